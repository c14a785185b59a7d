//! Task dependency graph.
//!
//! Tasks are linked through signals: a task `requires` signals that other tasks `produce`.
//! The resolver orders a requested task list so producers run before their dependents.

use std::collections::{BTreeSet, HashSet};

use tracing::warn;

use crate::domain::task::{TaskId, TaskNode, Trade};

pub const SUBSTRATE_EXPOSED: &str = "substrate_exposed";

const MAX_RESOLUTION_PASSES: usize = 100;

static TASK_GRAPH: [TaskNode; 6] = [
    TaskNode {
        key: "demolition_tiles",
        requires: &[],
        produces: &[SUBSTRATE_EXPOSED],
        trade: Trade::Demolition,
        complexity_weight: 1.0,
    },
    TaskNode {
        key: "plumbing_shower",
        requires: &[SUBSTRATE_EXPOSED],
        produces: &[],
        trade: Trade::Plumbing,
        complexity_weight: 1.1,
    },
    TaskNode {
        key: "toilet_replace",
        requires: &[SUBSTRATE_EXPOSED],
        produces: &[],
        trade: Trade::Plumbing,
        complexity_weight: 1.0,
    },
    TaskNode {
        key: "vanity_install",
        requires: &[SUBSTRATE_EXPOSED],
        produces: &[],
        trade: Trade::Carpentry,
        complexity_weight: 1.0,
    },
    TaskNode {
        key: "tiling_floor",
        requires: &[SUBSTRATE_EXPOSED],
        produces: &[],
        trade: Trade::Tiling,
        complexity_weight: 1.1,
    },
    TaskNode {
        key: "painting_walls",
        requires: &[],
        produces: &[],
        trade: Trade::Painting,
        complexity_weight: 0.9,
    },
];

pub fn node(task: &str) -> Option<&'static TaskNode> {
    TASK_GRAPH.iter().find(|node| node.key == task)
}

/// First catalog task that produces `signal`.
pub fn producer_of(signal: &str) -> Option<&'static TaskNode> {
    TASK_GRAPH.iter().find(|node| node.produces.contains(&signal))
}

/// Producer tasks missing from `tasks` for any signal a requested task requires.
pub fn implied_requirements(tasks: &[TaskId]) -> Vec<TaskId> {
    let present = tasks.iter().map(TaskId::as_str).collect::<HashSet<_>>();
    let mut implied: Vec<TaskId> = Vec::new();

    for task in tasks {
        let Some(node) = node(task.as_str()) else {
            continue;
        };
        for signal in node.requires {
            let Some(producer) = producer_of(signal) else {
                continue;
            };
            if present.contains(producer.key) || implied.iter().any(|t| t.as_str() == producer.key)
            {
                continue;
            }
            implied.push(TaskId::from(producer.key));
        }
    }

    implied
}

/// Requested tasks followed by their implied producers, without duplicates.
pub fn with_implied_requirements(tasks: &[TaskId]) -> Vec<TaskId> {
    let implied = implied_requirements(tasks);
    dedup_preserving_order(tasks.iter().chain(implied.iter()))
}

/// Orders tasks so every producer of a required signal is scheduled before its dependents.
///
/// Each pass walks the pending tasks in input order and schedules every task whose
/// requirements are met. When a pass makes no progress the remaining tasks are appended
/// in input order; this happens for cycles and for requirements whose producer is not in
/// the list.
pub fn resolve_order(tasks: &[TaskId]) -> Vec<TaskId> {
    let mut pending = dedup_preserving_order(tasks.iter());
    let mut ordered = Vec::with_capacity(pending.len());
    let mut satisfied: BTreeSet<&'static str> = BTreeSet::new();
    let mut passes = 0;

    while !pending.is_empty() && passes < MAX_RESOLUTION_PASSES {
        passes += 1;
        let mut progressed = false;
        let mut still_pending = Vec::with_capacity(pending.len());

        for task in pending {
            match node(task.as_str()) {
                None => {
                    ordered.push(task);
                    progressed = true;
                }
                Some(node) if requirements_met(node, &satisfied) => {
                    satisfied.extend(node.produces.iter().copied());
                    ordered.push(task);
                    progressed = true;
                }
                Some(_) => still_pending.push(task),
            }
        }

        pending = still_pending;
        if !progressed {
            break;
        }
    }

    if !pending.is_empty() {
        warn!(
            event_name = "graph.resolution.degraded",
            unresolved = ?pending.iter().map(TaskId::as_str).collect::<Vec<_>>(),
            passes,
            "task dependencies could not be fully resolved; appending remaining tasks in input order"
        );
        ordered.extend(pending);
    }

    ordered
}

fn requirements_met(node: &TaskNode, satisfied: &BTreeSet<&'static str>) -> bool {
    node.requires
        .iter()
        .all(|signal| producer_of(signal).is_none() || satisfied.contains(signal))
}

fn dedup_preserving_order<'a>(tasks: impl Iterator<Item = &'a TaskId>) -> Vec<TaskId> {
    let mut seen = HashSet::new();
    tasks.filter(|task| seen.insert(task.as_str().to_string())).cloned().collect()
}
