//! Feedback memory.
//!
//! Holds learned labor-hour multipliers per (city, task) and the chronological record of
//! quote outcomes. The store loads once when opened and flushes after every mutation.
//! Readers work from an immutable snapshot and never wait on a flush.
//!
//! Several stores may share one backing file, in this process or another. Each mutation
//! holds the storage lock while it re-reads the file, applies its change and saves, so a
//! write made through another handle is folded in rather than overwritten.

mod persistence;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::quote::QuoteId;

pub use persistence::{
    FeedbackPersistence, InMemoryPersistence, JsonFilePersistence, StorageLock,
};

pub const MIN_MULTIPLIER: f64 = 0.85;
pub const MAX_MULTIPLIER: f64 = 1.15;

const EMA_RETAIN: f64 = 0.8;
const EMA_LEARN: f64 = 0.2;

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("could not read feedback file `{path}`: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("feedback file `{path}` is corrupt: {source}")]
    Corrupt { path: String, source: serde_json::Error },
    #[error("could not write feedback file `{path}`: {source}")]
    Write { path: String, source: std::io::Error },
    #[error("could not lock feedback file `{path}`: {source}")]
    Lock { path: String, source: std::io::Error },
    #[error("could not encode feedback state: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("feedback store lock poisoned")]
    LockPoisoned,
}

impl<T> From<PoisonError<T>> for FeedbackError {
    fn from(_: PoisonError<T>) -> Self {
        Self::LockPoisoned
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LearnedMultiplier {
    pub multiplier: f64,
    #[serde(alias = "n", default)]
    pub count: u64,
}

impl Default for LearnedMultiplier {
    fn default() -> Self {
        Self { multiplier: 1.0, count: 0 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub quote_id: QuoteId,
    pub accepted: bool,
    #[serde(alias = "ts")]
    pub timestamp: DateTime<Utc>,
}

/// Persisted feedback document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackState {
    #[serde(default)]
    pub per_city_task: BTreeMap<String, LearnedMultiplier>,
    #[serde(default)]
    pub history: Vec<OutcomeRecord>,
}

impl FeedbackState {
    pub fn multiplier_for(&self, city: &str, task: &str) -> f64 {
        let stored = self
            .per_city_task
            .get(&feedback_key(city, task))
            .map(|entry| entry.multiplier)
            .unwrap_or(1.0);
        clamp_multiplier(stored)
    }

    pub fn recent_acceptance_ratio(&self, window: usize) -> Option<f64> {
        if window == 0 || self.history.is_empty() {
            return None;
        }

        let start = self.history.len().saturating_sub(window);
        let recent = &self.history[start..];
        let accepted = recent.iter().filter(|record| record.accepted).count();
        Some(accepted as f64 / recent.len() as f64)
    }
}

pub fn feedback_key(city: &str, task: &str) -> String {
    format!("{}::{}", city.to_lowercase(), task)
}

pub fn clamp_multiplier(value: f64) -> f64 {
    if value.is_nan() {
        return 1.0;
    }
    value.clamp(MIN_MULTIPLIER, MAX_MULTIPLIER)
}

pub struct FeedbackStore {
    persistence: Box<dyn FeedbackPersistence>,
    snapshot: RwLock<Arc<FeedbackState>>,
    writer: Mutex<()>,
}

impl FeedbackStore {
    /// Loads the persisted state; unreadable or corrupt state degrades to an empty store.
    pub fn open(persistence: impl FeedbackPersistence + 'static) -> Self {
        let state = match persistence.load() {
            Ok(state) => state,
            Err(error) => {
                warn!(
                    event_name = "feedback.load.degraded",
                    location = %persistence.describe(),
                    error = %error,
                    "feedback state unreadable; starting from an empty store"
                );
                FeedbackState::default()
            }
        };

        Self {
            persistence: Box::new(persistence),
            snapshot: RwLock::new(Arc::new(state)),
            writer: Mutex::new(()),
        }
    }

    pub fn in_memory() -> Self {
        Self::open(InMemoryPersistence::default())
    }

    pub fn snapshot(&self) -> Arc<FeedbackState> {
        match self.snapshot.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn multiplier_for(&self, city: &str, task: &str) -> f64 {
        self.snapshot().multiplier_for(city, task)
    }

    pub fn recent_acceptance_ratio(&self, window: usize) -> Option<f64> {
        self.snapshot().recent_acceptance_ratio(window)
    }

    /// Folds one observed/estimated hours ratio into the (city, task) multiplier.
    pub fn learn(
        &self,
        city: &str,
        task: &str,
        actual_hours: f64,
        estimated_hours: f64,
    ) -> Result<f64, FeedbackError> {
        let ratio = if estimated_hours > 0.0 { actual_hours / estimated_hours } else { 1.0 };
        let ratio = if ratio.is_finite() { ratio } else { 1.0 };
        let key = feedback_key(city, task);

        let mut learned = 1.0;
        self.mutate(|state| {
            let entry = state.per_city_task.entry(key.clone()).or_default();
            entry.multiplier =
                clamp_multiplier(EMA_RETAIN * clamp_multiplier(entry.multiplier) + EMA_LEARN * ratio);
            entry.count += 1;
            learned = entry.multiplier;
        })?;

        debug!(
            event_name = "feedback.learned",
            key = %key,
            ratio,
            multiplier = learned,
            "updated learned multiplier"
        );
        Ok(learned)
    }

    pub fn record_outcome(&self, quote_id: &QuoteId, accepted: bool) -> Result<(), FeedbackError> {
        self.mutate(|state| {
            state.history.push(OutcomeRecord {
                quote_id: quote_id.clone(),
                accepted,
                timestamp: Utc::now(),
            });
        })?;

        debug!(
            event_name = "feedback.outcome_recorded",
            quote_id = %quote_id,
            accepted,
            "recorded quote outcome"
        );
        Ok(())
    }

    /// Applies `change` to the latest stored state, publishes it and flushes it.
    ///
    /// The storage lock is held from the re-read through the save. Other handles on the same
    /// file may have written since this store last looked, and starting from our own
    /// snapshot would drop their entries. A corrupt file is replaced, starting from the
    /// current snapshot.
    ///
    /// The new state stays published when the flush fails; the error is returned so the
    /// caller knows the change is not yet durable.
    fn mutate(&self, change: impl FnOnce(&mut FeedbackState)) -> Result<(), FeedbackError> {
        let _writer = self.writer.lock()?;
        let _storage = self.persistence.lock()?;

        let mut next = match self.persistence.load() {
            Ok(stored) => stored,
            Err(error @ FeedbackError::Corrupt { .. }) => {
                warn!(
                    event_name = "feedback.reload.corrupt",
                    location = %self.persistence.describe(),
                    error = %error,
                    "stored feedback unreadable; continuing from the in-memory snapshot"
                );
                FeedbackState::clone(&self.snapshot())
            }
            Err(error) => return Err(error),
        };
        change(&mut next);
        let next = Arc::new(next);

        {
            let mut published = self.snapshot.write()?;
            *published = Arc::clone(&next);
        }

        self.persistence.save(&next).map_err(|error| {
            warn!(
                event_name = "feedback.flush.failed",
                location = %self.persistence.describe(),
                error = %error,
                "feedback state could not be flushed"
            );
            error
        })
    }
}

impl std::fmt::Debug for FeedbackStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackStore")
            .field("persistence", &self.persistence.describe())
            .finish_non_exhaustive()
    }
}
