//! Transcript feature extraction.
//!
//! Pattern-based heuristics that pull the job area, city, budget stance and requested
//! tasks out of a free-text transcript. The extractor reports what it finds and never
//! substitutes defaults; missing values stay `None` for the caller to resolve.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::task::TaskId;

const TASK_PHRASES: [(&str, &[&str]); 6] = [
    (
        "demolition_tiles",
        &["remove the old tiles", "remove old tiles", "demo tiles", "tile removal"],
    ),
    (
        "plumbing_shower",
        &[
            "redo the plumbing for the shower",
            "plumbing for the shower",
            "shower plumbing",
            "redo plumbing",
        ],
    ),
    ("toilet_replace", &["replace the toilet", "toilet"]),
    ("vanity_install", &["install a vanity", "vanity"]),
    ("painting_walls", &["repaint the walls", "paint the walls", "repainting", "painting"]),
    ("tiling_floor", &["lay new ceramic floor tiles", "floor tiles", "tiling"]),
];

/// Keywords that force a task in regardless of the phrase table.
const OVERRIDE_KEYWORDS: [(&str, &str); 2] =
    [("toilet", "toilet_replace"), ("vanity", "vanity_install")];

/// Largest floor area taken from a transcript; anything above is treated as not stated.
pub const MAX_AREA_M2: f64 = 10_000.0;

const BASE_CONFIDENCE: f64 = 0.5;
const MAX_FLAG_PENALTY: f64 = 0.3;

lazy_static! {
    static ref AREA_PATTERN: Regex = Regex::new(
        r"(?i)(\d+(?:\.\d+)?)\s*(?:m2|m²|sqm|square\s+met(?:er|re)s?)"
    )
    .expect("area pattern is valid");

    static ref SPACED_AREA_PATTERN: Regex =
        Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*m\s*[²2]").expect("spaced area pattern is valid");

    static ref CITY_PATTERN: Regex =
        Regex::new(r"(?i)located in ([A-Za-zÀ-ÿ\- ]+)").expect("city pattern is valid");

    static ref BUDGET_PATTERN: Regex =
        Regex::new(r"(?i)budget[- ]?conscious|tight budget|cost sensitive")
            .expect("budget pattern is valid");
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    MixedScopes,
    MissingArea,
    ImplausibleArea,
    NoRecognizedTasks,
    PriceOutOfRange,
}

impl QualityFlag {
    pub fn code(self) -> &'static str {
        match self {
            Self::MixedScopes => "mixed_scopes",
            Self::MissingArea => "missing_area",
            Self::ImplausibleArea => "implausible_area",
            Self::NoRecognizedTasks => "no_recognized_tasks",
            Self::PriceOutOfRange => "price_out_of_range",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::MixedScopes => "Kitchen and bathroom work mentioned for a single room",
            Self::MissingArea => "No floor area found in the transcript",
            Self::ImplausibleArea => "Stated floor area is beyond the supported range",
            Self::NoRecognizedTasks => "No known renovation task recognized",
            Self::PriceOutOfRange => "Some amounts hit the money ceiling and were clamped",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtractedScope {
    pub area_m2: Option<f64>,
    pub city: Option<String>,
    pub tasks: Vec<TaskId>,
    pub budget_conscious: bool,
    pub quality_flags: Vec<QualityFlag>,
    pub confidence: f64,
}

pub fn extract(text: &str) -> ExtractedScope {
    ExtractedScope {
        area_m2: extract_area(text),
        city: extract_city(text),
        tasks: detect_tasks(text),
        budget_conscious: is_budget_conscious(text),
        quality_flags: quality_flags(text),
        confidence: confidence_score(text),
    }
}

/// First area written in square meters.
///
/// Zero counts as absent, and so does anything above [`MAX_AREA_M2`].
pub fn extract_area(text: &str) -> Option<f64> {
    stated_area(text).filter(|area| area.is_finite() && *area <= MAX_AREA_M2)
}

fn stated_area(text: &str) -> Option<f64> {
    let captured = AREA_PATTERN
        .captures(text)
        .or_else(|| SPACED_AREA_PATTERN.captures(text))
        .and_then(|captures| captures.get(1))?;

    captured.as_str().parse::<f64>().ok().filter(|area| *area > 0.0)
}

pub fn extract_city(text: &str) -> Option<String> {
    let captured = CITY_PATTERN.captures(text)?.get(1)?;
    let city = captured.as_str().trim();
    (!city.is_empty()).then(|| city.to_string())
}

pub fn is_budget_conscious(text: &str) -> bool {
    BUDGET_PATTERN.is_match(text)
}

/// Recognized tasks in catalog order, each at most once.
///
/// Matching is a plain case-insensitive substring test, so overlapping phrases can
/// pull in several tasks.
pub fn detect_tasks(text: &str) -> Vec<TaskId> {
    let lowered = text.to_lowercase();
    let mut tasks: Vec<TaskId> = Vec::new();

    for (task, phrases) in TASK_PHRASES {
        if phrases.iter().any(|phrase| lowered.contains(phrase)) {
            tasks.push(TaskId::from(task));
        }
    }

    for (keyword, task) in OVERRIDE_KEYWORDS {
        if lowered.contains(keyword) && !tasks.iter().any(|t| t.as_str() == task) {
            tasks.push(TaskId::from(task));
        }
    }

    tasks
}

pub fn quality_flags(text: &str) -> Vec<QualityFlag> {
    let lowered = text.to_lowercase();
    let mut flags = Vec::new();

    if lowered.contains("kitchen") && lowered.contains("bath") {
        flags.push(QualityFlag::MixedScopes);
    }
    match stated_area(text) {
        None => flags.push(QualityFlag::MissingArea),
        Some(area) if !area.is_finite() || area > MAX_AREA_M2 => {
            flags.push(QualityFlag::ImplausibleArea)
        }
        Some(_) => {}
    }
    if detect_tasks(text).is_empty() {
        flags.push(QualityFlag::NoRecognizedTasks);
    }

    flags
}

pub fn confidence_score(text: &str) -> f64 {
    let mut score = BASE_CONFIDENCE;
    if extract_area(text).is_some() {
        score += 0.2;
    }
    if !detect_tasks(text).is_empty() {
        score += 0.2;
    }
    if extract_city(text).is_some() {
        score += 0.05;
    }
    if is_budget_conscious(text) {
        score += 0.05;
    }

    let penalty = (quality_flags(text).len() as f64 * 0.1).min(MAX_FLAG_PENALTY);
    let rounded = ((score - penalty) * 100.0).round() / 100.0;
    rounded.clamp(0.0, 1.0)
}
