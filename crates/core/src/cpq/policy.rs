use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const MIN_MARGIN: f64 = 0.12;
pub const MAX_MARGIN: f64 = 0.30;
pub const DEFAULT_BASE_MARGIN: f64 = 0.18;
/// Number of most recent outcomes the margin policy looks at.
pub const ACCEPTANCE_WINDOW: usize = 5;

const BUDGET_MARGIN_FACTOR: f64 = 0.9;
const ACCEPTANCE_STEP: f64 = 0.02;
const HIGH_ACCEPTANCE: f64 = 0.8;
const LOW_ACCEPTANCE: f64 = 0.4;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    Low,
    #[default]
    Mid,
    High,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDeltas {
    pub material: f64,
    pub labor: f64,
    pub margin: f64,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unsupported scenario `{0}` (expected low|mid|high)")]
pub struct ScenarioParseError(pub String);

impl Scenario {
    pub const ALL: [Scenario; 3] = [Scenario::Low, Scenario::Mid, Scenario::High];

    pub fn deltas(self) -> ScenarioDeltas {
        match self {
            Self::Low => ScenarioDeltas { material: 0.95, labor: 0.92, margin: -0.02 },
            Self::Mid => ScenarioDeltas { material: 1.0, labor: 1.0, margin: 0.0 },
            Self::High => ScenarioDeltas { material: 1.08, labor: 1.10, margin: 0.02 },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Mid => "mid",
            Self::High => "high",
        }
    }
}

impl FromStr for Scenario {
    type Err = ScenarioParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "mid" => Ok(Self::Mid),
            "high" => Ok(Self::High),
            other => Err(ScenarioParseError(other.to_string())),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MarginInput {
    pub budget_conscious: bool,
    pub market_bump: f64,
    pub scenario: Scenario,
    /// Accepted share of the last [`ACCEPTANCE_WINDOW`] outcomes, if any exist.
    pub recent_acceptance: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarginPolicy {
    pub base_margin: f64,
}

impl Default for MarginPolicy {
    fn default() -> Self {
        Self { base_margin: DEFAULT_BASE_MARGIN }
    }
}

impl MarginPolicy {
    pub fn new(base_margin: f64) -> Self {
        Self { base_margin }
    }

    /// Blended margin for one quote.
    ///
    /// Base, market bump and scenario delta are summed and clamped once; the
    /// acceptance-driven step is applied afterwards and clamped again.
    pub fn margin(&self, input: &MarginInput) -> f64 {
        let base = if input.budget_conscious {
            self.base_margin * BUDGET_MARGIN_FACTOR
        } else {
            self.base_margin
        };
        let composed = clamp_margin(base + input.market_bump + input.scenario.deltas().margin);
        let adjusted = apply_acceptance_adjustment(composed, input.recent_acceptance);

        debug!(
            event_name = "pricing.margin.resolved",
            base,
            composed,
            adjusted,
            scenario = %input.scenario,
            "margin policy resolved"
        );

        round_margin(adjusted)
    }
}

pub fn clamp_margin(margin: f64) -> f64 {
    if margin.is_nan() {
        return MIN_MARGIN;
    }
    margin.clamp(MIN_MARGIN, MAX_MARGIN)
}

/// Raises the margin after a run of accepted quotes and lowers it after rejections.
pub fn apply_acceptance_adjustment(margin: f64, recent_acceptance: Option<f64>) -> f64 {
    match recent_acceptance {
        Some(ratio) if ratio > HIGH_ACCEPTANCE => clamp_margin(margin + ACCEPTANCE_STEP),
        Some(ratio) if ratio < LOW_ACCEPTANCE => clamp_margin(margin - ACCEPTANCE_STEP),
        _ => margin,
    }
}

fn round_margin(margin: f64) -> f64 {
    (margin * 10_000.0).round() / 10_000.0
}
