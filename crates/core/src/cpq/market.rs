//! Macro-market adjustments.
//!
//! Inflation lifts both materials and labor, shortages hit materials only, and the
//! season moves labor cost and the margin stance.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seasonality {
    Peak,
    Off,
    #[default]
    Neutral,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unsupported seasonality `{0}` (expected peak|off|neutral)")]
pub struct SeasonalityParseError(pub String);

impl FromStr for Seasonality {
    type Err = SeasonalityParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "peak" => Ok(Self::Peak),
            "off" => Ok(Self::Off),
            "neutral" => Ok(Self::Neutral),
            other => Err(SeasonalityParseError(other.to_string())),
        }
    }
}

impl fmt::Display for Seasonality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Peak => "peak",
            Self::Off => "off",
            Self::Neutral => "neutral",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketConditions {
    /// Fractional inflation, `0.05` meaning +5%.
    pub inflation: f64,
    pub seasonality: Seasonality,
    /// Shortage severity in `[0, 1]`.
    pub shortage: f64,
}

impl MarketConditions {
    pub fn new(inflation: f64, seasonality: Seasonality, shortage: f64) -> Self {
        Self { inflation, seasonality, shortage }
    }

    pub fn material_multiplier(&self) -> f64 {
        (1.0 + self.inflation) * (1.0 + 0.10 * self.shortage)
    }

    pub fn labor_multiplier(&self) -> f64 {
        let seasonal = match self.seasonality {
            Seasonality::Peak => 1.05,
            Seasonality::Off => 0.98,
            Seasonality::Neutral => 1.0,
        };
        (1.0 + 0.6 * self.inflation) * seasonal
    }

    pub fn margin_bump(&self) -> f64 {
        match self.seasonality {
            Seasonality::Peak => 0.01,
            Seasonality::Off => -0.005,
            Seasonality::Neutral => 0.0,
        }
    }

    pub fn adjustments(&self) -> MarketAdjustments {
        MarketAdjustments {
            material: self.material_multiplier(),
            labor: self.labor_multiplier(),
            margin_bump: self.margin_bump(),
        }
    }
}

/// Multipliers derived from [`MarketConditions`], computed once per quote.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketAdjustments {
    pub material: f64,
    pub labor: f64,
    pub margin_bump: f64,
}

impl Default for MarketAdjustments {
    fn default() -> Self {
        MarketConditions::default().adjustments()
    }
}
