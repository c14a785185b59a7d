//! Post-assembly trust scoring.
//!
//! Four factors, each in `[0, 1]` and rounded to two decimals; the overall score is their
//! mean. Two factors read the assembled zones, the other two read acceptance history.

use serde::{Deserialize, Serialize};

use crate::cpq::policy::{MAX_MARGIN, MIN_MARGIN};
use crate::domain::quote::{money_ceiling, TaskPricing, Zone};

/// Number of most recent outcomes the trust scorer looks at.
pub const TRUST_WINDOW: usize = 10;

const COMPLETE_DATA_SCORE: f64 = 0.9;
const REASONABLE_PRICE_SCORE: f64 = 0.85;
const NO_HISTORY_VOLATILITY: f64 = 0.7;
const NO_HISTORY_ACCURACY: f64 = 0.6;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrustFactors {
    pub data_completeness: f64,
    pub price_reasonability: f64,
    pub market_volatility: f64,
    pub historical_accuracy: f64,
}

impl TrustFactors {
    pub fn mean(&self) -> f64 {
        (self.data_completeness
            + self.price_reasonability
            + self.market_volatility
            + self.historical_accuracy)
            / 4.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrustAssessment {
    pub score: f64,
    pub factors: TrustFactors,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TrustScorer;

impl TrustScorer {
    /// `recent_acceptance` is the accepted share of the last [`TRUST_WINDOW`] outcomes.
    pub fn score(&self, zones: &[Zone], recent_acceptance: Option<f64>) -> TrustAssessment {
        let (market_volatility, historical_accuracy) = match recent_acceptance {
            Some(ratio) => {
                let ratio = ratio.clamp(0.0, 1.0);
                (0.6 + 0.4 * ratio, 0.5 + 0.5 * ratio)
            }
            None => (NO_HISTORY_VOLATILITY, NO_HISTORY_ACCURACY),
        };

        let factors = TrustFactors {
            data_completeness: round2(data_completeness(zones)),
            price_reasonability: round2(price_reasonability(zones)),
            market_volatility: round2(market_volatility),
            historical_accuracy: round2(historical_accuracy),
        };

        TrustAssessment { score: round2(factors.mean()), factors }
    }
}

fn data_completeness(zones: &[Zone]) -> f64 {
    let complete = !zones.is_empty()
        && zones.iter().all(|zone| {
            zone.area_m2 > 0.0 && !zone.city.trim().is_empty() && !zone.tasks.is_empty()
        });
    if complete {
        COMPLETE_DATA_SCORE
    } else {
        0.0
    }
}

/// Every margin within policy and no net price pinned at the money ceiling.
fn price_reasonability(zones: &[Zone]) -> f64 {
    let ceiling = money_ceiling();
    let within_bounds = |task: &TaskPricing| {
        (MIN_MARGIN..=MAX_MARGIN).contains(&task.pricing.margin)
            && task.pricing.net_price.abs() < ceiling
    };

    let mut tasks = zones.iter().flat_map(|zone| zone.tasks.iter()).peekable();
    if tasks.peek().is_none() {
        return 0.0;
    }
    if tasks.all(within_bounds) {
        REASONABLE_PRICE_SCORE
    } else {
        0.0
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
