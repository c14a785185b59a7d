use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::cpq::catalog::MaterialSpec;
use crate::cpq::graph;
use crate::cpq::policy::Scenario;
use crate::domain::task::{TaskId, Trade};
use crate::extraction::QualityFlag;
use crate::trust::TrustAssessment;

pub const SYSTEM_NAME: &str = "Renoquote Pricing Engine";
pub const DEFAULT_ZONE_NAME: &str = "Bathroom";
const MONEY_DECIMALS: u32 = 2;
/// Ceiling for any single money figure, in currency units.
pub const MAX_MONEY_UNITS: i64 = 1_000_000_000_000_000;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuoteId(pub String);

impl QuoteId {
    /// `Q-<yyyymmddHHMMSS>-<8 hex>`; the random suffix keeps same-second ids apart.
    pub fn generate(at: DateTime<Utc>) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("Q-{}-{}", at.format("%Y%m%d%H%M%S"), &suffix[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LaborBreakdown {
    pub hours: f64,
    #[serde(with = "rust_decimal::serde::float")]
    pub cost: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaterialBreakdown {
    #[serde(with = "rust_decimal::serde::float")]
    pub cost: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub margin: f64,
    #[serde(with = "rust_decimal::serde::float")]
    pub net_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub vat_rate: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub vat_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskPricing {
    pub task: TaskId,
    pub quantity: f64,
    pub unit: String,
    pub unit_material_desc: Option<MaterialSpec>,
    pub labor: LaborBreakdown,
    pub materials: MaterialBreakdown,
    pub pricing: PriceBreakdown,
    pub estimated_duration_days: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub zone_name: String,
    pub area_m2: f64,
    pub city: String,
    pub city_index: f64,
    pub tasks: Vec<TaskPricing>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    #[serde(with = "rust_decimal::serde::float")]
    pub net_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub vat_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
}

impl Totals {
    /// Exact sums of the task amounts, saturating at the `Decimal` bounds.
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a TaskPricing>) -> Self {
        tasks.into_iter().fold(Self::default(), |totals, task| Self {
            net_price: add_money(totals.net_price, task.pricing.net_price),
            vat_amount: add_money(totals.vat_amount, task.pricing.vat_amount),
            total_price: add_money(totals.total_price, task.pricing.total_price),
        })
    }
}

fn add_money(total: Decimal, amount: Decimal) -> Decimal {
    total.checked_add(amount).unwrap_or_else(|| {
        warn!(
            event_name = "quote.totals.saturated",
            total = %total,
            amount = %amount,
            "quote total left the decimal range and was saturated"
        );
        if amount.is_sign_negative() {
            Decimal::MIN
        } else {
            Decimal::MAX
        }
    })
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Assumptions {
    /// Area stated in the transcript; `None` when the fallback area was used.
    pub transcript_area_m2: Option<f64>,
    pub defaults_applied: bool,
    pub budget_conscious: bool,
    pub city: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Confidence {
    pub score: f64,
    pub flags: Vec<QualityFlag>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub quote_id: QuoteId,
    pub created_utc: DateTime<Utc>,
    pub system: String,
    pub currency: String,
    pub scenario: Scenario,
    pub zones: Vec<Zone>,
    pub totals: Totals,
    pub assumptions: Assumptions,
    pub confidence: Confidence,
    pub trust: TrustAssessment,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteInsights {
    pub task_count: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg_task_price: Decimal,
    /// Distinct trades on site, in first-scheduled order.
    pub trades: Vec<Trade>,
    /// Mean complexity weight of the catalog tasks, 2 dp.
    pub avg_complexity: f64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalsComparison {
    #[serde(with = "rust_decimal::serde::float")]
    pub previous_total: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub current_total: Decimal,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub pct_change: Option<Decimal>,
}

impl Quote {
    pub fn tasks(&self) -> impl Iterator<Item = &TaskPricing> {
        self.zones.iter().flat_map(|zone| zone.tasks.iter())
    }

    pub fn insights(&self) -> QuoteInsights {
        let task_count = self.tasks().count();
        let avg_task_price = if task_count == 0 {
            Decimal::ZERO
        } else {
            let total = self.tasks().fold(Decimal::ZERO, |sum, task| {
                add_money(sum, task.pricing.total_price)
            });
            round_money(total / Decimal::from(task_count))
        };

        let mut trades: Vec<Trade> = Vec::new();
        let mut complexity = Vec::new();
        for node in self.tasks().filter_map(|task| graph::node(task.task.as_str())) {
            if !trades.contains(&node.trade) {
                trades.push(node.trade);
            }
            complexity.push(node.complexity_weight);
        }
        let avg_complexity = if complexity.is_empty() {
            0.0
        } else {
            let mean = complexity.iter().sum::<f64>() / complexity.len() as f64;
            (mean * 100.0).round() / 100.0
        };

        QuoteInsights { task_count, avg_task_price, trades, avg_complexity }
    }
}

pub fn compare_totals(previous: &Quote, current: &Quote) -> TotalsComparison {
    let previous_total = previous.totals.total_price;
    let current_total = current.totals.total_price;
    let pct_change = (!previous_total.is_zero()).then(|| {
        let change = (current_total - previous_total) / previous_total * Decimal::ONE_HUNDRED;
        round_money(change)
    });

    TotalsComparison { previous_total, current_total, pct_change }
}

pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
}

/// Unrounded money amount held within `±MAX_MONEY_UNITS`, and whether it had to be clamped.
///
/// NaN carries no amount at all; it becomes zero and is reported as clamped.
pub fn saturating_money(amount: f64) -> (Decimal, bool) {
    if amount.is_nan() {
        return (Decimal::ZERO, true);
    }
    let ceiling = MAX_MONEY_UNITS as f64;
    let bounded = amount.clamp(-ceiling, ceiling);
    (Decimal::from_f64(bounded).unwrap_or(Decimal::ZERO), bounded != amount)
}

pub fn money_ceiling() -> Decimal {
    Decimal::from(MAX_MONEY_UNITS)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::{
        compare_totals, money_ceiling, round_money, saturating_money, Assumptions, Confidence,
        LaborBreakdown, MaterialBreakdown, PriceBreakdown, Quote, QuoteId, TaskPricing, Totals,
        Zone,
    };
    use crate::cpq::policy::Scenario;
    use crate::domain::task::{TaskId, Trade};
    use crate::trust::{TrustAssessment, TrustFactors};

    #[test]
    fn generated_ids_carry_timestamp_and_random_suffix() {
        let at = Utc.with_ymd_and_hms(2025, 3, 9, 14, 5, 7).single().expect("valid time");
        let first = QuoteId::generate(at);
        let second = QuoteId::generate(at);

        assert!(first.as_str().starts_with("Q-20250309140507-"));
        assert_eq!(first.as_str().len(), "Q-20250309140507-".len() + 8);
        assert_ne!(first, second);
    }

    #[test]
    fn money_rounds_half_away_from_zero() {
        assert_eq!(round_money(Decimal::new(12345, 3)), Decimal::new(1235, 2));
        assert_eq!(round_money(Decimal::new(-12345, 3)), Decimal::new(-1235, 2));
        assert_eq!(round_money(saturating_money(19.999).0), Decimal::new(2000, 2));
    }

    #[test]
    fn money_saturates_at_the_ceiling() {
        assert_eq!(saturating_money(110.0), (Decimal::new(110, 0), false));
        assert_eq!(saturating_money(1e30), (money_ceiling(), true));
        assert_eq!(saturating_money(f64::INFINITY), (money_ceiling(), true));
        assert_eq!(saturating_money(f64::NEG_INFINITY), (-money_ceiling(), true));
        assert_eq!(saturating_money(f64::NAN), (Decimal::ZERO, true));
    }

    #[test]
    fn totals_saturate_instead_of_overflowing() {
        let quote = quote_with_prices(&[Decimal::MAX, Decimal::MAX, Decimal::new(100, 0)]);
        assert_eq!(quote.totals.total_price, Decimal::MAX);
        assert_eq!(quote.insights().task_count, 3);
    }

    #[test]
    fn totals_sum_rounded_task_amounts() {
        let quote = quote_with_prices(&[Decimal::new(11000, 2), Decimal::new(5550, 2)]);
        assert_eq!(quote.totals.total_price, Decimal::new(16550, 2));
        assert_eq!(quote.totals.net_price + quote.totals.vat_amount, quote.totals.total_price);
    }

    #[test]
    fn insights_average_task_prices() {
        let quote = quote_with_prices(&[Decimal::new(10000, 2), Decimal::new(5001, 2)]);
        let insights = quote.insights();
        assert_eq!(insights.task_count, 2);
        assert_eq!(insights.avg_task_price, Decimal::new(7501, 2));

        assert_eq!(insights.trades, vec![Trade::Tiling]);
        assert_eq!(insights.avg_complexity, 1.1);

        let empty = quote_with_prices(&[]).insights();
        assert_eq!(empty.task_count, 0);
        assert_eq!(empty.avg_task_price, Decimal::ZERO);
        assert!(empty.trades.is_empty());
        assert_eq!(empty.avg_complexity, 0.0);
    }

    #[test]
    fn comparison_reports_percent_change() {
        let previous = quote_with_prices(&[Decimal::new(20000, 2)]);
        let current = quote_with_prices(&[Decimal::new(25000, 2)]);
        let comparison = compare_totals(&previous, &current);
        assert_eq!(comparison.pct_change, Some(Decimal::new(2500, 2)));

        let zero = quote_with_prices(&[]);
        assert_eq!(compare_totals(&zero, &current).pct_change, None);
    }

    #[test]
    fn quote_serializes_with_external_field_names() {
        let quote = quote_with_prices(&[Decimal::new(11000, 2)]);
        let json = serde_json::to_value(&quote).expect("serialize quote");

        assert_eq!(json["quote_id"], "Q-TEST");
        assert_eq!(json["scenario"], "mid");
        assert_eq!(json["zones"][0]["zone_name"], "Bathroom");
        assert_eq!(json["zones"][0]["tasks"][0]["task"], "tiling_floor");
        assert_eq!(json["zones"][0]["tasks"][0]["pricing"]["total_price"], 110.0);
        assert_eq!(json["totals"]["vat_amount"], 10.0);
        assert!(json["zones"][0]["tasks"][0]["unit_material_desc"].is_null());
        assert_eq!(json["assumptions"]["transcript_area_m2"], 4.0);
        assert_eq!(json["trust"]["factors"]["data_completeness"], 0.9);
    }

    fn quote_with_prices(prices: &[Decimal]) -> Quote {
        let tasks: Vec<TaskPricing> = prices.iter().map(|price| task_with_total(*price)).collect();
        let totals = Totals::from_tasks(&tasks);
        Quote {
            quote_id: QuoteId("Q-TEST".to_string()),
            created_utc: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().expect("valid time"),
            system: super::SYSTEM_NAME.to_string(),
            currency: "EUR".to_string(),
            scenario: Scenario::Mid,
            zones: vec![Zone {
                zone_name: super::DEFAULT_ZONE_NAME.to_string(),
                area_m2: 4.0,
                city: "Marseille".to_string(),
                city_index: 0.95,
                tasks,
            }],
            totals,
            assumptions: Assumptions {
                transcript_area_m2: Some(4.0),
                defaults_applied: false,
                budget_conscious: false,
                city: "Marseille".to_string(),
            },
            confidence: Confidence { score: 0.9, flags: Vec::new() },
            trust: TrustAssessment {
                score: 0.76,
                factors: TrustFactors {
                    data_completeness: 0.9,
                    price_reasonability: 0.85,
                    market_volatility: 0.7,
                    historical_accuracy: 0.6,
                },
            },
        }
    }

    fn task_with_total(total: Decimal) -> TaskPricing {
        let vat = round_money(total / Decimal::new(11, 0));
        TaskPricing {
            task: TaskId::from("tiling_floor"),
            quantity: 4.0,
            unit: "m2".to_string(),
            unit_material_desc: None,
            labor: LaborBreakdown { hours: 6.0, cost: Decimal::new(5000, 2) },
            materials: MaterialBreakdown { cost: Decimal::new(4000, 2) },
            pricing: PriceBreakdown {
                margin: 0.18,
                net_price: total - vat,
                vat_rate: Decimal::new(10, 2),
                vat_amount: vat,
                total_price: total,
            },
            estimated_duration_days: 1,
        }
    }
}
