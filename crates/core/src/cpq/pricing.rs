//! Per-task cost computation.
//!
//! Quantity, material, labor, margin and VAT for each resolved task, plus quote totals.
//! Amounts are carried as `f64` while multipliers compound and become `Decimal` money
//! only at the end of each task. Money beyond `±MAX_MONEY_UNITS` is clamped, and the task is
//! reported in [`PricedTasks::out_of_range`].

use serde::{Deserialize, Serialize};

use crate::cpq::catalog::Catalog;
use crate::cpq::market::MarketAdjustments;
use crate::cpq::policy::Scenario;
use crate::cpq::supplier::SupplierPriceSource;
use crate::cpq::vat::vat_rate_for_task;
use crate::domain::quote::{
    round_money, saturating_money, LaborBreakdown, MaterialBreakdown, PriceBreakdown,
    TaskPricing, Totals,
};
use crate::domain::task::TaskId;
use crate::feedback::FeedbackState;

pub const DEFAULT_HOURLY_RATE: f64 = 48.0;
pub const HOURS_PER_WORKDAY: f64 = 6.0;
/// Wall surface painted per square meter of floor.
pub const WALL_TO_FLOOR_RATIO: f64 = 2.6;

const CATALOG_TILE_WEIGHT: f64 = 0.7;
const SUPPLIER_TILE_WEIGHT: f64 = 0.3;
const BUDGET_MATERIAL_FACTOR: f64 = 0.9;
const BUDGET_SPEC_TASKS: [&str; 3] = ["tiling_floor", "vanity_install", "toilet_replace"];

/// Everything about one quote that is shared by all of its tasks.
#[derive(Clone, Debug, PartialEq)]
pub struct PricingContext<'a> {
    pub area_m2: f64,
    pub city: &'a str,
    pub budget_conscious: bool,
    pub market: MarketAdjustments,
    pub scenario: Scenario,
    pub margin: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricedTasks {
    pub tasks: Vec<TaskPricing>,
    pub totals: Totals,
    /// Tasks whose amounts had to be clamped to the money ceiling.
    pub out_of_range: Vec<TaskId>,
}

pub struct CostEngine<'a, S: ?Sized> {
    catalog: &'a Catalog,
    supplier: &'a S,
    feedback: &'a FeedbackState,
    hourly_rate: f64,
}

impl<'a, S> CostEngine<'a, S>
where
    S: SupplierPriceSource + ?Sized,
{
    pub fn new(
        catalog: &'a Catalog,
        supplier: &'a S,
        feedback: &'a FeedbackState,
        hourly_rate: f64,
    ) -> Self {
        Self { catalog, supplier, feedback, hourly_rate }
    }

    pub fn price_tasks(&self, tasks: &[TaskId], context: &PricingContext<'_>) -> PricedTasks {
        let mut priced = Vec::with_capacity(tasks.len());
        let mut out_of_range = Vec::new();
        for task in tasks {
            let (pricing, clamped) = self.price_task_bounded(task, context);
            if clamped {
                out_of_range.push(task.clone());
            }
            priced.push(pricing);
        }

        let totals = Totals::from_tasks(&priced);
        PricedTasks { tasks: priced, totals, out_of_range }
    }

    pub fn price_task(&self, task: &TaskId, context: &PricingContext<'_>) -> TaskPricing {
        self.price_task_bounded(task, context).0
    }

    fn price_task_bounded(&self, task: &TaskId, context: &PricingContext<'_>) -> (TaskPricing, bool) {
        let quantity = quantity_for_task(task.as_str(), context.area_m2);
        let material = self.material_cost(task.as_str(), quantity, context);
        let (hours, labor) = self.labor(task.as_str(), quantity, context);

        let (material_cost, material_clamped) = saturating_money(material);
        let (labor_cost, labor_clamped) = saturating_money(labor);
        let (net_exact, net_clamped) = saturating_money((material + labor) * (1.0 + context.margin));
        let vat_rate = vat_rate_for_task(task.as_str());
        let net_price = round_money(net_exact);
        let vat_amount = round_money(net_exact * vat_rate);

        let pricing = TaskPricing {
            task: task.clone(),
            quantity: round2(quantity),
            unit: self.catalog.unit_for(task.as_str()).to_string(),
            unit_material_desc: self.catalog.material_spec(task.as_str()).cloned(),
            labor: LaborBreakdown { hours: round2(hours), cost: round_money(labor_cost) },
            materials: MaterialBreakdown { cost: round_money(material_cost) },
            pricing: PriceBreakdown {
                margin: context.margin,
                net_price,
                vat_rate,
                vat_amount,
                total_price: net_price + vat_amount,
            },
            estimated_duration_days: estimated_duration_days(hours),
        };
        (pricing, material_clamped || labor_clamped || net_clamped)
    }

    /// Material cost after supplier blending, budget spec, market and scenario factors.
    pub fn material_cost(&self, task: &str, quantity: f64, context: &PricingContext<'_>) -> f64 {
        let mut cost = match (task, self.catalog.material_spec(task)) {
            ("tiling_floor", Some(spec)) => {
                let anchor = self.supplier.tile_price(Some(context.city));
                let per_unit = CATALOG_TILE_WEIGHT * spec.cost_per_unit * spec.wastage_factor
                    + SUPPLIER_TILE_WEIGHT * anchor.unit_price_eur;
                per_unit * quantity
            }
            _ => self.catalog.material_cost(task, quantity),
        };

        if context.budget_conscious && BUDGET_SPEC_TASKS.contains(&task) {
            cost *= BUDGET_MATERIAL_FACTOR;
        }

        cost * context.market.material * context.scenario.deltas().material
    }

    /// `(hours, cost)`; tasks without a labor baseline cost nothing.
    pub fn labor(&self, task: &str, quantity: f64, context: &PricingContext<'_>) -> (f64, f64) {
        let Some(baseline) = self.catalog.labor_baseline(task) else {
            return (0.0, 0.0);
        };

        let hours = baseline.labor_hours_per_unit
            * quantity
            * self.feedback.multiplier_for(context.city, task)
            * self.catalog.city_index(Some(context.city));
        let cost = hours
            * self.hourly_rate
            * context.market.labor
            * context.scenario.deltas().labor;

        (hours, cost)
    }
}

pub fn quantity_for_task(task: &str, area_m2: f64) -> f64 {
    let area = area_m2.max(0.0);
    match task {
        "tiling_floor" | "demolition_tiles" => area,
        "painting_walls" => wall_area_from_floor(area),
        _ => 1.0,
    }
}

pub fn wall_area_from_floor(area_m2: f64) -> f64 {
    round2(area_m2.max(0.0) * WALL_TO_FLOOR_RATIO)
}

pub fn estimated_duration_days(hours: f64) -> u32 {
    let days = (hours / HOURS_PER_WORKDAY).ceil();
    if days.is_finite() && days > 1.0 {
        days as u32
    } else {
        1
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
