pub mod catalog;
pub mod graph;
pub mod market;
pub mod policy;
pub mod pricing;
pub mod supplier;
pub mod vat;

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::domain::quote::{
    Assumptions, Confidence, Quote, QuoteId, Zone, DEFAULT_ZONE_NAME, SYSTEM_NAME,
};
use crate::domain::task::TaskId;
use crate::errors::ApplicationError;
use crate::extraction::{self, QualityFlag};
use crate::feedback::{FeedbackStore, JsonFilePersistence};
use crate::trust::{TrustScorer, TRUST_WINDOW};

use self::{
    catalog::Catalog,
    market::MarketConditions,
    policy::{MarginInput, MarginPolicy, Scenario, ACCEPTANCE_WINDOW},
    pricing::{CostEngine, PricingContext, DEFAULT_HOURLY_RATE},
    supplier::{DeterministicSupplierStub, SupplierPriceSource},
};

/// Tasks priced when nothing in the transcript maps to a known task.
pub const FALLBACK_TASKS: [&str; 2] = ["tiling_floor", "painting_walls"];
pub const DEFAULT_CURRENCY: &str = "EUR";
pub const DEFAULT_FALLBACK_CITY: &str = "Marseille";
pub const DEFAULT_FALLBACK_AREA_M2: f64 = 4.0;

#[derive(Clone, Debug, PartialEq)]
pub struct QuoteRequest {
    pub transcript: String,
    pub market: Option<MarketConditions>,
    pub scenario: Option<Scenario>,
}

impl QuoteRequest {
    pub fn new(transcript: impl Into<String>) -> Self {
        Self { transcript: transcript.into(), market: None, scenario: None }
    }

    pub fn with_market(mut self, market: MarketConditions) -> Self {
        self.market = Some(market);
        self
    }

    pub fn with_scenario(mut self, scenario: Scenario) -> Self {
        self.scenario = Some(scenario);
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EngineSettings {
    pub currency: String,
    pub hourly_rate: f64,
    pub fallback_city: String,
    pub fallback_area_m2: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            currency: DEFAULT_CURRENCY.to_string(),
            hourly_rate: DEFAULT_HOURLY_RATE,
            fallback_city: DEFAULT_FALLBACK_CITY.to_string(),
            fallback_area_m2: DEFAULT_FALLBACK_AREA_M2,
        }
    }
}

pub trait QuoteRuntime: Send + Sync {
    fn generate(&self, request: &QuoteRequest) -> Quote;
}

pub struct QuoteEngine<S = DeterministicSupplierStub> {
    catalog: Arc<Catalog>,
    supplier: S,
    margin_policy: MarginPolicy,
    feedback: Arc<FeedbackStore>,
    trust_scorer: TrustScorer,
    settings: EngineSettings,
}

impl QuoteEngine<DeterministicSupplierStub> {
    /// Built-in catalog, stub supplier and default settings over the given feedback store.
    pub fn new(feedback: Arc<FeedbackStore>) -> Self {
        Self::with_parts(
            Arc::new(Catalog::builtin()),
            DeterministicSupplierStub,
            MarginPolicy::default(),
            feedback,
            EngineSettings::default(),
        )
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ApplicationError> {
        let catalog = match &config.catalog.path {
            Some(path) => Catalog::from_toml_file(path)?,
            None => Catalog::builtin(),
        };
        let feedback = if config.feedback.persist {
            FeedbackStore::open(JsonFilePersistence::new(&config.feedback.path))
        } else {
            FeedbackStore::in_memory()
        };

        Ok(Self::with_parts(
            Arc::new(catalog),
            DeterministicSupplierStub,
            MarginPolicy::new(config.pricing.base_margin),
            Arc::new(feedback),
            EngineSettings {
                currency: config.pricing.currency.clone(),
                hourly_rate: config.pricing.hourly_rate,
                fallback_city: config.pricing.fallback_city.clone(),
                fallback_area_m2: config.pricing.fallback_area_m2,
            },
        ))
    }
}

impl<S> QuoteEngine<S>
where
    S: SupplierPriceSource,
{
    pub fn with_parts(
        catalog: Arc<Catalog>,
        supplier: S,
        margin_policy: MarginPolicy,
        feedback: Arc<FeedbackStore>,
        settings: EngineSettings,
    ) -> Self {
        Self { catalog, supplier, margin_policy, feedback, trust_scorer: TrustScorer, settings }
    }

    pub fn feedback(&self) -> &Arc<FeedbackStore> {
        &self.feedback
    }

    /// Adds implied prerequisites and orders the list; falls back to the default tasks when
    /// nothing was detected.
    pub fn resolve_tasks(&self, detected: &[TaskId]) -> Vec<TaskId> {
        let resolved = graph::resolve_order(&graph::with_implied_requirements(detected));
        if resolved.is_empty() {
            return FALLBACK_TASKS.into_iter().map(TaskId::from).collect();
        }
        resolved
    }

    /// The same transcript priced under every scenario, low to high.
    pub fn generate_scenarios(&self, transcript: &str, market: MarketConditions) -> Vec<Quote> {
        Scenario::ALL
            .into_iter()
            .map(|scenario| {
                self.generate(
                    &QuoteRequest::new(transcript).with_market(market).with_scenario(scenario),
                )
            })
            .collect()
    }

    pub fn generate(&self, request: &QuoteRequest) -> Quote {
        let scope = extraction::extract(&request.transcript);
        let market = request.market.unwrap_or_default().adjustments();
        let scenario = request.scenario.unwrap_or_default();

        let area_m2 = scope.area_m2.unwrap_or(self.settings.fallback_area_m2);
        let city = scope.city.clone().unwrap_or_else(|| self.settings.fallback_city.clone());
        let tasks = self.resolve_tasks(&scope.tasks);

        // One snapshot per quote so margin, labor and trust read the same history.
        let feedback = self.feedback.snapshot();
        let margin = self.margin_policy.margin(&MarginInput {
            budget_conscious: scope.budget_conscious,
            market_bump: market.margin_bump,
            scenario,
            recent_acceptance: feedback.recent_acceptance_ratio(ACCEPTANCE_WINDOW),
        });

        let context = PricingContext {
            area_m2,
            city: &city,
            budget_conscious: scope.budget_conscious,
            market,
            scenario,
            margin,
        };
        let engine =
            CostEngine::new(&self.catalog, &self.supplier, &feedback, self.settings.hourly_rate);
        let priced = engine.price_tasks(&tasks, &context);

        let zones = vec![Zone {
            zone_name: DEFAULT_ZONE_NAME.to_string(),
            area_m2,
            city: city.clone(),
            city_index: self.catalog.city_index(Some(&city)),
            tasks: priced.tasks,
        }];
        let trust = self.trust_scorer.score(&zones, feedback.recent_acceptance_ratio(TRUST_WINDOW));

        let mut flags = scope.quality_flags;
        if !priced.out_of_range.is_empty() {
            warn!(
                event_name = "quote.amounts.clamped",
                tasks = ?priced.out_of_range,
                "task amounts exceeded the money ceiling and were clamped"
            );
            flags.push(QualityFlag::PriceOutOfRange);
        }

        let created_utc = Utc::now();
        let quote = Quote {
            quote_id: QuoteId::generate(created_utc),
            created_utc,
            system: SYSTEM_NAME.to_string(),
            currency: self.settings.currency.clone(),
            scenario,
            zones,
            totals: priced.totals,
            assumptions: Assumptions {
                transcript_area_m2: scope.area_m2,
                defaults_applied: scope.area_m2.is_none(),
                budget_conscious: scope.budget_conscious,
                city,
            },
            confidence: Confidence { score: scope.confidence, flags },
            trust,
        };

        info!(
            event_name = "quote.generated",
            quote_id = %quote.quote_id,
            scenario = %scenario,
            task_count = tasks.len(),
            total_price = %quote.totals.total_price,
            trust_score = quote.trust.score,
            "quote generated"
        );

        quote
    }
}

impl<S> QuoteRuntime for QuoteEngine<S>
where
    S: SupplierPriceSource,
{
    fn generate(&self, request: &QuoteRequest) -> Quote {
        QuoteEngine::generate(self, request)
    }
}
