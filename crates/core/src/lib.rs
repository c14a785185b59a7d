pub mod config;
pub mod cpq;
pub mod domain;
pub mod errors;
pub mod extraction;
pub mod feedback;
pub mod trust;

pub use cpq::catalog::{Catalog, CatalogError, LaborBaseline, MaterialSpec};
pub use cpq::market::{MarketAdjustments, MarketConditions, Seasonality};
pub use cpq::policy::{MarginPolicy, Scenario};
pub use cpq::supplier::{DeterministicSupplierStub, SupplierPriceSource, SupplierQuote};
pub use cpq::{EngineSettings, QuoteEngine, QuoteRequest, QuoteRuntime};
pub use domain::quote::{compare_totals, Quote, QuoteId, QuoteInsights, TaskPricing, Totals};
pub use domain::task::{TaskId, Trade};
pub use errors::ApplicationError;
pub use extraction::{ExtractedScope, QualityFlag};
pub use feedback::{FeedbackError, FeedbackStore, JsonFilePersistence};
pub use trust::{TrustAssessment, TrustFactors, TrustScorer};
