use thiserror::Error;

use crate::config::ConfigError;
use crate::cpq::catalog::CatalogError;
use crate::feedback::FeedbackError;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Feedback(#[from] FeedbackError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ApplicationError {
    /// Stable machine-readable class reported by the operator CLI.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_validation",
            Self::Catalog(_) => "catalog_load",
            Self::Feedback(_) => "feedback_persistence",
            Self::InvalidInput(_) => "invalid_input",
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Catalog(_) => 3,
            Self::Feedback(_) => 4,
            Self::InvalidInput(_) => 5,
        }
    }
}
