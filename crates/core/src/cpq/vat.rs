//! VAT rules for residential renovation work.
//!
//! Renovation labor and materials sit at the reduced rate; sanitary fixtures and plumbing
//! work are billed at the standard rate.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const SANITARY_KEYWORDS: [&str; 3] = ["toilet", "vanity", "plumbing"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VatCategory {
    Renovation,
    Sanitary,
}

impl VatCategory {
    pub fn for_task(task: &str) -> Self {
        let task = task.to_ascii_lowercase();
        if SANITARY_KEYWORDS.iter().any(|keyword| task.contains(keyword)) {
            Self::Sanitary
        } else {
            Self::Renovation
        }
    }

    pub fn rate(self) -> Decimal {
        match self {
            Self::Renovation => Decimal::new(10, 2),
            Self::Sanitary => Decimal::new(20, 2),
        }
    }
}

pub fn vat_rate_for_task(task: &str) -> Decimal {
    VatCategory::for_task(task).rate()
}
