use serde::{Deserialize, Serialize};

const TILE_BASE_PRICE_EUR: f64 = 27.0;
const TILE_SKU: &str = "TILE-STD-01";
const TILE_DESCRIPTION: &str = "Standard ceramic tile 30x30";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SupplierQuote {
    pub sku: String,
    pub description: String,
    pub unit_price_eur: f64,
    pub city: Option<String>,
}

/// Source of external supplier anchor prices.
pub trait SupplierPriceSource: Send + Sync {
    fn tile_price(&self, city: Option<&str>) -> SupplierQuote;
}

/// City-keyed price list standing in for a supplier feed.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicSupplierStub;

impl SupplierPriceSource for DeterministicSupplierStub {
    fn tile_price(&self, city: Option<&str>) -> SupplierQuote {
        let Some(city) = city else {
            return tile_quote(TILE_BASE_PRICE_EUR, None);
        };

        let normalized = city.to_lowercase();
        let price = if normalized.contains("paris") {
            TILE_BASE_PRICE_EUR * 1.12
        } else if normalized.contains("marseille") {
            TILE_BASE_PRICE_EUR * 0.96
        } else {
            TILE_BASE_PRICE_EUR
        };

        tile_quote(price, Some(city.to_string()))
    }
}

fn tile_quote(unit_price_eur: f64, city: Option<String>) -> SupplierQuote {
    SupplierQuote {
        sku: TILE_SKU.to_string(),
        description: TILE_DESCRIPTION.to_string(),
        unit_price_eur,
        city,
    }
}

#[cfg(test)]
mod tests {
    use super::{DeterministicSupplierStub, SupplierPriceSource};

    #[test]
    fn tile_anchor_varies_by_city() {
        let stub = DeterministicSupplierStub;

        assert!((stub.tile_price(Some("Paris")).unit_price_eur - 30.24).abs() < 1e-9);
        assert!((stub.tile_price(Some("MARSEILLE")).unit_price_eur - 25.92).abs() < 1e-9);
        assert!((stub.tile_price(Some("Lyon")).unit_price_eur - 27.0).abs() < 1e-9);

        let anonymous = stub.tile_price(None);
        assert_eq!(anonymous.city, None);
        assert_eq!(anonymous.sku, "TILE-STD-01");
    }
}
