use std::fs;
use std::sync::Arc;

use renoquote_core::config::{AppConfig, CatalogConfig, FeedbackConfig};
use renoquote_core::{
    compare_totals, FeedbackStore, JsonFilePersistence, MarketConditions, QualityFlag,
    QuoteEngine, QuoteId, QuoteRequest, Scenario, Seasonality, Trade,
};
use rust_decimal::Decimal;
use serde_json::Value;
use tempfile::TempDir;

const MARSEILLE_TRANSCRIPT: &str = "Client wants to renovate a small 4m² bathroom. They'll remove \
    the old tiles, redo the plumbing for the shower, replace the toilet, install a vanity, \
    repaint the walls, and lay new ceramic floor tiles. Budget-conscious. Located in Marseille.";

fn in_memory_engine() -> QuoteEngine {
    QuoteEngine::new(Arc::new(FeedbackStore::in_memory()))
}

#[test]
fn marseille_bathroom_transcript_produces_complete_quote() {
    let quote = in_memory_engine().generate(&QuoteRequest::new(MARSEILLE_TRANSCRIPT));

    let zone = &quote.zones[0];
    assert_eq!(zone.zone_name, "Bathroom");
    assert_eq!(zone.area_m2, 4.0);
    assert_eq!(zone.city, "Marseille");
    assert!((zone.city_index - 0.95).abs() < 1e-9);
    assert!(zone.tasks.iter().any(|task| task.task.as_str() == "tiling_floor"));
    assert!(quote.confidence.score >= 0.7);
    assert!(quote.confidence.flags.is_empty());
    assert_eq!(quote.currency, "EUR");

    let tiling = zone
        .tasks
        .iter()
        .find(|task| task.task.as_str() == "tiling_floor")
        .expect("tiling task should be priced");
    assert_eq!(tiling.unit, "m2");
    assert_eq!(tiling.quantity, 4.0);
    assert_eq!(tiling.pricing.vat_rate, Decimal::new(10, 2));

    let painting = zone
        .tasks
        .iter()
        .find(|task| task.task.as_str() == "painting_walls")
        .expect("painting task should be priced");
    assert_eq!(painting.quantity, 10.4);

    let toilet = zone
        .tasks
        .iter()
        .find(|task| task.task.as_str() == "toilet_replace")
        .expect("toilet task should be priced");
    assert_eq!(toilet.pricing.vat_rate, Decimal::new(20, 2));
}

#[test]
fn insights_summarize_trades_and_complexity() {
    let quote = in_memory_engine().generate(&QuoteRequest::new(MARSEILLE_TRANSCRIPT));
    let insights = quote.insights();

    assert_eq!(insights.task_count, 6);
    assert_eq!(
        insights.trades,
        vec![Trade::Demolition, Trade::Plumbing, Trade::Carpentry, Trade::Painting, Trade::Tiling]
    );
    assert_eq!(insights.avg_complexity, 1.02);
    assert!(insights.avg_task_price > Decimal::ZERO);
}

#[test]
fn explicit_area_is_recorded_in_assumptions() {
    let quote = in_memory_engine()
        .generate(&QuoteRequest::new("Retile a 4 m² bathroom floor with new floor tiles"));

    assert_eq!(quote.assumptions.transcript_area_m2, Some(4.0));
    assert!(!quote.assumptions.defaults_applied);
}

#[test]
fn missing_area_falls_back_and_is_flagged() {
    let quote = in_memory_engine().generate(&QuoteRequest::new("Repaint the walls please"));

    assert_eq!(quote.assumptions.transcript_area_m2, None);
    assert!(quote.assumptions.defaults_applied);
    assert_eq!(quote.zones[0].area_m2, 4.0);
    assert!(quote.confidence.flags.contains(&QualityFlag::MissingArea));
}

#[test]
fn absurd_area_is_replaced_by_fallback_and_flagged() {
    for transcript in [
        "400000000000000000000000000 m2 bathroom. Remove the old tiles, lay new floor tiles, \
         repaint the walls. Located in Lyon",
        "1000000000000000000000000000000 m2 bathroom, lay new floor tiles. Located in Lyon",
    ] {
        let quote = in_memory_engine().generate(&QuoteRequest::new(transcript));

        assert_eq!(quote.zones[0].area_m2, 4.0);
        assert!(quote.assumptions.defaults_applied);
        assert!(quote.confidence.flags.contains(&QualityFlag::ImplausibleArea));
        assert!(!quote.confidence.flags.contains(&QualityFlag::PriceOutOfRange));
        assert!(quote.totals.total_price > Decimal::ZERO);
        assert_eq!(
            quote.totals.total_price,
            quote.totals.net_price + quote.totals.vat_amount
        );
    }
}

#[test]
fn area_task_and_city_give_high_confidence() {
    let quote = in_memory_engine()
        .generate(&QuoteRequest::new("6 sqm floor, tiling needed. Located in Lyon"));

    assert!(quote.confidence.score >= 0.75);
    assert_eq!(quote.zones[0].city, "Lyon");
}

#[test]
fn peak_market_costs_more_than_off_season() {
    let engine = in_memory_engine();
    let peak = engine.generate(
        &QuoteRequest::new(MARSEILLE_TRANSCRIPT)
            .with_market(MarketConditions::new(0.05, Seasonality::Peak, 0.5)),
    );
    let off = engine.generate(
        &QuoteRequest::new(MARSEILLE_TRANSCRIPT)
            .with_market(MarketConditions::new(0.0, Seasonality::Off, 0.0)),
    );

    assert!(peak.totals.total_price > off.totals.total_price);
    let comparison = compare_totals(&off, &peak);
    assert!(comparison.pct_change.is_some_and(|change| change > Decimal::ZERO));
}

#[test]
fn quote_json_uses_external_field_layout() {
    let quote = in_memory_engine()
        .generate(&QuoteRequest::new(MARSEILLE_TRANSCRIPT).with_scenario(Scenario::High));
    let json: Value = serde_json::to_value(&quote).expect("quote should serialize");

    for key in [
        "quote_id",
        "created_utc",
        "system",
        "currency",
        "scenario",
        "zones",
        "totals",
        "assumptions",
        "confidence",
        "trust",
    ] {
        assert!(json.get(key).is_some(), "missing top-level key {key}");
    }
    assert_eq!(json["scenario"], "high");

    let task = &json["zones"][0]["tasks"][0];
    for key in
        ["task", "quantity", "unit", "unit_material_desc", "labor", "materials", "pricing"]
    {
        assert!(task.get(key).is_some(), "missing task key {key}");
    }
    assert!(task["labor"].get("hours").is_some());
    assert!(task["pricing"]["vat_amount"].is_f64());
    assert!(task["labor"]["cost"].is_f64());
    assert!(json["totals"]["total_price"].as_f64().is_some_and(|total| total > 0.0));
    assert!(task["estimated_duration_days"].is_u64());
    assert!(json["trust"]["factors"].get("historical_accuracy").is_some());
}

#[test]
fn feedback_file_survives_engine_restarts() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("feedback_memory.json");

    {
        let store = FeedbackStore::open(JsonFilePersistence::new(&path));
        store.learn("Paris", "tiling_floor", 12.0, 10.0).expect("learn should persist");
        store.record_outcome(&QuoteId("Q-1".to_string()), false).expect("record should persist");
    }

    let raw = fs::read_to_string(&path).expect("feedback file should exist");
    let document: Value = serde_json::from_str(&raw).expect("feedback file should be json");
    assert_eq!(document["per_city_task"]["paris::tiling_floor"]["count"], 1);
    assert_eq!(document["history"][0]["accepted"], false);

    let reopened = Arc::new(FeedbackStore::open(JsonFilePersistence::new(&path)));
    assert!((reopened.multiplier_for("Paris", "tiling_floor") - 1.04).abs() < 1e-9);

    let quote = QuoteEngine::new(reopened)
        .generate(&QuoteRequest::new("4 m2 floor tiles. Located in Paris"));
    assert_eq!(quote.trust.factors.market_volatility, 0.6);
    assert_eq!(quote.trust.factors.historical_accuracy, 0.5);
}

#[test]
fn engine_builds_from_config_with_custom_catalog() {
    let dir = TempDir::new().expect("temp dir");
    let catalog_path = dir.path().join("catalog.toml");
    fs::write(
        &catalog_path,
        r#"
[materials.painting_walls]
cost_per_unit = 9.0
wastage_factor = 1.1
description = "Premium washable paint"
"#,
    )
    .expect("write catalog");

    let config = AppConfig {
        catalog: CatalogConfig { path: Some(catalog_path) },
        feedback: FeedbackConfig { path: dir.path().join("feedback.json"), persist: false },
        ..AppConfig::default()
    };
    let engine = QuoteEngine::from_config(&config).expect("engine should build");

    let quote = engine.generate(&QuoteRequest::new("Repaint the walls of a 5 m2 room"));
    let painting = quote.tasks().next().expect("painting task");
    assert_eq!(
        painting.unit_material_desc.as_ref().map(|spec| spec.description.as_str()),
        Some("Premium washable paint")
    );
    assert!(!dir.path().join("feedback.json").exists());
}

#[test]
fn unreadable_catalog_is_a_config_time_error() {
    let dir = TempDir::new().expect("temp dir");
    let config = AppConfig {
        catalog: CatalogConfig { path: Some(dir.path().join("missing.toml")) },
        feedback: FeedbackConfig { path: dir.path().join("feedback.json"), persist: false },
        ..AppConfig::default()
    };

    let error = QuoteEngine::from_config(&config).err().expect("missing catalog should fail");
    assert_eq!(error.error_class(), "catalog_load");
}
