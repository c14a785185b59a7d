use std::sync::Arc;

use proptest::prelude::*;
use renoquote_core::cpq::policy::{MAX_MARGIN, MIN_MARGIN};
use renoquote_core::extraction::{confidence_score, MAX_AREA_M2};
use renoquote_core::feedback::{MAX_MULTIPLIER, MIN_MULTIPLIER};
use renoquote_core::{
    FeedbackStore, MarketConditions, QualityFlag, Quote, QuoteEngine, QuoteRequest, Scenario,
    Seasonality,
};
use rust_decimal::Decimal;

const FRAGMENTS: [&str; 14] = [
    "remove the old tiles",
    "shower plumbing",
    "replace the toilet",
    "install a vanity",
    "repaint the walls",
    "lay new ceramic floor tiles",
    "kitchen and bath",
    "budget-conscious",
    "tight budget",
    "located in Paris",
    "located in Lyon",
    "about 6 m2",
    "12.5 sqm",
    "replace the window frames",
];

fn arb_transcript() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(FRAGMENTS.to_vec()), 0..6)
        .prop_map(|fragments| fragments.join(". "))
}

fn arb_market() -> impl Strategy<Value = MarketConditions> {
    (
        -0.5f64..1.0,
        prop::sample::select(vec![Seasonality::Peak, Seasonality::Off, Seasonality::Neutral]),
        0.0f64..=1.0,
    )
        .prop_map(|(inflation, seasonality, shortage)| {
            MarketConditions::new(inflation, seasonality, shortage)
        })
}

fn arb_scenario() -> impl Strategy<Value = Scenario> {
    prop::sample::select(Scenario::ALL.to_vec())
}

fn engine() -> QuoteEngine {
    QuoteEngine::new(Arc::new(FeedbackStore::in_memory()))
}

fn task_total_sum(quote: &Quote) -> Decimal {
    quote.tasks().map(|task| task.pricing.total_price).sum()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn margins_and_vat_rates_stay_within_policy(
        transcript in arb_transcript(),
        market in arb_market(),
        scenario in arb_scenario()
    ) {
        let quote = engine().generate(
            &QuoteRequest::new(transcript).with_market(market).with_scenario(scenario),
        );

        prop_assert!(quote.tasks().count() > 0);
        for task in quote.tasks() {
            prop_assert!(task.pricing.margin >= MIN_MARGIN && task.pricing.margin <= MAX_MARGIN);
            prop_assert!(
                task.pricing.vat_rate == Decimal::new(10, 2)
                    || task.pricing.vat_rate == Decimal::new(20, 2)
            );
            prop_assert!(task.quantity >= 0.0);
            prop_assert!(task.estimated_duration_days >= 1);
        }
    }

    #[test]
    fn quote_total_is_sum_of_task_totals(
        transcript in arb_transcript(),
        market in arb_market(),
        scenario in arb_scenario()
    ) {
        let quote = engine().generate(
            &QuoteRequest::new(transcript).with_market(market).with_scenario(scenario),
        );

        prop_assert_eq!(quote.totals.total_price, task_total_sum(&quote));
        prop_assert_eq!(quote.totals.net_price + quote.totals.vat_amount, quote.totals.total_price);
    }

    #[test]
    fn low_scenario_never_exceeds_high(transcript in arb_transcript(), market in arb_market()) {
        let quotes = engine().generate_scenarios(&transcript, market);

        prop_assert!(quotes[0].totals.total_price <= quotes[2].totals.total_price);
    }

    #[test]
    fn any_stated_area_prices_within_range(digits in "[1-9][0-9]{0,39}") {
        let transcript = format!("{digits} m2 bathroom, lay new floor tiles. Located in Lyon");
        let quote = engine().generate(&QuoteRequest::new(transcript));

        prop_assert!(quote.zones[0].area_m2 <= MAX_AREA_M2);
        prop_assert!(quote.totals.total_price > Decimal::ZERO);
        prop_assert!(!quote.confidence.flags.contains(&QualityFlag::PriceOutOfRange));
        prop_assert_eq!(
            quote.confidence.flags.contains(&QualityFlag::ImplausibleArea),
            quote.assumptions.defaults_applied
        );
    }

    #[test]
    fn confidence_stays_in_unit_interval(text in ".{0,200}") {
        let score = confidence_score(&text);
        prop_assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn learned_multiplier_stays_bounded(
        observations in prop::collection::vec((0.0f64..100.0, -5.0f64..100.0), 1..40)
    ) {
        let store = FeedbackStore::in_memory();
        for (actual, estimated) in observations {
            let learned = store
                .learn("Lyon", "tiling_floor", actual, estimated)
                .expect("in-memory learn never fails");
            prop_assert!((MIN_MULTIPLIER..=MAX_MULTIPLIER).contains(&learned));
        }

        let multiplier = store.multiplier_for("lyon", "tiling_floor");
        prop_assert!((MIN_MULTIPLIER..=MAX_MULTIPLIER).contains(&multiplier));
    }
}
