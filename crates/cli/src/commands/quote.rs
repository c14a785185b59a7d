use clap::Args;
use renoquote_core::{
    ApplicationError, MarketConditions, Quote, QuoteInsights, QuoteRequest, Scenario, Seasonality,
};
use serde::Serialize;
use tracing::info;

use crate::commands::{load_engine, CommandResult};

const COMMAND: &str = "quote";
const ALL_SCENARIOS: &str = "all";

#[derive(Clone, Debug, Args)]
pub struct QuoteArgs {
    #[arg(long, help = "Free-text job description to price")]
    pub transcript: String,
    #[arg(long, default_value = "mid", help = "Pricing scenario: low|mid|high|all")]
    pub scenario: String,
    #[arg(
        long,
        default_value_t = 0.0,
        allow_negative_numbers = true,
        help = "Fractional inflation, e.g. 0.05 for +5%"
    )]
    pub inflation: f64,
    #[arg(long, default_value = "neutral", help = "Season: peak|off|neutral")]
    pub seasonality: String,
    #[arg(long, default_value_t = 0.0, help = "Supply shortage severity in [0, 1]")]
    pub shortage: f64,
}

/// A quote as printed: the quote's own fields plus its derived insights.
#[derive(Debug, Serialize)]
struct QuotePayload<'a> {
    #[serde(flatten)]
    quote: &'a Quote,
    insights: QuoteInsights,
}

impl<'a> From<&'a Quote> for QuotePayload<'a> {
    fn from(quote: &'a Quote) -> Self {
        Self { quote, insights: quote.insights() }
    }
}

impl QuoteArgs {
    pub fn new(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            scenario: "mid".to_string(),
            inflation: 0.0,
            seasonality: "neutral".to_string(),
            shortage: 0.0,
        }
    }
}

pub fn run(args: &QuoteArgs) -> CommandResult {
    let market = match parse_market(args) {
        Ok(market) => market,
        Err(error) => return CommandResult::from_error(COMMAND, &error),
    };
    let scenario = match parse_scenario(&args.scenario) {
        Ok(scenario) => scenario,
        Err(error) => return CommandResult::from_error(COMMAND, &error),
    };

    let (_, engine) = match load_engine() {
        Ok(loaded) => loaded,
        Err(error) => return CommandResult::from_error(COMMAND, &error),
    };

    match scenario {
        Some(scenario) => {
            let quote = engine.generate(
                &QuoteRequest::new(args.transcript.clone())
                    .with_market(market)
                    .with_scenario(scenario),
            );
            CommandResult::json(COMMAND, &QuotePayload::from(&quote))
        }
        None => {
            let quotes = engine.generate_scenarios(&args.transcript, market);
            info!(
                event_name = "cli.quote.scenarios",
                count = quotes.len(),
                "generated quotes for every scenario"
            );
            let payloads: Vec<QuotePayload<'_>> = quotes.iter().map(QuotePayload::from).collect();
            CommandResult::json(COMMAND, &payloads)
        }
    }
}

/// `None` means every scenario.
fn parse_scenario(value: &str) -> Result<Option<Scenario>, ApplicationError> {
    if value.trim().eq_ignore_ascii_case(ALL_SCENARIOS) {
        return Ok(None);
    }
    value
        .parse::<Scenario>()
        .map(Some)
        .map_err(|error| ApplicationError::InvalidInput(error.to_string()))
}

fn parse_market(args: &QuoteArgs) -> Result<MarketConditions, ApplicationError> {
    if !(-0.5..=1.0).contains(&args.inflation) {
        return Err(ApplicationError::InvalidInput(format!(
            "inflation must be within -0.5..=1.0, got {}",
            args.inflation
        )));
    }
    if !(0.0..=1.0).contains(&args.shortage) {
        return Err(ApplicationError::InvalidInput(format!(
            "shortage must be within 0..=1, got {}",
            args.shortage
        )));
    }

    let seasonality = args
        .seasonality
        .parse::<Seasonality>()
        .map_err(|error| ApplicationError::InvalidInput(error.to_string()))?;

    Ok(MarketConditions::new(args.inflation, seasonality, args.shortage))
}

#[cfg(test)]
mod tests {
    use renoquote_core::{Scenario, Seasonality};

    use super::{parse_market, parse_scenario, QuoteArgs};

    #[test]
    fn scenario_accepts_all_keyword() {
        assert_eq!(parse_scenario("ALL").expect("all is valid"), None);
        assert_eq!(parse_scenario("low").expect("low is valid"), Some(Scenario::Low));
        let error = parse_scenario("extreme").expect_err("unknown scenario");
        assert_eq!(error.error_class(), "invalid_input");
    }

    #[test]
    fn market_inputs_are_range_checked() {
        let market = parse_market(&QuoteArgs {
            inflation: 0.05,
            seasonality: "Peak".to_string(),
            shortage: 0.2,
            ..QuoteArgs::new("x")
        })
        .expect("valid market");
        assert_eq!(market.seasonality, Seasonality::Peak);

        assert!(parse_market(&QuoteArgs { inflation: 1.5, ..QuoteArgs::new("x") }).is_err());
        assert!(parse_market(&QuoteArgs { shortage: -0.1, ..QuoteArgs::new("x") }).is_err());
        assert!(parse_market(&QuoteArgs { inflation: f64::NAN, ..QuoteArgs::new("x") }).is_err());
        assert!(parse_market(&QuoteArgs {
            seasonality: "monsoon".to_string(),
            ..QuoteArgs::new("x")
        })
        .is_err());
    }
}
