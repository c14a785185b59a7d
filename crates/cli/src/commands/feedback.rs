use clap::Args;
use renoquote_core::cpq::policy::ACCEPTANCE_WINDOW;
use renoquote_core::feedback::feedback_key;
use renoquote_core::{ApplicationError, QuoteId};
use serde::Serialize;

use crate::commands::{load_engine, CommandResult};

#[derive(Clone, Debug, Args)]
pub struct LearnArgs {
    #[arg(long)]
    pub city: String,
    #[arg(long)]
    pub task: String,
    #[arg(long, help = "Hours the job actually took")]
    pub actual_hours: f64,
    #[arg(long, help = "Hours the quote estimated")]
    pub estimated_hours: f64,
}

#[derive(Clone, Debug, Args)]
pub struct RecordArgs {
    #[arg(long)]
    pub quote_id: String,
    #[arg(long, conflicts_with = "rejected", required_unless_present = "rejected")]
    pub accepted: bool,
    #[arg(long)]
    pub rejected: bool,
}

#[derive(Debug, Serialize)]
struct LearnOutcome<'a> {
    command: &'static str,
    status: &'static str,
    key: String,
    multiplier: f64,
    store: &'a str,
}

#[derive(Debug, Serialize)]
struct RecordOutcome<'a> {
    command: &'static str,
    status: &'static str,
    quote_id: &'a str,
    accepted: bool,
    recent_acceptance_ratio: Option<f64>,
    window: usize,
}

pub fn learn(args: &LearnArgs) -> CommandResult {
    const COMMAND: &str = "learn";

    if !args.actual_hours.is_finite() || args.actual_hours < 0.0 {
        let error = ApplicationError::InvalidInput(
            "actual hours must be a non-negative number".to_string(),
        );
        return CommandResult::from_error(COMMAND, &error);
    }

    let (config, engine) = match load_engine() {
        Ok(loaded) => loaded,
        Err(error) => return CommandResult::from_error(COMMAND, &error),
    };

    match engine.feedback().learn(&args.city, &args.task, args.actual_hours, args.estimated_hours)
    {
        Ok(multiplier) => {
            let store = config.feedback.path.display().to_string();
            CommandResult::json(
                COMMAND,
                &LearnOutcome {
                    command: COMMAND,
                    status: "ok",
                    key: feedback_key(&args.city, &args.task),
                    multiplier,
                    store: &store,
                },
            )
        }
        Err(error) => CommandResult::from_error(COMMAND, &ApplicationError::from(error)),
    }
}

pub fn record(args: &RecordArgs) -> CommandResult {
    const COMMAND: &str = "record";

    if args.quote_id.trim().is_empty() {
        let error = ApplicationError::InvalidInput("quote id cannot be empty".to_string());
        return CommandResult::from_error(COMMAND, &error);
    }
    let accepted = args.accepted && !args.rejected;

    let (_, engine) = match load_engine() {
        Ok(loaded) => loaded,
        Err(error) => return CommandResult::from_error(COMMAND, &error),
    };

    let quote_id = QuoteId(args.quote_id.trim().to_string());
    if let Err(error) = engine.feedback().record_outcome(&quote_id, accepted) {
        return CommandResult::from_error(COMMAND, &ApplicationError::from(error));
    }

    CommandResult::json(
        COMMAND,
        &RecordOutcome {
            command: COMMAND,
            status: "ok",
            quote_id: quote_id.as_str(),
            accepted,
            recent_acceptance_ratio: engine.feedback().recent_acceptance_ratio(ACCEPTANCE_WINDOW),
            window: ACCEPTANCE_WINDOW,
        },
    )
}
