use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cpq::policy::{DEFAULT_BASE_MARGIN, MAX_MARGIN, MIN_MARGIN};
use crate::cpq::pricing::DEFAULT_HOURLY_RATE;
use crate::cpq::{DEFAULT_CURRENCY, DEFAULT_FALLBACK_AREA_M2, DEFAULT_FALLBACK_CITY};
use crate::extraction::MAX_AREA_M2;

pub const DEFAULT_CONFIG_FILE: &str = "renoquote.toml";
pub const NESTED_CONFIG_FILE: &str = "config/renoquote.toml";
pub const DEFAULT_FEEDBACK_PATH: &str = "data/feedback_memory.json";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub pricing: PricingConfig,
    pub feedback: FeedbackConfig,
    pub catalog: CatalogConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct PricingConfig {
    pub currency: String,
    pub base_margin: f64,
    pub hourly_rate: f64,
    pub fallback_city: String,
    pub fallback_area_m2: f64,
}

#[derive(Clone, Debug)]
pub struct FeedbackConfig {
    pub path: PathBuf,
    /// `false` keeps learned multipliers and outcomes in memory only.
    pub persist: bool,
}

#[derive(Clone, Debug, Default)]
pub struct CatalogConfig {
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub currency: Option<String>,
    pub feedback_path: Option<PathBuf>,
    pub feedback_persist: Option<bool>,
    pub catalog_path: Option<PathBuf>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pricing: PricingConfig {
                currency: DEFAULT_CURRENCY.to_string(),
                base_margin: DEFAULT_BASE_MARGIN,
                hourly_rate: DEFAULT_HOURLY_RATE,
                fallback_city: DEFAULT_FALLBACK_CITY.to_string(),
                fallback_area_m2: DEFAULT_FALLBACK_AREA_M2,
            },
            feedback: FeedbackConfig { path: PathBuf::from(DEFAULT_FEEDBACK_PATH), persist: true },
            catalog: CatalogConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(pricing) = patch.pricing {
            if let Some(currency) = pricing.currency {
                self.pricing.currency = currency;
            }
            if let Some(base_margin) = pricing.base_margin {
                self.pricing.base_margin = base_margin;
            }
            if let Some(hourly_rate) = pricing.hourly_rate {
                self.pricing.hourly_rate = hourly_rate;
            }
            if let Some(fallback_city) = pricing.fallback_city {
                self.pricing.fallback_city = fallback_city;
            }
            if let Some(fallback_area_m2) = pricing.fallback_area_m2 {
                self.pricing.fallback_area_m2 = fallback_area_m2;
            }
        }

        if let Some(feedback) = patch.feedback {
            if let Some(path) = feedback.path {
                self.feedback.path = path;
            }
            if let Some(persist) = feedback.persist {
                self.feedback.persist = persist;
            }
        }

        if let Some(catalog) = patch.catalog {
            if let Some(path) = catalog.path {
                self.catalog.path = Some(path);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("RENOQUOTE_PRICING_CURRENCY") {
            self.pricing.currency = value;
        }
        if let Some(value) = read_env("RENOQUOTE_PRICING_BASE_MARGIN") {
            self.pricing.base_margin = parse_f64("RENOQUOTE_PRICING_BASE_MARGIN", &value)?;
        }
        if let Some(value) = read_env("RENOQUOTE_PRICING_HOURLY_RATE") {
            self.pricing.hourly_rate = parse_f64("RENOQUOTE_PRICING_HOURLY_RATE", &value)?;
        }
        if let Some(value) = read_env("RENOQUOTE_PRICING_FALLBACK_CITY") {
            self.pricing.fallback_city = value;
        }
        if let Some(value) = read_env("RENOQUOTE_PRICING_FALLBACK_AREA_M2") {
            self.pricing.fallback_area_m2 =
                parse_f64("RENOQUOTE_PRICING_FALLBACK_AREA_M2", &value)?;
        }

        if let Some(value) = read_env("RENOQUOTE_FEEDBACK_PATH") {
            self.feedback.path = PathBuf::from(value);
        }
        if let Some(value) = read_env("RENOQUOTE_FEEDBACK_PERSIST") {
            self.feedback.persist = parse_bool("RENOQUOTE_FEEDBACK_PERSIST", &value)?;
        }

        if let Some(value) = read_env("RENOQUOTE_CATALOG_PATH") {
            self.catalog.path = Some(PathBuf::from(value));
        }

        let log_level =
            read_env("RENOQUOTE_LOGGING_LEVEL").or_else(|| read_env("RENOQUOTE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("RENOQUOTE_LOGGING_FORMAT").or_else(|| read_env("RENOQUOTE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(currency) = overrides.currency {
            self.pricing.currency = currency;
        }
        if let Some(feedback_path) = overrides.feedback_path {
            self.feedback.path = feedback_path;
        }
        if let Some(persist) = overrides.feedback_persist {
            self.feedback.persist = persist;
        }
        if let Some(catalog_path) = overrides.catalog_path {
            self.catalog.path = Some(catalog_path);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_pricing(&self.pricing)?;
        validate_feedback(&self.feedback)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// First existing config file: the explicit path, else `renoquote.toml`, else
/// `config/renoquote.toml`.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from(NESTED_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_pricing(pricing: &PricingConfig) -> Result<(), ConfigError> {
    if pricing.currency.trim().is_empty() {
        return Err(ConfigError::Validation("pricing.currency cannot be empty".to_string()));
    }

    if !(MIN_MARGIN..=MAX_MARGIN).contains(&pricing.base_margin) {
        return Err(ConfigError::Validation(format!(
            "pricing.base_margin must be in range {MIN_MARGIN}..={MAX_MARGIN}"
        )));
    }

    if !pricing.hourly_rate.is_finite() || pricing.hourly_rate <= 0.0 {
        return Err(ConfigError::Validation(
            "pricing.hourly_rate must be greater than zero".to_string(),
        ));
    }

    if pricing.fallback_city.trim().is_empty() {
        return Err(ConfigError::Validation("pricing.fallback_city cannot be empty".to_string()));
    }

    if !pricing.fallback_area_m2.is_finite() || pricing.fallback_area_m2 <= 0.0 {
        return Err(ConfigError::Validation(
            "pricing.fallback_area_m2 must be greater than zero".to_string(),
        ));
    }

    if pricing.fallback_area_m2 > MAX_AREA_M2 {
        return Err(ConfigError::Validation(format!(
            "pricing.fallback_area_m2 must not exceed {MAX_AREA_M2}"
        )));
    }

    Ok(())
}

fn validate_feedback(feedback: &FeedbackConfig) -> Result<(), ConfigError> {
    if feedback.persist && feedback.path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "feedback.path is required when feedback.persist is true".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.trim().parse::<f64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    pricing: Option<PricingPatch>,
    feedback: Option<FeedbackPatch>,
    catalog: Option<CatalogPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct PricingPatch {
    currency: Option<String>,
    base_margin: Option<f64>,
    hourly_rate: Option<f64>,
    fallback_city: Option<String>,
    fallback_area_m2: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct FeedbackPatch {
    path: Option<PathBuf>,
    persist: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
