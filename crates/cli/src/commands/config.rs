use std::env;
use std::fs;
use std::path::Path;

use renoquote_core::config::{resolve_config_path, AppConfig, LoadOptions};
use renoquote_core::ApplicationError;
use serde::Serialize;
use toml::Value;

use crate::commands::CommandResult;

const COMMAND: &str = "config";

#[derive(Debug, Serialize)]
struct ConfigEntry {
    key: &'static str,
    value: String,
    source: String,
}

#[derive(Debug, Serialize)]
struct ConfigReport {
    command: &'static str,
    status: &'static str,
    precedence: &'static str,
    entries: Vec<ConfigEntry>,
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::from_error(COMMAND, &ApplicationError::from(error));
        }
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let catalog_path = config
        .catalog
        .path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<built-in>".to_string());

    let entries = vec![
        ConfigEntry {
            key: "pricing.currency",
            value: config.pricing.currency.clone(),
            source: source("pricing.currency", &["RENOQUOTE_PRICING_CURRENCY"]),
        },
        ConfigEntry {
            key: "pricing.base_margin",
            value: config.pricing.base_margin.to_string(),
            source: source("pricing.base_margin", &["RENOQUOTE_PRICING_BASE_MARGIN"]),
        },
        ConfigEntry {
            key: "pricing.hourly_rate",
            value: config.pricing.hourly_rate.to_string(),
            source: source("pricing.hourly_rate", &["RENOQUOTE_PRICING_HOURLY_RATE"]),
        },
        ConfigEntry {
            key: "pricing.fallback_city",
            value: config.pricing.fallback_city.clone(),
            source: source("pricing.fallback_city", &["RENOQUOTE_PRICING_FALLBACK_CITY"]),
        },
        ConfigEntry {
            key: "pricing.fallback_area_m2",
            value: config.pricing.fallback_area_m2.to_string(),
            source: source("pricing.fallback_area_m2", &["RENOQUOTE_PRICING_FALLBACK_AREA_M2"]),
        },
        ConfigEntry {
            key: "feedback.path",
            value: config.feedback.path.display().to_string(),
            source: source("feedback.path", &["RENOQUOTE_FEEDBACK_PATH"]),
        },
        ConfigEntry {
            key: "feedback.persist",
            value: config.feedback.persist.to_string(),
            source: source("feedback.persist", &["RENOQUOTE_FEEDBACK_PERSIST"]),
        },
        ConfigEntry {
            key: "catalog.path",
            value: catalog_path,
            source: source("catalog.path", &["RENOQUOTE_CATALOG_PATH"]),
        },
        ConfigEntry {
            key: "logging.level",
            value: config.logging.level.clone(),
            source: source("logging.level", &["RENOQUOTE_LOGGING_LEVEL", "RENOQUOTE_LOG_LEVEL"]),
        },
        ConfigEntry {
            key: "logging.format",
            value: format!("{:?}", config.logging.format).to_ascii_lowercase(),
            source: source(
                "logging.format",
                &["RENOQUOTE_LOGGING_FORMAT", "RENOQUOTE_LOG_FORMAT"],
            ),
        },
    ];

    CommandResult::json(
        COMMAND,
        &ConfigReport { command: COMMAND, status: "ok", precedence: "env > file > default", entries },
    )
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, field_source};

    #[test]
    fn file_source_is_reported_for_present_keys() {
        let doc = "[pricing]\ncurrency = \"CHF\"\n".parse::<Value>().expect("valid toml");

        assert!(contains_path(&doc, "pricing.currency"));
        assert!(!contains_path(&doc, "pricing.hourly_rate"));
        assert_eq!(
            field_source("pricing.currency", &["RENOQUOTE_TEST_UNSET_KEY"], Some(&doc), None),
            "file (config file)"
        );
        assert_eq!(
            field_source("pricing.hourly_rate", &["RENOQUOTE_TEST_UNSET_KEY"], Some(&doc), None),
            "default"
        );
    }
}
