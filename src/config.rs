use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::pipeline::extraction::{DEFAULT_EXTRACTOR_INIT_TIMEOUT_SECS, DEFAULT_MAX_UPLOAD_BYTES};
use crate::pipeline::structuring::{
    DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL, DEFAULT_MAX_TOOL_ROUNDS,
};

/// Application-level constants
pub const APP_NAME: &str = "IMED Search";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Default tracing filter when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "info,imed_lib=debug"
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Missing API key: set GEMINI_API_KEY or GOOGLE_API_KEY")]
    MissingApiKey,

    #[error("Invalid value for {name}: '{value}'")]
    InvalidValue { name: &'static str, value: String },
}

/// Runtime configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub bind_addr: SocketAddr,
    pub max_upload_bytes: usize,
    pub max_tool_rounds: usize,
    pub extractor_init_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_key = get("GEMINI_API_KEY")
            .or_else(|| get("GOOGLE_API_KEY"))
            .ok_or(ConfigError::MissingApiKey)?;

        Ok(Self {
            api_key,
            model: get("IMED_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            api_base: get("IMED_API_BASE").unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            timeout_secs: parse_or(get("IMED_TIMEOUT_SECS"), "IMED_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?,
            temperature: parse_or(get("IMED_TEMPERATURE"), "IMED_TEMPERATURE", DEFAULT_TEMPERATURE)?,
            bind_addr: match get("IMED_BIND_ADDR") {
                Some(raw) => parse_value(&raw, "IMED_BIND_ADDR")?,
                None => parse_value(DEFAULT_BIND_ADDR, "IMED_BIND_ADDR")?,
            },
            max_upload_bytes: parse_or(
                get("IMED_MAX_UPLOAD_BYTES"),
                "IMED_MAX_UPLOAD_BYTES",
                DEFAULT_MAX_UPLOAD_BYTES,
            )?,
            max_tool_rounds: parse_or(
                get("IMED_MAX_TOOL_ROUNDS"),
                "IMED_MAX_TOOL_ROUNDS",
                DEFAULT_MAX_TOOL_ROUNDS,
            )?,
            extractor_init_timeout: Duration::from_secs(parse_or(
                get("IMED_EXTRACTOR_INIT_TIMEOUT_SECS"),
                "IMED_EXTRACTOR_INIT_TIMEOUT_SECS",
                DEFAULT_EXTRACTOR_INIT_TIMEOUT_SECS,
            )?),
        })
    }
}

fn parse_or<T: FromStr>(
    raw: Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(raw) => parse_value(&raw, name),
        None => Ok(default),
    }
}

fn parse_value<T: FromStr>(raw: &str, name: &'static str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_applied() {
        let cfg = config(&[("GEMINI_API_KEY", "k")]).unwrap();
        assert_eq!(cfg.model, "gemini-2.0-flash");
        assert_eq!(cfg.api_base, "https://generativelanguage.googleapis.com");
        assert_eq!(cfg.timeout_secs, 120);
        assert_eq!(cfg.bind_addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(cfg.max_upload_bytes, 20 * 1024 * 1024);
        assert_eq!(cfg.max_tool_rounds, 4);
        assert_eq!(cfg.extractor_init_timeout, Duration::from_secs(30));
        assert!((cfg.temperature - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn google_key_is_fallback() {
        let cfg = config(&[("GEMINI_API_KEY", " "), ("GOOGLE_API_KEY", "g")]).unwrap();
        assert_eq!(cfg.api_key, "g");
    }

    #[test]
    fn missing_key_is_error() {
        assert_eq!(config(&[]).unwrap_err(), ConfigError::MissingApiKey);
    }

    #[test]
    fn overrides_parsed() {
        let cfg = config(&[
            ("GEMINI_API_KEY", "k"),
            ("IMED_MODEL", "gemini-1.5-pro"),
            ("IMED_BIND_ADDR", "0.0.0.0:9000"),
            ("IMED_MAX_TOOL_ROUNDS", "2"),
        ])
        .unwrap();
        assert_eq!(cfg.model, "gemini-1.5-pro");
        assert_eq!(cfg.bind_addr.port(), 9000);
        assert_eq!(cfg.max_tool_rounds, 2);
    }

    #[test]
    fn bad_number_names_variable() {
        let err = config(&[("GEMINI_API_KEY", "k"), ("IMED_TIMEOUT_SECS", "soon")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                name: "IMED_TIMEOUT_SECS",
                value: "soon".into()
            }
        );
    }

    #[test]
    fn app_name_is_imed() {
        assert_eq!(APP_NAME, "IMED Search");
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.3.0");
    }
}
