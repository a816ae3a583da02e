//! Per-invocation configuration read from the function environment.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde_json::{json, Value};
use thiserror::Error;

pub const LACEWORK_URL_KEY: &str = "lacework_url";
pub const ACCESS_KEY_ID_KEY: &str = "access_key_id";
pub const SECRET_KEY_KEY: &str = "secret_key";
pub const LACEWORK_ACCOUNT_KEY: &str = "lacework_account";
pub const LOG_LEVEL_KEY: &str = "LOGLEVEL";
pub const HONEY_API_KEY_KEY: &str = "HONEY_API_KEY";
pub const HONEY_DATASET_KEY: &str = "HONEY_DATASET";
pub const BUILD_VERSION_KEY: &str = "BUILD_VERSION";
pub const FAILURE_REPORTING_KEY: &str = "FAILURE_REPORTING";
pub const DELETE_RESPONSE_DELAY_KEY: &str = "DELETE_RESPONSE_DELAY_SECS";

pub const DEFAULT_LOG_FILTER: &str = "info";
pub const DEFAULT_HONEY_DATASET: &str = "lacework-control-tower";
pub const DEFAULT_DELETE_RESPONSE_DELAY_SECS: u64 = 15;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("required setting '{key}' is not configured")]
    Missing { key: &'static str },

    #[error("setting '{key}' has invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

pub trait SettingsSource {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads the process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl SettingsSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl SettingsSource for BTreeMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        BTreeMap::get(self, key).cloned()
    }
}

fn optional(source: &dyn SettingsSource, key: &str) -> Option<String> {
    source
        .get(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn required(source: &dyn SettingsSource, key: &'static str) -> Result<String, SettingsError> {
    optional(source, key).ok_or(SettingsError::Missing { key })
}

pub fn load_platform_url(source: &dyn SettingsSource) -> Result<String, SettingsError> {
    required(source, LACEWORK_URL_KEY)
}

fn parse_optional<T>(
    source: &dyn SettingsSource,
    key: &'static str,
) -> Result<Option<T>, SettingsError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let Some(value) = optional(source, key) else {
        return Ok(None);
    };
    match value.parse::<T>() {
        Ok(parsed) => Ok(Some(parsed)),
        Err(error) => Err(SettingsError::Invalid {
            key,
            value,
            reason: error.to_string(),
        }),
    }
}

/// Credentials and identifiers needed to register a member account.
#[derive(Clone, PartialEq, Eq)]
pub struct PlatformSettings {
    pub lacework_url: String,
    pub access_key_id: String,
    pub secret_key: String,
    pub lacework_account: String,
}

impl PlatformSettings {
    pub fn load(source: &dyn SettingsSource) -> Result<Self, SettingsError> {
        Ok(Self {
            lacework_url: load_platform_url(source)?,
            access_key_id: required(source, ACCESS_KEY_ID_KEY)?,
            secret_key: required(source, SECRET_KEY_KEY)?,
            lacework_account: required(source, LACEWORK_ACCOUNT_KEY)?,
        })
    }

    /// Non-secret view attached to telemetry.
    pub fn public_summary(&self) -> Value {
        json!({
            "lacework_url": self.lacework_url,
            "lacework_account": self.lacework_account,
            "access_key_id": self.access_key_id,
        })
    }
}

impl fmt::Debug for PlatformSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformSettings")
            .field("lacework_url", &self.lacework_url)
            .field("access_key_id", &self.access_key_id)
            .field("secret_key", &"<redacted>")
            .field("lacework_account", &self.lacework_account)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetrySettings {
    pub api_key: Option<String>,
    pub dataset: String,
    pub build_version: String,
}

impl TelemetrySettings {
    pub fn load(source: &dyn SettingsSource) -> Self {
        Self {
            api_key: optional(source, HONEY_API_KEY_KEY),
            dataset: optional(source, HONEY_DATASET_KEY)
                .unwrap_or_else(|| DEFAULT_HONEY_DATASET.to_string()),
            build_version: optional(source, BUILD_VERSION_KEY)
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
        }
    }
}

/// How the create path labels and sequences its two non-exception failures.
///
/// `Parity` keeps the historical message text and lets a rejected
/// registration fall through to the success signal; `Corrected` names the
/// failing step and stops at the first failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailureReporting {
    Parity,
    #[default]
    Corrected,
}

impl FromStr for FailureReporting {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "parity" => Ok(Self::Parity),
            "corrected" => Ok(Self::Corrected),
            other => Err(format!("expected 'parity' or 'corrected', got '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSettings {
    pub failure_reporting: FailureReporting,
    pub delete_response_delay: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            failure_reporting: FailureReporting::default(),
            delete_response_delay: Duration::from_secs(DEFAULT_DELETE_RESPONSE_DELAY_SECS),
        }
    }
}

impl DispatchSettings {
    pub fn load(source: &dyn SettingsSource) -> Result<Self, SettingsError> {
        let failure_reporting = parse_optional(source, FAILURE_REPORTING_KEY)?;
        let delay_secs = parse_optional(source, DELETE_RESPONSE_DELAY_KEY)?
            .unwrap_or(DEFAULT_DELETE_RESPONSE_DELAY_SECS);

        Ok(Self {
            failure_reporting: failure_reporting.unwrap_or_default(),
            delete_response_delay: Duration::from_secs(delay_secs),
        })
    }
}

/// `tracing` filter directive for `LOGLEVEL`, accepting logging-style names.
pub fn log_filter(source: &dyn SettingsSource) -> String {
    let Some(level) = optional(source, LOG_LEVEL_KEY) else {
        return DEFAULT_LOG_FILTER.to_string();
    };
    let filter = match level.to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" | "10" => "debug",
        "info" | "20" => "info",
        "warn" | "warning" | "30" => "warn",
        "error" | "critical" | "fatal" | "40" | "50" => "error",
        _ => DEFAULT_LOG_FILTER,
    };
    filter.to_string()
}
