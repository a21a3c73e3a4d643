use std::env;
use std::path::PathBuf;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    workspace: Option<PathBuf>,
    telemetry: TelemetrySettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySettings {
    pub log_level: String,
    pub json: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let workspace = optional("ATTENDANCED_WORKSPACE").map(PathBuf::from);
        let log_level = optional("ATTENDANCED_LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        let json = match optional("ATTENDANCED_LOG_JSON") {
            None => false,
            Some(value) => parse_bool(&value).ok_or(ConfigError::InvalidValue {
                field: "ATTENDANCED_LOG_JSON",
                value,
            })?,
        };

        let settings = Self {
            workspace,
            telemetry: TelemetrySettings { log_level, json },
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn workspace(&self) -> Option<&PathBuf> {
        self.workspace.as_ref()
    }

    pub fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if EnvFilter::try_new(&self.telemetry.log_level).is_err() {
            return Err(ConfigError::InvalidValue {
                field: "ATTENDANCED_LOG_LEVEL",
                value: self.telemetry.log_level.clone(),
            });
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" | "off" | "OFF" => Some(false),
        _ => None,
    }
}
