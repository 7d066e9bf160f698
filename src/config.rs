use std::env;
use std::fs;
use std::str::FromStr;
use std::time::Duration;

use crate::engine::creation::CreationSettings;
use crate::engine::queue::DispatcherSettings;
use crate::engine::service::EngineSettings;
use crate::error::AppError;
use crate::pricing::PricingConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format {other:?}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub event_buffer_size: usize,
    pub dispatch_queue_size: usize,
    pub auto_dispatch: bool,
    pub dispatch_retry_delay: Duration,
    pub max_dispatch_attempts: u32,
    pub max_assignment_attempts: u32,
    pub default_distance_km: f64,
    pub pricing_config_path: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let default_distance_km: f64 = parse_or_default("DEFAULT_DISTANCE_KM", 5.0)?;
        if !default_distance_km.is_finite() || default_distance_km < 0.0 {
            return Err(AppError::Internal(
                "invalid DEFAULT_DISTANCE_KM: must be a non-negative number".to_string(),
            ));
        }

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: parse_or_default("LOG_FORMAT", LogFormat::Compact)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            dispatch_queue_size: parse_or_default("DISPATCH_QUEUE_SIZE", 1024)?,
            auto_dispatch: parse_or_default("AUTO_DISPATCH", true)?,
            dispatch_retry_delay: Duration::from_millis(parse_or_default(
                "DISPATCH_RETRY_DELAY_MS",
                250,
            )?),
            max_dispatch_attempts: parse_or_default("MAX_DISPATCH_ATTEMPTS", 20)?,
            max_assignment_attempts: parse_or_default("MAX_ASSIGNMENT_ATTEMPTS", 3)?,
            default_distance_km,
            pricing_config_path: env::var("PRICING_CONFIG_PATH")
                .ok()
                .filter(|path| !path.trim().is_empty()),
        })
    }

    pub fn dispatcher_settings(&self) -> DispatcherSettings {
        DispatcherSettings {
            retry_delay: self.dispatch_retry_delay,
            max_attempts: self.max_dispatch_attempts.max(1),
        }
    }

    /// Rate tables from `PRICING_CONFIG_PATH`, or the built-in defaults.
    pub fn pricing(&self) -> Result<PricingConfig, AppError> {
        let Some(path) = &self.pricing_config_path else {
            return Ok(PricingConfig::default());
        };

        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Internal(format!("failed to read {path}: {err}")))?;
        serde_json::from_str(&raw)
            .map_err(|err| AppError::Internal(format!("invalid pricing config {path}: {err}")))
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            creation: CreationSettings {
                default_distance_km: self.default_distance_km,
                ..CreationSettings::default()
            },
            max_assignment_attempts: self.max_assignment_attempts,
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
