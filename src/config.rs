//! Runtime configuration, read from the environment (and `.env` via dotenvy).

use std::env;
use std::time::Duration;

use thiserror::Error;

pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_GOOGLE_DRIVE_TOKEN: &str = "GOOGLE_DRIVE_TOKEN";
pub const ENV_GOOGLE_DRIVE_API_URL: &str = "GOOGLE_DRIVE_API_URL";
pub const ENV_ORDERS_FILE_NAME: &str = "ORDERS_FILE_NAME";
pub const ENV_CBR_DAILY_URL: &str = "CBR_DAILY_URL";
pub const ENV_CBR_VALUTE_ID: &str = "CBR_VALUTE_ID";
pub const ENV_ORDERS_BATCH_SIZE: &str = "ORDERS_BATCH_SIZE";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "HTTP_TIMEOUT_SECS";
pub const ENV_JOB_START_OFFSET_SECS: &str = "ORDERS_JOB_START_OFFSET_SECS";
pub const ENV_JOB_INTERVAL_SECS: &str = "ORDERS_JOB_INTERVAL_SECS";

pub const DEFAULT_GOOGLE_DRIVE_API_URL: &str = "https://www.googleapis.com";
pub const DEFAULT_ORDERS_FILE_NAME: &str = "test_kanalservis";
pub const DEFAULT_CBR_DAILY_URL: &str = "https://www.cbr.ru/scripts/XML_daily.asp";
/// CBR identifier of the US dollar
pub const DEFAULT_CBR_VALUTE_ID: &str = "R01235";
pub const DEFAULT_BATCH_SIZE: usize = 20;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_JOB_START_OFFSET_SECS: u64 = 10;
pub const DEFAULT_JOB_INTERVAL_SECS: u64 = 3600;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings of a single pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderSettings {
    pub file_name: String,
    pub batch_size: usize,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            file_name: DEFAULT_ORDERS_FILE_NAME.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// When the periodic job fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleSettings {
    pub start_offset: Duration,
    pub interval: Duration,
}

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub database_url: String,
    pub drive_token: String,
    pub drive_api_url: String,
    pub cbr_url: String,
    pub cbr_valute_id: String,
    pub http_timeout: Duration,
    pub loader: LoaderSettings,
    pub schedule: ScheduleSettings,
}

impl LoaderConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the config from an arbitrary variable lookup (used by tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };
        let or_default =
            |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let batch_size = parse_positive(&lookup, ENV_ORDERS_BATCH_SIZE, DEFAULT_BATCH_SIZE as u64)?;
        let http_timeout_secs =
            parse_positive(&lookup, ENV_HTTP_TIMEOUT_SECS, DEFAULT_HTTP_TIMEOUT_SECS)?;
        let interval_secs =
            parse_positive(&lookup, ENV_JOB_INTERVAL_SECS, DEFAULT_JOB_INTERVAL_SECS)?;
        let start_offset_secs = match lookup(ENV_JOB_START_OFFSET_SECS) {
            Some(raw) => raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                name: ENV_JOB_START_OFFSET_SECS,
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_JOB_START_OFFSET_SECS,
        };

        Ok(Self {
            database_url: required(ENV_DATABASE_URL)?,
            drive_token: required(ENV_GOOGLE_DRIVE_TOKEN)?,
            drive_api_url: or_default(ENV_GOOGLE_DRIVE_API_URL, DEFAULT_GOOGLE_DRIVE_API_URL),
            cbr_url: or_default(ENV_CBR_DAILY_URL, DEFAULT_CBR_DAILY_URL),
            cbr_valute_id: or_default(ENV_CBR_VALUTE_ID, DEFAULT_CBR_VALUTE_ID),
            http_timeout: Duration::from_secs(http_timeout_secs),
            loader: LoaderSettings {
                file_name: or_default(ENV_ORDERS_FILE_NAME, DEFAULT_ORDERS_FILE_NAME),
                batch_size: batch_size as usize,
            },
            schedule: ScheduleSettings {
                start_offset: Duration::from_secs(start_offset_secs),
                interval: Duration::from_secs(interval_secs),
            },
        })
    }
}

fn parse_positive<F>(lookup: &F, name: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid {
            name,
            value: raw,
            reason: "must be at least 1".to_string(),
        }),
        Ok(value) => Ok(value),
        Err(e) => Err(ConfigError::Invalid {
            name,
            value: raw,
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_applied() {
        let config = LoaderConfig::from_lookup(lookup_from(&[
            (ENV_DATABASE_URL, "postgres://localhost/orders"),
            (ENV_GOOGLE_DRIVE_TOKEN, "token"),
        ]))
        .unwrap();

        assert_eq!(config.loader, LoaderSettings::default());
        assert_eq!(config.cbr_valute_id, "R01235");
        assert_eq!(config.cbr_url, DEFAULT_CBR_DAILY_URL);
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.schedule.start_offset, Duration::from_secs(10));
        assert_eq!(config.schedule.interval, Duration::from_secs(3600));
    }

    #[test]
    fn test_missing_database_url() {
        let err = LoaderConfig::from_lookup(lookup_from(&[(ENV_GOOGLE_DRIVE_TOKEN, "token")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::Missing(ENV_DATABASE_URL));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let err = LoaderConfig::from_lookup(lookup_from(&[
            (ENV_DATABASE_URL, "postgres://localhost/orders"),
            (ENV_GOOGLE_DRIVE_TOKEN, "token"),
            (ENV_ORDERS_BATCH_SIZE, "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: ENV_ORDERS_BATCH_SIZE, .. }));
    }

    #[test]
    fn test_overrides() {
        let config = LoaderConfig::from_lookup(lookup_from(&[
            (ENV_DATABASE_URL, "postgres://localhost/orders"),
            (ENV_GOOGLE_DRIVE_TOKEN, "token"),
            (ENV_ORDERS_FILE_NAME, "orders_2024"),
            (ENV_ORDERS_BATCH_SIZE, "50"),
            (ENV_JOB_START_OFFSET_SECS, "0"),
            (ENV_JOB_INTERVAL_SECS, "60"),
        ]))
        .unwrap();

        assert_eq!(config.loader.file_name, "orders_2024");
        assert_eq!(config.loader.batch_size, 50);
        assert_eq!(config.schedule.start_offset, Duration::ZERO);
        assert_eq!(config.schedule.interval, Duration::from_secs(60));
    }
}
