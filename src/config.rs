use std::{env, fmt::Display, str::FromStr};

use chrono::Duration;

use crate::error::AppError;

const DEFAULT_LOG_FILTER: &str = "info,kumve=debug";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// Length applied when a trip has a gather time but no end time.
    pub default_trip_length: Duration,
    pub result_channel_capacity: usize,
    /// Tracing directives used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://kumve.db?mode=rwc".to_string());
        let max_connections = parse_var("KUMVE_MAX_CONNECTIONS", 10u32)?;
        let default_trip_hours = parse_var("KUMVE_DEFAULT_TRIP_HOURS", 4i64)?;
        if default_trip_hours <= 0 {
            return Err(AppError::Config(
                "KUMVE_DEFAULT_TRIP_HOURS must be positive".to_string(),
            ));
        }
        let result_channel_capacity = parse_var("KUMVE_RESULT_CHANNEL_CAPACITY", 64usize)?;
        if result_channel_capacity == 0 {
            return Err(AppError::Config(
                "KUMVE_RESULT_CHANNEL_CAPACITY must not be zero".to_string(),
            ));
        }

        let log_filter =
            env::var("KUMVE_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());

        Ok(Self {
            database_url,
            max_connections,
            default_trip_length: Duration::hours(default_trip_hours),
            result_channel_capacity,
            log_filter,
        })
    }

    pub fn for_database(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 5,
            default_trip_length: Duration::hours(4),
            result_channel_capacity: 64,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

fn parse_var<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|err| AppError::Config(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_config_uses_defaults() {
        let config = AppConfig::for_database("sqlite::memory:");
        assert_eq!(config.default_trip_length, Duration::hours(4));
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
        assert!(config.result_channel_capacity > 0);
    }
}
