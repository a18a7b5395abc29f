//! Configuration loading and representation.
//!
//! Everything comes from environment variables with dev-friendly defaults.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::refresh::{RefreshConfig, MAX_SUGGESTION_TTL_HOURS};

pub const DEV_JWT_SECRET: &str = "dev-insecure-secret-change-me";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },

    #[error("{0} must be set when USE_PERSISTENT_STORES=true")]
    Missing(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    InMemory {
        /// Optional JSON seed for the in-memory collaborators.
        seed_file: Option<String>,
    },
    Postgres {
        database_url: String,
        max_connections: u32,
    },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    /// True when `JWT_SECRET` was not set and the dev default is in use.
    pub jwt_secret_is_default: bool,
    pub storage: StorageConfig,
    pub refresh: RefreshConfig,
    pub refresh_interval: Duration,
    /// Disable the background scheduler (tests, one-off admin instances).
    pub scheduler_enabled: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = parse_or(&lookup, "FIGURA_BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?;

        let (jwt_secret, jwt_secret_is_default) = match lookup("JWT_SECRET") {
            Some(secret) if !secret.is_empty() => (secret, false),
            _ => (DEV_JWT_SECRET.to_string(), true),
        };

        let persistent = lookup("USE_PERSISTENT_STORES")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);
        let storage = if persistent {
            let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
            StorageConfig::Postgres {
                database_url,
                max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10u32)?,
            }
        } else {
            StorageConfig::InMemory {
                seed_file: lookup("FIGURA_SEED_FILE"),
            }
        };

        let defaults = RefreshConfig::default();
        let refresh = RefreshConfig {
            ttl: ttl_hours(parse_or(
                &lookup,
                "SUGGESTION_TTL_HOURS",
                defaults.ttl.num_hours() as u32,
            )?)?,
            subject_timeout: Duration::from_secs(parse_or(
                &lookup,
                "REFRESH_SUBJECT_TIMEOUT_SECS",
                defaults.subject_timeout.as_secs(),
            )?),
            concurrency: parse_or(&lookup, "REFRESH_CONCURRENCY", defaults.concurrency)?,
            max_attempts: parse_or(&lookup, "REFRESH_MAX_ATTEMPTS", defaults.max_attempts)?,
            base_backoff: Duration::from_millis(parse_or(
                &lookup,
                "REFRESH_BASE_BACKOFF_MS",
                defaults.base_backoff.as_millis() as u64,
            )?),
            max_suggestions_per_subject: parse_or(
                &lookup,
                "MAX_SUGGESTIONS_PER_SUBJECT",
                defaults.max_suggestions_per_subject,
            )?,
        };
        refresh.validate()?;

        let refresh_interval = Duration::from_secs(parse_or(&lookup, "REFRESH_INTERVAL_SECS", 86_400u64)?);
        if refresh_interval.is_zero() {
            return Err(ConfigError::Invalid {
                key: "REFRESH_INTERVAL_SECS",
                message: "must be positive".to_string(),
            });
        }

        let scheduler_enabled = lookup("REFRESH_SCHEDULER_ENABLED")
            .map(|v| !(v.eq_ignore_ascii_case("false") || v == "0"))
            .unwrap_or(true);

        Ok(Self {
            bind_addr,
            jwt_secret,
            jwt_secret_is_default,
            storage,
            refresh,
            refresh_interval,
            scheduler_enabled,
        })
    }
}

fn ttl_hours(hours: u32) -> Result<chrono::Duration, ConfigError> {
    let invalid = |message: String| ConfigError::Invalid {
        key: "SUGGESTION_TTL_HOURS",
        message,
    };
    if hours == 0 || hours > MAX_SUGGESTION_TTL_HOURS {
        return Err(invalid(format!("must be between 1 and {MAX_SUGGESTION_TTL_HOURS}")));
    }
    chrono::Duration::try_hours(i64::from(hours)).ok_or_else(|| invalid(format!("{hours} hours is out of range")))
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            message: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_are_in_memory_with_daily_refresh() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind_addr.port(), 8080);
        assert!(cfg.jwt_secret_is_default);
        assert_eq!(cfg.storage, StorageConfig::InMemory { seed_file: None });
        assert_eq!(cfg.refresh_interval, Duration::from_secs(86_400));
        assert_eq!(cfg.refresh.ttl, chrono::Duration::hours(48));
        assert_eq!(cfg.refresh.concurrency, 4);
        assert!(cfg.scheduler_enabled);
    }

    #[test]
    fn persistent_mode_requires_database_url() {
        assert_eq!(
            config(&[("USE_PERSISTENT_STORES", "true")]).unwrap_err(),
            ConfigError::Missing("DATABASE_URL")
        );
        let cfg = config(&[("USE_PERSISTENT_STORES", "true"), ("DATABASE_URL", "postgres://x")]).unwrap();
        assert!(matches!(cfg.storage, StorageConfig::Postgres { max_connections: 10, .. }));
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = config(&[("REFRESH_CONCURRENCY", "many")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "REFRESH_CONCURRENCY", .. }));
        assert!(config(&[("REFRESH_CONCURRENCY", "0")]).is_err());
        assert!(config(&[("REFRESH_INTERVAL_SECS", "0")]).is_err());
    }

    #[test]
    fn overrides_apply() {
        let cfg = config(&[
            ("JWT_SECRET", "s3cret"),
            ("SUGGESTION_TTL_HOURS", "12"),
            ("MAX_SUGGESTIONS_PER_SUBJECT", "5"),
            ("REFRESH_SCHEDULER_ENABLED", "false"),
        ])
        .unwrap();
        assert_eq!(cfg.jwt_secret, "s3cret");
        assert!(!cfg.jwt_secret_is_default);
        assert_eq!(cfg.refresh.ttl, chrono::Duration::hours(12));
        assert_eq!(cfg.refresh.max_suggestions_per_subject, 5);
        assert!(!cfg.scheduler_enabled);
    }

    #[test]
    fn oversized_ttl_is_a_config_error() {
        for raw in ["0", "876000", "99999999999999"] {
            let err = config(&[("SUGGESTION_TTL_HOURS", raw)]).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { key: "SUGGESTION_TTL_HOURS", .. }), "{raw}: {err}");
        }
        let max = MAX_SUGGESTION_TTL_HOURS.to_string();
        let cfg = config(&[("SUGGESTION_TTL_HOURS", max.as_str())]).unwrap();
        assert_eq!(cfg.refresh.ttl, chrono::Duration::hours(i64::from(MAX_SUGGESTION_TTL_HOURS)));
    }
}
