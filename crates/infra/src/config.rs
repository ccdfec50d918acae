//! Service configuration from environment variables.

use std::net::SocketAddr;
use std::str::FromStr;

use thiserror::Error;

use sitestock_core::page::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

pub const ENV_BIND_ADDR: &str = "SITESTOCK_BIND_ADDR";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_MAX_COMMIT_RETRIES: &str = "SITESTOCK_MAX_COMMIT_RETRIES";
pub const ENV_DEFAULT_PAGE_SIZE: &str = "SITESTOCK_DEFAULT_PAGE_SIZE";
pub const ENV_MAX_PAGE_SIZE: &str = "SITESTOCK_MAX_PAGE_SIZE";
pub const ENV_DB_MAX_CONNECTIONS: &str = "SITESTOCK_DB_MAX_CONNECTIONS";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    pub bind_addr: SocketAddr,
    /// Postgres connection string. `None` selects the in-memory backend.
    pub database_url: Option<String>,
    /// Version-conflict retries before giving up with `ConcurrentModification`.
    pub max_commit_retries: u32,
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub db_max_connections: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_url: None,
            max_commit_retries: 3,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            db_max_connections: 5,
        }
    }
}

impl LedgerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset or blank keys keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let cfg = Self {
            bind_addr: parse_or(get(ENV_BIND_ADDR), ENV_BIND_ADDR, defaults.bind_addr)?,
            database_url: get(ENV_DATABASE_URL),
            max_commit_retries: parse_or(
                get(ENV_MAX_COMMIT_RETRIES),
                ENV_MAX_COMMIT_RETRIES,
                defaults.max_commit_retries,
            )?,
            default_page_size: parse_or(
                get(ENV_DEFAULT_PAGE_SIZE),
                ENV_DEFAULT_PAGE_SIZE,
                defaults.default_page_size,
            )?,
            max_page_size: parse_or(
                get(ENV_MAX_PAGE_SIZE),
                ENV_MAX_PAGE_SIZE,
                defaults.max_page_size,
            )?,
            db_max_connections: parse_or(
                get(ENV_DB_MAX_CONNECTIONS),
                ENV_DB_MAX_CONNECTIONS,
                defaults.db_max_connections,
            )?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let positive = |key: &'static str, value: u32| {
            if value == 0 {
                Err(ConfigError::Invalid {
                    key,
                    value: value.to_string(),
                    reason: "must be at least 1".to_string(),
                })
            } else {
                Ok(())
            }
        };
        positive(ENV_MAX_COMMIT_RETRIES, self.max_commit_retries)?;
        positive(ENV_DEFAULT_PAGE_SIZE, self.default_page_size)?;
        positive(ENV_MAX_PAGE_SIZE, self.max_page_size)?;
        positive(ENV_DB_MAX_CONNECTIONS, self.db_max_connections)?;

        if self.default_page_size > self.max_page_size {
            return Err(ConfigError::Invalid {
                key: ENV_DEFAULT_PAGE_SIZE,
                value: self.default_page_size.to_string(),
                reason: format!("exceeds {ENV_MAX_PAGE_SIZE} ({})", self.max_page_size),
            });
        }
        Ok(())
    }
}

fn parse_or<T>(raw: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: core::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let cfg = LedgerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg, LedgerConfig::default());
        assert_eq!(cfg.bind_addr.port(), 8080);
        assert_eq!(cfg.max_commit_retries, 3);
        assert_eq!(cfg.default_page_size, 20);
        assert!(cfg.database_url.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = LedgerConfig::from_lookup(lookup(&[
            (ENV_BIND_ADDR, "127.0.0.1:9000"),
            (ENV_DATABASE_URL, "postgres://localhost/sitestock"),
            (ENV_MAX_COMMIT_RETRIES, " 7 "),
            (ENV_MAX_PAGE_SIZE, "50"),
        ]))
        .unwrap();
        assert_eq!(cfg.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/sitestock"));
        assert_eq!(cfg.max_commit_retries, 7);
        assert_eq!(cfg.max_page_size, 50);
    }

    #[test]
    fn invalid_values_are_startup_errors() {
        let err = LedgerConfig::from_lookup(lookup(&[(ENV_MAX_COMMIT_RETRIES, "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: ENV_MAX_COMMIT_RETRIES, .. }));

        let err = LedgerConfig::from_lookup(lookup(&[(ENV_MAX_PAGE_SIZE, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: ENV_MAX_PAGE_SIZE, .. }));

        let err = LedgerConfig::from_lookup(lookup(&[
            (ENV_DEFAULT_PAGE_SIZE, "100"),
            (ENV_MAX_PAGE_SIZE, "10"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: ENV_DEFAULT_PAGE_SIZE, .. }));
    }
}
