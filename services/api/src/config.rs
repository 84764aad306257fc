//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development. The signing secrets end up in the token
//! service and are never read from the environment again.

use std::net::{IpAddr, SocketAddr};
use ticketing_core::TokenSecrets;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub token_secrets: TokenSecrets,
    pub cors_origins: Vec<String>,
    pub scheduler_enabled: bool,
    /// Adds the `Secure` attribute to session cookies.
    pub secure_cookies: bool,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingVar(key.to_string()))
        };

        // --- Load Server and Database Settings ---
        let host_str = lookup("BIND_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let host = host_str
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_HOST".to_string(), e.to_string()))?;
        let port = lookup("PORT")
            .map(|p| {
                p.parse::<u16>()
                    .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), e.to_string()))
            })
            .transpose()?
            .unwrap_or(8080);
        let bind_address = SocketAddr::new(host, port);

        let database_url = required("DATABASE_URL")?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Token Secrets ---
        let access = required("ACCESS_JWT_SECRET")?;
        let refresh = required("REFRESH_JWT_SECRET")?;
        if access == refresh {
            return Err(ConfigError::InvalidValue(
                "REFRESH_JWT_SECRET".to_string(),
                "must differ from ACCESS_JWT_SECRET".to_string(),
            ));
        }

        // --- Load HTTP Settings ---
        let cors_origins = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();

        let scheduler_enabled = parse_flag(&lookup, "SCHEDULER_ENABLED", true)?;
        let secure_cookies = parse_flag(&lookup, "COOKIE_SECURE", false)?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            token_secrets: TokenSecrets { access, refresh },
            cors_origins,
            scheduler_enabled,
            secure_cookies,
        })
    }
}

fn parse_flag<F>(lookup: &F, key: &str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("'{}' is not a boolean", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn base() -> HashMap<String, String> {
        vars(&[
            ("DATABASE_URL", "postgres://localhost/tickets"),
            ("ACCESS_JWT_SECRET", "access"),
            ("REFRESH_JWT_SECRET", "refresh"),
        ])
    }

    #[test]
    fn defaults_apply() {
        let env = base();
        let config = Config::from_lookup(|k| env.get(k).cloned()).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.cors_origins, vec!["http://localhost:3000".to_string()]);
        assert!(config.scheduler_enabled);
        assert!(!config.secure_cookies);
    }

    #[test]
    fn overrides_are_parsed() {
        let mut env = base();
        env.extend(vars(&[
            ("PORT", "9000"),
            ("BIND_HOST", "127.0.0.1"),
            ("RUST_LOG", "debug"),
            ("CORS_ORIGINS", "https://a.example, https://b.example"),
            ("SCHEDULER_ENABLED", "false"),
        ]));
        let config = Config::from_lookup(|k| env.get(k).cloned()).unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.cors_origins.len(), 2);
        assert!(!config.scheduler_enabled);
    }

    #[test]
    fn missing_secret_is_an_error() {
        let mut env = base();
        env.remove("REFRESH_JWT_SECRET");
        let err = Config::from_lookup(|k| env.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ref k) if k == "REFRESH_JWT_SECRET"));
    }

    #[test]
    fn identical_secrets_are_rejected() {
        let mut env = base();
        env.insert("REFRESH_JWT_SECRET".to_string(), "access".to_string());
        let err = Config::from_lookup(|k| env.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(..)));
    }

    #[test]
    fn bad_port_is_an_error() {
        let mut env = base();
        env.insert("PORT".to_string(), "eighty".to_string());
        assert!(Config::from_lookup(|k| env.get(k).cloned()).is_err());
    }
}
