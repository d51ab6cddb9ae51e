//! Configuration loading and representation.
//!
//! Everything comes from environment variables. Only `JWT_SECRET` is
//! required; a missing secret is a startup error.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use tenantry_auth::{ThrottleConfig, TokenConfig};
use tenantry_observability::LogFormat;

use crate::rate_limit::RateLimitConfig;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_REDIS_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Fully resolved process configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub token: TokenConfig,
    pub throttle: ThrottleConfig,
    pub rate_limit: RateLimitConfig,
    /// Shared store location; `None` selects the in-memory store.
    pub redis_url: Option<String>,
    /// Connect/read/write bound for each Redis round-trip.
    pub redis_timeout: Duration,
    pub log_format: LogFormat,
    /// System administrator to create at startup, if any.
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

/// Credentials for the initial system administrator.
#[derive(Clone, PartialEq, Eq)]
pub struct BootstrapAdmin {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl core::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl AppConfig {
    /// Read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from explicit key/value pairs.
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let secret = env
            .string("JWT_SECRET")
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let mut token = TokenConfig::new(secret);
        if let Some(issuer) = env.string("JWT_ISSUER") {
            token.issuer = issuer;
        }
        token.access_ttl = env.secs("JWT_ACCESS_TTL_SECS", token.access_ttl)?;
        token.refresh_ttl = env.secs("JWT_REFRESH_TTL_SECS", token.refresh_ttl)?;

        let defaults = ThrottleConfig::default();
        let throttle = ThrottleConfig {
            max_attempts: env.parse("LOGIN_MAX_ATTEMPTS", defaults.max_attempts)?,
            lockout_window: env.secs("LOGIN_LOCKOUT_SECS", defaults.lockout_window)?,
        };

        let defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            max_requests: env.parse("RATE_LIMIT_MAX_REQUESTS", defaults.max_requests)?,
            window: env.secs("RATE_LIMIT_WINDOW_SECS", defaults.window)?,
            sweep_interval: env.secs("RATE_LIMIT_SWEEP_SECS", defaults.sweep_interval)?,
        };

        let bind_addr = match env.string("BIND_ADDR") {
            Some(raw) => parse_value("BIND_ADDR", &raw)?,
            None => parse_value("BIND_ADDR", DEFAULT_BIND_ADDR)?,
        };

        let bootstrap_admin = match (
            env.string("BOOTSTRAP_ADMIN_EMAIL"),
            env.string("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Some(email), Some(password)) => Some(BootstrapAdmin {
                username: env.string("BOOTSTRAP_ADMIN_USERNAME").unwrap_or_else(|| "admin".to_string()),
                email,
                password,
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing("BOOTSTRAP_ADMIN_PASSWORD")),
            (None, Some(_)) => return Err(ConfigError::Missing("BOOTSTRAP_ADMIN_EMAIL")),
        };

        Ok(Self {
            bind_addr,
            token,
            throttle,
            rate_limit,
            redis_url: env.string("REDIS_URL"),
            redis_timeout: env.millis("REDIS_TIMEOUT_MS", DEFAULT_REDIS_TIMEOUT)?,
            log_format: env.parse("LOG_FORMAT", LogFormat::default())?,
            bootstrap_admin,
        })
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Non-blank value, trimmed.
    fn string(&self, var: &str) -> Option<String> {
        (self.0)(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T>(&self, var: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: core::fmt::Display,
    {
        match self.string(var) {
            Some(raw) => parse_value(var, &raw),
            None => Ok(default),
        }
    }

    fn secs(&self, var: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        let secs: u64 = self.parse(var, default.as_secs())?;
        positive(var, secs).map(Duration::from_secs)
    }

    fn millis(&self, var: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        let default = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
        let millis: u64 = self.parse(var, default)?;
        positive(var, millis).map(Duration::from_millis)
    }
}

fn positive(var: &'static str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            var,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

fn parse_value<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: core::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        reason: format!("'{raw}': {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let cfg = AppConfig::from_map(&vars(&[("JWT_SECRET", "s")])).unwrap();

        assert_eq!(cfg.token.secret, "s");
        assert_eq!(cfg.token.issuer, "tenantry");
        assert_eq!(cfg.token.access_ttl, Duration::from_secs(3600));
        assert_eq!(cfg.token.refresh_ttl, Duration::from_secs(604_800));
        assert_eq!(cfg.throttle.max_attempts, 5);
        assert_eq!(cfg.throttle.lockout_window, Duration::from_secs(900));
        assert_eq!(cfg.rate_limit.max_requests, 100);
        assert_eq!(cfg.rate_limit.window, Duration::from_secs(60));
        assert_eq!(cfg.rate_limit.sweep_interval, Duration::from_secs(300));
        assert_eq!(cfg.bind_addr, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.redis_url, None);
        assert_eq!(cfg.redis_timeout, Duration::from_millis(500));
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.bootstrap_admin, None);
    }

    #[test]
    fn bootstrap_admin_needs_both_email_and_password() {
        let cfg = AppConfig::from_map(&vars(&[
            ("JWT_SECRET", "s"),
            ("BOOTSTRAP_ADMIN_EMAIL", "root@example.com"),
            ("BOOTSTRAP_ADMIN_PASSWORD", "hunter2"),
        ]))
        .unwrap();
        let admin = cfg.bootstrap_admin.unwrap();
        assert_eq!(admin.username, "admin");
        assert!(!format!("{admin:?}").contains("hunter2"));

        assert_eq!(
            AppConfig::from_map(&vars(&[("JWT_SECRET", "s"), ("BOOTSTRAP_ADMIN_EMAIL", "a@b.c")])).err(),
            Some(ConfigError::Missing("BOOTSTRAP_ADMIN_PASSWORD"))
        );
    }

    #[test]
    fn missing_or_blank_secret_is_fatal() {
        assert_eq!(
            AppConfig::from_map(&vars(&[])).err(),
            Some(ConfigError::Missing("JWT_SECRET"))
        );
        assert_eq!(
            AppConfig::from_map(&vars(&[("JWT_SECRET", "   ")])).err(),
            Some(ConfigError::Missing("JWT_SECRET"))
        );
    }

    #[test]
    fn overrides_are_read() {
        let cfg = AppConfig::from_map(&vars(&[
            ("JWT_SECRET", "s"),
            ("JWT_ISSUER", "acme-auth"),
            ("JWT_ACCESS_TTL_SECS", "600"),
            ("LOGIN_MAX_ATTEMPTS", "3"),
            ("REDIS_URL", "redis://127.0.0.1:6379"),
            ("REDIS_TIMEOUT_MS", "250"),
            ("BIND_ADDR", "127.0.0.1:3000"),
            ("LOG_FORMAT", "pretty"),
        ]))
        .unwrap();

        assert_eq!(cfg.token.issuer, "acme-auth");
        assert_eq!(cfg.token.access_ttl, Duration::from_secs(600));
        assert_eq!(cfg.throttle.max_attempts, 3);
        assert_eq!(cfg.redis_url.as_deref(), Some("redis://127.0.0.1:6379"));
        assert_eq!(cfg.redis_timeout, Duration::from_millis(250));
        assert_eq!(cfg.bind_addr.port(), 3000);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }

    #[test]
    fn bad_values_name_the_variable() {
        let err = AppConfig::from_map(&vars(&[("JWT_SECRET", "s"), ("LOGIN_LOCKOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "LOGIN_LOCKOUT_SECS", .. }));

        let err = AppConfig::from_map(&vars(&[("JWT_SECRET", "s"), ("RATE_LIMIT_WINDOW_SECS", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "RATE_LIMIT_WINDOW_SECS", .. }));

        let err = AppConfig::from_map(&vars(&[("JWT_SECRET", "s"), ("LOG_FORMAT", "xml")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "LOG_FORMAT", .. }));
    }
}
