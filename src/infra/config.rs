//! Centralized configuration (environment variables + defaults).

use crate::domain::model::DEFAULT_LICENSE_KEYS;
use crate::domain::token::DEFAULT_TOKEN_CAPACITY;
use anyhow::Context;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://cdn.sqlite";
pub const DEFAULT_STORAGE_ROOT: &str = "public";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3344";
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub storage_root: PathBuf,
    pub bind_addr: SocketAddr,
    /// Bearer key for admin routes. `None` leaves them open.
    pub admin_api_key: Option<String>,
    /// Allow-list seeded into the `licenses` table at startup.
    pub license_keys: Vec<String>,
    pub token_sweep_interval: Duration,
    pub max_live_tokens: usize,
    /// Comma separated origins; `None` allows any origin.
    pub cors_origins: Option<String>,
}

impl Config {
    /// Reads the process environment (after loading `.env` when present).
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = non_empty("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = SocketAddr::from_str(&bind_addr)
            .with_context(|| format!("BIND_ADDR must be host:port, got {:?}", bind_addr))?;

        let license_keys = match non_empty("LICENSE_KEYS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from)
                .collect(),
            None => DEFAULT_LICENSE_KEYS.iter().map(|k| k.to_string()).collect(),
        };

        let sweep_secs: u64 = parse_or(&non_empty, "TOKEN_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS)?;
        let max_live_tokens: usize = parse_or(&non_empty, "MAX_LIVE_TOKENS", DEFAULT_TOKEN_CAPACITY)?;

        Ok(Self {
            database_url: non_empty("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            storage_root: PathBuf::from(
                non_empty("STORAGE_ROOT").unwrap_or_else(|| DEFAULT_STORAGE_ROOT.to_string()),
            ),
            bind_addr,
            admin_api_key: non_empty("ADMIN_API_KEY"),
            license_keys,
            token_sweep_interval: Duration::from_secs(sweep_secs.max(1)),
            max_live_tokens: max_live_tokens.max(1),
            cors_origins: non_empty("CORS_ORIGINS"),
        })
    }
}

/// Log filter directive for the tracing subscriber (`CDN_LOG`, default `info`).
pub fn log_filter() -> String {
    std::env::var("CDN_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string())
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{} must be a valid number, got {:?}", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config_from(&[]).expect("defaults");
        assert_eq!(cfg.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(cfg.storage_root, PathBuf::from(DEFAULT_STORAGE_ROOT));
        assert_eq!(cfg.bind_addr.port(), 3344);
        assert_eq!(cfg.admin_api_key, None);
        assert_eq!(cfg.license_keys, DEFAULT_LICENSE_KEYS);
        assert_eq!(cfg.token_sweep_interval, Duration::from_secs(60));
        assert_eq!(cfg.max_live_tokens, DEFAULT_TOKEN_CAPACITY);
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = config_from(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("ADMIN_API_KEY", "secret"),
            ("LICENSE_KEYS", "A, B,,C"),
            ("TOKEN_SWEEP_INTERVAL_SECS", "0"),
            ("MAX_LIVE_TOKENS", "5"),
        ])
        .expect("config");
        assert_eq!(cfg.database_url, "sqlite::memory:");
        assert_eq!(cfg.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(cfg.admin_api_key.as_deref(), Some("secret"));
        assert_eq!(cfg.license_keys, vec!["A", "B", "C"]);
        assert_eq!(cfg.token_sweep_interval, Duration::from_secs(1));
        assert_eq!(cfg.max_live_tokens, 5);
    }

    #[test]
    fn blank_admin_key_means_unset() {
        let cfg = config_from(&[("ADMIN_API_KEY", "  ")]).expect("config");
        assert_eq!(cfg.admin_api_key, None);
    }

    #[test]
    fn invalid_numbers_are_errors() {
        assert!(config_from(&[("MAX_LIVE_TOKENS", "lots")]).is_err());
        assert!(config_from(&[("BIND_ADDR", "nowhere")]).is_err());
    }
}
