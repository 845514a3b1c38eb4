//! Runtime configuration from environment variables

use crate::error::TipsterError;
use crate::providers::{huggingface, sportsdb};
use crate::scheduler::DEFAULT_REFRESH_INTERVAL;
use crate::Result;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Upper bound for any configured TTL, timeout or interval: one year.
pub const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq)]
pub struct BotConfig {
    pub sports_api_key: String,
    pub sports_api_base_url: String,
    pub league_id: String,
    pub sports_cache_ttl: Duration,
    pub huggingface_token: String,
    pub huggingface_model_url: String,
    pub generation_cache_ttl: Duration,
    pub fetch_timeout: Duration,
    pub refresh_interval: Duration,
    pub database_url: Option<String>,
    pub catalog_path: Option<PathBuf>,
    pub port: u16,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            sports_api_key: sportsdb::DEFAULT_API_KEY.to_string(),
            sports_api_base_url: sportsdb::DEFAULT_BASE_URL.to_string(),
            league_id: sportsdb::DEFAULT_LEAGUE_ID.to_string(),
            sports_cache_ttl: Duration::from_secs(3600),
            huggingface_token: String::new(),
            huggingface_model_url: huggingface::DEFAULT_MODEL_URL.to_string(),
            generation_cache_ttl: Duration::from_secs(300),
            fetch_timeout: Duration::from_secs(15),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            database_url: None,
            catalog_path: None,
            port: 8080,
        }
    }
}

impl BotConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            sports_api_key: get("SPORTS_API_KEY").unwrap_or(defaults.sports_api_key),
            sports_api_base_url: get("SPORTS_API_BASE_URL").unwrap_or(defaults.sports_api_base_url),
            league_id: get("SPORTS_LEAGUE_ID").unwrap_or(defaults.league_id),
            sports_cache_ttl: seconds(&get, "SPORTS_CACHE_TTL_SECS", defaults.sports_cache_ttl)?,
            huggingface_token: get("HUGGINGFACE_API_TOKEN").unwrap_or(defaults.huggingface_token),
            huggingface_model_url: get("HUGGINGFACE_MODEL_URL").unwrap_or(defaults.huggingface_model_url),
            generation_cache_ttl: seconds(&get, "GENERATION_CACHE_TTL_SECS", defaults.generation_cache_ttl)?,
            fetch_timeout: seconds(&get, "FETCH_TIMEOUT_SECS", defaults.fetch_timeout)?,
            refresh_interval: seconds(&get, "REFRESH_INTERVAL_SECS", defaults.refresh_interval)?,
            database_url: get("DATABASE_URL").or_else(|| get("POSTGRES_URL")),
            catalog_path: get("CATALOG_PATH").map(PathBuf::from),
            port: match get("PORT").or_else(|| get("API_PORT")) {
                Some(raw) => parse("PORT", &raw)?,
                None => defaults.port,
            },
        })
    }
}

fn seconds(get: &dyn Fn(&str) -> Option<String>, key: &str, default: Duration) -> Result<Duration> {
    match get(key) {
        Some(raw) => {
            let secs: u64 = parse(key, &raw)?;
            if secs == 0 {
                return Err(TipsterError::Config(format!("{} must be greater than zero", key)));
            }
            if secs > MAX_DURATION_SECS {
                return Err(TipsterError::Config(format!(
                    "{} must be at most {} seconds",
                    key, MAX_DURATION_SECS
                )));
            }
            Ok(Duration::from_secs(secs))
        }
        None => Ok(default),
    }
}

fn parse<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| TipsterError::Config(format!("invalid value for {}: {:?}", key, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<BotConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BotConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg, BotConfig::default());
        assert_eq!(cfg.league_id, "4328");
        assert_eq!(cfg.refresh_interval, Duration::from_secs(14_400));
        assert!(cfg.database_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("SPORTS_LEAGUE_ID", "4335"),
            ("SPORTS_CACHE_TTL_SECS", "60"),
            ("POSTGRES_URL", "postgres://localhost/tipster"),
            ("API_PORT", "3000"),
            ("HUGGINGFACE_API_TOKEN", ""),
        ])
        .unwrap();

        assert_eq!(cfg.league_id, "4335");
        assert_eq!(cfg.sports_cache_ttl, Duration::from_secs(60));
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/tipster"));
        assert_eq!(cfg.port, 3000);
        assert!(cfg.huggingface_token.is_empty());
    }

    #[test]
    fn test_invalid_numbers_are_config_errors() {
        assert!(matches!(
            config(&[("FETCH_TIMEOUT_SECS", "soon")]),
            Err(TipsterError::Config(_))
        ));
        assert!(matches!(
            config(&[("REFRESH_INTERVAL_SECS", "0")]),
            Err(TipsterError::Config(_))
        ));
        assert!(matches!(config(&[("PORT", "70000")]), Err(TipsterError::Config(_))));
    }

    #[test]
    fn test_oversized_ttl_is_rejected() {
        assert!(matches!(
            config(&[("SPORTS_CACHE_TTL_SECS", "9000000000000")]),
            Err(TipsterError::Config(_))
        ));
        assert!(matches!(
            config(&[("GENERATION_CACHE_TTL_SECS", "31536001")]),
            Err(TipsterError::Config(_))
        ));

        let cfg = config(&[("GENERATION_CACHE_TTL_SECS", "31536000")]).unwrap();
        assert_eq!(cfg.generation_cache_ttl, Duration::from_secs(MAX_DURATION_SECS));
    }
}
