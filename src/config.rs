use std::env;
use std::path::PathBuf;

use anyhow::Context;
use chrono::{FixedOffset, Offset, Utc};

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub frontend_url: String,

    /// Directory backing the local key-value storage.
    pub data_dir: PathBuf,

    /// Remote record collection. Cloud sync is disabled when unset.
    pub database_url: Option<String>,

    pub session_secret: String,
    pub session_ttl_secs: i64,

    pub deepseek_api_key: Option<String>,
    pub deepseek_base_url: String,
    pub deepseek_model: String,
    pub analysis_timeout_secs: u64,
    pub analysis_rate_limit_per_hour: u32,

    pub utc_offset_minutes: i32,
    pub trash_sweep_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key))
    }

    /// Builds the config from any variable source. Malformed numbers are
    /// rejected rather than defaulted.
    pub fn from_lookup<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        Ok(Self {
            host: var("HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            port: var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()
                .context("PORT must be a number")?,
            frontend_url: var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".into()),

            data_dir: var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),

            database_url: var("DATABASE_URL").ok().filter(|s| !s.is_empty()),

            session_secret: var("SESSION_SECRET")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            session_ttl_secs: var("SESSION_TTL_SECS")
                .unwrap_or_else(|_| "2592000".into()) // 30 days
                .parse()
                .context("SESSION_TTL_SECS must be a number")?,

            deepseek_api_key: var("DEEPSEEK_API_KEY").ok().filter(|s| !s.is_empty()),
            deepseek_base_url: var("DEEPSEEK_BASE_URL")
                .unwrap_or_else(|_| "https://api.deepseek.com".into()),
            deepseek_model: var("DEEPSEEK_MODEL")
                .unwrap_or_else(|_| "deepseek-chat".into()),
            analysis_timeout_secs: var("ANALYSIS_TIMEOUT_SECS")
                .unwrap_or_else(|_| "55".into())
                .parse()
                .context("ANALYSIS_TIMEOUT_SECS must be a number")?,
            analysis_rate_limit_per_hour: var("ANALYSIS_RATE_LIMIT_PER_HOUR")
                .unwrap_or_else(|_| "20".into())
                .parse()
                .context("ANALYSIS_RATE_LIMIT_PER_HOUR must be a number")?,

            utc_offset_minutes: var("UTC_OFFSET_MINUTES")
                .unwrap_or_else(|_| "0".into())
                .parse()
                .context("UTC_OFFSET_MINUTES must be a number")?,
            trash_sweep_interval_secs: var("TRASH_SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| "3600".into())
                .parse()
                .context("TRASH_SWEEP_INTERVAL_SECS must be a number")?,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn cloud_enabled(&self) -> bool {
        self.database_url.is_some()
    }

    /// Offset used for calendar days, week bounds and `createTime` strings.
    /// Falls back to UTC when the configured minutes are out of range.
    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }
}

#[cfg(test)]
impl Config {
    /// Baseline config for tests; no cloud, no API key.
    pub fn for_tests(data_dir: PathBuf) -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            frontend_url: "http://localhost:5173".into(),
            data_dir,
            database_url: None,
            session_secret: "test-secret".into(),
            session_ttl_secs: 3600,
            deepseek_api_key: None,
            deepseek_base_url: "http://127.0.0.1:9".into(),
            deepseek_model: "deepseek-chat".into(),
            analysis_timeout_secs: 55,
            analysis_rate_limit_per_hour: 20,
            utc_offset_minutes: 0,
            trash_sweep_interval_secs: 3600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_falls_back_to_utc_when_out_of_range() {
        let mut config = Config::for_tests(PathBuf::from("/tmp"));
        config.utc_offset_minutes = 480;
        assert_eq!(config.utc_offset().local_minus_utc(), 8 * 3600);

        config.utc_offset_minutes = 100_000;
        assert_eq!(config.utc_offset().local_minus_utc(), 0);
    }

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Result<String, env::VarError> {
        let vars: std::collections::HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned().ok_or(env::VarError::NotPresent)
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.analysis_timeout_secs, 55);
        assert_eq!(config.analysis_rate_limit_per_hour, 20);
        assert_eq!(config.trash_sweep_interval_secs, 3600);
        assert!(!config.cloud_enabled());
    }

    #[test]
    fn test_malformed_numbers_are_rejected() {
        for key in [
            "PORT",
            "ANALYSIS_TIMEOUT_SECS",
            "ANALYSIS_RATE_LIMIT_PER_HOUR",
            "TRASH_SWEEP_INTERVAL_SECS",
            "UTC_OFFSET_MINUTES",
        ] {
            let err = Config::from_lookup(lookup(&[(key, "soon")])).unwrap_err();
            assert!(err.to_string().contains(key), "{key}: {err}");
        }

        let config = Config::from_lookup(lookup(&[("ANALYSIS_TIMEOUT_SECS", "30")])).unwrap();
        assert_eq!(config.analysis_timeout_secs, 30);
    }

    #[test]
    fn test_cloud_enabled_follows_database_url() {
        let mut config = Config::for_tests(PathBuf::from("/tmp"));
        assert!(!config.cloud_enabled());
        config.database_url = Some("postgres://localhost/mood".into());
        assert!(config.cloud_enabled());
    }
}
