//! Application configuration module
//!
//! Two values are mandatory and must be present at process start: the
//! remote endpoint URL and the access key. Their absence is a startup
//! configuration error surfaced to the operator, not something the sync
//! core papers over. Everything else has a sensible default.
//!
//! Configuration is resolved from environment variables
//! (`BANDBRAIN_REMOTE_URL`, `BANDBRAIN_API_KEY`, ...) or from a TOML file
//! via [`AppConfig::from_file`].

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Default interval between background sync passes.
const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30);

/// Default bound on a single remote call.
const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Default interval for connectivity probes and change-feed polling.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the remote store, e.g. `https://abc.supabase.co`
    pub remote_url: String,
    /// Access key sent with every remote request
    pub api_key: String,
    /// Owning band scope applied to every collection
    pub band_id: Option<String>,
    /// Path of the local cache database; platform data dir when unset
    pub database_path: Option<PathBuf>,
    /// Interval between background sync passes
    pub sync_interval: Duration,
    /// Bound on a single remote call
    pub operation_timeout: Duration,
    /// Interval for connectivity probes and change-feed polling
    pub poll_interval: Duration,
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Resolve configuration from `BANDBRAIN_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut builder = Self::builder();
        if let Ok(url) = std::env::var("BANDBRAIN_REMOTE_URL") {
            builder = builder.remote_url(url);
        }
        if let Ok(key) = std::env::var("BANDBRAIN_API_KEY") {
            builder = builder.api_key(key);
        }
        if let Ok(band) = std::env::var("BANDBRAIN_BAND_ID") {
            builder = builder.band_id(band);
        }
        if let Ok(path) = std::env::var("BANDBRAIN_DB_PATH") {
            builder = builder.database_path(path);
        }
        if let Ok(secs) = std::env::var("BANDBRAIN_SYNC_INTERVAL_SECS") {
            let secs = secs.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                key: "BANDBRAIN_SYNC_INTERVAL_SECS",
                reason: "expected an integer number of seconds".into(),
            })?;
            builder = builder.sync_interval(Duration::from_secs(secs));
        }
        builder.build()
    }

    /// Resolve configuration from a TOML file.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let raw = std::fs::read_to_string(&path)?;
        let file: ConfigFile = toml::from_str(&raw)?;

        let mut builder = Self::builder();
        if let Some(url) = file.remote_url {
            builder = builder.remote_url(url);
        }
        if let Some(key) = file.api_key {
            builder = builder.api_key(key);
        }
        if let Some(band) = file.band_id {
            builder = builder.band_id(band);
        }
        if let Some(db) = file.database_path {
            builder = builder.database_path(db);
        }
        if let Some(secs) = file.sync_interval_secs {
            builder = builder.sync_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = file.operation_timeout_secs {
            builder = builder.operation_timeout(Duration::from_secs(secs));
        }
        builder.build()
    }
}

/// On-disk layout of `bandbrain.toml`.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    remote_url: Option<String>,
    api_key: Option<String>,
    band_id: Option<String>,
    database_path: Option<PathBuf>,
    sync_interval_secs: Option<u64>,
    operation_timeout_secs: Option<u64>,
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    remote_url: Option<String>,
    api_key: Option<String>,
    band_id: Option<String>,
    database_path: Option<PathBuf>,
    sync_interval: Option<Duration>,
    operation_timeout: Option<Duration>,
    poll_interval: Option<Duration>,
}

impl AppConfigBuilder {
    /// Set the remote endpoint URL
    pub fn remote_url(mut self, url: impl Into<String>) -> Self {
        self.remote_url = Some(url.into());
        self
    }

    /// Set the access key
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Scope all collections to one band
    pub fn band_id(mut self, band: impl Into<String>) -> Self {
        self.band_id = Some(band.into());
        self
    }

    /// Override the local cache database path
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Override the background sync interval
    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = Some(interval);
        self
    }

    /// Override the per-call remote timeout
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// Override the probe and change-feed polling interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        let remote_url = self
            .remote_url
            .ok_or(ConfigError::MissingValue("remote_url"))?;
        if !remote_url.starts_with("http://") && !remote_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                key: "remote_url",
                reason: format!("'{remote_url}' is not an http(s) URL"),
            });
        }
        let api_key = self.api_key.ok_or(ConfigError::MissingValue("api_key"))?;
        if api_key.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "api_key",
                reason: "must not be empty".into(),
            });
        }

        Ok(AppConfig {
            remote_url: remote_url.trim_end_matches('/').to_string(),
            api_key,
            band_id: self.band_id,
            database_path: self.database_path,
            sync_interval: self.sync_interval.unwrap_or(DEFAULT_SYNC_INTERVAL),
            operation_timeout: self.operation_timeout.unwrap_or(DEFAULT_OPERATION_TIMEOUT),
            poll_interval: self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL),
        })
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_remote_url() {
        let err = AppConfig::builder().api_key("key").build().unwrap_err();
        assert!(matches!(err, ConfigError::MissingValue("remote_url")));
    }

    #[test]
    fn build_requires_api_key() {
        let err = AppConfig::builder()
            .remote_url("https://example.supabase.co")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingValue("api_key")));
    }

    #[test]
    fn build_rejects_non_http_url() {
        let err = AppConfig::builder()
            .remote_url("ftp://example.com")
            .api_key("key")
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { key: "remote_url", .. }
        ));
    }

    #[test]
    fn build_applies_defaults_and_trims_trailing_slash() {
        let config = AppConfig::builder()
            .remote_url("https://example.supabase.co/")
            .api_key("key")
            .build()
            .unwrap();
        assert_eq!(config.remote_url, "https://example.supabase.co");
        assert_eq!(config.sync_interval, Duration::from_secs(30));
        assert_eq!(config.operation_timeout, Duration::from_secs(10));
        assert!(config.band_id.is_none());
    }

    #[test]
    fn from_file_parses_toml() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "remote_url = \"https://example.supabase.co\"\n\
             api_key = \"secret\"\n\
             band_id = \"band-1\"\n\
             sync_interval_secs = 60"
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.api_key, "secret");
        assert_eq!(config.band_id.as_deref(), Some("band-1"));
        assert_eq!(config.sync_interval, Duration::from_secs(60));
    }

    #[test]
    #[serial_test::serial]
    fn from_env_reads_required_values() {
        std::env::set_var("BANDBRAIN_REMOTE_URL", "https://example.supabase.co");
        std::env::set_var("BANDBRAIN_API_KEY", "env-key");
        std::env::remove_var("BANDBRAIN_SYNC_INTERVAL_SECS");

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.api_key, "env-key");

        std::env::remove_var("BANDBRAIN_REMOTE_URL");
        std::env::remove_var("BANDBRAIN_API_KEY");
    }

    #[test]
    #[serial_test::serial]
    fn from_env_fails_without_url() {
        std::env::remove_var("BANDBRAIN_REMOTE_URL");
        std::env::remove_var("BANDBRAIN_API_KEY");
        assert!(AppConfig::from_env().is_err());
    }
}
