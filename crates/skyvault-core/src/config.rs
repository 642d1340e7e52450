//! Configuration module for skyvault.
//!
//! Provides typed configuration structs that map to the YAML configuration
//! file, with loading, defaults, and validation. Configuration problems
//! are fatal at startup; the engine never sees an invalid config.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::conflict::ConflictPolicy;

/// Worker pool size used when `max_concurrent` is unset or non-positive.
pub const DEFAULT_MAX_WORKERS: usize = 3;

/// Top-level configuration for skyvault.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncSection,
    pub remote: RemoteSection,
    pub crypto: CryptoSection,
    pub system: SystemSection,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    /// Root of the local tree to synchronize.
    pub local_dir: PathBuf,
    /// Root directory on the remote drive, e.g. `/apps/skyvault`.
    pub remote_dir: String,
    /// Time between cycle triggers, e.g. `30s`, `10m`, `1h`.
    pub interval: String,
    /// Worker pool size; values `<= 0` fall back to the default of 3.
    pub max_concurrent: i64,
    /// One of `rename_local`, `rename_remote`, `keep_latest`,
    /// `delete_remote`, `delete_local`.
    pub conflict_strategy: String,
}

/// Remote drive API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSection {
    /// Base URL of the drive API, e.g. `https://drive.example.com`.
    pub base_url: String,
    /// Bearer token sent with every request.
    pub access_token: String,
    /// User-Agent header value.
    pub user_agent: String,
}

/// Content and filename encryption settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoSection {
    /// Enables streaming content encryption.
    pub enable: bool,
    /// Passphrase the 32-byte key is derived from. Required when
    /// `enable` is true.
    pub password: String,
    /// Enables the filename transform in the remote adapter.
    pub encrypt_filenames: bool,
}

/// Process-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemSection {
    /// Path of the snapshot database file.
    pub db_path: PathBuf,
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub log_level: String,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            local_dir: PathBuf::from("./vault"),
            remote_dir: "/apps/skyvault".to_string(),
            interval: "10m".to_string(),
            max_concurrent: DEFAULT_MAX_WORKERS as i64,
            conflict_strategy: "rename_local".to_string(),
        }
    }
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            access_token: String::new(),
            user_agent: format!("skyvault/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for SystemSection {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("skyvault-state.db"),
            log_level: "info".to_string(),
        }
    }
}

/// A configuration problem that prevents startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("sync.interval '{0}' is not a valid duration (expected e.g. 30s, 10m, 1h)")]
    Interval(String),

    #[error("sync.conflict_strategy: {0}")]
    Strategy(String),

    #[error("sync.local_dir must not be empty")]
    LocalDir,

    #[error("remote.base_url must not be empty")]
    BaseUrl,

    #[error("crypto.password must be set when crypto.enable is true")]
    Password,
}

impl Config {
    /// Loads and validates the configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every field the daemon depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.local_dir.as_os_str().is_empty() {
            return Err(ConfigError::LocalDir);
        }
        if self.remote.base_url.is_empty() {
            return Err(ConfigError::BaseUrl);
        }
        if self.crypto.enable && self.crypto.password.is_empty() {
            return Err(ConfigError::Password);
        }
        self.interval()?;
        self.conflict_policy()?;
        Ok(())
    }

    /// The parsed cycle interval.
    pub fn interval(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.sync.interval)
            .ok_or_else(|| ConfigError::Interval(self.sync.interval.clone()))
    }

    /// The parsed conflict policy.
    pub fn conflict_policy(&self) -> Result<ConflictPolicy, ConfigError> {
        ConflictPolicy::from_str(&self.sync.conflict_strategy).map_err(ConfigError::Strategy)
    }

    /// Effective worker pool size.
    pub fn max_workers(&self) -> usize {
        if self.sync.max_concurrent <= 0 {
            DEFAULT_MAX_WORKERS
        } else {
            self.sync.max_concurrent as usize
        }
    }
}

/// Parses durations of the form `500ms`, `30s`, `10m`, `2h`, or a bare
/// number of seconds.
fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(secs) = s.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let (value, unit) = s.split_at(s.find(|c: char| !c.is_ascii_digit())?);
    let value: u64 = value.parse().ok()?;
    match unit {
        "ms" => Some(Duration::from_millis(value)),
        "s" => Some(Duration::from_secs(value)),
        "m" => Some(Duration::from_secs(value * 60)),
        "h" => Some(Duration::from_secs(value * 3600)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.remote.base_url = "https://drive.example.com".to_string();
        config
    }

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("10m"), Some(Duration::from_secs(600)));
        assert_eq!(parse_duration("2h"), Some(Duration::from_secs(7200)));
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("45"), Some(Duration::from_secs(45)));
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("10x"), None);
        assert_eq!(parse_duration("fast"), None);
    }

    #[test]
    fn default_config_validates_once_base_url_is_set() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn bad_interval_is_fatal() {
        let mut config = valid_config();
        config.sync.interval = "soon".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Interval(_))));
    }

    #[test]
    fn bad_strategy_is_fatal() {
        let mut config = valid_config();
        config.sync.conflict_strategy = "coin_flip".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Strategy(_))));
    }

    #[test]
    fn encryption_requires_password() {
        let mut config = valid_config();
        config.crypto.enable = true;
        assert!(matches!(config.validate(), Err(ConfigError::Password)));

        config.crypto.password = "hunter2".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn non_positive_worker_count_falls_back() {
        let mut config = valid_config();
        config.sync.max_concurrent = 0;
        assert_eq!(config.max_workers(), DEFAULT_MAX_WORKERS);
        config.sync.max_concurrent = -4;
        assert_eq!(config.max_workers(), DEFAULT_MAX_WORKERS);
        config.sync.max_concurrent = 8;
        assert_eq!(config.max_workers(), 8);
    }

    #[test]
    fn loads_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "sync:\n  local_dir: /data/vault\n  interval: 30s\n  conflict_strategy: keep_latest\nremote:\n  base_url: https://drive.example.com\n  access_token: tok\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.sync.local_dir, PathBuf::from("/data/vault"));
        assert_eq!(config.interval().unwrap(), Duration::from_secs(30));
        assert_eq!(
            config.conflict_policy().unwrap(),
            ConflictPolicy::KeepNewest
        );
        assert_eq!(config.remote.access_token, "tok");
    }
}
