use crate::runner::{DEFAULT_CONCURRENCY, UPLOAD_CONCURRENCY};
use crate::transport::normalize_remote_folder;
use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What a full pass does when the remote listing itself fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ListingFailurePolicy {
    /// Treat the remote folder as empty: nothing is deleted and every local
    /// file is pushed again.
    #[default]
    AssumeEmpty,
    /// Fail the pass without touching the device.
    Abort,
}

/// Per-operation bridge budgets, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub probe: u64,
    pub list: u64,
    pub delete: u64,
    pub push: u64,
    pub touch: u64,
    pub rescan: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            probe: 10,
            list: 10,
            delete: 10,
            push: 120,
            touch: 5,
            rescan: 10,
        }
    }
}

impl TimeoutConfig {
    pub fn probe(&self) -> Duration {
        Duration::from_secs(self.probe)
    }

    pub fn list(&self) -> Duration {
        Duration::from_secs(self.list)
    }

    pub fn delete(&self) -> Duration {
        Duration::from_secs(self.delete)
    }

    pub fn push(&self) -> Duration {
        Duration::from_secs(self.push)
    }

    pub fn touch(&self) -> Duration {
        Duration::from_secs(self.touch)
    }

    pub fn rescan(&self) -> Duration {
        Duration::from_secs(self.rescan)
    }
}

/// A local music folder and the device folder it is mirrored to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FolderMapping {
    pub local: PathBuf,
    /// Bridge path, or an Explorer path that is converted on load.
    pub remote: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub bridge_binary: String,
    pub device_serial: Option<String>,
    pub max_workers: usize,
    pub upload_workers: usize,
    pub listing_failure: ListingFailurePolicy,
    pub timeouts: TimeoutConfig,
    pub mappings: Vec<FolderMapping>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bridge_binary: "adb".to_string(),
            device_serial: None,
            max_workers: DEFAULT_CONCURRENCY,
            upload_workers: UPLOAD_CONCURRENCY,
            listing_failure: ListingFailurePolicy::default(),
            timeouts: TimeoutConfig::default(),
            mappings: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Pool size for pushes; never larger than the general bound.
    pub fn effective_upload_workers(&self) -> usize {
        self.upload_workers.min(self.max_workers).max(1)
    }

    fn normalize_mappings(&mut self) {
        for mapping in &mut self.mappings {
            mapping.remote = normalize_remote_folder(&mapping.remote);
        }
    }
}

/// Loads `Config.toml` from the working directory (or `path` when given),
/// then `PHONE_SYNC_*` environment overrides.
pub fn load_configuration(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let file = match path {
        Some(path) => ConfigFile::from(path).required(true),
        None => ConfigFile::with_name("Config").required(false),
    };

    let builder = Config::builder()
        .add_source(file)
        .add_source(
            Environment::with_prefix("PHONE_SYNC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let mut config = builder.try_deserialize::<AppConfig>()?;
    config.normalize_mappings();
    Ok(config)
}
