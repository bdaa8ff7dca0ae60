//! Session configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::consumer::ConsumeStrategy;
use crate::error::{Error, Result};
use crate::participant::Role;

/// Settings for one producer/consumer session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of producer tasks
    pub producers: usize,

    /// Number of consumer tasks
    pub consumers: usize,

    /// Pause between enqueues, per producer
    #[serde(rename = "producer-interval-ms")]
    pub producer_interval_ms: u64,

    /// Pause between dequeue attempts, per polling consumer
    #[serde(rename = "consumer-interval-ms")]
    pub consumer_interval_ms: u64,

    /// Poll or block on the queue
    pub strategy: ConsumeStrategy,

    /// How long to wait for consumers to empty the queue after producers stop
    #[serde(rename = "drain-timeout-ms")]
    pub drain_timeout_ms: u64,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            producers: 4,
            consumers: 2,
            producer_interval_ms: 1000,
            consumer_interval_ms: 1000,
            strategy: ConsumeStrategy::Poll,
            drain_timeout_ms: 10_000,
            log_level: None,
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    ///
    /// Explicit path, then `.pcqueue.yml`, then
    /// `~/.config/pcqueue/pcqueue.yml`, then defaults. Only an explicit path
    /// that fails to load is an error.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(".pcqueue.yml");
        let user_config = dirs::config_dir().map(|dir| dir.join("pcqueue").join("pcqueue.yml"));

        for candidate in std::iter::once(local_config).chain(user_config) {
            if !candidate.exists() {
                continue;
            }
            match Self::load_from_file(&candidate) {
                Ok(config) => return Ok(config),
                Err(e) => warn!("Failed to load config from {}: {}", candidate.display(), e),
            }
        }

        debug!("Config::load: no config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "Config::load_from_file: called");
        let content = fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reject zero counts and zero intervals
    pub fn validate(&self) -> Result<()> {
        if self.producers == 0 {
            return Err(Error::InvalidCount { what: "producer" });
        }
        if self.consumers == 0 {
            return Err(Error::InvalidCount { what: "consumer" });
        }
        if self.producer_interval_ms == 0 {
            return Err(Error::InvalidInterval { role: Role::Producer });
        }
        if self.consumer_interval_ms == 0 {
            return Err(Error::InvalidInterval { role: Role::Consumer });
        }
        Ok(())
    }

    pub fn producer_interval(&self) -> Duration {
        Duration::from_millis(self.producer_interval_ms)
    }

    pub fn consumer_interval(&self) -> Duration {
        Duration::from_millis(self.consumer_interval_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}
