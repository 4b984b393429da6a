//! Sync Configuration
//!
//! Configuration for the scheduled anti-entropy sync.

use std::time::Duration;

/// Configuration for the sync agent.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Name of the local replica in logs and reports (default: "local")
    pub replica_name: String,

    /// Run scheduled passes at all (default: false)
    pub enabled: bool,

    /// Base URL of the remote replica's API
    pub remote_url: Option<String>,

    /// Time between passes (default: 300s)
    pub interval: Duration,

    /// Per-request timeout against the remote replica (default: 30s)
    pub timeout: Duration,

    /// Run push and pull legs concurrently (default: false)
    pub concurrent_legs: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            replica_name: "local".to_string(),
            enabled: false,
            remote_url: None,
            interval: Duration::from_secs(300),
            timeout: Duration::from_secs(30),
            concurrent_legs: false,
        }
    }
}

impl SyncConfig {
    /// Create a new configuration with replica name.
    pub fn new(replica_name: impl Into<String>) -> Self {
        Self {
            replica_name: replica_name.into(),
            ..Default::default()
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the remote replica URL.
    pub fn remote_url(mut self, url: impl Into<String>) -> Self {
        self.remote_url = Some(url.into());
        self
    }

    /// Set the interval between passes.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn concurrent_legs(mut self, concurrent: bool) -> Self {
        self.concurrent_legs = concurrent;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.replica_name.is_empty() {
            return Err(ConfigError::MissingReplicaName);
        }
        if self.interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        // Remote clients take whole seconds.
        if self.timeout.as_secs() == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.enabled && self.remote_url.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::MissingRemoteUrl);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("replica_name is required")]
    MissingReplicaName,
    #[error("sync interval must be greater than zero")]
    ZeroInterval,
    #[error("sync timeout must be at least one second")]
    ZeroTimeout,
    #[error("remote_url is required when sync is enabled")]
    MissingRemoteUrl,
}
