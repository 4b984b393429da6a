use crate::domain::value_objects::GatewayId;
use crate::replication::SyncConfig;
use std::time::Duration;

/// Which store adapter backs the local replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    // HTTP API settings
    pub listen_addr: String,
    pub max_body_bytes: usize,
    pub uplink_max_bytes: usize,

    // Storage settings
    pub store: StoreKind,
    pub db_path: String,
    pub gateway_id: Option<GatewayId>,
    pub debug: bool,

    // Sync settings
    pub sync_enabled: bool,
    pub sync_remote_url: Option<String>,
    pub sync_interval_secs: u64,
    pub sync_timeout_secs: u64,
    pub sync_concurrent_legs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8088".to_string(),
            max_body_bytes: 1024 * 1024,
            uplink_max_bytes: 4096,
            store: StoreKind::Sqlite,
            db_path: "loratracker.db".to_string(),
            gateway_id: None,
            debug: false,
            sync_enabled: false,
            sync_remote_url: None,
            sync_interval_secs: 300,
            sync_timeout_secs: 30,
            sync_concurrent_legs: false,
        }
    }
}

impl Config {
    /// Sync engine settings derived from this configuration.
    pub fn sync_config(&self) -> SyncConfig {
        let name = self
            .gateway_id
            .map(|gw| gw.to_string())
            .unwrap_or_else(|| "local".to_string());

        let mut sync = SyncConfig::new(name)
            .enabled(self.sync_enabled)
            .interval(Duration::from_secs(self.sync_interval_secs))
            .timeout(Duration::from_secs(self.sync_timeout_secs))
            .concurrent_legs(self.sync_concurrent_legs);
        if let Some(url) = &self.sync_remote_url {
            sync = sync.remote_url(url.clone());
        }
        sync
    }
}

pub fn load_config() -> anyhow::Result<Config> {
    load_from(|key| std::env::var(key).ok())
}

fn flag(value: Option<String>) -> bool {
    value
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false)
}

fn load_from<F>(var: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = Config::default();

    let listen_addr = var("LORATRACKER_LISTEN_ADDR").unwrap_or(defaults.listen_addr);

    let max_body_bytes = var("LORATRACKER_MAX_BODY_BYTES")
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults.max_body_bytes);

    let uplink_max_bytes = var("LORATRACKER_UPLINK_MAX_BYTES")
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults.uplink_max_bytes);

    let store = match var("LORATRACKER_STORE").as_deref().map(str::to_lowercase) {
        None => defaults.store,
        Some(kind) if kind == "sqlite" => StoreKind::Sqlite,
        Some(kind) if kind == "memory" => StoreKind::Memory,
        Some(other) => anyhow::bail!("LORATRACKER_STORE must be sqlite or memory, got {:?}", other),
    };

    let db_path = var("LORATRACKER_DB_PATH").unwrap_or(defaults.db_path);

    let gateway_id = var("LORATRACKER_GATEWAY_ID")
        .map(|v| GatewayId::parse(v.trim()))
        .transpose()?;

    let debug = var("DEBUG").is_some();

    // Sync settings
    let sync_enabled = flag(var("LORATRACKER_SYNC_ENABLED"));

    let sync_remote_url = var("LORATRACKER_SYNC_REMOTE_URL").filter(|v| !v.is_empty());

    let sync_interval_secs = var("LORATRACKER_SYNC_INTERVAL_SECS")
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults.sync_interval_secs);

    let sync_timeout_secs = var("LORATRACKER_SYNC_TIMEOUT_SECS")
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults.sync_timeout_secs);

    let sync_concurrent_legs = flag(var("LORATRACKER_SYNC_CONCURRENT_LEGS"));

    Ok(Config {
        listen_addr,
        max_body_bytes,
        uplink_max_bytes,
        store,
        db_path,
        gateway_id,
        debug,
        sync_enabled,
        sync_remote_url,
        sync_interval_secs,
        sync_timeout_secs,
        sync_concurrent_legs,
    })
}
