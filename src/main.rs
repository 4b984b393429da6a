//! lora-tracker - Telemetry collection point with anti-entropy sync
//!
//! This is the composition root that wires together all the components.

use lora_tracker::adapters::inbound::{ApiServer, ApiState};
use lora_tracker::adapters::outbound::{
    HttpReplica, HttpReplicaConfig, MemoryTelemetryStore, SqliteTelemetryStore,
};
use lora_tracker::config::{load_config, StoreKind};
use lora_tracker::domain::ports::TelemetryStore;
use lora_tracker::infrastructure::{shutdown_signal, ShutdownController};
use lora_tracker::replication::{Replica, SyncAgent, SyncOrchestrator};
use std::sync::Arc;
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let cfg = load_config()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    tracing::info!(
        "starting lora-tracker listen={} store={:?} gateway={}",
        cfg.listen_addr,
        cfg.store,
        cfg.gateway_id
            .map(|gw| gw.to_string())
            .unwrap_or_else(|| "-".to_string())
    );

    // ===== COMPOSITION ROOT =====

    // 1. Local telemetry store
    let store: Arc<dyn TelemetryStore> = match cfg.store {
        StoreKind::Sqlite => {
            let store = SqliteTelemetryStore::open(&cfg.db_path)?;
            tracing::info!("telemetry store opened at {}", cfg.db_path);
            Arc::new(store)
        }
        StoreKind::Memory => {
            tracing::warn!("using in-memory telemetry store; data is lost on exit");
            Arc::new(MemoryTelemetryStore::new())
        }
    };

    let shutdown = ShutdownController::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    // 2. Scheduled sync against the remote replica
    let sync_cfg = cfg.sync_config();
    sync_cfg.validate()?;
    let sync_timeout = sync_cfg.timeout;

    let agent_handle = match (&sync_cfg.remote_url, sync_cfg.enabled) {
        (Some(url), true) => {
            let remote = HttpReplica::new(HttpReplicaConfig {
                base_url: url.clone(),
                timeout_secs: sync_timeout.as_secs(),
            })?;
            let orchestrator = SyncOrchestrator::new(
                Replica::new(sync_cfg.replica_name.clone(), store.clone()),
                Replica::new(remote.base_url().to_string(), Arc::new(remote)),
            );
            let agent = Arc::new(SyncAgent::new(sync_cfg, orchestrator)?);
            Some(agent.start(shutdown.clone()))
        }
        _ => {
            tracing::info!("scheduled sync disabled");
            None
        }
    };

    // 3. HTTP API, runs until shutdown
    let server = ApiServer::new(cfg.listen_addr.clone(), ApiState::new(store, cfg.gateway_id))
        .with_body_limits(cfg.max_body_bytes, cfg.uplink_max_bytes);
    let result = server.run(shutdown.clone()).await;

    // Make sure the agent sees shutdown even if the server failed on its own.
    shutdown.shutdown();
    if let Some(handle) = agent_handle {
        if !shutdown.wait_for_drain(sync_timeout).await {
            tracing::warn!("sync pass still running at exit");
        }
        handle.abort();
    }

    result
}
