//! Sync Agent
//!
//! Runs a sync pass on a fixed interval until shutdown. A failed pass is
//! logged and the schedule carries on; nothing is retried in-process.

use crate::infrastructure::ShutdownController;
use crate::replication::config::SyncConfig;
use crate::replication::orchestrator::SyncOrchestrator;
use crate::replication::types::{SyncError, SyncReport};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Scheduled driver for a [`SyncOrchestrator`].
pub struct SyncAgent {
    config: SyncConfig,
    orchestrator: SyncOrchestrator,
    passes: AtomicU64,
    failed_passes: AtomicU64,
    last_report: RwLock<Option<SyncReport>>,
}

impl SyncAgent {
    pub fn new(config: SyncConfig, orchestrator: SyncOrchestrator) -> anyhow::Result<Self> {
        config.validate()?;

        Ok(Self {
            orchestrator: orchestrator.with_concurrent_legs(config.concurrent_legs),
            config,
            passes: AtomicU64::new(0),
            failed_passes: AtomicU64::new(0),
            last_report: RwLock::new(None),
        })
    }

    /// Number of passes attempted so far.
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::SeqCst)
    }

    /// Passes aborted by a watermark fetch failure.
    pub fn failed_passes(&self) -> u64 {
        self.failed_passes.load(Ordering::SeqCst)
    }

    pub fn last_report(&self) -> Option<SyncReport> {
        self.last_report.read().clone()
    }

    /// Run a single pass and record its outcome.
    pub async fn run_once(&self) -> Result<SyncReport, SyncError> {
        let pass = self.passes.fetch_add(1, Ordering::SeqCst) + 1;
        let result = self.orchestrator.run_pass().await;

        match &result {
            Ok(report) => {
                if report.is_complete() {
                    tracing::info!(
                        "sync pass {} done in {:?}: push [{}] pull [{}]",
                        pass,
                        report.elapsed,
                        report.push,
                        report.pull
                    );
                } else {
                    tracing::warn!(
                        "sync pass {} partial in {:?}: push [{}] pull [{}]",
                        pass,
                        report.elapsed,
                        report.push,
                        report.pull
                    );
                }
                *self.last_report.write() = Some(report.clone());
            }
            Err(e) => {
                self.failed_passes.fetch_add(1, Ordering::SeqCst);
                tracing::error!("sync pass {} aborted: {}", pass, e);
            }
        }

        result
    }

    /// Spawn the schedule. The first pass runs immediately.
    pub fn start(self: Arc<Self>, shutdown: ShutdownController) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            let mut timer = interval(self.config.interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!(
                "sync agent started replica={} remote={} interval={:?}",
                self.config.replica_name,
                self.orchestrator.remote().name,
                self.config.interval
            );

            loop {
                if shutdown.is_shutdown() {
                    break;
                }

                tokio::select! {
                    _ = timer.tick() => {
                        let _guard = shutdown.work_guard();
                        let _ = self.run_once().await;
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }

            tracing::info!("sync agent stopped after {} passes", self.passes());
        })
    }
}
