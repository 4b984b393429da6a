//! Sync Orchestrator
//!
//! Drives one anti-entropy pass between a local and a remote replica:
//! fetch both watermark maps, plan, run the push leg, run the pull leg.
//!
//! A watermark fetch failure aborts the pass before anything is written.
//! A failed leg is reported in the [`SyncReport`] and the pass still
//! finishes; the next pass re-derives the same delta from the unchanged
//! watermarks.

use crate::domain::entities::WatermarkMap;
use crate::replication::exchange::ExchangeExecutor;
use crate::replication::planner::ReconciliationPlanner;
use crate::replication::types::{Replica, SyncError, SyncReport};
use crate::replication::watermark::WatermarkResolver;
use std::time::Instant;

pub struct SyncOrchestrator {
    local: Replica,
    remote: Replica,
    executor: ExchangeExecutor,
    concurrent_legs: bool,
}

impl SyncOrchestrator {
    pub fn new(local: Replica, remote: Replica) -> Self {
        Self {
            executor: ExchangeExecutor::new(local.clone(), remote.clone()),
            local,
            remote,
            concurrent_legs: false,
        }
    }

    /// Run both legs at the same time. They touch disjoint source/sink
    /// pairs, so the outcome is the same either way.
    pub fn with_concurrent_legs(mut self, concurrent: bool) -> Self {
        self.concurrent_legs = concurrent;
        self
    }

    pub fn local(&self) -> &Replica {
        &self.local
    }

    pub fn remote(&self) -> &Replica {
        &self.remote
    }

    #[tracing::instrument(skip(self), fields(local = %self.local.name, remote = %self.remote.name))]
    pub async fn run_pass(&self) -> Result<SyncReport, SyncError> {
        let started = Instant::now();

        let local = fetch_watermarks(&self.local).await?;
        let remote = fetch_watermarks(&self.remote).await?;

        let plan = ReconciliationPlanner::plan(&local, &remote);
        tracing::debug!(
            "plan: push {} gateways, pull {} gateways",
            plan.push.len(),
            plan.pull.len()
        );

        let (push, pull) = if self.concurrent_legs {
            tokio::join!(self.executor.push(&plan.push), self.executor.pull(&plan.pull))
        } else {
            let push = self.executor.push(&plan.push).await;
            let pull = self.executor.pull(&plan.pull).await;
            (push, pull)
        };

        Ok(SyncReport {
            local,
            remote,
            plan,
            push,
            pull,
            elapsed: started.elapsed(),
        })
    }
}

async fn fetch_watermarks(replica: &Replica) -> Result<WatermarkMap, SyncError> {
    WatermarkResolver::new(replica.store.clone())
        .latest()
        .await
        .map_err(|source| {
            tracing::warn!("watermark fetch from {} failed: {}", replica.name, source);
            SyncError::WatermarkFetch {
                replica: replica.name.clone(),
                source,
            }
        })
}
