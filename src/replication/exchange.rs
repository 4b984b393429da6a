//! Exchange Executor
//!
//! Runs the two transfer legs of a plan. A leg fetches everything after the
//! planned since-timestamps from its source and writes it to its sink as a
//! single atomic batch. The legs share nothing, so one failing never touches
//! the other.

use crate::domain::entities::WatermarkMap;
use crate::replication::types::{LegDirection, LegError, LegOutcome, Replica};

pub struct ExchangeExecutor {
    local: Replica,
    remote: Replica,
}

impl ExchangeExecutor {
    pub fn new(local: Replica, remote: Replica) -> Self {
        Self { local, remote }
    }

    /// Copy records local has and remote lacks, local -> remote.
    pub async fn push(&self, set: &WatermarkMap) -> LegOutcome {
        self.run(LegDirection::Push, set).await
    }

    /// Copy records remote has and local lacks, remote -> local.
    pub async fn pull(&self, set: &WatermarkMap) -> LegOutcome {
        self.run(LegDirection::Pull, set).await
    }

    pub async fn run(&self, direction: LegDirection, set: &WatermarkMap) -> LegOutcome {
        let (source, sink) = match direction {
            LegDirection::Push => (&self.local, &self.remote),
            LegDirection::Pull => (&self.remote, &self.local),
        };
        let outcome = transfer(source, sink, set).await;

        match &outcome {
            LegOutcome::Skipped => {
                tracing::debug!("{} leg skipped: nothing to send", direction);
            }
            LegOutcome::Completed { gateways, records } => {
                tracing::info!(
                    "{} leg {} -> {}: {} records across {} gateways",
                    direction,
                    source.name,
                    sink.name,
                    records,
                    gateways
                );
            }
            LegOutcome::Failed { error, .. } => {
                tracing::warn!("{} leg {} -> {} failed: {}", direction, source.name, sink.name, error);
            }
        }

        outcome
    }
}

async fn transfer(source: &Replica, sink: &Replica, set: &WatermarkMap) -> LegOutcome {
    if set.is_empty() {
        return LegOutcome::Skipped;
    }
    let gateways = set.len();

    let batch = match source.store.records_after(set).await {
        Ok(batch) => batch,
        Err(source_err) => {
            return LegOutcome::Failed {
                gateways,
                error: LegError::Fetch {
                    replica: source.name.clone(),
                    source: source_err,
                },
            };
        }
    };

    // Watermarks moved between fetch and plan; nothing new after all.
    if batch.is_empty() {
        return LegOutcome::Completed {
            gateways,
            records: 0,
        };
    }

    let records = batch.len();
    match sink.store.bulk_insert(batch).await {
        Ok(()) => LegOutcome::Completed { gateways, records },
        Err(e) => LegOutcome::Failed {
            gateways,
            error: LegError::Insert {
                replica: sink.name.clone(),
                source: e,
            },
        },
    }
}
