//! Replication Types
//!
//! Plans, per-leg outcomes and pass reports produced by the sync engine.

use crate::domain::entities::WatermarkMap;
use crate::domain::errors::StoreError;
use crate::domain::ports::TelemetryStore;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// One side of a sync pass: a named telemetry store.
#[derive(Clone)]
pub struct Replica {
    pub name: String,
    pub store: Arc<dyn TelemetryStore>,
}

impl Replica {
    pub fn new(name: impl Into<String>, store: Arc<dyn TelemetryStore>) -> Self {
        Self {
            name: name.into(),
            store,
        }
    }
}

impl fmt::Debug for Replica {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Replica").field("name", &self.name).finish()
    }
}

/// Output of the reconciliation planner.
///
/// Both sets map a gateway to the since-timestamp of the side that is
/// behind. `push` is what local has and remote lacks; `pull` the reverse.
/// A gateway never appears in both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    pub push: WatermarkMap,
    pub pull: WatermarkMap,
}

impl ReconciliationPlan {
    pub fn is_empty(&self) -> bool {
        self.push.is_empty() && self.pull.is_empty()
    }
}

/// Direction of a transfer leg, seen from the local replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegDirection {
    /// local -> remote
    Push,
    /// remote -> local
    Pull,
}

impl fmt::Display for LegDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegDirection::Push => write!(f, "push"),
            LegDirection::Pull => write!(f, "pull"),
        }
    }
}

/// Why a leg failed. Either way nothing was committed at the sink.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LegError {
    #[error("fetching from {replica} failed: {source}")]
    Fetch {
        replica: String,
        #[source]
        source: StoreError,
    },
    #[error("inserting into {replica} failed: {source}")]
    Insert {
        replica: String,
        #[source]
        source: StoreError,
    },
}

/// Result of one transfer leg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegOutcome {
    /// The leg's gateway set was empty
    Skipped,
    Completed { gateways: usize, records: usize },
    Failed { gateways: usize, error: LegError },
}

impl LegOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, LegOutcome::Failed { .. })
    }

    /// Records committed at the sink by this leg.
    pub fn records(&self) -> usize {
        match self {
            LegOutcome::Completed { records, .. } => *records,
            _ => 0,
        }
    }
}

impl fmt::Display for LegOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegOutcome::Skipped => write!(f, "skipped"),
            LegOutcome::Completed { gateways, records } => {
                write!(f, "ok gateways={} records={}", gateways, records)
            }
            LegOutcome::Failed { gateways, error } => {
                write!(f, "failed gateways={} error={}", gateways, error)
            }
        }
    }
}

/// Everything one sync pass did.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub local: WatermarkMap,
    pub remote: WatermarkMap,
    pub plan: ReconciliationPlan,
    pub push: LegOutcome,
    pub pull: LegOutcome,
    pub elapsed: Duration,
}

impl SyncReport {
    /// True when neither leg failed.
    pub fn is_complete(&self) -> bool {
        !self.push.is_failed() && !self.pull.is_failed()
    }

    pub fn records_transferred(&self) -> usize {
        self.push.records() + self.pull.records()
    }
}

/// Errors that abort a whole pass before any exchange.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("watermark fetch from {replica} failed: {source}")]
    WatermarkFetch {
        replica: String,
        #[source]
        source: StoreError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{GatewayId, Timestamp};

    fn report(push: LegOutcome, pull: LegOutcome) -> SyncReport {
        SyncReport {
            local: WatermarkMap::new(),
            remote: WatermarkMap::new(),
            plan: ReconciliationPlan::default(),
            push,
            pull,
            elapsed: Duration::from_millis(3),
        }
    }

    #[test]
    fn test_plan_is_empty() {
        let mut plan = ReconciliationPlan::default();
        assert!(plan.is_empty());

        plan.pull.insert(GatewayId::parse("aaaaaaaaaaaaaaaa").unwrap(), Timestamp::minimum());
        assert!(!plan.is_empty());
    }

    #[test]
    fn test_report_complete_with_skipped_legs() {
        let r = report(LegOutcome::Skipped, LegOutcome::Skipped);
        assert!(r.is_complete());
        assert_eq!(r.records_transferred(), 0);
    }

    #[test]
    fn test_report_counts_records() {
        let r = report(
            LegOutcome::Completed { gateways: 1, records: 4 },
            LegOutcome::Completed { gateways: 2, records: 3 },
        );
        assert_eq!(r.records_transferred(), 7);
    }

    #[test]
    fn test_report_with_failed_leg() {
        let failed = LegOutcome::Failed {
            gateways: 1,
            error: LegError::Insert {
                replica: "remote".to_string(),
                source: StoreError::PartialInsert {
                    attempted: 2,
                    reason: "disk full".to_string(),
                },
            },
        };
        let r = report(failed, LegOutcome::Completed { gateways: 1, records: 2 });
        assert!(!r.is_complete());
        assert_eq!(r.records_transferred(), 2);
    }

    #[test]
    fn test_leg_outcome_display() {
        assert_eq!(LegOutcome::Skipped.to_string(), "skipped");
        assert_eq!(
            LegOutcome::Completed { gateways: 2, records: 5 }.to_string(),
            "ok gateways=2 records=5"
        );
    }

    #[test]
    fn test_sync_error_display() {
        let err = SyncError::WatermarkFetch {
            replica: "peer".to_string(),
            source: StoreError::Unavailable("connection refused".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "watermark fetch from peer failed: store unavailable: connection refused"
        );
    }

    #[test]
    fn test_replica_debug_shows_name() {
        let store = Arc::new(crate::adapters::outbound::MemoryTelemetryStore::new());
        let replica = Replica::new("local", store);
        assert!(format!("{:?}", replica).contains("local"));
        assert_eq!(LegDirection::Push.to_string(), "push");
    }
}
