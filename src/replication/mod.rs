//! Watermark-based Anti-Entropy Sync
//!
//! Keeps two telemetry replicas converged without change logs or vector
//! clocks. Each gateway's records form an independent append-only stream,
//! so a replica's progress on a gateway is fully described by the newest
//! receive timestamp it holds (its watermark).
//!
//! ## Pass
//!
//! 1. **Watermarks**: read `{gateway: latest}` from both replicas
//! 2. **Plan**: compare per gateway; the side that is behind gets
//!    everything after its own watermark
//! 3. **Exchange**: push leg (local -> remote) and pull leg
//!    (remote -> local), each a single atomic `bulk_insert`
//!
//! Watermarks are read once per pass and never persisted. A failed leg is
//! retried by the next pass, which sees the same unchanged watermarks.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lora_tracker::replication::{Replica, SyncAgent, SyncConfig, SyncOrchestrator};
//!
//! let orchestrator = SyncOrchestrator::new(
//!     Replica::new("local", local_store),
//!     Replica::new("peer", Arc::new(HttpReplica::new(replica_config)?)),
//! );
//! let agent = Arc::new(SyncAgent::new(SyncConfig::new("local"), orchestrator)?);
//! agent.start(shutdown.clone());
//! ```

mod agent;
mod config;
mod exchange;
mod orchestrator;
mod planner;
mod types;
mod watermark;

pub use agent::SyncAgent;
pub use config::{ConfigError, SyncConfig};
pub use exchange::ExchangeExecutor;
pub use orchestrator::SyncOrchestrator;
pub use planner::ReconciliationPlanner;
pub use types::{
    LegDirection, LegError, LegOutcome, ReconciliationPlan, Replica, SyncError, SyncReport,
};
pub use watermark::WatermarkResolver;
