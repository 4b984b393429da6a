//! Reconciliation Planner
//!
//! Set-difference merge over two sparse watermark vectors. Each gateway's
//! stream is an independent append-only partition, so gateways are compared
//! one at a time with no cross-gateway ordering.

use crate::domain::entities::WatermarkMap;
use crate::domain::value_objects::Timestamp;
use crate::replication::types::ReconciliationPlan;
use std::cmp::Ordering;

pub struct ReconciliationPlanner;

impl ReconciliationPlanner {
    /// Compare local and remote watermarks.
    ///
    /// - local behind remote: pull after local's watermark
    /// - local ahead of remote: push after remote's watermark
    /// - equal: nothing to do
    /// - remote-only gateway: pull its full history
    /// - local-only gateway: push its full history
    pub fn plan(local: &WatermarkMap, remote: &WatermarkMap) -> ReconciliationPlan {
        let mut plan = ReconciliationPlan::default();
        let mut unclassified = remote.clone();

        for (gw, &local_mark) in local {
            let Some(remote_mark) = unclassified.remove(gw) else {
                plan.push.insert(*gw, Timestamp::minimum());
                continue;
            };

            match local_mark.cmp(&remote_mark) {
                Ordering::Less => {
                    plan.pull.insert(*gw, local_mark);
                }
                Ordering::Greater => {
                    plan.push.insert(*gw, remote_mark);
                }
                Ordering::Equal => {}
            }
        }

        for gw in unclassified.into_keys() {
            plan.pull.insert(gw, Timestamp::minimum());
        }

        plan
    }
}
