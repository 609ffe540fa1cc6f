//! Procedure reaper: periodic sweep of active procedures.
//!
//! Each tick lists UEs that own active procedures and routes one sweep per
//! UE through the classifier pool, so sweeps never race that UE's messages.
//! A sweep closes procedures whose close verdict is ready (end-grace timeout
//! included) and expires procedures idle beyond the active TTL.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::pipeline::PoolHandle;

/// Totals over the reaper's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaperStats {
    pub ticks: u64,
    pub closed: u64,
    pub failed_sweeps: u64,
}

pub struct ProcedureReaper {
    pool: PoolHandle,
    interval: Duration,
    cancel_token: CancellationToken,
}

impl ProcedureReaper {
    pub fn new(pool: PoolHandle, interval: Duration, cancel_token: CancellationToken) -> Self {
        Self {
            pool,
            interval: interval.max(Duration::from_millis(1)),
            cancel_token,
        }
    }

    /// Run until cancelled (call from `tokio::spawn`).
    pub async fn run(self) -> ReaperStats {
        let mut stats = ReaperStats::default();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(interval_ms = self.interval.as_millis(), "Procedure reaper started");
        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => break,
                _ = ticker.tick() => self.run_cycle(&mut stats).await,
            }
        }
        info!(ticks = stats.ticks, closed = stats.closed, "Procedure reaper stopped");
        stats
    }

    /// One sweep over every UE with active procedures.
    pub async fn run_cycle(&self, stats: &mut ReaperStats) {
        stats.ticks += 1;
        let engine = self.pool.engine();
        let now_ms = engine.sweep_now_ms();
        let ues = match engine.store().active_ue_ids() {
            Ok(ues) => ues,
            Err(e) => {
                warn!(error = %e, "Reaper could not list active UEs");
                stats.failed_sweeps += 1;
                return;
            }
        };

        let mut closed = 0u64;
        for ue_id in &ues {
            match self.pool.sweep(ue_id, now_ms).await {
                Ok(records) => closed += records.len() as u64,
                Err(e) => {
                    warn!(ue_id = %ue_id, error = %e, "Sweep failed");
                    stats.failed_sweeps += 1;
                }
            }
        }
        stats.closed += closed;
        if closed > 0 {
            info!(ues = ues.len(), closed, now_ms, "Reaper closed procedures");
        } else {
            debug!(ues = ues.len(), now_ms, "Reaper tick");
        }
    }
}
