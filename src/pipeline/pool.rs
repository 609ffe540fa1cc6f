//! UE-partitioned classifier workers.
//!
//! Each worker owns one bounded queue and runs every command it receives
//! to completion before taking the next. Commands are routed by a stable
//! hash of the UE id, so one UE's messages and sweeps are processed in
//! submission order while different UEs proceed in parallel.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::engine::{ClassificationEngine, ClassifyError};
use crate::types::{MatchResult, Procedure, SignalingMessage};

// ============================================================================
// Commands
// ============================================================================

#[derive(Debug)]
enum WorkerCommand {
    Classify {
        msg: SignalingMessage,
        response_tx: oneshot::Sender<MatchResult>,
    },
    Sweep {
        ue_id: String,
        now_ms: i64,
        response_tx: oneshot::Sender<Result<Vec<Procedure>, ClassifyError>>,
    },
}

/// FNV-1a; stable across builds and processes.
fn route_hash(ue_id: &str) -> u64 {
    ue_id.bytes().fold(0xcbf2_9ce4_8422_2325, |h, b| {
        (h ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    })
}

// ============================================================================
// Handle
// ============================================================================

/// Cloneable submission side of a [`ClassifierPool`].
#[derive(Clone)]
pub struct PoolHandle {
    senders: Arc<[mpsc::Sender<WorkerCommand>]>,
    engine: Arc<ClassificationEngine>,
}

impl PoolHandle {
    pub fn engine(&self) -> &Arc<ClassificationEngine> {
        &self.engine
    }

    pub fn workers(&self) -> usize {
        self.senders.len()
    }

    /// Worker index owning `ue_id`.
    pub fn worker_for(&self, ue_id: &str) -> usize {
        let n = self.senders.len().max(1) as u64;
        // `n` fits usize, so the remainder does too.
        usize::try_from(route_hash(ue_id) % n).unwrap_or(0)
    }

    fn sender_for(&self, ue_id: &str) -> Result<&mpsc::Sender<WorkerCommand>> {
        self.senders
            .get(self.worker_for(ue_id))
            .context("Classifier pool has no workers")
    }

    /// Queue a message and return the receiver for its result.
    ///
    /// Awaits queue space (backpressure). Messages enqueued in order for
    /// the same UE are classified in that order.
    pub async fn enqueue(&self, msg: SignalingMessage) -> Result<oneshot::Receiver<MatchResult>> {
        let (response_tx, response_rx) = oneshot::channel();
        self.sender_for(&msg.ue_id)?
            .send(WorkerCommand::Classify { msg, response_tx })
            .await
            .map_err(|_| anyhow::anyhow!("Classifier worker channel closed"))?;
        Ok(response_rx)
    }

    /// Classify one message and wait for the result.
    pub async fn submit(&self, msg: SignalingMessage) -> Result<MatchResult> {
        self.enqueue(msg)
            .await?
            .await
            .context("Classifier response channel closed")
    }

    /// Run a sweep for `ue_id` on its owning worker.
    pub async fn sweep(&self, ue_id: &str, now_ms: i64) -> Result<Vec<Procedure>> {
        let (response_tx, response_rx) = oneshot::channel();
        self.sender_for(ue_id)?
            .send(WorkerCommand::Sweep {
                ue_id: ue_id.to_string(),
                now_ms,
                response_tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("Classifier worker channel closed"))?;
        Ok(response_rx
            .await
            .context("Classifier response channel closed")??)
    }

    /// Sweep every UE with active procedures. Returns the closed records.
    pub async fn sweep_all(&self, now_ms: i64) -> Result<Vec<Procedure>> {
        let ues = self
            .engine
            .store()
            .active_ue_ids()
            .context("Failed to list active UEs")?;
        let mut closed = Vec::new();
        for ue_id in ues {
            closed.extend(self.sweep(&ue_id, now_ms).await?);
        }
        Ok(closed)
    }
}

// ============================================================================
// Pool
// ============================================================================

/// Owns the worker tasks; hands out [`PoolHandle`]s.
pub struct ClassifierPool {
    handle: PoolHandle,
    workers: Vec<JoinHandle<()>>,
}

impl ClassifierPool {
    /// Start `workers` tasks (at least one), each with a queue of
    /// `capacity` commands (at least one). Must be called inside a tokio
    /// runtime.
    pub fn spawn(engine: Arc<ClassificationEngine>, workers: usize, capacity: usize) -> Self {
        let workers = workers.max(1);
        let mut senders = Vec::with_capacity(workers);
        let mut joins = Vec::with_capacity(workers);
        for index in 0..workers {
            let (tx, rx) = mpsc::channel(capacity.max(1));
            senders.push(tx);
            joins.push(tokio::spawn(run_worker(index, engine.clone(), rx)));
        }
        info!(workers, capacity, store = engine.store().backend_name(), "Classifier pool started");
        Self {
            handle: PoolHandle {
                senders: senders.into(),
                engine,
            },
            workers: joins,
        }
    }

    pub fn handle(&self) -> PoolHandle {
        self.handle.clone()
    }

    /// Close the queues and wait for workers to drain them. Queues stay
    /// open while any cloned [`PoolHandle`] is alive.
    pub async fn shutdown(self) {
        let Self { handle, workers } = self;
        drop(handle);
        for (index, join) in workers.into_iter().enumerate() {
            if let Err(e) = join.await {
                error!(worker = index, error = %e, "Classifier worker failed");
            }
        }
        info!("Classifier pool stopped");
    }
}

async fn run_worker(
    index: usize,
    engine: Arc<ClassificationEngine>,
    mut rx: mpsc::Receiver<WorkerCommand>,
) {
    debug!(worker = index, "Classifier worker started");
    let mut handled = 0u64;
    while let Some(cmd) = rx.recv().await {
        handled += 1;
        match cmd {
            // Store writes block (sled, journal flush); keep them off the
            // runtime threads. Awaiting here keeps per-queue ordering.
            WorkerCommand::Classify { msg, response_tx } => {
                let engine = engine.clone();
                let result = match tokio::task::spawn_blocking(move || engine.classify(&msg)).await
                {
                    Ok(result) => result,
                    Err(e) => {
                        error!(worker = index, error = %e, "Classification task failed");
                        MatchResult::error(ClassifyError::Task(e.to_string()).to_string())
                    }
                };
                let _ = response_tx.send(result);
            }
            WorkerCommand::Sweep {
                ue_id,
                now_ms,
                response_tx,
            } => {
                let engine = engine.clone();
                let result = tokio::task::spawn_blocking(move || engine.sweep_ue(&ue_id, now_ms))
                    .await
                    .unwrap_or_else(|e| {
                        error!(worker = index, error = %e, "Sweep task failed");
                        Err(ClassifyError::Task(e.to_string()))
                    });
                let _ = response_tx.send(result);
            }
        }
    }
    debug!(worker = index, handled, "Classifier worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::FlowRegistry;
    use crate::storage::{InMemoryProcedureStore, MemoryArchive};

    fn engine() -> Arc<ClassificationEngine> {
        let store = Arc::new(InMemoryProcedureStore::new(Arc::new(MemoryArchive::new())));
        Arc::new(ClassificationEngine::new(FlowRegistry::default(), store))
    }

    #[test]
    fn test_route_hash_is_stable() {
        assert_eq!(route_hash(""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(route_hash("U1"), route_hash("U1"));
    }

    #[tokio::test]
    async fn test_same_ue_same_worker() {
        let pool = ClassifierPool::spawn(engine(), 4, 8);
        let h = pool.handle();
        assert_eq!(h.workers(), 4);
        assert_eq!(h.worker_for("imsi-1"), h.worker_for("imsi-1"));
        assert!(h.worker_for("imsi-2") < 4);
        drop(h);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_zero_workers_clamped() {
        let pool = ClassifierPool::spawn(engine(), 0, 0);
        let h = pool.handle();
        let r = h.submit(SignalingMessage::new("U1", "PAGING", 1)).await.unwrap();
        assert!(r.is_matched());
        drop(h);
        pool.shutdown().await;
    }
}
