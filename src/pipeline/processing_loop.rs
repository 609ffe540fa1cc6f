//! Message processing loop: source → pool → stats (→ optional output).

use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::pool::PoolHandle;
use super::source::{MessageSource, SourceEvent};
use super::PipelineStats;
use crate::config::defaults::PROGRESS_LOG_EVERY;
use crate::types::{MatchResult, MessageCategory};

/// One classified message as reported downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedMessage {
    pub ue_id: String,
    pub msg_type: String,
    pub timestamp: i64,
    pub category: MessageCategory,
    pub result: MatchResult,
}

/// Drives a [`MessageSource`] through a classifier pool.
///
/// Results are awaited out of band so different UEs classify concurrently;
/// at most `max_in_flight` results are outstanding at once.
pub struct ProcessingLoop {
    pool: PoolHandle,
    cancel_token: CancellationToken,
    output: Option<mpsc::Sender<ClassifiedMessage>>,
    max_in_flight: usize,
    progress_every: u64,
}

impl ProcessingLoop {
    pub fn new(pool: PoolHandle, cancel_token: CancellationToken) -> Self {
        let max_in_flight = pool.workers() * 64;
        Self {
            pool,
            cancel_token,
            output: None,
            max_in_flight,
            progress_every: PROGRESS_LOG_EVERY,
        }
    }

    /// Forward every classified message to `tx`.
    #[must_use]
    pub fn with_output(mut self, tx: mpsc::Sender<ClassifiedMessage>) -> Self {
        self.output = Some(tx);
        self
    }

    #[must_use]
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Run until the source is exhausted or cancellation. Every message
    /// already queued is still awaited and counted.
    pub async fn run<S: MessageSource + ?Sized>(mut self, source: &mut S) -> PipelineStats {
        let mut stats = PipelineStats::default();
        let mut pending = FuturesUnordered::new();

        info!(source = source.source_name(), workers = self.pool.workers(), "Processing signaling messages");

        loop {
            let event = tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!("Shutdown signal received");
                    break;
                }
                result = source.next_message() => match result {
                    Ok(ev) => ev,
                    Err(e) => {
                        warn!(source = source.source_name(), error = %e, "Source error");
                        break;
                    }
                }
            };

            let msg = match event {
                SourceEvent::Message(m) => m,
                SourceEvent::Eof => {
                    info!(messages = stats.messages, "Source reached end");
                    break;
                }
            };

            let category = self.pool.engine().registry().categorize(&msg.msg_type);
            let (ue_id, msg_type, timestamp) = (msg.ue_id.clone(), msg.msg_type.clone(), msg.timestamp);
            let rx = match self.pool.enqueue(msg).await {
                Ok(rx) => rx,
                Err(e) => {
                    warn!(error = %e, "Classifier pool unavailable");
                    break;
                }
            };
            pending.push(async move {
                let result = rx
                    .await
                    .unwrap_or_else(|_| MatchResult::error("classifier worker dropped the request"));
                ClassifiedMessage {
                    ue_id,
                    msg_type,
                    timestamp,
                    category,
                    result,
                }
            });

            while let Some(Some(done)) = pending.next().now_or_never() {
                self.finish(&mut stats, done).await;
            }
            while pending.len() >= self.max_in_flight {
                match pending.next().await {
                    Some(done) => self.finish(&mut stats, done).await,
                    None => break,
                }
            }
        }

        while let Some(done) = pending.next().await {
            self.finish(&mut stats, done).await;
        }
        info!(%stats, "Processing complete");
        stats
    }

    async fn finish(&mut self, stats: &mut PipelineStats, done: ClassifiedMessage) {
        stats.record(done.category, &done.result);
        if self.progress_every > 0 && stats.messages % self.progress_every == 0 {
            info!(%stats, "Progress");
        }
        if let Some(tx) = &self.output {
            if tx.send(done).await.is_err() {
                warn!("Output channel closed, results are no longer forwarded");
                self.output = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::engine::ClassificationEngine;
    use crate::flow::FlowRegistry;
    use crate::pipeline::{ClassifierPool, VecSource};
    use crate::storage::{InMemoryProcedureStore, MemoryArchive};
    use crate::types::SignalingMessage;

    fn pool() -> ClassifierPool {
        let store = Arc::new(InMemoryProcedureStore::new(Arc::new(MemoryArchive::new())));
        let engine = ClassificationEngine::new(FlowRegistry::default(), store);
        ClassifierPool::spawn(Arc::new(engine), 2, 4)
    }

    #[tokio::test]
    async fn test_counts_every_message() {
        let pool = pool();
        let mut source = VecSource::new(vec![
            SignalingMessage::new("U1", "PAGING", 1),
            SignalingMessage::new("U1", "PAGING", 2),
            SignalingMessage::new("", "PAGING", 3),
        ]);
        let (tx, mut rx) = mpsc::channel(16);
        let stats = ProcessingLoop::new(pool.handle(), CancellationToken::new())
            .with_output(tx)
            .with_max_in_flight(1)
            .run(&mut source)
            .await;
        assert_eq!(stats.messages, 3);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.unknown_created, 1);
        assert_eq!(stats.matched_existing, 1);
        assert_eq!(stats.non_procedure, 3);

        let mut forwarded = 0;
        while rx.try_recv().is_ok() {
            forwarded += 1;
        }
        assert_eq!(forwarded, 3);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let pool = pool();
        let token = CancellationToken::new();
        token.cancel();
        let mut source = VecSource::new(vec![SignalingMessage::new("U1", "PAGING", 1)]);
        let stats = ProcessingLoop::new(pool.handle(), token).run(&mut source).await;
        // select! picks randomly among ready branches; either way nothing is lost.
        assert!(stats.messages <= 1);
        pool.shutdown().await;
    }
}
