//! Background expiry for groups that never complete.
//!
//! A spawned tokio task sweeps the correlation store at a fixed interval and
//! expires every group older than the configured timeout, either forcing a
//! partial release or discarding the members. On-demand tasks arrive over an
//! mpsc channel so callers can trigger a sweep or expire one group early.

use std::sync::Arc;
use std::time::Duration;

use switchyard_core::CorrelationId;
use tokio::sync::mpsc;

use super::ReleaseEngine;

// ---------------------------------------------------------------------------
// ExpiryConfig / ExpiryTask
// ---------------------------------------------------------------------------

/// Tuning for the expiry worker.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// A group older than this is expired on the next sweep.
    pub group_timeout: Duration,
    /// How often the periodic sweep runs.
    pub sweep_interval: Duration,
    /// Expired groups are force-released when set, discarded otherwise.
    pub release_partial_on_expiry: bool,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            group_timeout: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(10),
            release_partial_on_expiry: false,
        }
    }
}

/// On-demand work submitted to the expiry worker.
#[derive(Debug)]
pub enum ExpiryTask {
    /// Sweep the whole store now, ahead of the next tick.
    Sweep,
    /// Expire one group immediately, regardless of its age.
    Expire(CorrelationId),
}

// ---------------------------------------------------------------------------
// ExpiryWorker
// ---------------------------------------------------------------------------

/// Handle to the spawned expiry task.
pub struct ExpiryWorker {
    tx: Option<mpsc::Sender<ExpiryTask>>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl ExpiryWorker {
    /// Spawn the worker. The channel capacity is fixed at 256.
    pub fn start(engine: Arc<ReleaseEngine>, config: ExpiryConfig) -> Self {
        let (tx, mut rx) = mpsc::channel::<ExpiryTask>(256);
        let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut tick = tokio::time::interval(config.sweep_interval);
            // Skip the first immediate tick so no sweep fires at startup.
            tick.tick().await;

            loop {
                tokio::select! {
                    task = rx.recv() => {
                        match task {
                            Some(ExpiryTask::Sweep) => sweep(&engine, &config).await,
                            Some(ExpiryTask::Expire(id)) => expire(&engine, &config, &id).await,
                            None => break, // Channel closed.
                        }
                    }
                    _ = tick.tick() => {
                        sweep(&engine, &config).await;
                    }
                    _ = &mut shutdown_rx => {
                        break;
                    }
                }
            }
        });

        Self {
            tx: Some(tx),
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Submit an on-demand task.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker has been stopped.
    pub async fn submit(&self, task: ExpiryTask) -> anyhow::Result<()> {
        match &self.tx {
            Some(tx) => tx
                .send(task)
                .await
                .map_err(|_| anyhow::anyhow!("expiry worker channel closed")),
            None => Err(anyhow::anyhow!("expiry worker not running")),
        }
    }

    /// Stop the worker gracefully, waiting for the task to complete.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

/// Collect ids past the timeout, then expire them outside the visit. A group
/// whose lock is held is being handled right now, so it is skipped until the
/// next sweep.
async fn sweep(engine: &ReleaseEngine, config: &ExpiryConfig) {
    let mut due = Vec::new();
    engine.store().for_each(&mut |id, slot| {
        if let Ok(group) = slot.try_lock() {
            if !group.is_closed() && group.age() >= config.group_timeout {
                due.push(id.clone());
            }
        }
    });

    if !due.is_empty() {
        tracing::debug!(expired = due.len(), "expiry sweep");
    }
    for id in due {
        expire(engine, config, &id).await;
    }
}

async fn expire(engine: &ReleaseEngine, config: &ExpiryConfig, id: &CorrelationId) {
    if config.release_partial_on_expiry {
        match engine.force_release(id).await {
            Ok(released) => {
                tracing::info!(correlation_id = %id, released, "group expired");
            }
            Err(err) => {
                tracing::error!(correlation_id = %id, error = %err, "expiry release failed");
            }
        }
    } else {
        let discarded = engine.discard_group(id).await;
        tracing::info!(correlation_id = %id, discarded, "group expired");
    }
}

#[cfg(test)]
mod tests {
    use switchyard_core::{Message, MessageChannel, PollableChannel};

    use super::*;
    use crate::channel::QueueChannel;
    use crate::store::InMemoryGroupStore;

    fn stale_member(correlation: &str, number: u32, payload: &str) -> Message {
        Message::builder(payload.to_string())
            .correlation_id(correlation)
            .sequence_number(number)
            .sequence_size(10)
            .build()
    }

    fn engine_with_output() -> (Arc<ReleaseEngine>, Arc<QueueChannel>) {
        let out = Arc::new(QueueChannel::new("out", 16));
        let engine = Arc::new(ReleaseEngine::resequencer(
            Arc::new(InMemoryGroupStore::new()),
            None,
            Some(Arc::clone(&out) as Arc<dyn MessageChannel>),
            false,
        ));
        (engine, out)
    }

    #[tokio::test]
    async fn sweep_releases_timed_out_groups() {
        let (engine, out) = engine_with_output();
        engine.handle(stale_member("old", 2, "2")).await.unwrap();
        engine.handle(stale_member("old", 1, "1")).await.unwrap();

        let config = ExpiryConfig {
            group_timeout: Duration::ZERO,
            sweep_interval: Duration::from_secs(3600),
            release_partial_on_expiry: true,
        };
        let mut worker = ExpiryWorker::start(Arc::clone(&engine), config);
        worker.submit(ExpiryTask::Sweep).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let mut payloads = Vec::new();
        while let Some(msg) = out.receive(Duration::from_millis(20)).await {
            payloads.push(msg.payload_as::<String>().unwrap().clone());
        }
        assert_eq!(payloads, vec!["1", "2"]);
        assert_eq!(engine.store().group_count(), 0);

        worker.stop().await;
    }

    #[tokio::test]
    async fn sweep_skips_groups_under_the_timeout() {
        let (engine, out) = engine_with_output();
        engine.handle(stale_member("young", 1, "1")).await.unwrap();

        let config = ExpiryConfig {
            group_timeout: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(3600),
            release_partial_on_expiry: true,
        };
        let mut worker = ExpiryWorker::start(Arc::clone(&engine), config);
        worker.submit(ExpiryTask::Sweep).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(out.receive(Duration::from_millis(20)).await.is_none());
        assert_eq!(engine.store().group_count(), 1);

        worker.stop().await;
    }

    #[tokio::test]
    async fn expire_discards_when_partial_release_is_off() {
        let out = Arc::new(QueueChannel::new("out", 16));
        let discard = Arc::new(QueueChannel::new("discard", 16));
        let engine = Arc::new(
            ReleaseEngine::resequencer(
                Arc::new(InMemoryGroupStore::new()),
                None,
                Some(Arc::clone(&out) as Arc<dyn MessageChannel>),
                false,
            )
            .with_discard_channel(Arc::clone(&discard) as Arc<dyn MessageChannel>),
        );
        engine.handle(stale_member("drop", 2, "2")).await.unwrap();

        let config = ExpiryConfig {
            group_timeout: Duration::ZERO,
            sweep_interval: Duration::from_secs(3600),
            release_partial_on_expiry: false,
        };
        let mut worker = ExpiryWorker::start(Arc::clone(&engine), config);
        worker
            .submit(ExpiryTask::Expire("drop".into()))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(out.receive(Duration::from_millis(20)).await.is_none());
        assert!(discard.receive(Duration::from_millis(50)).await.is_some());
        assert_eq!(engine.store().group_count(), 0);

        worker.stop().await;
    }

    #[tokio::test]
    async fn periodic_tick_expires_without_submissions() {
        let (engine, out) = engine_with_output();
        engine.handle(stale_member("tick", 1, "1")).await.unwrap();

        let config = ExpiryConfig {
            group_timeout: Duration::ZERO,
            sweep_interval: Duration::from_millis(20),
            release_partial_on_expiry: true,
        };
        let mut worker = ExpiryWorker::start(Arc::clone(&engine), config);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(out.receive(Duration::from_millis(50)).await.is_some());
        assert_eq!(engine.store().group_count(), 0);

        worker.stop().await;
    }

    #[tokio::test]
    async fn submit_after_stop_returns_error() {
        let (engine, _out) = engine_with_output();
        let mut worker = ExpiryWorker::start(engine, ExpiryConfig::default());
        worker.stop().await;

        assert!(worker.submit(ExpiryTask::Sweep).await.is_err());
    }
}
