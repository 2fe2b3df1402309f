//! Periodic sweep of due outbox records.
//!
//! The queue job created at record time is only an optimisation; this
//! sweeper is the source of truth for scheduling. It scans for PENDING and
//! FAILED records whose `next_run_at` has elapsed and enqueues dispatch
//! jobs for them, deduplicated against jobs the dispatcher already created.
//! Join handles are tracked and cancellation is explicit.

use std::sync::Arc;
use std::time::Duration;

use minuteflow_core::outbox::ports::{EnqueueOptions, JobScheduler, OutboxStore};
use minuteflow_core::telemetry::TelemetrySink;
use minuteflow_domain::constants::OUTBOX_DISPATCH_QUEUE;
use minuteflow_domain::{MinuteflowError, Result};
use serde_json::json;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Configuration for the outbox sweeper.
#[derive(Debug, Clone)]
pub struct OutboxSweeperConfig {
    /// Interval between sweeps.
    pub poll_interval: Duration,
    /// Maximum records picked up per sweep.
    pub batch_size: usize,
    /// Join timeout when stopping.
    pub join_timeout: Duration,
}

impl Default for OutboxSweeperConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            batch_size: 50,
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Sweeper with explicit lifecycle management.
pub struct OutboxSweeper {
    store: Arc<dyn OutboxStore>,
    scheduler: Arc<dyn JobScheduler>,
    config: OutboxSweeperConfig,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl OutboxSweeper {
    pub fn new(
        store: Arc<dyn OutboxStore>,
        scheduler: Arc<dyn JobScheduler>,
        config: OutboxSweeperConfig,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            store,
            scheduler,
            config,
            cancellation: CancellationToken::new(),
            task_handle: None,
            telemetry,
        }
    }

    /// Start the sweeper, spawning the background task.
    #[instrument(skip(self))]
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(MinuteflowError::Internal("sweeper already running".to_string()));
        }

        info!("starting outbox sweeper");
        self.cancellation = CancellationToken::new();

        let store = Arc::clone(&self.store);
        let scheduler = Arc::clone(&self.scheduler);
        let telemetry = Arc::clone(&self.telemetry);
        let poll_interval = self.config.poll_interval;
        let batch_size = self.config.batch_size;
        let cancel = self.cancellation.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("outbox sweeper loop cancelled");
                        break;
                    }
                    _ = tokio::time::sleep(poll_interval) => {
                        match sweep_once(&store, &scheduler, batch_size).await {
                            Ok(0) => {}
                            Ok(count) => {
                                debug!(count, "sweep enqueued due records");
                                telemetry.record("outbox.swept", &[]);
                            }
                            Err(err) => {
                                error!(error = %err, "sweep failed");
                                telemetry.record("outbox.sweep_error", &[]);
                            }
                        }
                    }
                }
            }
        });

        self.task_handle = Some(handle);
        info!("outbox sweeper started");
        Ok(())
    }

    /// Stop the sweeper and wait for the task to finish.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> Result<()> {
        if !self.is_running() {
            return Err(MinuteflowError::Internal("sweeper not running".to_string()));
        }

        info!("stopping outbox sweeper");
        self.cancellation.cancel();

        if let Some(handle) = self.task_handle.take() {
            match tokio::time::timeout(self.config.join_timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(error = %err, "sweeper task panicked");
                    return Err(MinuteflowError::Internal("sweeper task panicked".to_string()));
                }
                Err(_) => {
                    warn!("sweeper task did not complete within timeout");
                    return Err(MinuteflowError::Internal("sweeper task timeout".to_string()));
                }
            }
        }

        info!("outbox sweeper stopped");
        self.cancellation = CancellationToken::new();
        Ok(())
    }

    /// Returns true when the sweeper task is active.
    pub fn is_running(&self) -> bool {
        self.task_handle.is_some()
    }
}

/// One sweep: enqueue dispatch jobs for due records. Returns how many
/// records were picked up.
pub(crate) async fn sweep_once(
    store: &Arc<dyn OutboxStore>,
    scheduler: &Arc<dyn JobScheduler>,
    batch_size: usize,
) -> Result<usize> {
    let due = store.fetch_due(batch_size).await?;
    if due.is_empty() {
        return Ok(0);
    }

    let count = due.len();
    for record in due {
        let result = scheduler
            .enqueue(
                OUTBOX_DISPATCH_QUEUE,
                json!({
                    "tenantId": record.tenant_id,
                    "outboxId": record.id,
                }),
                EnqueueOptions {
                    delay: None,
                    dedupe_id: Some(format!("{}:{}", record.id, record.attempts)),
                },
            )
            .await;

        if let Err(err) = result {
            warn!(outbox_id = %record.id, error = %err, "sweep enqueue failed");
        }
    }

    Ok(count)
}

impl Drop for OutboxSweeper {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("OutboxSweeper dropped while running; cancelling task");
            self.cancellation.cancel();
        }
    }
}
