//! Outbox dispatch service.
//!
//! Bridges domain transactions and queue-driven side effects: records the
//! intent, schedules a delivery job (best effort; the sweeper recovers lost
//! jobs), dispatches records through the typed handler registry, and owns
//! the PENDING/FAILED/COMPLETED/DEAD_LETTER transitions. The OutboxRecord is
//! the sole retry authority; the queue only delivers.
//!
//! Dedupe keys are `<record id>:<attempt stage>` so duplicate triggers for
//! the same stage collapse at the queue layer while legitimate retries still
//! get a fresh job.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use minuteflow_domain::constants::OUTBOX_DISPATCH_QUEUE;
use minuteflow_domain::{
    DeadLetterSummary, MinuteflowError, NewOutboxMessage, OutboxMessage, OutboxStatus, Result,
    RetryAck, RetryPolicy,
};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::dispatch::registry::{HandlerError, HandlerRegistry};
use crate::outbox::ports::{
    EnqueueOptions, FailureTransition, InsertOutcome, JobScheduler, OutboxStore,
};
use crate::telemetry::TelemetrySink;

/// Outbox record/schedule/dispatch service.
pub struct OutboxService {
    store: Arc<dyn OutboxStore>,
    scheduler: Arc<dyn JobScheduler>,
    registry: Arc<HandlerRegistry>,
    retry_policy: RetryPolicy,
    telemetry: Arc<dyn TelemetrySink>,
}

impl OutboxService {
    pub fn new(
        store: Arc<dyn OutboxStore>,
        scheduler: Arc<dyn JobScheduler>,
        registry: Arc<HandlerRegistry>,
        retry_policy: RetryPolicy,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self { store, scheduler, registry, retry_policy, telemetry }
    }

    /// Insert an outbox record and schedule its delivery job.
    ///
    /// A duplicate `(tenant_id, idempotency_key)` is success-of-intent and
    /// returns `Ok(None)`. The enqueue is best effort: a queue failure is
    /// logged and the record stays PENDING for the sweeper.
    #[instrument(skip(self, record), fields(tenant_id = %record.tenant_id, topic = %record.topic))]
    pub async fn record_and_schedule(
        &self,
        record: NewOutboxMessage,
    ) -> Result<Option<OutboxMessage>> {
        match self.store.insert(record).await? {
            InsertOutcome::Duplicate => {
                debug!("duplicate idempotency key, intent already recorded");
                self.telemetry.record("outbox.duplicate", &[]);
                Ok(None)
            }
            InsertOutcome::Inserted(message) => {
                self.telemetry.record("outbox.recorded", &[("topic", &message.topic.to_string())]);
                if let Err(err) = self.schedule(&message).await {
                    warn!(
                        outbox_id = %message.id,
                        error = %err,
                        "enqueue failed; sweeper will pick the record up"
                    );
                }
                Ok(Some(message))
            }
        }
    }

    /// Enqueue a dispatch job for an existing record.
    pub async fn schedule(&self, message: &OutboxMessage) -> Result<()> {
        self.enqueue_dispatch(&message.tenant_id, &message.id, message.attempts, None).await
    }

    async fn enqueue_dispatch(
        &self,
        tenant_id: &str,
        id: &str,
        attempt_stage: i32,
        delay: Option<Duration>,
    ) -> Result<()> {
        self.scheduler
            .enqueue(
                OUTBOX_DISPATCH_QUEUE,
                json!({
                    "tenantId": tenant_id,
                    "outboxId": id,
                }),
                EnqueueOptions { delay, dedupe_id: Some(format!("{id}:{attempt_stage}")) },
            )
            .await
    }

    /// Dispatch one outbox record.
    ///
    /// Idempotent against duplicate jobs: terminal records return
    /// immediately. Failures are committed to the record first and then
    /// re-raised so queue-level accounting observes the same outcome.
    #[instrument(skip(self))]
    pub async fn dispatch(&self, tenant_id: &str, id: &str) -> Result<()> {
        let Some(message) = self.store.fetch(tenant_id, id).await? else {
            warn!("outbox record not found, dropping job");
            return Ok(());
        };

        if message.status.is_terminal() {
            debug!(status = %message.status, "record already terminal, skipping");
            self.telemetry
                .record("outbox.short_circuit", &[("status", &message.status.to_string())]);
            return Ok(());
        }

        let topic_label = message.topic.to_string();
        let handler = self.registry.handler_for(message.topic).ok_or_else(|| {
            // verify_complete at startup makes this unreachable in practice
            MinuteflowError::Internal(format!("no handler registered for topic {topic_label}"))
        })?;

        match handler.handle(&message).await {
            Ok(()) => {
                self.store.mark_completed(tenant_id, id).await?;
                info!(topic = %topic_label, "outbox record completed");
                self.telemetry.record("outbox.completed", &[("topic", &topic_label)]);
                Ok(())
            }
            Err(HandlerError::Permanent(reason)) => {
                // Retrying can never succeed; dead-letter promptly.
                self.store.mark_dead(tenant_id, id, &reason).await?;
                warn!(topic = %topic_label, error = %reason, "permanent failure, dead-lettered");
                self.telemetry.record("outbox.dead_letter", &[("topic", &topic_label)]);
                Err(MinuteflowError::InvalidInput(reason))
            }
            Err(HandlerError::CircuitOpen(dependency)) => {
                // Attempts still advance so a persistently open breaker
                // converges on DEAD_LETTER instead of an unbounded backlog.
                let error = format!("circuit open for dependency '{dependency}'");
                let transition =
                    self.store.mark_failed(tenant_id, id, &error, &self.retry_policy).await?;
                self.handle_failure_transition(tenant_id, id, &topic_label, transition).await;
                Err(MinuteflowError::CircuitOpen(dependency))
            }
            Err(HandlerError::Transient(reason)) => {
                let transition =
                    self.store.mark_failed(tenant_id, id, &reason, &self.retry_policy).await?;
                self.handle_failure_transition(tenant_id, id, &topic_label, transition).await;
                Err(MinuteflowError::Network(reason))
            }
        }
    }

    /// Commit-side bookkeeping after a failed dispatch: telemetry plus a
    /// delayed redispatch job while the record is still retryable. The job
    /// is an optimisation; the sweeper redelivers if it is lost.
    async fn handle_failure_transition(
        &self,
        tenant_id: &str,
        id: &str,
        topic: &str,
        transition: FailureTransition,
    ) {
        if transition.status == OutboxStatus::DeadLetter {
            warn!(topic, attempts = transition.attempts, "retries exhausted, record dead-lettered");
            self.telemetry.record("outbox.dead_letter", &[("topic", topic)]);
            return;
        }

        self.telemetry.record("outbox.failed", &[("topic", topic)]);

        let now = Utc::now().timestamp_millis();
        let delay = Duration::from_millis(transition.next_run_at.saturating_sub(now).max(0) as u64);
        if let Err(err) =
            self.enqueue_dispatch(tenant_id, id, transition.attempts, Some(delay)).await
        {
            warn!(error = %err, "retry enqueue failed; sweeper will pick the record up");
        }
    }

    /// Operator listing of dead-lettered records for a tenant.
    pub async fn dead_letters(&self, tenant_id: &str) -> Result<Vec<DeadLetterSummary>> {
        self.store.dead_letters(tenant_id).await
    }

    /// Operator recovery: reset one DEAD_LETTER record to PENDING and
    /// re-enqueue its delivery job.
    #[instrument(skip(self))]
    pub async fn retry_dead_letter(&self, tenant_id: &str, id: &str) -> Result<RetryAck> {
        self.store.reset_for_retry(tenant_id, id).await?;

        let Some(message) = self.store.fetch(tenant_id, id).await? else {
            return Err(MinuteflowError::NotFound(format!("outbox record {id}")));
        };
        if let Err(err) = self.schedule(&message).await {
            warn!(error = %err, "re-enqueue after retry failed; sweeper will recover");
        }

        info!("dead-lettered record requeued by operator");
        self.telemetry.record("outbox.manual_retry", &[("topic", &message.topic.to_string())]);
        Ok(RetryAck::queued())
    }
}
