//! Port interfaces for outbox persistence and job scheduling

use std::time::Duration;

use async_trait::async_trait;
use minuteflow_domain::{
    DeadLetterSummary, NewOutboxMessage, OutboxMessage, OutboxStatus, Result, RetryPolicy,
};

/// Outcome of inserting an outbox record.
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    /// A new record was created.
    Inserted(OutboxMessage),
    /// A record with this tenant + idempotency key already exists; the
    /// intent is already represented, so the insert is a no-op.
    Duplicate,
}

/// Result of committing a failed dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureTransition {
    pub status: OutboxStatus,
    /// Attempts after the increment.
    pub attempts: i32,
    /// Epoch milliseconds of the next automatic dispatch (meaningful while
    /// FAILED).
    pub next_run_at: i64,
}

/// Trait for the durable outbox store
///
/// Every method is confined to the given tenant; `fetch_due` is the single
/// system-level exception feeding the sweeper.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Insert a pending record, deduplicating on `(tenant_id,
    /// idempotency_key)`.
    async fn insert(&self, record: NewOutboxMessage) -> Result<InsertOutcome>;

    /// Load a record by id.
    async fn fetch(&self, tenant_id: &str, id: &str) -> Result<Option<OutboxMessage>>;

    /// Record a successful dispatch: status COMPLETED, attempts + 1,
    /// last_error cleared.
    async fn mark_completed(&self, tenant_id: &str, id: &str) -> Result<()>;

    /// Record a failed dispatch: attempts + 1, then DEAD_LETTER once the
    /// policy's ceiling is reached, otherwise FAILED with a backoff
    /// `next_run_at`.
    async fn mark_failed(
        &self,
        tenant_id: &str,
        id: &str,
        error: &str,
        policy: &RetryPolicy,
    ) -> Result<FailureTransition>;

    /// Dead-letter immediately (permanent failures that can never succeed).
    async fn mark_dead(&self, tenant_id: &str, id: &str, error: &str) -> Result<()>;

    /// Pending/Failed records across all tenants whose `next_run_at` has
    /// elapsed, oldest first.
    async fn fetch_due(&self, limit: usize) -> Result<Vec<OutboxMessage>>;

    /// Dead-lettered records for a tenant, newest first.
    async fn dead_letters(&self, tenant_id: &str) -> Result<Vec<DeadLetterSummary>>;

    /// Operator reset: DEAD_LETTER -> PENDING, attempts 0, error cleared,
    /// due now.
    async fn reset_for_retry(&self, tenant_id: &str, id: &str) -> Result<()>;
}

/// Scheduling options for [`JobScheduler::enqueue`].
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    /// Delay before the job becomes ready.
    pub delay: Option<Duration>,
    /// Collides with a pending or in-flight job id -> the enqueue is a
    /// no-op.
    pub dedupe_id: Option<String>,
}

/// Trait for scheduling queue jobs
#[async_trait]
pub trait JobScheduler: Send + Sync {
    /// Schedule a job on a named queue.
    async fn enqueue(
        &self,
        queue: &str,
        payload: serde_json::Value,
        options: EnqueueOptions,
    ) -> Result<()>;
}
