//! SQLite-backed implementation of the outbox store port.
//!
//! All statements carry a `tenant_id` predicate, so no port operation can
//! read or write another tenant's rows (`fetch_due` is the system-level
//! sweep input and returns tenant ids for per-record dispatch). Blocking
//! rusqlite work runs on the tokio blocking pool.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use minuteflow_core::outbox::ports::{FailureTransition, InsertOutcome, OutboxStore};
use minuteflow_domain::constants::MAX_LAST_ERROR_LEN;
use minuteflow_domain::{
    DeadLetterSummary, MinuteflowError, NewOutboxMessage, OutboxMessage, OutboxStatus, Result,
    RetryPolicy, Topic,
};
use rusqlite::{params, OptionalExtension, Row};
use tokio::task;

use super::manager::{map_sql_error, DbManager};

/// SQLite-backed outbox repository.
pub struct SqliteOutboxRepository {
    db: Arc<DbManager>,
}

impl SqliteOutboxRepository {
    /// Construct a repository backed by the shared database manager.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Insert an outbox record with the caller's domain write in the same
    /// transaction.
    ///
    /// `domain_write` runs first; if it fails, nothing commits, including
    /// the outbox row. A duplicate idempotency key leaves the domain write
    /// committed (upserts are expected to be idempotent) and reports
    /// [`InsertOutcome::Duplicate`].
    pub async fn insert_with<F>(
        &self,
        record: NewOutboxMessage,
        domain_write: F,
    ) -> Result<InsertOutcome>
    where
        F: FnOnce(&rusqlite::Transaction<'_>) -> Result<()> + Send + 'static,
    {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<InsertOutcome> {
            let mut conn = db.get_connection()?;
            let tx = conn.transaction().map_err(map_sql_error)?;
            domain_write(&tx)?;
            let outcome = insert_message(&tx, &record)?;
            tx.commit().map_err(map_sql_error)?;
            Ok(outcome)
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl OutboxStore for SqliteOutboxRepository {
    async fn insert(&self, record: NewOutboxMessage) -> Result<InsertOutcome> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<InsertOutcome> {
            let conn = db.get_connection()?;
            insert_message(&conn, &record)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn fetch(&self, tenant_id: &str, id: &str) -> Result<Option<OutboxMessage>> {
        let db = Arc::clone(&self.db);
        let tenant_id = tenant_id.to_string();
        let id = id.to_string();

        task::spawn_blocking(move || -> Result<Option<OutboxMessage>> {
            let conn = db.get_connection()?;
            conn.query_row(
                &format!("{SELECT_COLUMNS} WHERE tenant_id = ?1 AND id = ?2"),
                params![tenant_id, id],
                map_message_row,
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn mark_completed(&self, tenant_id: &str, id: &str) -> Result<()> {
        let db = Arc::clone(&self.db);
        let tenant_id = tenant_id.to_string();
        let id = id.to_string();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            let rows = conn
                .execute(
                    "UPDATE outbox_messages
                     SET status = 'completed', attempts = attempts + 1,
                         last_error = NULL, updated_at = ?1
                     WHERE tenant_id = ?2 AND id = ?3",
                    params![now_ms(), tenant_id, id],
                )
                .map_err(map_sql_error)?;
            if rows == 0 {
                return Err(MinuteflowError::NotFound(format!("outbox record {id}")));
            }
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn mark_failed(
        &self,
        tenant_id: &str,
        id: &str,
        error: &str,
        policy: &RetryPolicy,
    ) -> Result<FailureTransition> {
        let db = Arc::clone(&self.db);
        let tenant_id = tenant_id.to_string();
        let id = id.to_string();
        let error = truncate_reason(error);
        let policy = *policy;

        task::spawn_blocking(move || -> Result<FailureTransition> {
            let mut conn = db.get_connection()?;
            let tx = conn.transaction().map_err(map_sql_error)?;

            let attempts: i32 = tx
                .query_row(
                    "SELECT attempts FROM outbox_messages WHERE tenant_id = ?1 AND id = ?2",
                    params![tenant_id, id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(map_sql_error)?
                .ok_or_else(|| MinuteflowError::NotFound(format!("outbox record {id}")))?;

            let attempts = attempts + 1;
            let now = now_ms();
            let (status, next_run_at) = if attempts >= policy.max_attempts as i32 {
                (OutboxStatus::DeadLetter, now)
            } else {
                let backoff = policy.delay_for_attempt(attempts as u32);
                (OutboxStatus::Failed, now + backoff.as_millis() as i64)
            };

            tx.execute(
                "UPDATE outbox_messages
                 SET status = ?1, attempts = ?2, last_error = ?3,
                     next_run_at = ?4, updated_at = ?5
                 WHERE tenant_id = ?6 AND id = ?7",
                params![status.to_string(), attempts, error, next_run_at, now, tenant_id, id],
            )
            .map_err(map_sql_error)?;
            tx.commit().map_err(map_sql_error)?;

            Ok(FailureTransition { status, attempts, next_run_at })
        })
        .await
        .map_err(map_join_error)?
    }

    async fn mark_dead(&self, tenant_id: &str, id: &str, error: &str) -> Result<()> {
        let db = Arc::clone(&self.db);
        let tenant_id = tenant_id.to_string();
        let id = id.to_string();
        let error = truncate_reason(error);

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            let rows = conn
                .execute(
                    "UPDATE outbox_messages
                     SET status = 'dead_letter', attempts = attempts + 1,
                         last_error = ?1, updated_at = ?2
                     WHERE tenant_id = ?3 AND id = ?4",
                    params![error, now_ms(), tenant_id, id],
                )
                .map_err(map_sql_error)?;
            if rows == 0 {
                return Err(MinuteflowError::NotFound(format!("outbox record {id}")));
            }
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn fetch_due(&self, limit: usize) -> Result<Vec<OutboxMessage>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<Vec<OutboxMessage>> {
            if limit == 0 {
                return Ok(Vec::new());
            }
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(&format!(
                    "{SELECT_COLUMNS}
                     WHERE status IN ('pending', 'failed') AND next_run_at <= ?1
                     ORDER BY next_run_at ASC
                     LIMIT ?2"
                ))
                .map_err(map_sql_error)?;

            let rows = stmt
                .query_map(params![now_ms(), limit as i64], map_message_row)
                .map_err(map_sql_error)?;

            let mut due = Vec::new();
            for row in rows {
                due.push(row.map_err(map_sql_error)?);
            }
            Ok(due)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn dead_letters(&self, tenant_id: &str) -> Result<Vec<DeadLetterSummary>> {
        let db = Arc::clone(&self.db);
        let tenant_id = tenant_id.to_string();

        task::spawn_blocking(move || -> Result<Vec<DeadLetterSummary>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(
                    "SELECT id, topic, last_error, attempts, updated_at
                     FROM outbox_messages
                     WHERE tenant_id = ?1 AND status = 'dead_letter'
                     ORDER BY updated_at DESC",
                )
                .map_err(map_sql_error)?;

            let rows = stmt
                .query_map(params![tenant_id], map_dead_letter_row)
                .map_err(map_sql_error)?;

            let mut items = Vec::new();
            for row in rows {
                items.push(row.map_err(map_sql_error)?);
            }
            Ok(items)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn reset_for_retry(&self, tenant_id: &str, id: &str) -> Result<()> {
        let db = Arc::clone(&self.db);
        let tenant_id = tenant_id.to_string();
        let id = id.to_string();

        task::spawn_blocking(move || -> Result<()> {
            let mut conn = db.get_connection()?;
            let tx = conn.transaction().map_err(map_sql_error)?;

            let status_raw: String = tx
                .query_row(
                    "SELECT status FROM outbox_messages WHERE tenant_id = ?1 AND id = ?2",
                    params![tenant_id, id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(map_sql_error)?
                .ok_or_else(|| MinuteflowError::NotFound(format!("outbox record {id}")))?;

            let status = OutboxStatus::from_str(&status_raw)
                .map_err(MinuteflowError::Database)?;
            match status {
                OutboxStatus::DeadLetter => {}
                // A previous operator retry already reset the record; keep
                // the operation idempotent.
                OutboxStatus::Pending => {
                    tx.commit().map_err(map_sql_error)?;
                    return Ok(());
                }
                other => {
                    return Err(MinuteflowError::InvalidInput(format!(
                        "outbox record {id} is {other}, only dead_letter records can be retried"
                    )));
                }
            }

            let now = now_ms();
            tx.execute(
                "UPDATE outbox_messages
                 SET status = 'pending', attempts = 0, last_error = NULL,
                     next_run_at = ?1, updated_at = ?2
                 WHERE tenant_id = ?3 AND id = ?4",
                params![now, now, tenant_id, id],
            )
            .map_err(map_sql_error)?;
            tx.commit().map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

const SELECT_COLUMNS: &str = "SELECT
        id, tenant_id, topic, payload_json, status, attempts, last_error,
        next_run_at, idempotency_key, created_at, updated_at
    FROM outbox_messages";

fn insert_message(conn: &rusqlite::Connection, record: &NewOutboxMessage) -> Result<InsertOutcome> {
    let message = OutboxMessage::new(
        record.tenant_id.clone(),
        record.topic,
        record.payload_json.clone(),
        record.idempotency_key.clone(),
    );

    let rows = conn
        .execute(
            "INSERT INTO outbox_messages (
                id, tenant_id, topic, payload_json, status, attempts, last_error,
                next_run_at, idempotency_key, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT (tenant_id, idempotency_key) DO NOTHING",
            params![
                message.id,
                message.tenant_id,
                message.topic.to_string(),
                message.payload_json,
                message.status.to_string(),
                message.attempts,
                message.last_error,
                message.next_run_at,
                message.idempotency_key,
                message.created_at,
                message.updated_at,
            ],
        )
        .map_err(map_sql_error)?;

    if rows == 0 {
        Ok(InsertOutcome::Duplicate)
    } else {
        Ok(InsertOutcome::Inserted(message))
    }
}

fn map_message_row(row: &Row<'_>) -> rusqlite::Result<OutboxMessage> {
    let topic_raw: String = row.get(2)?;
    let topic = Topic::from_str(&topic_raw).map_err(|err| conversion_error(2, err))?;
    let status_raw: String = row.get(4)?;
    let status = OutboxStatus::from_str(&status_raw).map_err(|err| conversion_error(4, err))?;

    Ok(OutboxMessage {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        topic,
        payload_json: row.get(3)?,
        status,
        attempts: row.get(5)?,
        last_error: row.get(6)?,
        next_run_at: row.get(7)?,
        idempotency_key: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn map_dead_letter_row(row: &Row<'_>) -> rusqlite::Result<DeadLetterSummary> {
    let topic_raw: String = row.get(1)?;
    let topic = Topic::from_str(&topic_raw).map_err(|err| conversion_error(1, err))?;

    Ok(DeadLetterSummary {
        id: row.get(0)?,
        topic,
        last_error: row.get(2)?,
        attempts: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn conversion_error(index: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        index,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn truncate_reason(reason: &str) -> String {
    if reason.len() <= MAX_LAST_ERROR_LEN {
        return reason.to_string();
    }

    let mut truncated =
        reason.chars().take(MAX_LAST_ERROR_LEN.saturating_sub(3)).collect::<String>();
    truncated.push_str("...");
    truncated
}

fn map_join_error(err: task::JoinError) -> MinuteflowError {
    if err.is_cancelled() {
        MinuteflowError::Internal("outbox task cancelled".into())
    } else {
        MinuteflowError::Internal(format!("outbox task panic: {err}"))
    }
}
