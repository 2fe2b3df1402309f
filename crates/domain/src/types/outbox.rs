//! Outbox record types and status machine.
//!
//! An [`OutboxMessage`] is the durable "this side effect must happen" record
//! written atomically with the domain change that triggered it. The queue job
//! that references it is only a scheduling hint; the record here is
//! authoritative for retries and dead-lettering.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::topics::Topic;

/// Outbox record status.
///
/// `Pending ⇄ Failed → DeadLetter` on the failure path (DeadLetter is
/// terminal except for an operator reset), `Pending/Failed → Completed` on
/// success (terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    Pending,
    Completed,
    Failed,
    DeadLetter,
}

crate::impl_domain_string_conversions!(OutboxStatus {
    Pending => "pending",
    Completed => "completed",
    Failed => "failed",
    DeadLetter => "dead_letter",
});

impl OutboxStatus {
    /// Terminal states are never dispatched again automatically.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OutboxStatus::Completed | OutboxStatus::DeadLetter)
    }
}

/// A durable side-effect record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxMessage {
    pub id: String,
    pub tenant_id: String,
    pub topic: Topic,
    /// Serialised payload for the topic handler.
    pub payload_json: String,
    pub status: OutboxStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    /// Epoch milliseconds; meaningful only while Pending/Failed.
    pub next_run_at: i64,
    /// Unique per tenant; duplicate upstream deliveries collapse onto one
    /// record.
    pub idempotency_key: String,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub updated_at: i64,
}

impl OutboxMessage {
    /// Create a fresh pending record with a v7 id and current timestamps.
    pub fn new(
        tenant_id: impl Into<String>,
        topic: Topic,
        payload_json: impl Into<String>,
        idempotency_key: impl Into<String>,
    ) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            id: Uuid::now_v7().to_string(),
            tenant_id: tenant_id.into(),
            topic,
            payload_json: payload_json.into(),
            status: OutboxStatus::Pending,
            attempts: 0,
            last_error: None,
            next_run_at: now,
            idempotency_key: idempotency_key.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Decode the payload into its typed form.
    pub fn payload<T: serde::de::DeserializeOwned>(&self) -> crate::Result<T> {
        serde_json::from_str(&self.payload_json).map_err(Into::into)
    }
}

/// Insert request for a new outbox record.
#[derive(Debug, Clone)]
pub struct NewOutboxMessage {
    pub tenant_id: String,
    pub topic: Topic,
    pub payload_json: String,
    pub idempotency_key: String,
}

impl NewOutboxMessage {
    pub fn new(
        tenant_id: impl Into<String>,
        topic: Topic,
        payload_json: impl Into<String>,
        idempotency_key: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            topic,
            payload_json: payload_json.into(),
            idempotency_key: idempotency_key.into(),
        }
    }

    /// Build from a typed payload.
    pub fn from_payload<T: Serialize>(
        tenant_id: impl Into<String>,
        topic: Topic,
        payload: &T,
        idempotency_key: impl Into<String>,
    ) -> crate::Result<Self> {
        let payload_json = serde_json::to_string(payload)?;
        Ok(Self::new(tenant_id, topic, payload_json, idempotency_key))
    }
}

/// Operator-facing summary of a dead-lettered record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetterSummary {
    pub id: String,
    pub topic: Topic,
    pub last_error: Option<String>,
    pub attempts: i32,
    /// Epoch milliseconds.
    pub updated_at: i64,
}

/// Acknowledgement returned by the operator retry operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryAck {
    pub status: String,
}

impl RetryAck {
    pub fn queued() -> Self {
        Self { status: "queued".to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_message_starts_pending_and_due() {
        let msg = OutboxMessage::new("tenant-1", Topic::ApprovalRequest, "{}", "key-1");

        assert_eq!(msg.status, OutboxStatus::Pending);
        assert_eq!(msg.attempts, 0);
        assert!(msg.last_error.is_none());
        assert!(msg.next_run_at <= Utc::now().timestamp_millis());
        assert_eq!(msg.created_at, msg.updated_at);
    }

    #[test]
    fn terminal_states() {
        assert!(OutboxStatus::Completed.is_terminal());
        assert!(OutboxStatus::DeadLetter.is_terminal());
        assert!(!OutboxStatus::Pending.is_terminal());
        assert!(!OutboxStatus::Failed.is_terminal());
    }

    #[test]
    fn status_string_roundtrip() {
        use std::str::FromStr;

        for status in [
            OutboxStatus::Pending,
            OutboxStatus::Completed,
            OutboxStatus::Failed,
            OutboxStatus::DeadLetter,
        ] {
            assert_eq!(OutboxStatus::from_str(&status.to_string()).unwrap(), status);
        }
    }

    #[test]
    fn typed_payload_decodes() {
        use crate::types::topics::DocumentMovePayload;

        let payload = DocumentMovePayload {
            document_id: "doc-1".to_string(),
            folder_id: "folder-9".to_string(),
        };
        let msg = OutboxMessage::new(
            "tenant-1",
            Topic::DocumentMove,
            serde_json::to_string(&payload).unwrap(),
            "key-1",
        );

        let decoded: DocumentMovePayload = msg.payload().expect("decodes");
        assert_eq!(decoded, payload);
    }

    #[test]
    fn malformed_payload_is_invalid_input() {
        let msg = OutboxMessage::new("tenant-1", Topic::DocumentMove, "{broken", "key-1");
        let err = msg.payload::<serde_json::Value>().unwrap_err();
        assert!(matches!(err, crate::MinuteflowError::InvalidInput(_)));
    }

    #[test]
    fn retry_ack_matches_operator_contract() {
        let ack = RetryAck::queued();
        let json = serde_json::to_value(&ack).unwrap();
        assert_eq!(json["status"], "queued");
    }
}
