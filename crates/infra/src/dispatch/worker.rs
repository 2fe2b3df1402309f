//! Bridge between queue jobs and the outbox service.

use std::sync::Arc;

use async_trait::async_trait;
use minuteflow_core::OutboxService;
use minuteflow_domain::{MinuteflowError, Result};
use serde::Deserialize;

use crate::queue::{Job, JobHandler};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DispatchJobPayload {
    tenant_id: String,
    outbox_id: String,
}

/// Queue handler for the outbox dispatch queue.
///
/// Errors propagate back to the queue so its delivery accounting matches
/// the outbox record's; with queue-level `max_attempts = 1` the record
/// stays the only retry authority.
pub struct OutboxDispatchJobHandler {
    service: Arc<OutboxService>,
}

impl OutboxDispatchJobHandler {
    pub fn new(service: Arc<OutboxService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl JobHandler for OutboxDispatchJobHandler {
    async fn handle(&self, job: &Job) -> Result<()> {
        let payload: DispatchJobPayload = serde_json::from_value(job.payload.clone())
            .map_err(|err| MinuteflowError::InvalidInput(format!("malformed dispatch job: {err}")))?;

        self.service.dispatch(&payload.tenant_id, &payload.outbox_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_decodes_camel_case_fields() {
        let value = serde_json::json!({ "tenantId": "tenant-1", "outboxId": "out-1" });
        let payload: DispatchJobPayload = serde_json::from_value(value).unwrap();
        assert_eq!(payload.tenant_id, "tenant-1");
        assert_eq!(payload.outbox_id, "out-1");
    }

    #[test]
    fn malformed_payload_is_rejected() {
        let value = serde_json::json!({ "tenantId": "tenant-1" });
        assert!(serde_json::from_value::<DispatchJobPayload>(value).is_err());
    }
}
