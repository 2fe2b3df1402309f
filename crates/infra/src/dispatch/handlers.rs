//! Topic handlers mapping outbox records onto collaborator operations.
//!
//! Payload decode failures are permanent: a record that cannot be parsed
//! will never succeed, so it goes straight to the dead letters.

use std::sync::Arc;

use async_trait::async_trait;
use minuteflow_core::dispatch::registry::{HandlerError, TopicHandler};
use minuteflow_core::integrations::ports::{ApprovalNotifier, DocumentStore};
use minuteflow_domain::{
    ApprovalRequestPayload, DocumentCreatePayload, DocumentMovePayload, OutboxMessage, Topic,
};
use tracing::debug;

fn decode<T: serde::de::DeserializeOwned>(message: &OutboxMessage) -> Result<T, HandlerError> {
    message.payload::<T>().map_err(|err| HandlerError::Permanent(err.to_string()))
}

/// Creates documents in the external document store.
pub struct DocumentCreateHandler {
    documents: Arc<dyn DocumentStore>,
}

impl DocumentCreateHandler {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }
}

#[async_trait]
impl TopicHandler for DocumentCreateHandler {
    fn topic(&self) -> Topic {
        Topic::DocumentCreate
    }

    async fn handle(&self, message: &OutboxMessage) -> Result<(), HandlerError> {
        let payload: DocumentCreatePayload = decode(message)?;
        let created = self.documents.create_document(&payload).await.map_err(HandlerError::from)?;
        debug!(
            document_id = %created.document_id,
            folder_id = %created.folder_id,
            "document created"
        );
        Ok(())
    }
}

/// Moves documents into their final folder.
pub struct DocumentMoveHandler {
    documents: Arc<dyn DocumentStore>,
}

impl DocumentMoveHandler {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }
}

#[async_trait]
impl TopicHandler for DocumentMoveHandler {
    fn topic(&self) -> Topic {
        Topic::DocumentMove
    }

    async fn handle(&self, message: &OutboxMessage) -> Result<(), HandlerError> {
        let payload: DocumentMovePayload = decode(message)?;
        self.documents
            .move_document(&payload.document_id, &payload.folder_id)
            .await
            .map_err(HandlerError::from)?;
        debug!(document_id = %payload.document_id, "document moved");
        Ok(())
    }
}

/// Posts approval requests into the chat workspace.
pub struct ApprovalRequestHandler {
    notifier: Arc<dyn ApprovalNotifier>,
    channel: String,
}

impl ApprovalRequestHandler {
    pub fn new(notifier: Arc<dyn ApprovalNotifier>, channel: impl Into<String>) -> Self {
        Self { notifier, channel: channel.into() }
    }
}

#[async_trait]
impl TopicHandler for ApprovalRequestHandler {
    fn topic(&self) -> Topic {
        Topic::ApprovalRequest
    }

    async fn handle(&self, message: &OutboxMessage) -> Result<(), HandlerError> {
        let payload: ApprovalRequestPayload = decode(message)?;
        self.notifier
            .post_approval(&self.channel, &payload)
            .await
            .map_err(HandlerError::from)?;
        debug!(entity_id = %payload.entity_id, "approval request posted");
        Ok(())
    }
}
