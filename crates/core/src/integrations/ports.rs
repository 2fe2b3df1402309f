//! Port interfaces for the external collaborators.
//!
//! The document store and chat workspace are consumed as operations only;
//! their wire protocols live in `minuteflow-infra::integrations`.

use async_trait::async_trait;
use minuteflow_domain::{ApprovalRequestPayload, DocumentCreatePayload, Result};
use serde::{Deserialize, Serialize};

/// Result of creating a document downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedDocument {
    pub document_id: String,
    pub folder_id: String,
    pub link: String,
}

/// Trait for the external document storage collaborator
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document from a meeting transcript.
    async fn create_document(&self, request: &DocumentCreatePayload) -> Result<CreatedDocument>;

    /// Move an existing document into its final folder.
    async fn move_document(&self, document_id: &str, folder_id: &str) -> Result<()>;
}

/// Trait for the chat notification collaborator
#[async_trait]
pub trait ApprovalNotifier: Send + Sync {
    /// Post an approval request into the given channel.
    async fn post_approval(&self, channel: &str, request: &ApprovalRequestPayload) -> Result<()>;
}
