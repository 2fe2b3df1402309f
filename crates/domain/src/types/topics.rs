//! Closed enumeration of outbox topics and their payload shapes.
//!
//! Every side effect the outbox can produce is one of these variants. The
//! dispatcher's handler registry is checked against [`Topic::ALL`] at
//! startup, so an unhandled topic is a boot failure rather than a runtime
//! dead-letter storm.

use serde::{Deserialize, Serialize};

/// Logical operation name carried by an outbox record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topic {
    /// Create a document in the external document store.
    DocumentCreate,
    /// Move an existing document into its final folder.
    DocumentMove,
    /// Post an approval request to the chat workspace.
    ApprovalRequest,
}

crate::impl_domain_string_conversions!(Topic {
    DocumentCreate => "document.create",
    DocumentMove => "document.move",
    ApprovalRequest => "notification.approval-request",
});

impl Topic {
    /// Every topic the outbox store can produce.
    pub const ALL: [Topic; 3] = [Topic::DocumentCreate, Topic::DocumentMove, Topic::ApprovalRequest];
}

/// Payload for [`Topic::DocumentCreate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentCreatePayload {
    pub tenant_id: String,
    pub title: String,
    pub account: String,
    pub project: String,
    /// Date component used in the document path, `YYYYMMDD`.
    pub date: String,
    pub content: String,
}

/// Payload for [`Topic::DocumentMove`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMovePayload {
    pub document_id: String,
    pub folder_id: String,
}

/// Payload for [`Topic::ApprovalRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequestPayload {
    pub tenant_id: String,
    /// The entity awaiting approval (a meeting in the upstream product).
    pub entity_id: String,
    pub doc_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routed_client: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routed_project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}
