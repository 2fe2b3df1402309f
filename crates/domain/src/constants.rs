//! Shared constants

/// Queue name for outbox dispatch jobs.
pub const OUTBOX_DISPATCH_QUEUE: &str = "outbox-dispatch";

/// Dependency key for the document storage collaborator.
pub const DEP_DOCUMENTS: &str = "documents";

/// Dependency key for the chat notification collaborator.
pub const DEP_CHAT: &str = "chat";

/// Maximum length persisted for `last_error` on an outbox record.
pub const MAX_LAST_ERROR_LEN: usize = 256;
