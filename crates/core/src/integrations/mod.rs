//! Collaborator ports for external side effects

pub mod ports;

pub use ports::{ApprovalNotifier, CreatedDocument, DocumentStore};
