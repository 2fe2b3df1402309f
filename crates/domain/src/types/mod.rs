//! Domain type modules

pub mod config;
pub mod outbox;
pub mod topics;

pub use config::{
    Config, DatabaseConfig, DependencyConfig, DependencyConfigs, DispatchConfig, QueueSettings,
    RetryPolicy,
};
pub use outbox::{DeadLetterSummary, NewOutboxMessage, OutboxMessage, OutboxStatus, RetryAck};
pub use topics::{ApprovalRequestPayload, DocumentCreatePayload, DocumentMovePayload, Topic};
