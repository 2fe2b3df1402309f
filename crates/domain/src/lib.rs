//! # Minuteflow Domain
//!
//! Pure domain types shared across Minuteflow crates.
//!
//! This crate contains:
//! - Outbox record types and status machine
//! - The closed topic enumeration and per-topic payloads
//! - Configuration types (loaded by `minuteflow-infra`)
//! - The workspace error enum
//!
//! No I/O happens here; everything is serialisable data.

pub mod constants;
pub mod errors;
#[macro_use]
pub mod macros;
pub mod types;

pub use errors::{MinuteflowError, Result};
pub use types::config::{
    Config, DatabaseConfig, DependencyConfig, DependencyConfigs, DispatchConfig, QueueSettings,
    RetryPolicy,
};
pub use types::outbox::{
    DeadLetterSummary, NewOutboxMessage, OutboxMessage, OutboxStatus, RetryAck,
};
pub use types::topics::{
    ApprovalRequestPayload, DocumentCreatePayload, DocumentMovePayload, Topic,
};
