//! # Minuteflow Core
//!
//! Ports and services sitting between the pure domain types and the
//! infrastructure implementations.
//!
//! This crate contains:
//! - The outbox store and job scheduler ports
//! - Collaborator ports (document store, approval notifier)
//! - The typed topic handler registry, checked for completeness at startup
//! - `OutboxService`, which owns record/schedule/dispatch/dead-letter
//!   semantics
//!
//! ## Architecture
//! - Depends on `minuteflow-domain` and `minuteflow-common` only
//! - All I/O lives behind the ports and is implemented in
//!   `minuteflow-infra`

pub mod dispatch;
pub mod integrations;
pub mod outbox;
pub mod telemetry;

pub use dispatch::registry::{HandlerError, HandlerRegistry, TopicHandler};
pub use integrations::ports::{ApprovalNotifier, CreatedDocument, DocumentStore};
pub use outbox::ports::{
    EnqueueOptions, FailureTransition, InsertOutcome, JobScheduler, OutboxStore,
};
pub use outbox::service::OutboxService;
pub use telemetry::{NoopTelemetry, TelemetrySink};
