//! Outbox dispatch wiring: topic handlers, the queue job bridge, and the
//! pending-record sweeper.

pub mod handlers;
pub mod sweeper;
pub mod worker;

pub use handlers::{ApprovalRequestHandler, DocumentCreateHandler, DocumentMoveHandler};
pub use sweeper::{OutboxSweeper, OutboxSweeperConfig};
pub use worker::OutboxDispatchJobHandler;
