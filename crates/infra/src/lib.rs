//! # Minuteflow Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - SQLite database manager and the outbox repository
//! - The in-process job queue with named queues and worker pools
//! - Dispatch handlers, the dispatch job worker and the pending-record
//!   sweeper
//! - HTTP collaborator clients (document store, chat notifier)
//! - Configuration loading and observability
//!
//! ## Architecture
//! - Implements traits defined in `minuteflow-core`
//! - Contains all "impure" code (I/O, clocks, network)

pub mod config;
pub mod context;
pub mod database;
pub mod dispatch;
pub mod integrations;
pub mod observability;
pub mod queue;

pub use context::AppContext;
pub use database::{DbManager, SqliteOutboxRepository};
pub use dispatch::{
    ApprovalRequestHandler, DocumentCreateHandler, DocumentMoveHandler, OutboxDispatchJobHandler,
    OutboxSweeper, OutboxSweeperConfig,
};
pub use integrations::{HttpApprovalNotifier, HttpDocumentStore};
pub use observability::{init_tracing, DispatchMetrics, DispatchMetricsSnapshot};
pub use queue::{Job, JobHandler, JobQueue, WorkerOptions};
