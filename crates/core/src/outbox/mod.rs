//! Outbox ports and dispatch service

pub mod ports;
pub mod service;

pub use ports::{EnqueueOptions, FailureTransition, InsertOutcome, JobScheduler, OutboxStore};
pub use service::OutboxService;
