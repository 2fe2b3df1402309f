//! In-process job queue with named queues and per-queue worker pools.
//!
//! The queue is a delivery mechanism, not a source of truth: outbox jobs
//! reference durable records and a lost job is regenerated by the sweeper.
//! Dedupe ids collapse duplicate scheduling of the same work; delays
//! implement backoff-timed redelivery.

pub mod job;
pub mod worker_pool;

pub use job::{Job, JobHandler, WorkerOptions};
pub use worker_pool::JobQueue;
