//! Reusable infrastructure shared across Minuteflow crates.
//!
//! Currently this is the resilience toolkit: a clock abstraction for
//! deterministic tests, a circuit breaker, a token-bucket rate limiter, and
//! the resilient call executor that combines them with timeouts and
//! retry/backoff for outbound calls.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod resilience;

pub use resilience::{
    apply_jitter, CallError, CallExecutor, CallExecutorConfig, CircuitBreaker,
    CircuitBreakerConfig, CircuitBreakerMetrics, CircuitState, Clock, MockClock, SystemClock,
    TokenBucket, TokenBucketConfig,
};
