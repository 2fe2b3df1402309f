//! Resilient call executor.
//!
//! Wraps one logical outbound operation with admission control and retry:
//! breaker check first (an open circuit fails the whole call, no sleep),
//! then rate-limiter admission (denial is a transient failure on the normal
//! backoff path), then the operation itself under a per-attempt deadline.
//! Between attempts the executor sleeps `min(base * 2^(attempt-1), max)`
//! plus jitter in `[0, 0.2 * delay]`.
//!
//! Breaker and limiter state are the only side effects outside the wrapped
//! operation.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::{debug, warn};

use super::circuit_breaker::CircuitBreaker;
use super::clock::{Clock, SystemClock};
use super::rate_limiter::TokenBucket;

/// Errors surfaced by [`CallExecutor::execute`].
#[derive(Debug, Error)]
pub enum CallError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// The circuit is open; the operation was never invoked for this call.
    #[error("circuit breaker open for dependency '{dependency}'")]
    CircuitOpen { dependency: String },

    /// The rate-limit window stayed exhausted through the final attempt.
    #[error("rate limit exceeded for dependency '{dependency}'")]
    RateLimited { dependency: String },

    /// The final attempt exceeded the per-attempt deadline.
    #[error("operation timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// The final attempt failed in the operation itself.
    #[error("operation failed after {attempts} attempts")]
    Failed {
        attempts: u32,
        #[source]
        source: E,
    },
}

impl<E> CallError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// True when the circuit rejected the call without reaching the network.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CallError::CircuitOpen { .. })
    }
}

/// Configuration for the call executor.
#[derive(Debug, Clone)]
pub struct CallExecutorConfig {
    /// Total attempts (first try included).
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Deadline for a single attempt, not the whole sequence.
    pub timeout: Duration,
}

impl Default for CallExecutorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            timeout: Duration::from_secs(10),
        }
    }
}

impl CallExecutorConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be greater than 0".to_string());
        }
        if self.base_delay.is_zero() {
            return Err("base_delay must be greater than zero".to_string());
        }
        if self.max_delay < self.base_delay {
            return Err("max_delay must be at least base_delay".to_string());
        }
        if self.timeout.is_zero() {
            return Err("timeout must be greater than zero".to_string());
        }
        Ok(())
    }

    /// Backoff after failed attempt `attempt` (1-indexed):
    /// `min(base * 2^(attempt-1), max)`, no jitter.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exp = attempt.saturating_sub(1).min(31);
        let base_ms = self.base_delay.as_millis() as u64;
        let delay_ms = base_ms.saturating_mul(1u64 << exp).min(self.max_delay.as_millis() as u64);
        Duration::from_millis(delay_ms)
    }
}

/// Add uniform jitter in `[0, 0.2 * delay]` to avoid synchronized retry
/// storms.
pub fn apply_jitter(delay: Duration) -> Duration {
    let bound = delay.as_millis() as u64 / 5;
    if bound == 0 {
        return delay;
    }
    let jitter = rand::thread_rng().gen_range(0..=bound);
    delay + Duration::from_millis(jitter)
}

/// Executes outbound operations for one logical dependency.
///
/// Owns that dependency's breaker and rate-limiter state exclusively; other
/// components must not mutate them directly.
pub struct CallExecutor<C: Clock = SystemClock> {
    dependency: String,
    config: CallExecutorConfig,
    breaker: CircuitBreaker<C>,
    limiter: TokenBucket<C>,
}

impl<C: Clock> fmt::Debug for CallExecutor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallExecutor")
            .field("dependency", &self.dependency)
            .field("config", &self.config)
            .field("breaker", &self.breaker.state())
            .finish()
    }
}

impl<C: Clock> CallExecutor<C> {
    /// Assemble an executor from pre-built components.
    pub fn with_components(
        dependency: impl Into<String>,
        config: CallExecutorConfig,
        breaker: CircuitBreaker<C>,
        limiter: TokenBucket<C>,
    ) -> Result<Self, String> {
        config.validate()?;
        Ok(Self { dependency: dependency.into(), config, breaker, limiter })
    }

    /// The dependency this executor guards.
    pub fn dependency(&self) -> &str {
        &self.dependency
    }

    /// Breaker handle, mainly for monitoring.
    pub fn breaker(&self) -> &CircuitBreaker<C> {
        &self.breaker
    }

    /// Execute `operation` with admission control, timeout and retry.
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> Result<T, CallError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            if !self.breaker.can_request() {
                debug!(dependency = %self.dependency, "call rejected by open circuit");
                return Err(CallError::CircuitOpen { dependency: self.dependency.clone() });
            }

            let failure = if !self.limiter.try_acquire() {
                // Denial counts as a downstream failure, matching how the
                // breaker observes every non-success of an admitted call.
                self.breaker.record_failure();
                debug!(dependency = %self.dependency, attempt, "rate limit denied attempt");
                CallError::RateLimited { dependency: self.dependency.clone() }
            } else {
                match tokio::time::timeout(self.config.timeout, operation()).await {
                    Ok(Ok(value)) => {
                        self.breaker.record_success();
                        return Ok(value);
                    }
                    Ok(Err(err)) => {
                        self.breaker.record_failure();
                        debug!(
                            dependency = %self.dependency,
                            attempt,
                            error = %err,
                            "attempt failed"
                        );
                        CallError::Failed { attempts: attempt, source: err }
                    }
                    Err(_) => {
                        self.breaker.record_failure();
                        debug!(
                            dependency = %self.dependency,
                            attempt,
                            timeout_ms = self.config.timeout.as_millis() as u64,
                            "attempt timed out"
                        );
                        CallError::Timeout { timeout: self.config.timeout }
                    }
                }
            };

            if attempt >= self.config.max_attempts {
                warn!(
                    dependency = %self.dependency,
                    attempts = attempt,
                    "retries exhausted"
                );
                return Err(failure);
            }

            let delay = apply_jitter(self.config.backoff_delay(attempt));
            debug!(
                dependency = %self.dependency,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "backing off before retry"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
