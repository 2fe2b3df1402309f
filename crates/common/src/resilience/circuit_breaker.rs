//! Circuit breaker for failure isolation per downstream dependency.
//!
//! State machine: CLOSED counts consecutive failures and trips to OPEN at
//! `failure_threshold`, scheduling `next_attempt_at`. OPEN rejects everything
//! until that instant, then admits callers by moving to HALF_OPEN. HALF_OPEN
//! closes after `half_open_max_successes` consecutive probe successes; a
//! single probe failure reopens immediately.
//!
//! Rejected requests never reach the network and are not counted as
//! downstream failures.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests flow normally.
    Closed,
    /// Requests are rejected until the recovery window elapses.
    Open,
    /// Trial probes are being admitted.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Configuration for circuit breaker behaviour
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit.
    pub failure_threshold: u64,
    /// How long the circuit stays open before probing.
    pub recovery_time: Duration,
    /// Consecutive probe successes needed to close from half-open.
    pub half_open_max_successes: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_time: Duration::from_secs(30),
            half_open_max_successes: 3,
        }
    }
}

impl CircuitBreakerConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err("failure_threshold must be greater than 0".to_string());
        }
        if self.half_open_max_successes == 0 {
            return Err("half_open_max_successes must be greater than 0".to_string());
        }
        if self.recovery_time.is_zero() {
            return Err("recovery_time must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Snapshot of breaker internals for monitoring.
#[derive(Debug, Clone)]
pub struct CircuitBreakerMetrics {
    pub state: CircuitState,
    pub consecutive_failures: u64,
    pub half_open_successes: u64,
    pub next_attempt_at: Option<Instant>,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u64,
    half_open_successes: u64,
    next_attempt_at: Option<Instant>,
}

/// Per-dependency circuit breaker.
///
/// Cloning shares state, so one breaker instance can be handed to every
/// call site for the same dependency.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    config: CircuitBreakerConfig,
    state: Arc<Mutex<BreakerState>>,
    clock: Arc<C>,
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

impl<C: Clock> Clone for CircuitBreaker<C> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            state: Arc::clone(&self.state),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl CircuitBreaker<SystemClock> {
    /// Create a breaker using the system clock.
    pub fn new(config: CircuitBreakerConfig) -> Result<Self, String> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a breaker with a custom clock (useful for testing).
    pub fn with_clock(config: CircuitBreakerConfig, clock: C) -> Result<Self, String> {
        config.validate()?;

        Ok(Self {
            config,
            state: Arc::new(Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                half_open_successes: 0,
                next_attempt_at: None,
            })),
            clock: Arc::new(clock),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("circuit breaker state lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Whether a request may proceed right now.
    ///
    /// An OPEN circuit whose recovery window has elapsed transitions to
    /// HALF_OPEN here, admitting the caller as a probe.
    pub fn can_request(&self) -> bool {
        let mut state = self.lock();

        match state.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let now = self.clock.now();
                match state.next_attempt_at {
                    Some(at) if now >= at => {
                        state.state = CircuitState::HalfOpen;
                        state.half_open_successes = 0;
                        debug!("circuit breaker transitioning OPEN -> HALF_OPEN");
                        true
                    }
                    _ => false,
                }
            }
        }
    }

    /// Record a successful downstream call.
    pub fn record_success(&self) {
        let mut state = self.lock();

        match state.state {
            CircuitState::HalfOpen => {
                state.half_open_successes += 1;
                if state.half_open_successes >= self.config.half_open_max_successes {
                    state.state = CircuitState::Closed;
                    state.consecutive_failures = 0;
                    state.half_open_successes = 0;
                    state.next_attempt_at = None;
                    info!("circuit breaker closed after successful probes");
                }
            }
            CircuitState::Closed | CircuitState::Open => {
                state.consecutive_failures = 0;
            }
        }
    }

    /// Record a failed downstream call.
    pub fn record_failure(&self) {
        let mut state = self.lock();
        let now = self.clock.now();

        match state.state {
            CircuitState::Closed => {
                state.consecutive_failures += 1;
                if state.consecutive_failures >= self.config.failure_threshold {
                    state.state = CircuitState::Open;
                    state.next_attempt_at = Some(now + self.config.recovery_time);
                    state.consecutive_failures = 0;
                    warn!(
                        recovery_ms = self.config.recovery_time.as_millis() as u64,
                        "circuit breaker opened after reaching failure threshold"
                    );
                }
            }
            CircuitState::HalfOpen => {
                // A single probe failure reopens the circuit.
                state.state = CircuitState::Open;
                state.next_attempt_at = Some(now + self.config.recovery_time);
                state.consecutive_failures = 0;
                state.half_open_successes = 0;
                warn!("circuit breaker reopened after half-open probe failure");
            }
            CircuitState::Open => {}
        }
    }

    /// Current state.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Snapshot of internals for monitoring.
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let state = self.lock();
        CircuitBreakerMetrics {
            state: state.state,
            consecutive_failures: state.consecutive_failures,
            half_open_successes: state.half_open_successes,
            next_attempt_at: state.next_attempt_at,
        }
    }

    /// Reset to CLOSED, clearing all counters.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.state = CircuitState::Closed;
        state.consecutive_failures = 0;
        state.half_open_successes = 0;
        state.next_attempt_at = None;
        info!("circuit breaker manually reset to closed state");
    }
}

impl Default for CircuitBreaker<SystemClock> {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default()).unwrap_or_else(|_| {
            // Default config is statically valid.
            unreachable!("default circuit breaker config must validate")
        })
    }
}
