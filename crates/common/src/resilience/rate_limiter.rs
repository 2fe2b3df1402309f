//! Token-bucket rate limiter with fixed-window refill.
//!
//! The bucket holds `points` tokens and is refilled to capacity whenever a
//! full `window` has elapsed since the window started. Exhaustion is a
//! transient condition; the call executor routes it through the normal
//! backoff path rather than failing the record permanently.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::clock::{Clock, SystemClock};

/// Configuration for the token bucket.
#[derive(Debug, Clone)]
pub struct TokenBucketConfig {
    /// Tokens available per window.
    pub points: u64,
    /// Window after which the bucket refills to capacity.
    pub window: Duration,
}

impl Default for TokenBucketConfig {
    fn default() -> Self {
        Self { points: 10, window: Duration::from_secs(1) }
    }
}

impl TokenBucketConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.points == 0 {
            return Err("points must be greater than 0".to_string());
        }
        if self.window.is_zero() {
            return Err("window must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Fixed-window token bucket.
///
/// Cloning shares state so one limiter guards all call sites for a
/// dependency.
pub struct TokenBucket<C: Clock = SystemClock> {
    config: TokenBucketConfig,
    tokens: Arc<AtomicU64>,
    window_started: Arc<RwLock<Instant>>,
    clock: Arc<C>,
}

impl TokenBucket<SystemClock> {
    /// Create a bucket using the system clock.
    pub fn new(points: u64, window: Duration) -> Result<Self, String> {
        Self::with_clock(points, window, SystemClock)
    }
}

impl<C: Clock> TokenBucket<C> {
    /// Create a bucket with a custom clock (useful for testing).
    pub fn with_clock(points: u64, window: Duration, clock: C) -> Result<Self, String> {
        let config = TokenBucketConfig { points, window };
        config.validate()?;

        Ok(Self {
            tokens: Arc::new(AtomicU64::new(config.points)),
            window_started: Arc::new(RwLock::new(clock.now())),
            clock: Arc::new(clock),
            config,
        })
    }

    /// Refill to capacity when the current window has elapsed.
    fn refill(&self) {
        let now = self.clock.now();

        let window_started = match self.window_started.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn!("token bucket window lock poisoned, recovering");
                *poisoned.into_inner()
            }
        };

        if now.duration_since(window_started) >= self.config.window {
            self.tokens.store(self.config.points, Ordering::Release);
            if let Ok(mut guard) = self.window_started.write() {
                *guard = now;
            }
            debug!(points = self.config.points, "token bucket window refilled");
        }
    }

    /// Try to take one token. Returns `false` when the window budget is
    /// spent.
    pub fn try_acquire(&self) -> bool {
        self.refill();

        let mut current = self.tokens.load(Ordering::Acquire);
        loop {
            if current == 0 {
                debug!("rate limit window exhausted");
                return false;
            }

            match self.tokens.compare_exchange_weak(
                current,
                current - 1,
                Ordering::Release,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Tokens remaining in the current window.
    pub fn available(&self) -> u64 {
        self.refill();
        self.tokens.load(Ordering::Acquire)
    }

    /// Reset to a full bucket and a fresh window.
    pub fn reset(&self) {
        self.tokens.store(self.config.points, Ordering::Release);
        if let Ok(mut guard) = self.window_started.write() {
            *guard = self.clock.now();
        }
    }
}

impl<C: Clock> Clone for TokenBucket<C> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            tokens: Arc::clone(&self.tokens),
            window_started: Arc::clone(&self.window_started),
            clock: Arc::clone(&self.clock),
        }
    }
}
