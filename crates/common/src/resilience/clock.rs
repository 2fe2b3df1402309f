//! Time abstraction for deterministic testing.
//!
//! Breakers and rate limiters take a [`Clock`] parameter so tests can drive
//! recovery windows and refills without sleeping.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Monotonic time source.
pub trait Clock: Send + Sync + 'static {
    /// Current instant.
    fn now(&self) -> Instant;
}

/// Real system clock for production use.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Mock clock for deterministic tests.
///
/// Cloned handles share elapsed time, so a test can advance the clock it
/// kept while the component under test reads the same instant.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self { start: Instant::now(), elapsed: Arc::new(Mutex::new(Duration::ZERO)) }
    }

    /// Advance the clock without sleeping.
    pub fn advance(&self, duration: Duration) {
        if let Ok(mut elapsed) = self.elapsed.lock() {
            *elapsed += duration;
        }
    }

    /// Convenience wrapper for millisecond advances.
    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed.lock().map(|e| *e).unwrap_or(Duration::ZERO)
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        let elapsed = self.elapsed.lock().map(|e| *e).unwrap_or(Duration::ZERO);
        self.start + elapsed
    }
}
