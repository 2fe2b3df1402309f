//! Configuration types.
//!
//! Loaded once at process start (see `minuteflow-infra::config::loader`) and
//! passed by reference into every component constructor; nothing reads
//! ambient global state.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry/backoff bounds shared by the call executor and the outbox
/// dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retry ceiling before dead-lettering (total attempts, first included).
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 5, base_delay_ms: 500, max_delay_ms: 10_000 }
    }
}

impl RetryPolicy {
    /// Backoff before attempt `attempt + 1`, 1-indexed on the attempt that
    /// just failed: `min(base * 2^(attempt-1), max)`. Jitter is applied by
    /// callers that need it.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exp = attempt.saturating_sub(1).min(31);
        let delay_ms = self.base_delay_ms.saturating_mul(1u64 << exp).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be greater than 0".to_string());
        }
        if self.base_delay_ms == 0 {
            return Err("base_delay_ms must be greater than 0".to_string());
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err("max_delay_ms must be at least base_delay_ms".to_string());
        }
        Ok(())
    }
}

/// Database settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "minuteflow.db".to_string(), pool_size: 4 }
    }
}

/// Outbox dispatch settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Retry ceiling before a record is dead-lettered.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Concurrent dispatches on the outbox queue.
    pub worker_concurrency: usize,
    /// How often the sweeper scans for due Pending/Failed records.
    pub sweep_interval_secs: u64,
    /// Maximum records picked up per sweep.
    pub sweep_batch_size: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
            worker_concurrency: 2,
            sweep_interval_secs: 30,
            sweep_batch_size: 50,
        }
    }
}

impl DispatchConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay_ms: self.base_delay_ms,
            max_delay_ms: self.max_delay_ms,
        }
    }
}

/// Job queue settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Worker poll interval while a queue is idle.
    pub poll_interval_ms: u64,
    /// Queue-level delivery attempts. The outbox record owns retries, so
    /// dispatch workers keep this at 1 and the queue stays a pure delivery
    /// mechanism.
    pub max_attempts: u32,
    /// Delay before a queue-level redelivery (only relevant when
    /// `max_attempts` > 1).
    pub retry_delay_ms: u64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self { poll_interval_ms: 50, max_attempts: 1, retry_delay_ms: 1_000 }
    }
}

/// Per-dependency admission control and timeout settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyConfig {
    pub base_url: String,
    pub failure_threshold: u64,
    pub recovery_time_ms: u64,
    pub half_open_max_successes: u64,
    pub rate_limit_points: u64,
    pub rate_limit_window_secs: u64,
    pub timeout_ms: u64,
}

impl Default for DependencyConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            failure_threshold: 5,
            recovery_time_ms: 30_000,
            half_open_max_successes: 3,
            rate_limit_points: 5,
            rate_limit_window_secs: 1,
            timeout_ms: 10_000,
        }
    }
}

impl DependencyConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err("failure_threshold must be greater than 0".to_string());
        }
        if self.half_open_max_successes == 0 {
            return Err("half_open_max_successes must be greater than 0".to_string());
        }
        if self.rate_limit_points == 0 {
            return Err("rate_limit_points must be greater than 0".to_string());
        }
        if self.rate_limit_window_secs == 0 {
            return Err("rate_limit_window_secs must be greater than 0".to_string());
        }
        if self.timeout_ms == 0 {
            return Err("timeout_ms must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Downstream dependency settings, one section per collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DependencyConfigs {
    pub documents: DependencyConfig,
    pub chat: DependencyConfig,
}

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub dispatch: DispatchConfig,
    pub queue: QueueSettings,
    pub dependencies: DependencyConfigs,
    /// Chat channel receiving approval requests.
    pub approval_channel: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            dispatch: DispatchConfig::default(),
            queue: QueueSettings::default(),
            dependencies: DependencyConfigs {
                documents: DependencyConfig { rate_limit_points: 5, ..Default::default() },
                chat: DependencyConfig { rate_limit_points: 10, ..Default::default() },
            },
            approval_channel: "#alerts".to_string(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), String> {
        if self.database.pool_size == 0 {
            return Err("database.pool_size must be greater than 0".to_string());
        }
        self.dispatch.retry_policy().validate()?;
        if self.dispatch.worker_concurrency == 0 {
            return Err("dispatch.worker_concurrency must be greater than 0".to_string());
        }
        if self.dispatch.sweep_batch_size == 0 {
            return Err("dispatch.sweep_batch_size must be greater than 0".to_string());
        }
        if self.queue.max_attempts == 0 {
            return Err("queue.max_attempts must be greater than 0".to_string());
        }
        self.dependencies.documents.validate().map_err(|e| format!("dependencies.documents: {e}"))?;
        self.dependencies.chat.validate().map_err(|e| format!("dependencies.chat: {e}"))?;
        Ok(())
    }
}
