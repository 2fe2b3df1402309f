//! HTTP implementations of the collaborator ports.
//!
//! Each collaborator ("documents", "chat") owns one [`CallExecutor`] so
//! breaker and rate-limiter state are isolated per dependency. Transport
//! errors and HTTP 5xx are transient and retried inside the executor; a
//! non-success response that survives the executor (4xx) is a permanent
//! rejection.

pub mod chat;
pub mod documents;

pub use chat::HttpApprovalNotifier;
pub use documents::HttpDocumentStore;

use std::time::Duration;

use minuteflow_common::resilience::{
    CallError, CallExecutor, CallExecutorConfig, CircuitBreaker, CircuitBreakerConfig, TokenBucket,
};
use minuteflow_domain::{DependencyConfig, MinuteflowError, Result, RetryPolicy};
use thiserror::Error;

/// Failure of a single collaborator attempt, as seen by the executor.
#[derive(Debug, Error)]
pub(crate) enum DependencyError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Server { status: u16, body: String },
}

/// Assemble the per-dependency executor from configuration.
pub(crate) fn build_executor(
    name: &str,
    dependency: &DependencyConfig,
    retry: &RetryPolicy,
) -> Result<CallExecutor> {
    dependency.validate().map_err(MinuteflowError::Config)?;

    let breaker = CircuitBreaker::new(CircuitBreakerConfig {
        failure_threshold: dependency.failure_threshold,
        recovery_time: Duration::from_millis(dependency.recovery_time_ms),
        half_open_max_successes: dependency.half_open_max_successes,
    })
    .map_err(MinuteflowError::Config)?;

    let limiter = TokenBucket::new(
        dependency.rate_limit_points,
        Duration::from_secs(dependency.rate_limit_window_secs),
    )
    .map_err(MinuteflowError::Config)?;

    let config = CallExecutorConfig {
        max_attempts: retry.max_attempts,
        base_delay: Duration::from_millis(retry.base_delay_ms),
        max_delay: Duration::from_millis(retry.max_delay_ms),
        timeout: Duration::from_millis(dependency.timeout_ms),
    };

    CallExecutor::with_components(name, config, breaker, limiter).map_err(MinuteflowError::Config)
}

pub(crate) fn map_call_error(err: CallError<DependencyError>) -> MinuteflowError {
    match err {
        CallError::CircuitOpen { dependency } => MinuteflowError::CircuitOpen(dependency),
        CallError::Failed { source, .. } => MinuteflowError::Network(source.to_string()),
        other => MinuteflowError::Network(other.to_string()),
    }
}

/// POST a JSON body through the dependency's executor.
///
/// Transport errors and 5xx responses fail the attempt (retried by the
/// executor); everything else, including 4xx, is returned to the caller for
/// classification.
pub(crate) async fn post_with_resilience(
    client: &reqwest::Client,
    executor: &CallExecutor,
    url: String,
    body: serde_json::Value,
) -> Result<reqwest::Response> {
    executor
        .execute(|| {
            let client = client.clone();
            let url = url.clone();
            let body = body.clone();
            async move {
                let response = client
                    .post(&url)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|err| DependencyError::Transport(err.to_string()))?;

                let status = response.status();
                if status.is_server_error() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(DependencyError::Server { status: status.as_u16(), body });
                }
                Ok(response)
            }
        })
        .await
        .map_err(map_call_error)
}

pub(crate) fn build_http_client(dependency: &DependencyConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_millis(dependency.timeout_ms))
        .build()
        .map_err(|err| MinuteflowError::Network(err.to_string()))
}
