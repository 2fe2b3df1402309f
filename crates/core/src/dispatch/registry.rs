//! Typed topic handler registry.
//!
//! Replaces string-keyed dynamic handler lookup with a closed mapping from
//! [`Topic`] variants to handler implementations. `verify_complete` runs at
//! startup so a topic the outbox store can produce without a registered
//! handler is a boot failure, not a runtime surprise.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use minuteflow_common::resilience::CallError;
use minuteflow_domain::{MinuteflowError, OutboxMessage, Topic};
use thiserror::Error;

/// Failure classification produced by topic handlers.
///
/// The dispatcher chooses the outbox transition from this: transient goes
/// through the FAILED/DEAD_LETTER backoff path, permanent dead-letters
/// immediately, and circuit-open counts an attempt without a downstream
/// failure having occurred.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("transient failure: {0}")]
    Transient(String),

    #[error("permanent failure: {0}")]
    Permanent(String),

    #[error("circuit open for dependency '{0}'")]
    CircuitOpen(String),
}

impl From<MinuteflowError> for HandlerError {
    fn from(err: MinuteflowError) -> Self {
        match err {
            MinuteflowError::CircuitOpen(dep) => HandlerError::CircuitOpen(dep),
            MinuteflowError::InvalidInput(msg) | MinuteflowError::NotFound(msg) => {
                HandlerError::Permanent(msg)
            }
            other => HandlerError::Transient(other.to_string()),
        }
    }
}

impl<E> From<CallError<E>> for HandlerError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: CallError<E>) -> Self {
        match err {
            CallError::CircuitOpen { dependency } => HandlerError::CircuitOpen(dependency),
            CallError::RateLimited { .. } | CallError::Timeout { .. } => {
                HandlerError::Transient(err.to_string())
            }
            CallError::Failed { ref source, .. } => HandlerError::Transient(source.to_string()),
        }
    }
}

/// Trait for performing one topic's side effect
#[async_trait]
pub trait TopicHandler: Send + Sync {
    /// The topic this handler serves.
    fn topic(&self) -> Topic;

    /// Perform the side effect described by the record's payload.
    async fn handle(&self, message: &OutboxMessage) -> Result<(), HandlerError>;
}

/// Closed mapping from topics to their handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<Topic, Arc<dyn TopicHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self { handlers: HashMap::new() }
    }

    /// Register a handler under its own topic, replacing any previous one.
    pub fn register(mut self, handler: Arc<dyn TopicHandler>) -> Self {
        self.handlers.insert(handler.topic(), handler);
        self
    }

    /// Look up the handler for a topic.
    pub fn handler_for(&self, topic: Topic) -> Option<Arc<dyn TopicHandler>> {
        self.handlers.get(&topic).cloned()
    }

    /// Fail fast when any producible topic lacks a handler.
    pub fn verify_complete(&self) -> minuteflow_domain::Result<()> {
        let missing: Vec<String> = Topic::ALL
            .iter()
            .filter(|topic| !self.handlers.contains_key(*topic))
            .map(ToString::to_string)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(MinuteflowError::Config(format!(
                "missing topic handlers: {}",
                missing.join(", ")
            )))
        }
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry").field("topics", &self.handlers.len()).finish()
    }
}
