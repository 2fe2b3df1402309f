//! Typed topic dispatch

pub mod registry;

pub use registry::{HandlerError, HandlerRegistry, TopicHandler};
