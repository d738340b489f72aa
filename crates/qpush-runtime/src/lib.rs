//! # qpush runtime
//!
//! Queue providers behind one contract: publish, receive, delete.
//!
//! - A **file** provider that keeps every message as a JSON file in a sharded
//!   directory and uses advisory file locks to hand each message to a single
//!   receiver at a time. It needs no broker and suits development, tests and
//!   low-volume single-host deployments.
//! - A **pre-provisioned AWS** provider that translates the same operations
//!   into SQS and SNS calls on a host-supplied [`QueueBackend`].
//!
//! Delivery is at-least-once for both. A [`MessagePipeline`] runs received
//! messages through handlers and consumes them only when all handlers succeed.
//!
//! ## Module Organization
//!
//! - [`error`] - Error types for all queue operations
//! - [`message`] - Messages, identifiers and metadata
//! - [`options`] - Queue options and per-call overrides
//! - [`provider`] - Provider types and configuration
//! - [`client`] - The provider contract and provider factory
//! - [`providers`] - File and AWS provider implementations
//! - [`pipeline`] - Handler pipeline over a provider
//! - [`logging`] - Log sink used by providers

pub mod client;
pub mod error;
pub mod logging;
pub mod message;
pub mod options;
pub mod pipeline;
pub mod provider;
pub mod providers;

// Re-export commonly used types at crate root for convenience
pub use client::{ProviderFactory, QueueProvider};
pub use error::{ConfigurationError, QueueError, ValidationError};
pub use logging::{LogContext, LogSink, RecordingLogSink, TracingLogSink};
pub use message::{Message, MessageEvent, MessageId, MessageMetadata, QueueName};
pub use options::{OptionOverrides, ProviderOptions};
pub use pipeline::{DispatchOutcome, HandlerError, MessageHandler, MessagePipeline, PollReport};
pub use provider::{AwsProviderConfig, FileProviderConfig, ProviderConfig, ProviderType};
pub use providers::{
    BackendError, CleanupPolicy, FileProvider, LockTable, PreconfiguredAwsProvider, QueueBackend,
};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
