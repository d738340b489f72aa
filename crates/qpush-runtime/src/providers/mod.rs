//! Queue provider implementations.
//!
//! This module contains the concrete implementations of the `QueueProvider`
//! trait: a local filesystem queue and a pre-provisioned AWS SQS/SNS queue.

pub mod aws;
pub mod file;

pub use aws::{BackendError, BackendMessage, PreconfiguredAwsProvider, QueueBackend};
pub use file::{CleanupPolicy, FileProvider, FileStore, LockTable, VisibilityWindow};
