//! Provider contract and construction of providers from configuration.

use crate::error::{ConfigurationError, QueueError};
use crate::logging::LogSink;
use crate::message::{Message, MessageEvent, MessageId, QueueName};
use crate::options::OptionOverrides;
use crate::provider::{ProviderConfig, ProviderType};
use crate::providers::{FileProvider, PreconfiguredAwsProvider, QueueBackend};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

/// Interface implemented by every queue provider (file, AWS, etc.).
///
/// A provider is bound to a single named queue. Receiving a message puts it in
/// flight; it stays hidden from other receivers until it is deleted, or until
/// the provider's own redelivery rules make it visible again.
#[async_trait]
pub trait QueueProvider: Send + Sync {
    /// Short provider name, e.g. `"File"` or `"AWSP"`
    fn provider_name(&self) -> &'static str {
        self.provider_type().name()
    }

    /// Get provider type
    fn provider_type(&self) -> ProviderType;

    /// Name of the queue this provider serves
    fn queue_name(&self) -> &QueueName;

    /// Provision the queue; true when it is ready for use
    async fn create(&self) -> Result<bool, QueueError>;

    /// Remove the queue and everything in it; true when it no longer exists
    async fn destroy(&self) -> Result<bool, QueueError>;

    /// Enqueue a message body and return its id
    async fn publish(
        &self,
        body: &Value,
        overrides: &OptionOverrides,
    ) -> Result<MessageId, QueueError>;

    /// Receive up to `messages_to_receive` messages, putting each in flight
    async fn receive(&self, overrides: &OptionOverrides) -> Result<Vec<Message>, QueueError>;

    /// Consume an in-flight message.
    ///
    /// Returns false, rather than an error, when the id is not held by this
    /// provider (already deleted, never received, or claimed elsewhere).
    async fn delete(&self, id: &str) -> Result<bool, QueueError>;

    /// Reap expired messages and return how many were removed
    async fn cleanup(&self) -> Result<usize, QueueError> {
        Ok(0)
    }

    /// Post-processing hook run once every handler accepted `event`
    async fn on_message_received(&self, event: &MessageEvent) -> Result<(), QueueError>;
}

/// Builds providers from configuration
pub struct ProviderFactory;

impl ProviderFactory {
    /// Create a provider for `name`.
    ///
    /// Only the file provider can be built from configuration alone. The AWS
    /// provider needs a backend client; use [`ProviderFactory::create_with_backend`].
    pub fn create(
        name: QueueName,
        config: &ProviderConfig,
        log_sink: Arc<dyn LogSink>,
    ) -> Result<Arc<dyn QueueProvider>, QueueError> {
        config.validate()?;

        match config {
            ProviderConfig::File(file_config) => Ok(Arc::new(
                FileProvider::new(name, file_config.clone())?.with_log_sink(log_sink),
            )),
            ProviderConfig::AwsPreconfigured(_) => {
                Err(QueueError::Configuration(ConfigurationError::UnsupportedProvider {
                    provider: ProviderType::AwsPreconfigured.name().to_string(),
                    message: "no AWS backend client was supplied".to_string(),
                }))
            }
        }
    }

    /// Create a provider, routing remote configurations through `backend`
    pub fn create_with_backend(
        name: QueueName,
        config: &ProviderConfig,
        backend: Arc<dyn QueueBackend>,
        log_sink: Arc<dyn LogSink>,
    ) -> Result<Arc<dyn QueueProvider>, QueueError> {
        config.validate()?;

        match config {
            ProviderConfig::AwsPreconfigured(aws_config) => Ok(Arc::new(
                PreconfiguredAwsProvider::new(name, aws_config.clone(), backend)?
                    .with_log_sink(log_sink),
            )),
            ProviderConfig::File(_) => Self::create(name, config, log_sink),
        }
    }
}
