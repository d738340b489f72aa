//! Pre-provisioned AWS SQS/SNS provider.
//!
//! The provider never creates queues, topics or subscriptions; everything is
//! expected to exist already, which suits restrictive IAM roles. It only
//! translates queue operations into requests for a [`QueueBackend`], the
//! abstract SQS/SNS client supplied by the host.
//!
//! ## Publishing
//!
//! - With a `topic_arn` the message is published to SNS using the JSON
//!   message structure, so SQS subscribers receive the body while HTTP(S)
//!   subscribers only receive the queue name as a notification.
//! - Otherwise, with a `queue_url`, the message is sent straight to SQS with
//!   `DelaySeconds` set from `message_delay`.
//!
//! ## Receiving
//!
//! Messages always come from the SQS queue. A body that is an SNS
//! notification (a JSON object with a `Message` field) is unwrapped to the
//! original message. The receipt handle is kept in the message metadata and is
//! the id that `delete` expects.

use crate::client::QueueProvider;
use crate::error::{ConfigurationError, QueueError, ValidationError};
use crate::logging::{LogContext, LogSink, TracingLogSink};
use crate::message::{Message, MessageEvent, MessageId, MessageMetadata, QueueName};
use crate::options::{OptionOverrides, ProviderOptions};
use crate::provider::{AwsProviderConfig, ProviderType};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{instrument, warn};

#[cfg(test)]
#[path = "aws_tests.rs"]
mod tests;

/// Metadata key holding the SQS receipt handle
pub const RECEIPT_HANDLE: &str = "ReceiptHandle";

/// Metadata key holding the MD5 digest SQS computed over the body
pub const MD5_OF_BODY: &str = "MD5OfBody";

// ============================================================================
// Error Types
// ============================================================================

/// Errors reported by a [`QueueBackend`]
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    #[error("Topic not found: {0}")]
    TopicNotFound(String),

    #[error("Invalid receipt handle: {0}")]
    InvalidReceipt(String),
}

impl BackendError {
    /// Network and service failures are worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Authentication(_) => false,
            Self::NetworkError(_) => true,
            Self::ServiceError(_) => true, // Most SQS errors are throttling
            Self::QueueNotFound(_) => false,
            Self::TopicNotFound(_) => false,
            Self::InvalidReceipt(_) => false,
        }
    }

    /// Map backend error to QueueError, keeping its transience
    pub fn to_queue_error(self) -> QueueError {
        QueueError::Backend {
            provider: ProviderType::AwsPreconfigured.name().to_string(),
            message: self.to_string(),
            transient: self.is_transient(),
        }
    }
}

// ============================================================================
// Backend Requests
// ============================================================================

/// SQS `SendMessage` parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessageRequest {
    pub queue_url: String,
    pub message_body: String,
    pub delay_seconds: u64,
}

/// SNS `Publish` parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub topic_arn: String,
    pub subject: String,
    pub message: String,
    pub message_structure: String,
}

/// SQS `ReceiveMessage` parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveMessagesRequest {
    pub queue_url: String,
    pub max_number_of_messages: u32,
    pub wait_time_seconds: u32,
}

/// SQS `DeleteMessage` parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteMessageRequest {
    pub queue_url: String,
    pub receipt_handle: String,
}

/// A message as returned by SQS `ReceiveMessage`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendMessage {
    pub message_id: String,
    pub receipt_handle: String,
    pub md5_of_body: String,
    pub body: String,
}

/// The SQS and SNS calls the provider needs.
///
/// Implementations wrap a real AWS client; they return the service's message
/// id for sends and publishes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueueBackend: Send + Sync {
    async fn send_message(&self, request: SendMessageRequest) -> Result<String, BackendError>;

    async fn publish_to_topic(&self, request: PublishRequest) -> Result<String, BackendError>;

    async fn receive_messages(
        &self,
        request: ReceiveMessagesRequest,
    ) -> Result<Vec<BackendMessage>, BackendError>;

    async fn delete_message(&self, request: DeleteMessageRequest) -> Result<(), BackendError>;
}

// ============================================================================
// Provider
// ============================================================================

/// Provider for an SQS queue and/or SNS topic that already exist
pub struct PreconfiguredAwsProvider {
    name: QueueName,
    config: AwsProviderConfig,
    backend: Arc<dyn QueueBackend>,
    log_sink: Arc<dyn LogSink>,
}

impl PreconfiguredAwsProvider {
    pub fn new(
        name: QueueName,
        config: AwsProviderConfig,
        backend: Arc<dyn QueueBackend>,
    ) -> Result<Self, QueueError> {
        config.validate()?;

        Ok(Self {
            name,
            config,
            backend,
            log_sink: Arc::new(TracingLogSink),
        })
    }

    pub fn with_log_sink(self, log_sink: Arc<dyn LogSink>) -> Self {
        Self { log_sink, ..self }
    }

    pub fn config(&self) -> &AwsProviderConfig {
        &self.config
    }

    fn log(&self, status: u16, message: &str, context: LogContext) {
        if self.config.options.logging_enabled {
            self.log_sink.log(status, message, &context);
        }
    }

    fn queue_url(&self) -> Result<&str, QueueError> {
        self.config.queue_url.as_deref().ok_or_else(|| {
            QueueError::Configuration(ConfigurationError::Missing {
                key: "queue_url".to_string(),
            })
        })
    }

    fn merged_options(&self, overrides: &OptionOverrides) -> Result<ProviderOptions, QueueError> {
        let options = overrides.merge(&self.config.options)?;

        let max = ProviderType::AwsPreconfigured.max_batch_size();
        if options.messages_to_receive > max {
            return Err(ValidationError::OutOfRange {
                field: "messages_to_receive".to_string(),
                message: format!("SQS returns at most {} messages per call", max),
            }
            .into());
        }

        Ok(options)
    }

    async fn publish_to_topic(&self, topic_arn: &str, body: &Value) -> Result<MessageId, QueueError> {
        let started = Instant::now();
        let name = self.name.as_str();

        let envelope = json!({
            "default": name,
            "sqs": serde_json::to_string(body)?,
            "http": name,
            "https": name,
        });

        let request = PublishRequest {
            topic_arn: topic_arn.to_string(),
            subject: name.to_string(),
            message: serde_json::to_string(&envelope)?,
            message_structure: "json".to_string(),
        };

        let message_id = self
            .backend
            .publish_to_topic(request)
            .await
            .map_err(BackendError::to_queue_error)?;

        self.log(
            200,
            "Message published to SNS",
            LogContext::new()
                .with("TopicArn", topic_arn)
                .with("MessageId", message_id.as_str())
                .with("publish_time", started.elapsed().as_secs_f64()),
        );

        Ok(message_id.parse()?)
    }

    async fn publish_to_queue(
        &self,
        queue_url: &str,
        body: &Value,
        overrides: &OptionOverrides,
    ) -> Result<MessageId, QueueError> {
        let options = self.merged_options(overrides)?;

        let request = SendMessageRequest {
            queue_url: queue_url.to_string(),
            message_body: serde_json::to_string(body)?,
            delay_seconds: options.message_delay,
        };

        let message_id = self
            .backend
            .send_message(request)
            .await
            .map_err(BackendError::to_queue_error)?;

        self.log(
            200,
            "Message published to SQS",
            LogContext::new()
                .with("QueueUrl", queue_url)
                .with("MessageId", message_id.as_str()),
        );

        Ok(message_id.parse()?)
    }

    fn convert_message(&self, received: BackendMessage) -> Result<Message, QueueError> {
        let body = decode_body(&received.message_id, &received.body)?;
        let metadata = MessageMetadata::new()
            .with(RECEIPT_HANDLE, received.receipt_handle)
            .with(MD5_OF_BODY, received.md5_of_body);

        Ok(Message::new(received.message_id.parse()?, body, metadata))
    }
}

/// Decode an SQS body, unwrapping an SNS notification when present
fn decode_body(message_id: &str, raw: &str) -> Result<Value, QueueError> {
    let decode = |text: &str| {
        serde_json::from_str::<Value>(text).map_err(|source| QueueError::Decode {
            id: message_id.to_string(),
            source,
        })
    };

    let mut body = decode(raw)?;
    if let Some(inner) = body.get_mut("Message").map(Value::take) {
        body = match inner {
            Value::String(text) => decode(&text)?,
            other => other,
        };
    }

    Ok(body)
}

impl std::fmt::Debug for PreconfiguredAwsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreconfiguredAwsProvider")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait]
impl QueueProvider for PreconfiguredAwsProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::AwsPreconfigured
    }

    fn queue_name(&self) -> &QueueName {
        &self.name
    }

    /// Queues and topics are provisioned outside this provider
    async fn create(&self) -> Result<bool, QueueError> {
        Ok(true)
    }

    async fn destroy(&self) -> Result<bool, QueueError> {
        Ok(true)
    }

    #[instrument(skip_all, fields(queue = %self.name))]
    async fn publish(
        &self,
        body: &Value,
        overrides: &OptionOverrides,
    ) -> Result<MessageId, QueueError> {
        if let Some(topic_arn) = self.config.topic_arn.as_deref() {
            return self.publish_to_topic(topic_arn, body).await;
        }
        if let Some(queue_url) = self.config.queue_url.as_deref() {
            return self.publish_to_queue(queue_url, body, overrides).await;
        }

        Err(QueueError::Configuration(ConfigurationError::Invalid {
            message: "both \"topic_arn\" and \"queue_url\" are undefined".to_string(),
        }))
    }

    #[instrument(skip_all, fields(queue = %self.name))]
    async fn receive(&self, overrides: &OptionOverrides) -> Result<Vec<Message>, QueueError> {
        let queue_url = self.queue_url()?;
        let options = self.merged_options(overrides)?;

        let request = ReceiveMessagesRequest {
            queue_url: queue_url.to_string(),
            max_number_of_messages: options.messages_to_receive,
            wait_time_seconds: if self.provider_type().supports_long_polling() {
                options.receive_wait_time
            } else {
                0
            },
        };

        let received = self
            .backend
            .receive_messages(request)
            .await
            .map_err(BackendError::to_queue_error)?;

        let mut messages = Vec::with_capacity(received.len());
        for backend_message in received {
            let message_id = backend_message.message_id.clone();
            match self.convert_message(backend_message) {
                Ok(message) => {
                    self.log(
                        200,
                        "Message fetched from SQS Queue",
                        LogContext::new().with("MessageId", message_id.as_str()),
                    );
                    messages.push(message);
                }
                Err(e) => {
                    // Left in flight; SQS makes it visible again after the
                    // visibility timeout.
                    warn!(message_id = %message_id, error = %e, "Skipping undecodable SQS message");
                    self.log(
                        500,
                        "Message could not be decoded",
                        LogContext::new()
                            .with("MessageId", message_id.as_str())
                            .with("error", e.to_string()),
                    );
                }
            }
        }

        Ok(messages)
    }

    /// Delete by receipt handle
    #[instrument(skip_all, fields(queue = %self.name))]
    async fn delete(&self, id: &str) -> Result<bool, QueueError> {
        let queue_url = self.queue_url()?;

        self.backend
            .delete_message(DeleteMessageRequest {
                queue_url: queue_url.to_string(),
                receipt_handle: id.to_string(),
            })
            .await
            .map_err(BackendError::to_queue_error)?;

        self.log(
            200,
            "Message deleted from SQS Queue",
            LogContext::new()
                .with("QueueUrl", queue_url)
                .with("ReceiptHandle", id),
        );

        Ok(true)
    }

    async fn on_message_received(&self, event: &MessageEvent) -> Result<(), QueueError> {
        let receipt_handle = event
            .message()
            .metadata()
            .get(RECEIPT_HANDLE)
            .ok_or_else(|| ValidationError::Required {
                field: RECEIPT_HANDLE.to_string(),
            })?;

        self.delete(receipt_handle).await?;
        Ok(())
    }
}
