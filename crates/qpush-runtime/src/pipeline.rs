//! Message processing pipeline.
//!
//! A [`MessagePipeline`] receives messages from one provider and runs each
//! through an ordered list of [`MessageHandler`]s. Only when every handler
//! accepts a message does the pipeline call the provider's
//! `on_message_received` hook, which consumes it. A rejected message is left in
//! flight; the provider's redelivery rules bring it back later.

use crate::client::QueueProvider;
use crate::error::QueueError;
use crate::message::{Message, MessageEvent};
use crate::options::OptionOverrides;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;

/// Errors returned by message handlers
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("Message rejected: {reason}")]
    Rejected { reason: String },

    #[error("Handler failed: {message}")]
    Failed { message: String },
}

impl HandlerError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// One processing step for received messages
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Process the message; an error stops the pipeline for this message
    async fn handle(&self, event: &MessageEvent) -> Result<(), HandlerError>;
}

/// Result of dispatching one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Every handler succeeded and the provider consumed the message
    Acknowledged,
    /// A handler failed; the message stays in flight
    Rejected { handler: String, reason: String },
}

/// Counters for one `poll_once` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    pub received: usize,
    pub acknowledged: usize,
    pub failed: usize,
}

/// Runs received messages through handlers and acknowledges successes
pub struct MessagePipeline {
    provider: Arc<dyn QueueProvider>,
    handlers: Vec<Arc<dyn MessageHandler>>,
    overrides: OptionOverrides,
}

impl MessagePipeline {
    pub fn new(provider: Arc<dyn QueueProvider>) -> Self {
        Self {
            provider,
            handlers: Vec::new(),
            overrides: OptionOverrides::default(),
        }
    }

    /// Append a handler; handlers run in the order they were added
    pub fn with_handler(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Options applied to every receive made by `poll_once`
    pub fn with_overrides(mut self, overrides: OptionOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn provider(&self) -> &Arc<dyn QueueProvider> {
        &self.provider
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Run `message` through every handler, then acknowledge it.
    ///
    /// Handler failures are reported as [`DispatchOutcome::Rejected`], not as
    /// errors. Errors only come from the provider's acknowledgement.
    pub async fn dispatch(&self, message: Message) -> Result<DispatchOutcome, QueueError> {
        let event = MessageEvent::new(self.provider.queue_name().clone(), message);

        for handler in &self.handlers {
            if let Err(e) = handler.handle(&event).await {
                warn!(
                    queue = %event.queue_name(),
                    message_id = %event.message().id(),
                    handler = handler.name(),
                    error = %e,
                    "Handler rejected message, leaving it in flight"
                );
                return Ok(DispatchOutcome::Rejected {
                    handler: handler.name().to_string(),
                    reason: e.to_string(),
                });
            }
        }

        self.provider.on_message_received(&event).await?;
        debug!(message_id = %event.message().id(), "Message acknowledged");
        Ok(DispatchOutcome::Acknowledged)
    }

    /// Receive one batch and dispatch every message in it.
    ///
    /// A failing acknowledgement is logged and counted; it does not stop the
    /// rest of the batch.
    #[instrument(skip(self), fields(queue = %self.provider.queue_name()))]
    pub async fn poll_once(&self) -> Result<PollReport, QueueError> {
        let messages = self.provider.receive(&self.overrides).await?;
        let mut report = PollReport {
            received: messages.len(),
            ..PollReport::default()
        };

        for message in messages {
            let message_id = message.id().clone();
            match self.dispatch(message).await {
                Ok(DispatchOutcome::Acknowledged) => report.acknowledged += 1,
                Ok(DispatchOutcome::Rejected { .. }) => report.failed += 1,
                Err(e) => {
                    error!(message_id = %message_id, error = %e, "Failed to acknowledge message");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}

impl std::fmt::Debug for MessagePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagePipeline")
            .field("queue", self.provider.queue_name())
            .field("provider", &self.provider.provider_name())
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
