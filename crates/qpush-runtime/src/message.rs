//! Messages and the identifiers that name queues and messages.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;
use ulid::Ulid;

// ============================================================================
// Core Domain Identifiers
// ============================================================================

/// Queue name: 1 to 80 characters from `[A-Za-z0-9_-]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueueName(String);

impl QueueName {
    /// Validate and wrap a queue name
    pub fn new(name: String) -> Result<Self, ValidationError> {
        // Validate length (SQS allows at most 80 characters)
        if name.is_empty() || name.len() > 80 {
            return Err(ValidationError::OutOfRange {
                field: "queue_name".to_string(),
                message: "must be 1-80 characters".to_string(),
            });
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ValidationError::InvalidFormat {
                field: "queue_name".to_string(),
                message: "use letters, digits, '-' or '_'".to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Get queue name as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

/// Identifier of a queued message.
///
/// Generated identifiers are ULIDs: a millisecond creation timestamp followed by
/// random bits, so two messages published in the same instant still differ.
/// Identifiers handed out by a remote backend are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Generate a new time-ordered message ID
    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }

    /// Get message ID as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ValidationError::Required {
                field: "message_id".to_string(),
            });
        }

        Ok(Self(s.to_string()))
    }
}

// ============================================================================
// Message Types
// ============================================================================

/// Provider specific key/value data attached to a received message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageMetadata(BTreeMap<String, String>);

impl MessageMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A message delivered by a provider.
///
/// Messages are immutable values; a provider creates one per receive attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    body: Value,
    metadata: MessageMetadata,
}

impl Message {
    /// Create new message
    pub fn new(id: MessageId, body: Value, metadata: MessageMetadata) -> Self {
        Self { id, body, metadata }
    }

    pub fn id(&self) -> &MessageId {
        &self.id
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn metadata(&self) -> &MessageMetadata {
        &self.metadata
    }
}

/// A received message on its way through the consumer pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    queue_name: QueueName,
    message: Message,
}

impl MessageEvent {
    pub fn new(queue_name: QueueName, message: Message) -> Self {
        Self {
            queue_name,
            message,
        }
    }

    pub fn queue_name(&self) -> &QueueName {
        &self.queue_name
    }

    pub fn message(&self) -> &Message {
        &self.message
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
