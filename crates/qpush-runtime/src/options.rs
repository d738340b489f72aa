//! Queue options shared by all providers.
//!
//! Every queue is configured with a [`ProviderOptions`] value. Individual
//! `publish` and `receive` calls may pass [`OptionOverrides`], which are merged
//! over the queue-level options for that call only.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

/// Options recognized by every provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderOptions {
    /// Seconds a new message stays hidden before it can be received (0 disables)
    pub message_delay: u64,
    /// Seconds after which an unconsumed message is expired (0 disables expiry)
    pub message_expiration: u64,
    /// Maximum number of messages returned by one receive call
    pub messages_to_receive: u32,
    /// Long-poll hint in seconds; ignored by the file provider
    pub receive_wait_time: u32,
    /// Forward provider activity to the log sink
    pub logging_enabled: bool,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            message_delay: 0,
            message_expiration: 86_400, // 1 day
            messages_to_receive: 1,
            receive_wait_time: 3,
            logging_enabled: true,
        }
    }
}

impl ProviderOptions {
    /// Validate option ranges
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.messages_to_receive == 0 {
            return Err(ValidationError::OutOfRange {
                field: "messages_to_receive".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

/// Per-call overrides; unset fields fall back to the queue options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionOverrides {
    pub message_delay: Option<u64>,
    pub message_expiration: Option<u64>,
    pub messages_to_receive: Option<u32>,
    pub receive_wait_time: Option<u32>,
}

impl OptionOverrides {
    /// Create empty overrides
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message_delay(mut self, seconds: u64) -> Self {
        self.message_delay = Some(seconds);
        self
    }

    pub fn with_message_expiration(mut self, seconds: u64) -> Self {
        self.message_expiration = Some(seconds);
        self
    }

    pub fn with_messages_to_receive(mut self, max: u32) -> Self {
        self.messages_to_receive = Some(max);
        self
    }

    pub fn with_receive_wait_time(mut self, seconds: u32) -> Self {
        self.receive_wait_time = Some(seconds);
        self
    }

    /// Merge these overrides over `base` and validate the result
    pub fn merge(&self, base: &ProviderOptions) -> Result<ProviderOptions, ValidationError> {
        let merged = ProviderOptions {
            message_delay: self.message_delay.unwrap_or(base.message_delay),
            message_expiration: self.message_expiration.unwrap_or(base.message_expiration),
            messages_to_receive: self.messages_to_receive.unwrap_or(base.messages_to_receive),
            receive_wait_time: self.receive_wait_time.unwrap_or(base.receive_wait_time),
            logging_enabled: base.logging_enabled,
        };
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
#[path = "options_tests.rs"]
mod tests;
