//! Provider types and configuration.

use crate::error::{ConfigurationError, ValidationError};
use crate::options::ProviderOptions;
use crate::providers::file::CleanupPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Enumeration of supported queue providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderType {
    /// Local directory of JSON files guarded by advisory locks
    File,
    /// Pre-provisioned SQS queue and/or SNS topic
    AwsPreconfigured,
}

impl ProviderType {
    /// Name reported by `QueueProvider::provider_name`
    pub fn name(&self) -> &'static str {
        match self {
            Self::File => "File",
            Self::AwsPreconfigured => "AWSP",
        }
    }

    /// Largest batch a single receive call may return
    pub fn max_batch_size(&self) -> u32 {
        match self {
            Self::File => u32::MAX,
            Self::AwsPreconfigured => 10,
        }
    }

    /// Check if the provider honors `receive_wait_time`
    pub fn supports_long_polling(&self) -> bool {
        match self {
            Self::File => false,
            Self::AwsPreconfigured => true,
        }
    }
}

/// Provider-specific configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProviderConfig {
    File(FileProviderConfig),
    AwsPreconfigured(AwsProviderConfig),
}

impl ProviderConfig {
    pub fn provider_type(&self) -> ProviderType {
        match self {
            Self::File(_) => ProviderType::File,
            Self::AwsPreconfigured(_) => ProviderType::AwsPreconfigured,
        }
    }

    pub fn options(&self) -> &ProviderOptions {
        match self {
            Self::File(config) => &config.options,
            Self::AwsPreconfigured(config) => &config.options,
        }
    }

    /// Validate the configuration before a provider is built from it
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        match self {
            Self::File(config) => config.validate(),
            Self::AwsPreconfigured(config) => config.validate(),
        }
    }
}

fn invalid(e: ValidationError) -> ConfigurationError {
    ConfigurationError::Invalid {
        message: e.to_string(),
    }
}

/// File provider configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileProviderConfig {
    /// Queue root directory
    pub path: PathBuf,
    pub options: ProviderOptions,
    pub cleanup: CleanupPolicy,
}

impl FileProviderConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            options: ProviderOptions::default(),
            cleanup: CleanupPolicy::default(),
        }
    }

    pub fn with_options(mut self, options: ProviderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cleanup(mut self, cleanup: CleanupPolicy) -> Self {
        self.cleanup = cleanup;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.path.as_os_str().is_empty() {
            return Err(ConfigurationError::Missing {
                key: "path".to_string(),
            });
        }
        self.options.validate().map_err(invalid)?;
        self.cleanup.validate().map_err(invalid)
    }
}

/// Pre-provisioned AWS configuration.
///
/// Nothing is created or subscribed on the AWS side; publishing goes to the SNS
/// topic when `topic_arn` is set and to the SQS queue otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwsProviderConfig {
    pub queue_url: Option<String>,
    pub topic_arn: Option<String>,
    pub options: ProviderOptions,
}

impl AwsProviderConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.queue_url.is_none() && self.topic_arn.is_none() {
            return Err(ConfigurationError::Invalid {
                message: "both \"topic_arn\" and \"queue_url\" are undefined; the provider \
                          must publish to either an SNS topic or an SQS queue"
                    .to_string(),
            });
        }
        self.options.validate().map_err(invalid)?;

        let max = ProviderType::AwsPreconfigured.max_batch_size();
        if self.options.messages_to_receive > max {
            return Err(ConfigurationError::Invalid {
                message: format!("messages_to_receive may not exceed {}", max),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
