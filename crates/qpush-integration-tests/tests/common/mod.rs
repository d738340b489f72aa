//! Common utilities for qpush integration tests
//!
//! This module provides:
//! - Builders for file queues rooted in a temporary directory
//! - Helpers to publish batches and age message files

use qpush_runtime::{
    CleanupPolicy, FileProvider, FileProviderConfig, MessageId, OptionOverrides, ProviderOptions,
    QueueName, QueueProvider,
};
use std::path::Path;
use std::time::{Duration, SystemTime};

/// File queue named `name` under `root` with the given options
#[allow(dead_code)]
pub fn file_queue(root: &Path, name: &str, options: ProviderOptions) -> anyhow::Result<FileProvider> {
    let config = FileProviderConfig::new(root.join(name))
        .with_options(options)
        .with_cleanup(CleanupPolicy::Never);
    Ok(FileProvider::new(QueueName::new(name.to_string())?, config)?)
}

/// Options that return up to `batch` messages per receive
#[allow(dead_code)]
pub fn batch_options(batch: u32) -> ProviderOptions {
    ProviderOptions {
        messages_to_receive: batch,
        ..ProviderOptions::default()
    }
}

/// Publish `count` messages whose bodies are `{"n": i}`
#[allow(dead_code)]
pub async fn publish_n(provider: &dyn QueueProvider, count: usize) -> anyhow::Result<Vec<MessageId>> {
    let mut ids = Vec::with_capacity(count);
    for n in 0..count {
        ids.push(
            provider
                .publish(&serde_json::json!({ "n": n }), &OptionOverrides::new())
                .await?,
        );
    }
    Ok(ids)
}

/// Move a message file's modification time `age` into the past
#[allow(dead_code)]
pub fn age_file(path: &Path, age: Duration) -> anyhow::Result<()> {
    std::fs::File::options()
        .write(true)
        .open(path)?
        .set_modified(SystemTime::now() - age)?;
    Ok(())
}
