//! Filesystem-backed queue provider.
//!
//! A queue is a directory of JSON files, one per message, spread over shard
//! subdirectories (see [`FileStore`]). The state of a message follows from
//! its file alone:
//!
//! - **Absent**: no file.
//! - **Delayed**: the file is younger than `message_delay` seconds.
//! - **Visible**: not delayed, not expired and not locked.
//! - **InFlight**: some process holds an advisory lock on the file.
//! - **Expired**: the file is older than `message_expiration` seconds.
//!
//! `receive` claims visible files through the [`LockTable`]; `delete` removes
//! the file and releases the claim. A claim dies with its process, so a
//! message whose consumer crashed becomes visible again: delivery is
//! at-least-once. Expired files are only reaped by `cleanup`, which does not
//! look at locks and can remove a file another process still holds.
//!
//! This is a single-node queue. Locks coordinate processes that share one
//! filesystem and nothing more.

mod cleanup;
mod lock_table;
mod store;
mod visibility;

pub use cleanup::{CleanupPolicy, CleanupTrigger};
pub use lock_table::LockTable;
pub use store::{shard_for, EligibleFiles, FileStore, StoredFile};
pub use visibility::VisibilityWindow;

use crate::client::QueueProvider;
use crate::error::{QueueError, ValidationError};
use crate::logging::{LogContext, LogSink, TracingLogSink};
use crate::message::{Message, MessageEvent, MessageId, MessageMetadata, QueueName};
use crate::options::{OptionOverrides, ProviderOptions};
use crate::provider::{FileProviderConfig, ProviderType};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};
use tracing::{debug, instrument, warn};

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

/// Queue provider storing messages as files under a local directory
pub struct FileProvider {
    name: QueueName,
    options: ProviderOptions,
    store: FileStore,
    claims: Mutex<LockTable>,
    cleanup_trigger: CleanupTrigger,
    log_sink: Arc<dyn LogSink>,
}

impl FileProvider {
    /// Create a provider for the queue rooted at `config.path`.
    ///
    /// Nothing is touched on disk until `create` or `publish` runs.
    pub fn new(name: QueueName, config: FileProviderConfig) -> Result<Self, QueueError> {
        config.validate()?;

        Ok(Self {
            name,
            options: config.options,
            store: FileStore::new(config.path),
            claims: Mutex::new(LockTable::new()),
            cleanup_trigger: CleanupTrigger::new(config.cleanup),
            log_sink: Arc::new(TracingLogSink),
        })
    }

    /// Use `table` to track claims instead of a fresh one
    pub fn with_lock_table(self, table: LockTable) -> Self {
        Self {
            claims: Mutex::new(table),
            ..self
        }
    }

    pub fn with_log_sink(self, log_sink: Arc<dyn LogSink>) -> Self {
        Self { log_sink, ..self }
    }

    pub fn options(&self) -> &ProviderOptions {
        &self.options
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    pub fn cleanup_policy(&self) -> CleanupPolicy {
        self.cleanup_trigger.policy()
    }

    /// Number of messages this provider currently holds in flight
    pub fn in_flight(&self) -> usize {
        self.claims().len()
    }

    fn claims(&self) -> MutexGuard<'_, LockTable> {
        self.claims.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn log(&self, status: u16, message: &str, context: LogContext) {
        if !self.options.logging_enabled {
            return;
        }

        let context = context
            .with("provider", ProviderType::File.name())
            .with("queue", self.name.as_str());
        self.log_sink.log(status, message, &context);
    }

    fn publish_body(&self, body: &Value, delay: u64) -> Result<MessageId, QueueError> {
        let id = MessageId::generate();
        let payload = serde_json::to_vec(body)?;
        let path = match self.enqueue_time(delay)? {
            Some(modified) => self.store.write_modified_at(id.as_str(), &payload, modified)?,
            None => self.store.write(id.as_str(), &payload)?,
        };

        debug!(message_id = %id, path = %path.display(), "Message written");
        self.log(
            200,
            "Message published",
            LogContext::new()
                .with("message_id", id.as_str())
                .with("path", path.display().to_string()),
        );
        Ok(id)
    }

    /// Modification time that makes a message published with `delay` become
    /// visible after `delay` seconds, given that receivers apply the queue's
    /// own delay. `None` when the two agree and the current time is right.
    fn enqueue_time(&self, delay: u64) -> Result<Option<SystemTime>, QueueError> {
        let queue_delay = self.options.message_delay;
        if delay == queue_delay {
            return Ok(None);
        }

        let now = SystemTime::now();
        let shifted = if delay > queue_delay {
            now.checked_add(Duration::from_secs(delay - queue_delay))
        } else {
            now.checked_sub(Duration::from_secs(queue_delay - delay))
        };

        shifted.map(Some).ok_or_else(|| {
            ValidationError::OutOfRange {
                field: "message_delay".to_string(),
                message: format!("{} seconds cannot be represented", delay),
            }
            .into()
        })
    }

    fn receive_batch(&self, options: &ProviderOptions) -> Result<Vec<Message>, QueueError> {
        let window = VisibilityWindow::for_receive(
            Utc::now(),
            options.message_delay,
            options.message_expiration,
        );
        let limit = usize::try_from(options.messages_to_receive).unwrap_or(usize::MAX);

        let mut messages = Vec::new();
        let mut claims = self.claims();

        for file in self.store.list_eligible(window)? {
            if messages.len() >= limit {
                break;
            }

            // A file outside its own shard could be claimed but never deleted
            if file.path != self.store.path_for(&file.id) {
                debug!(path = %file.path.display(), "Skipping misplaced message file");
                continue;
            }

            let contents = match claims.try_claim(&file.path, &file.id) {
                Ok(Some(contents)) => contents,
                Ok(None) => {
                    debug!(message_id = %file.id, "Message already claimed");
                    continue;
                }
                Err(e) => {
                    warn!(message_id = %file.id, error = %e, "Could not claim message");
                    continue;
                }
            };

            let decoded = serde_json::from_slice::<Value>(&contents)
                .map_err(|source| QueueError::Decode {
                    id: file.id.clone(),
                    source,
                })
                .and_then(|body| Ok((file.id.parse::<MessageId>()?, body)));

            match decoded {
                Ok((id, body)) => messages.push(Message::new(id, body, MessageMetadata::new())),
                Err(e) => {
                    claims.release(&file.id);
                    warn!(message_id = %file.id, error = %e, "Skipping undecodable message");
                    self.log(
                        500,
                        "Message could not be decoded",
                        LogContext::new()
                            .with("message_id", file.id.as_str())
                            .with("error", e.to_string()),
                    );
                }
            }
        }
        drop(claims);

        self.log(
            200,
            "Messages received",
            LogContext::new().with("count", messages.len()),
        );
        Ok(messages)
    }

    fn delete_claimed(&self, id: &str) -> Result<bool, QueueError> {
        let mut claims = self.claims();
        if !claims.is_claimed(id) {
            debug!(message_id = %id, "Delete ignored, message is not held by this provider");
            return Ok(false);
        }

        // The claim survives a failed removal so the message is not handed
        // to another receiver while its file still exists.
        if !self.store.remove(id)? {
            debug!(message_id = %id, "Message file was already reaped");
        }
        claims.release(id);
        drop(claims);

        self.log(
            200,
            "Message deleted",
            LogContext::new().with("message_id", id),
        );
        Ok(true)
    }

    fn reap_expired(&self) -> Result<usize, QueueError> {
        let Some(window) = VisibilityWindow::for_cleanup(Utc::now(), self.options.message_expiration)
        else {
            return Ok(0);
        };

        let mut removed = 0;
        for file in self.store.list_eligible(window)? {
            match self.store.remove_stored(&file) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!(message_id = %file.id, error = %e, "Could not remove expired message"),
            }
        }

        // Leftovers of writes interrupted before their rename
        for file in self.store.list_abandoned_writes(window)? {
            match self.store.remove_stored(&file) {
                Ok(true) => debug!(path = %file.path.display(), "Removed abandoned temporary file"),
                Ok(false) => {}
                Err(e) => warn!(path = %file.path.display(), error = %e, "Could not remove temporary file"),
            }
        }

        if removed > 0 {
            self.log(
                200,
                "Expired messages removed",
                LogContext::new().with("count", removed),
            );
        }
        Ok(removed)
    }

    fn destroy_queue(&self) -> Result<bool, QueueError> {
        self.claims().clear();
        self.store.remove_all()?;

        let destroyed = !self.store.root().exists();
        self.log(
            200,
            "Queue destroyed",
            LogContext::new().with("path", self.store.root().display().to_string()),
        );
        Ok(destroyed)
    }
}

impl std::fmt::Debug for FileProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileProvider")
            .field("name", &self.name)
            .field("root", &self.store.root())
            .field("options", &self.options)
            .field("cleanup", &self.cleanup_trigger.policy())
            .finish()
    }
}

#[async_trait]
impl QueueProvider for FileProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::File
    }

    fn queue_name(&self) -> &QueueName {
        &self.name
    }

    async fn create(&self) -> Result<bool, QueueError> {
        self.store.ensure_root_exists()?;
        self.log(
            200,
            "Queue created",
            LogContext::new().with("path", self.store.root().display().to_string()),
        );
        Ok(true)
    }

    async fn destroy(&self) -> Result<bool, QueueError> {
        self.destroy_queue()
    }

    /// Write the body as a new message file.
    ///
    /// A file carries no options of its own. A `message_delay` override is
    /// applied by shifting the file's modification time; other overrides are
    /// validated and otherwise ignored.
    #[instrument(skip_all, fields(queue = %self.name))]
    async fn publish(
        &self,
        body: &Value,
        overrides: &OptionOverrides,
    ) -> Result<MessageId, QueueError> {
        let options = overrides.merge(&self.options)?;
        self.publish_body(body, options.message_delay)
    }

    #[instrument(skip_all, fields(queue = %self.name))]
    async fn receive(&self, overrides: &OptionOverrides) -> Result<Vec<Message>, QueueError> {
        let options = overrides.merge(&self.options)?;
        self.receive_batch(&options)
    }

    /// Delete a message this provider holds.
    ///
    /// The cleanup policy is consulted on every call, whether or not `id` was
    /// held.
    #[instrument(skip(self), fields(queue = %self.name))]
    async fn delete(&self, id: &str) -> Result<bool, QueueError> {
        let deleted = self.delete_claimed(id)?;

        if self.cleanup_trigger.should_run() {
            if let Err(e) = self.reap_expired() {
                warn!(error = %e, "Opportunistic cleanup failed");
            }
        }

        Ok(deleted)
    }

    #[instrument(skip_all, fields(queue = %self.name))]
    async fn cleanup(&self) -> Result<usize, QueueError> {
        self.reap_expired()
    }

    async fn on_message_received(&self, event: &MessageEvent) -> Result<(), QueueError> {
        let id = event.message().id();
        if !self.delete(id.as_str()).await? {
            debug!(message_id = %id, "Processed message was no longer held");
        }
        Ok(())
    }
}
