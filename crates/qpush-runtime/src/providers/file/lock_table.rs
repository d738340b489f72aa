//! Per-process registry of claimed message files.
//!
//! Claiming a message opens its file and takes a non-blocking exclusive
//! advisory lock on the descriptor. The table owns the open file until the
//! claim is released; closing the descriptor drops the lock. Other processes
//! (and other tables in this process) see the lock and skip the file.
//!
//! Nothing here is persisted. A process that dies releases its locks with its
//! descriptors, so the message becomes receivable again: delivery is
//! at-least-once. Advisory locks only coordinate processes sharing one
//! filesystem.

use crate::error::QueueError;
use fd_lock::RwLock;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read};
use std::path::Path;

/// Open, locked message files keyed by message id
#[derive(Debug, Default)]
pub struct LockTable {
    claims: HashMap<String, File>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to claim the message file at `path` for `id`.
    ///
    /// Returns the file contents when the claim succeeds. Returns `Ok(None)`
    /// without waiting when the id is already claimed by this table, when
    /// another holder has the lock, or when the file disappeared before it
    /// could be opened.
    pub fn try_claim(&mut self, path: &Path, id: &str) -> Result<Option<Vec<u8>>, QueueError> {
        if self.claims.contains_key(id) {
            return Ok(None);
        }

        let file = match OpenOptions::new().read(true).write(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(QueueError::io("open message file", path, e)),
        };

        let mut lock = RwLock::new(file);
        let contents = match lock.try_write() {
            Ok(mut guard) => {
                let mut contents = Vec::new();
                let read = guard.read_to_end(&mut contents);
                // The guard unlocks when dropped; the claim must instead live
                // as long as the descriptor kept in the table.
                std::mem::forget(guard);
                read.map_err(|e| QueueError::io("read message file", path, e))?;
                contents
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(None),
            Err(e) => return Err(QueueError::io("lock message file", path, e)),
        };

        self.claims.insert(id.to_string(), lock.into_inner());
        Ok(Some(contents))
    }

    /// Release the claim on `id`, closing its file; false if not claimed
    pub fn release(&mut self, id: &str) -> bool {
        self.claims.remove(id).is_some()
    }

    pub fn is_claimed(&self, id: &str) -> bool {
        self.claims.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// Release every claim
    pub fn clear(&mut self) {
        self.claims.clear();
    }
}

#[cfg(test)]
#[path = "lock_table_tests.rs"]
mod tests;
