//! On-disk layout of a file queue.
//!
//! Every message lives in `root/<shard>/<id>.json`, where `<shard>` is the
//! first three hex characters of the MD5 digest of the id. Shards only bound
//! directory fan-out. A file's modification time is its enqueue time; there is
//! no other metadata on disk.

use super::visibility::VisibilityWindow;
use crate::error::QueueError;
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use std::fs::{self, File, ReadDir};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

const SHARD_LENGTH: usize = 3;
const MESSAGE_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "tmp";

/// Version-control metadata directories never scanned for messages
const VCS_DIRECTORIES: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    ".bzr",
    "_svn",
    "CVS",
    "_darcs",
    ".arch-params",
    ".monotone",
];

/// Shard directory name for a message id
pub fn shard_for(id: &str) -> String {
    let digest = Md5::digest(id.as_bytes());
    let mut shard = hex::encode(digest);
    shard.truncate(SHARD_LENGTH);
    shard
}

/// A message file found by a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub id: String,
    pub path: PathBuf,
    pub modified: DateTime<Utc>,
}

/// Sharded directory of message files
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path of the file backing `id`
    pub fn path_for(&self, id: &str) -> PathBuf {
        self.root
            .join(shard_for(id))
            .join(format!("{}.{}", id, MESSAGE_EXTENSION))
    }

    /// Create the root directory if it does not exist yet
    pub fn ensure_root_exists(&self) -> Result<(), QueueError> {
        if self.root.exists() && !self.root.is_dir() {
            return Err(QueueError::io(
                "create queue root",
                &self.root,
                io::Error::new(io::ErrorKind::AlreadyExists, "path exists and is not a directory"),
            ));
        }

        fs::create_dir_all(&self.root)
            .map_err(|e| QueueError::io("create queue root", &self.root, e))
    }

    /// Store `payload` as the complete contents of the file for `id`.
    ///
    /// The payload goes to a hidden temporary file first and is renamed into
    /// place, so scans never observe a partially written message.
    pub fn write(&self, id: &str, payload: &[u8]) -> Result<PathBuf, QueueError> {
        self.write_file(id, payload, None)
    }

    /// Like [`FileStore::write`], with the file's modification time set to
    /// `modified` before it becomes visible to scans.
    pub fn write_modified_at(
        &self,
        id: &str,
        payload: &[u8],
        modified: SystemTime,
    ) -> Result<PathBuf, QueueError> {
        self.write_file(id, payload, Some(modified))
    }

    fn write_file(
        &self,
        id: &str,
        payload: &[u8],
        modified: Option<SystemTime>,
    ) -> Result<PathBuf, QueueError> {
        let path = self.path_for(id);
        let shard_dir = self.root.join(shard_for(id));

        fs::create_dir_all(&shard_dir)
            .map_err(|e| QueueError::io("create shard directory", &shard_dir, e))?;

        let temp_path = shard_dir.join(format!(".{}.{}", id, TEMP_EXTENSION));
        if let Err(e) = write_and_sync(&temp_path, payload, modified) {
            let _ = fs::remove_file(&temp_path);
            return Err(QueueError::io("write message file", &temp_path, e));
        }

        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(QueueError::io("rename message file", &path, e));
        }

        Ok(path)
    }

    /// Lazily list message files whose modification time lies in `window`.
    ///
    /// Fails only when the root itself cannot be read. Unreadable shards and
    /// entries are skipped. Enumeration order is whatever the filesystem
    /// returns.
    pub fn list_eligible(&self, window: VisibilityWindow) -> Result<EligibleFiles, QueueError> {
        let shards =
            fs::read_dir(&self.root).map_err(|e| QueueError::io("list queue root", &self.root, e))?;

        Ok(EligibleFiles {
            shards,
            current: None,
            window,
            temporaries: false,
        })
    }

    /// Lazily list temporary files left behind by writes that never reached
    /// the rename, restricted to modification times in `window`.
    ///
    /// The returned [`StoredFile`] paths point at the temporary files.
    pub fn list_abandoned_writes(
        &self,
        window: VisibilityWindow,
    ) -> Result<EligibleFiles, QueueError> {
        let mut files = self.list_eligible(window)?;
        files.temporaries = true;
        Ok(files)
    }

    /// Delete the file for `id`; returns false when it was already gone
    pub fn remove(&self, id: &str) -> Result<bool, QueueError> {
        remove_message_file(&self.path_for(id))
    }

    /// Delete a file found by a scan; returns false when it was already gone
    pub fn remove_stored(&self, file: &StoredFile) -> Result<bool, QueueError> {
        remove_message_file(&file.path)
    }

    /// Recursively delete the whole queue
    pub fn remove_all(&self) -> Result<(), QueueError> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(QueueError::io("remove queue root", &self.root, e)),
        }
    }
}

fn remove_message_file(path: &Path) -> Result<bool, QueueError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(QueueError::io("remove message file", path, e)),
    }
}

fn write_and_sync(path: &Path, payload: &[u8], modified: Option<SystemTime>) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(payload)?;
    if let Some(modified) = modified {
        file.set_modified(modified)?;
    }
    file.sync_all()
}

fn is_ignored_name(name: &str) -> bool {
    name.starts_with('.') || VCS_DIRECTORIES.contains(&name)
}

/// Iterator over message files inside a visibility window
#[derive(Debug)]
pub struct EligibleFiles {
    shards: ReadDir,
    current: Option<ReadDir>,
    window: VisibilityWindow,
    temporaries: bool,
}

impl EligibleFiles {
    fn next_shard(&mut self) -> Option<ReadDir> {
        loop {
            let entry = match self.shards.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(error = %e, "Skipping unreadable queue root entry");
                    continue;
                }
            };

            let name = entry.file_name();
            if name.to_str().map_or(true, is_ignored_name) {
                continue;
            }
            if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }

            match fs::read_dir(entry.path()) {
                Ok(entries) => return Some(entries),
                Err(e) => {
                    debug!(shard = %entry.path().display(), error = %e, "Skipping unreadable shard");
                }
            }
        }
    }

    fn accept(&self, entry: fs::DirEntry) -> Option<StoredFile> {
        let file_name = entry.file_name();
        let name = file_name.to_str()?;

        let id = if self.temporaries {
            name.strip_prefix('.')?
                .strip_suffix(TEMP_EXTENSION)?
                .strip_suffix('.')?
        } else if is_ignored_name(name) {
            return None;
        } else {
            name.strip_suffix(MESSAGE_EXTENSION)?.strip_suffix('.')?
        };
        if id.is_empty() {
            return None;
        }

        let metadata = entry.metadata().ok()?;
        if !metadata.is_file() {
            return None;
        }

        let modified = DateTime::<Utc>::from(metadata.modified().ok()?);
        if !self.window.contains(modified) {
            return None;
        }

        Some(StoredFile {
            id: id.to_string(),
            path: entry.path(),
            modified,
        })
    }
}

impl Iterator for EligibleFiles {
    type Item = StoredFile;

    fn next(&mut self) -> Option<StoredFile> {
        loop {
            let entries = match self.current.as_mut() {
                Some(entries) => entries,
                None => {
                    let shard = self.next_shard()?;
                    self.current.insert(shard)
                }
            };

            match entries.next() {
                Some(Ok(entry)) => {
                    if let Some(file) = self.accept(entry) {
                        return Some(file);
                    }
                }
                Some(Err(e)) => debug!(error = %e, "Skipping unreadable shard entry"),
                None => self.current = None,
            }
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
