//! Uploaded source images, keyed by opaque file identifiers.
//!
//! The store is an identifier → `Arc<StoredImage>` map. Entries are
//! immutable once inserted; tasks hold `Arc` clones of the images they read,
//! so removing an entry never invalidates a running task.
//!
//! Lifetime is ephemeral: nothing is persisted, and the
//! [`TaskManager`](crate::task::TaskManager) removes entries when the tasks
//! that used them are cleaned up or expire.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StoreError {
    #[error("File not found: {0}")]
    NotFound(FileId),
}

/// Opaque identifier assigned to an upload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    /// A fresh random (UUIDv4) identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FileId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for FileId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An uploaded image, stored verbatim.
#[derive(Debug)]
pub struct StoredImage {
    pub id: FileId,
    pub bytes: Bytes,
    pub filename: String,
    pub content_type: String,
    pub uploaded_at: DateTime<Utc>,
}

/// In-memory image store.
#[derive(Debug, Default)]
pub struct ImageStore {
    images: RwLock<HashMap<FileId, Arc<StoredImage>>>,
}

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `bytes` under a freshly generated identifier.
    pub fn put(
        &self,
        bytes: Bytes,
        filename: impl Into<String>,
        content_type: impl Into<String>,
    ) -> FileId {
        let id = FileId::generate();
        self.insert(id.clone(), bytes, filename.into(), content_type.into());
        id
    }

    /// Store under a caller-chosen identifier. An existing entry with the
    /// same id is kept.
    pub(crate) fn insert(
        &self,
        id: FileId,
        bytes: Bytes,
        filename: String,
        content_type: String,
    ) {
        let size = bytes.len();
        let image = Arc::new(StoredImage {
            id: id.clone(),
            bytes,
            filename,
            content_type,
            uploaded_at: Utc::now(),
        });
        self.images.write().entry(id.clone()).or_insert(image);
        tracing::debug!(file_id = %id, size, "stored upload");
    }

    pub fn get(&self, id: &FileId) -> Result<Arc<StoredImage>, StoreError> {
        self.images
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    pub fn contains(&self, id: &FileId) -> bool {
        self.images.read().contains_key(id)
    }

    /// Remove an entry. Returns whether it existed.
    pub fn remove(&self, id: &FileId) -> bool {
        self.images.write().remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.images.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop uploads older than `cutoff` that no id in `live` refers to.
    ///
    /// Returns the number of entries removed.
    pub fn purge_unreferenced(&self, cutoff: DateTime<Utc>, live: &HashSet<FileId>) -> usize {
        let mut images = self.images.write();
        let before = images.len();
        images.retain(|id, image| image.uploaded_at >= cutoff || live.contains(id));
        before - images.len()
    }
}
