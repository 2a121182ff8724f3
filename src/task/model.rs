//! Task and work-item state.
//!
//! A [`Task`] is a small state machine:
//!
//! ```text
//! Pending ──start──▶ Processing ──finish──▶ Completed
//!                        │
//!                        └──fail──────────▶ Error
//! ```
//!
//! Completed and Error are terminal; every mutator is a no-op once the task
//! has reached either. The manager is the only writer, and it holds the
//! task's lock for each whole transition, so readers never see an item
//! half-updated.

use super::packager::Artifact;
use crate::imaging::{EncodedImage, ResizeParams, calculate_progress};
use crate::store::StoredImage;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Opaque identifier of a resize task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Aggregate task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Error => "error",
        }
    }
}

/// Status of a single work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Pending,
    Done,
    Failed,
}

/// One image's resize job within a task.
#[derive(Debug, Clone)]
pub struct WorkItem {
    /// Shared, read-only source upload.
    pub source: Arc<StoredImage>,
    /// Parameters with the fill color already resolved for this image.
    pub params: ResizeParams,
    pub status: ItemStatus,
    pub output: Option<EncodedImage>,
    pub error: Option<String>,
}

impl WorkItem {
    pub fn new(source: Arc<StoredImage>, params: ResizeParams) -> Self {
        Self {
            source,
            params,
            status: ItemStatus::Pending,
            output: None,
            error: None,
        }
    }
}

/// Read-only view of a task for polling clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub status: TaskStatus,
    /// Whole percentage, `round(100 * completed / total)`.
    pub progress: u8,
    pub completed: usize,
    pub total: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct Task {
    pub id: TaskId,
    pub items: Vec<WorkItem>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    /// Set when the task enters Completed or Error.
    pub completed_at: Option<DateTime<Utc>>,
    /// First failure message.
    pub error: Option<String>,
    /// Packaged result, present only when Completed.
    pub artifact: Option<Arc<Artifact>>,
}

impl Task {
    pub fn new(id: TaskId, items: Vec<WorkItem>) -> Self {
        Self {
            id,
            items,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            error: None,
            artifact: None,
        }
    }

    pub fn completed(&self) -> usize {
        self.items
            .iter()
            .filter(|i| i.status == ItemStatus::Done)
            .count()
    }

    pub fn progress(&self) -> u8 {
        calculate_progress(self.completed(), self.items.len())
    }

    /// Time from creation to reaching a terminal status.
    pub fn elapsed(&self) -> Option<Duration> {
        self.completed_at.map(|done| done - self.created_at)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            status: self.status,
            progress: self.progress(),
            completed: self.completed(),
            total: self.items.len(),
            error: self.error.clone(),
        }
    }

    /// Pending → Processing. Returns false if the task had already started.
    pub fn start(&mut self) -> bool {
        if self.status != TaskStatus::Pending {
            return false;
        }
        self.status = TaskStatus::Processing;
        true
    }

    /// Record a successful item.
    pub fn complete_item(&mut self, index: usize, output: EncodedImage) {
        if self.status != TaskStatus::Processing {
            return;
        }
        if let Some(item) = self.items.get_mut(index) {
            item.status = ItemStatus::Done;
            item.output = Some(output);
        }
    }

    /// Record a failed item and move the whole task to Error.
    pub fn fail_item(&mut self, index: usize, error: String) {
        if self.status.is_terminal() {
            return;
        }
        if let Some(item) = self.items.get_mut(index) {
            item.status = ItemStatus::Failed;
            item.error = Some(error.clone());
        }
        self.fail(error);
    }

    /// Move to Error without blaming a specific item (e.g. packaging failed).
    pub fn fail(&mut self, error: String) {
        if self.status.is_terminal() {
            return;
        }
        self.status = TaskStatus::Error;
        self.error.get_or_insert(error);
        self.completed_at = Some(Utc::now());
    }

    /// Processing → Completed with the packaged artifact.
    ///
    /// Only valid once every item is Done; otherwise the task is left as is.
    pub fn finish(&mut self, artifact: Artifact) -> bool {
        if self.status != TaskStatus::Processing
            || self.items.iter().any(|i| i.status != ItemStatus::Done)
        {
            return false;
        }
        self.status = TaskStatus::Completed;
        self.artifact = Some(Arc::new(artifact));
        self.completed_at = Some(Utc::now());
        true
    }
}
