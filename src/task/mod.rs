//! Batch resize tasks.
//!
//! A task turns a [`ResizeRequest`] into one output per source image:
//!
//! ```text
//! ResizeRequest ──validate──▶ Task (Pending) ──worker pool──▶ Processing
//!                                                    │
//!                         per item, in order: backend.resize(...)
//!                                                    │
//!                              package ──▶ Completed │ first failure ──▶ Error
//! ```
//!
//! | Module | Contents |
//! |--------|----------|
//! | `request` | Wire shape of a resize request and its validation |
//! | `model` | [`Task`], [`WorkItem`], status enums, [`ProgressSnapshot`] |
//! | `manager` | [`TaskManager`]: creation, execution, queries, cleanup |
//! | `packager` | One image raw, several as a zip ([`Artifact`]) |

pub mod manager;
pub mod model;
pub mod packager;
pub mod request;

pub use manager::{ManagerOptions, PurgeStats, TaskManager};
pub use model::{ItemStatus, ProgressSnapshot, Task, TaskId, TaskStatus, WorkItem};
pub use packager::{Artifact, PackageEntry, package};
pub use request::{ResizeRequest, ValidatedRequest};

use crate::store::{FileId, StoreError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("File not found: {0}")]
    FileNotFound(FileId),
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),
    #[error("Task {0} has not completed")]
    NotReady(TaskId),
    #[error("Packaging failed: {0}")]
    Packaging(String),
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl From<StoreError> for TaskError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => TaskError::FileNotFound(id),
        }
    }
}
