//! Shared application state for the HTTP server

use crate::config::UploadsConfig;
use crate::imaging::ImageBackend;
use crate::store::ImageStore;
use crate::task::TaskManager;
use std::sync::Arc;

/// Cheaply cloneable handle passed to every handler.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    manager: Arc<TaskManager>,
    uploads: UploadsConfig,
}

impl AppState {
    pub fn new(manager: Arc<TaskManager>, uploads: UploadsConfig) -> Self {
        Self {
            inner: Arc::new(AppStateInner { manager, uploads }),
        }
    }

    pub fn manager(&self) -> &Arc<TaskManager> {
        &self.inner.manager
    }

    pub fn store(&self) -> &Arc<ImageStore> {
        self.inner.manager.store()
    }

    pub fn backend(&self) -> &Arc<dyn ImageBackend> {
        self.inner.manager.backend()
    }

    /// Upload limits.
    pub fn uploads(&self) -> &UploadsConfig {
        &self.inner.uploads
    }
}
