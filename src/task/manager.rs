//! Task lifecycle: creation, execution, progress queries, results, cleanup.
//!
//! ## Execution model
//!
//! [`TaskManager::create_task`] validates the request, snapshots the source
//! images (as `Arc`s) into work items, inserts the task in Pending, and
//! hands it to a [rayon](https://docs.rs/rayon) pool. It never waits for
//! resize work.
//!
//! On the pool, one worker owns the task for its whole run:
//!
//! 1. Pending → Processing
//! 2. For each item in order, resize **outside** the task lock, then take the
//!    write lock just long enough to record the result
//! 3. Stop at the first failure (the task moves to Error, later items stay
//!    Pending)
//! 4. Package every output into an [`Artifact`] and move to Completed
//!
//! Readers ([`progress`](TaskManager::progress),
//! [`result`](TaskManager::result)) take the task's read lock, so a snapshot
//! always reflects whole-item updates.
//!
//! ## Locking
//!
//! The task table and each task have their own `parking_lot::RwLock`.
//! Workers only ever lock their own task, never the table, so table
//! operations cannot deadlock against a running resize.
//!
//! ## Expiry
//!
//! Terminal tasks older than the retention window are dropped by
//! [`purge_expired`](TaskManager::purge_expired), along with any source
//! uploads no remaining task refers to.

use super::model::{Task, TaskId, WorkItem};
use super::packager::{Artifact, PackageEntry, package};
use super::request::ResizeRequest;
use super::{ProgressSnapshot, TaskError};
use crate::config::{Config, ConfigError, effective_threads};
use crate::imaging::{BackendError, EncodedImage, ImageBackend};
use crate::store::{FileId, ImageStore};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// Worker pool and retention settings.
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// Number of worker threads executing tasks.
    pub threads: usize,
    /// How long terminal tasks (and unreferenced uploads) are kept.
    pub retention: Duration,
}

impl ManagerOptions {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            threads: effective_threads(&config.processing),
            retention: config.tasks.retention()?,
        })
    }
}

/// Counts returned by [`TaskManager::purge_expired`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeStats {
    pub tasks: usize,
    pub uploads: usize,
}

type SharedTask = Arc<RwLock<Task>>;

pub struct TaskManager {
    store: Arc<ImageStore>,
    backend: Arc<dyn ImageBackend>,
    pool: rayon::ThreadPool,
    tasks: RwLock<HashMap<TaskId, SharedTask>>,
    retention: Duration,
}

impl TaskManager {
    pub fn new(
        store: Arc<ImageStore>,
        backend: Arc<dyn ImageBackend>,
        options: ManagerOptions,
    ) -> Result<Self, TaskError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.threads.max(1))
            .thread_name(|i| format!("resize-worker-{i}"))
            .build()?;
        tracing::debug!(threads = pool.current_num_threads(), "worker pool ready");
        Ok(Self {
            store,
            backend,
            pool,
            tasks: RwLock::new(HashMap::new()),
            retention: options.retention,
        })
    }

    pub fn store(&self) -> &Arc<ImageStore> {
        &self.store
    }

    pub fn backend(&self) -> &Arc<dyn ImageBackend> {
        &self.backend
    }

    /// Number of tasks currently tracked (any status).
    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validate `request`, register a Pending task, and schedule it.
    ///
    /// Every check runs before the task exists: a request that fails here
    /// leaves no trace.
    pub fn create_task(&self, request: &ResizeRequest) -> Result<TaskId, TaskError> {
        let valid = request.validate()?;
        let items = valid
            .file_ids
            .iter()
            .map(|id| Ok(WorkItem::new(self.store.get(id)?, valid.params_for(id))))
            .collect::<Result<Vec<_>, TaskError>>()?;

        let id = TaskId::generate();
        let task = Arc::new(RwLock::new(Task::new(id.clone(), items)));
        self.tasks.write().insert(id.clone(), Arc::clone(&task));
        tracing::info!(
            task_id = %id,
            items = valid.file_ids.len(),
            mode = %valid.mode,
            width = valid.width,
            height = valid.height,
            "task created"
        );

        let backend = Arc::clone(&self.backend);
        self.pool.spawn(move || run(&task, backend.as_ref()));
        Ok(id)
    }

    /// Consistent snapshot of a task's state.
    pub fn progress(&self, id: &TaskId) -> Result<ProgressSnapshot, TaskError> {
        Ok(self.task(id)?.read().snapshot())
    }

    /// The packaged result of a Completed task.
    pub fn result(&self, id: &TaskId) -> Result<Arc<Artifact>, TaskError> {
        let task = self.task(id)?;
        let task = task.read();
        task.artifact
            .clone()
            .ok_or_else(|| TaskError::NotReady(id.clone()))
    }

    /// Forget a task, its outputs, and any source upload no other task uses.
    ///
    /// A task still running keeps going on its detached state; its results
    /// are simply never observable.
    pub fn cleanup(&self, id: &TaskId) -> Result<(), TaskError> {
        let removed = self
            .tasks
            .write()
            .remove(id)
            .ok_or_else(|| TaskError::TaskNotFound(id.clone()))?;
        let freed = self.release_sources(source_ids(&removed));
        tracing::info!(task_id = %id, uploads_removed = freed, "task cleaned up");
        Ok(())
    }

    /// Drop terminal tasks that finished before `now - retention`, then any
    /// upload older than the window that no remaining task refers to.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> PurgeStats {
        let cutoff = now - self.retention;

        let expired: Vec<SharedTask> = {
            let mut tasks = self.tasks.write();
            let ids: Vec<TaskId> = tasks
                .iter()
                .filter(|(_, task)| {
                    let task = task.read();
                    task.status.is_terminal() && task.completed_at.is_some_and(|t| t < cutoff)
                })
                .map(|(id, _)| id.clone())
                .collect();
            ids.iter().filter_map(|id| tasks.remove(id)).collect()
        };

        let sources: HashSet<FileId> = expired.iter().flat_map(source_ids).collect();
        let mut uploads = self.release_sources(sources);
        uploads += self.store.purge_unreferenced(cutoff, &self.live_sources());

        let stats = PurgeStats {
            tasks: expired.len(),
            uploads,
        };
        if stats != PurgeStats::default() {
            tracing::info!(tasks = stats.tasks, uploads = stats.uploads, "purged expired state");
        }
        stats
    }

    fn task(&self, id: &TaskId) -> Result<SharedTask, TaskError> {
        self.tasks
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| TaskError::TaskNotFound(id.clone()))
    }

    /// Every file id referenced by a task still in the table.
    fn live_sources(&self) -> HashSet<FileId> {
        self.tasks.read().values().flat_map(source_ids).collect()
    }

    /// Remove the given uploads unless a live task still refers to them.
    fn release_sources(&self, candidates: impl IntoIterator<Item = FileId>) -> usize {
        let live = self.live_sources();
        candidates
            .into_iter()
            .filter(|id| !live.contains(id))
            .filter(|id| self.store.remove(id))
            .count()
    }
}

fn source_ids(task: &SharedTask) -> Vec<FileId> {
    task.read()
        .items
        .iter()
        .map(|item| item.source.id.clone())
        .collect()
}

fn elapsed_ms(task: &Task) -> i64 {
    task.elapsed().map(|d| d.num_milliseconds()).unwrap_or_default()
}

/// Execute a task to completion on the calling (pool) thread.
fn run(task: &RwLock<Task>, backend: &dyn ImageBackend) {
    let (id, jobs, queued) = {
        let mut task = task.write();
        if !task.start() {
            return;
        }
        let jobs: Vec<_> = task
            .items
            .iter()
            .map(|item| (Arc::clone(&item.source), item.params))
            .collect();
        (task.id.clone(), jobs, Utc::now() - task.created_at)
    };
    tracing::info!(
        task_id = %id,
        items = jobs.len(),
        queued_ms = queued.num_milliseconds(),
        "task started"
    );

    for (index, (source, params)) in jobs.iter().enumerate() {
        let outcome = catch_unwind(AssertUnwindSafe(|| backend.resize(&source.bytes, params)))
            .unwrap_or_else(|_| Err(BackendError::ProcessingFailed("backend panicked".into())));

        match outcome {
            Ok(output) => {
                let mut task = task.write();
                task.complete_item(index, output);
                tracing::debug!(
                    task_id = %id,
                    item = index,
                    file = %source.filename,
                    progress = task.progress(),
                    "item resized"
                );
            }
            Err(err) => {
                let message = format!("{}: {err}", source.filename);
                let mut task = task.write();
                task.fail_item(index, message.clone());
                tracing::warn!(
                    task_id = %id,
                    item = index,
                    error = %message,
                    elapsed_ms = elapsed_ms(&task),
                    "item failed"
                );
                return;
            }
        }
    }

    let outputs: Vec<(String, EncodedImage)> = task
        .read()
        .items
        .iter()
        .filter_map(|item| {
            item.output
                .clone()
                .map(|output| (item.source.filename.clone(), output))
        })
        .collect();
    let entries: Vec<PackageEntry<'_>> = outputs
        .iter()
        .map(|(filename, image)| PackageEntry {
            original_filename: filename,
            image,
        })
        .collect();

    match package(&entries) {
        Ok(artifact) => {
            let size = artifact.bytes.len();
            let mut task = task.write();
            if task.finish(artifact) {
                tracing::info!(
                    task_id = %id,
                    bytes = size,
                    elapsed_ms = elapsed_ms(&task),
                    "task completed"
                );
            }
        }
        Err(err) => {
            tracing::error!(task_id = %id, error = %err, "packaging failed");
            task.write().fail(err.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{GatedBackend, MockBackend, RecordedOp};
    use crate::imaging::{Dimensions, HexColor, ResizeMode, ResizeParams};
    use crate::task::TaskStatus;
    use crate::test_helpers::{wait_for, wait_until_terminal};
    use bytes::Bytes;

    fn store_with(ids: &[&str]) -> Arc<ImageStore> {
        let store = Arc::new(ImageStore::new());
        for id in ids {
            store.insert(
                (*id).into(),
                Bytes::from(format!("bytes-of-{id}")),
                format!("{id}.png"),
                "image/png".into(),
            );
        }
        store
    }

    fn manager(store: Arc<ImageStore>, backend: Arc<dyn ImageBackend>) -> TaskManager {
        let options = ManagerOptions {
            threads: 2,
            retention: Duration::hours(1),
        };
        TaskManager::new(store, backend, options).unwrap()
    }

    fn request(ids: &[&str], mode: ResizeMode) -> ResizeRequest {
        ResizeRequest::new(ids.iter().map(|s| FileId::from(*s)).collect(), 40, 30, mode)
    }

    struct PanickingBackend;

    impl ImageBackend for PanickingBackend {
        fn identify(&self, _source: &[u8]) -> Result<Dimensions, BackendError> {
            panic!("identify exploded")
        }

        fn resize(
            &self,
            _source: &[u8],
            _params: &ResizeParams,
        ) -> Result<EncodedImage, BackendError> {
            panic!("resize exploded")
        }
    }

    // =========================================================================
    // Options
    // =========================================================================

    #[test]
    fn options_take_retention_from_config() {
        let options = ManagerOptions::from_config(&Config::default()).unwrap();
        assert_eq!(options.retention, Duration::hours(1));
        assert!(options.threads >= 1);
    }

    #[test]
    fn options_reject_unrepresentable_retention() {
        let mut config = Config::default();
        for secs in [10_u64.pow(16), u64::MAX] {
            config.tasks.retention_secs = secs;
            assert!(matches!(
                ManagerOptions::from_config(&config),
                Err(ConfigError::Validation(_))
            ));
        }
    }

    // =========================================================================
    // Creation and validation
    // =========================================================================

    #[test]
    fn invalid_request_creates_no_task() {
        let manager = manager(store_with(&["a"]), Arc::new(MockBackend::new()));
        let mut req = request(&["a"], ResizeMode::Fit);
        req.width = 0;

        assert!(matches!(manager.create_task(&req), Err(TaskError::Validation(_))));
        assert!(manager.is_empty());
    }

    #[test]
    fn unknown_file_id_is_not_found() {
        let manager = manager(store_with(&["a"]), Arc::new(MockBackend::new()));
        let err = manager
            .create_task(&request(&["a", "ghost"], ResizeMode::Fit))
            .unwrap_err();

        assert!(matches!(err, TaskError::FileNotFound(id) if id.as_str() == "ghost"));
        assert!(manager.is_empty());
    }

    #[test]
    fn unknown_task_id_is_not_found() {
        let manager = manager(store_with(&[]), Arc::new(MockBackend::new()));
        let ghost = TaskId::from("ghost");

        assert!(matches!(manager.progress(&ghost), Err(TaskError::TaskNotFound(_))));
        assert!(matches!(manager.result(&ghost), Err(TaskError::TaskNotFound(_))));
        assert!(matches!(manager.cleanup(&ghost), Err(TaskError::TaskNotFound(_))));
    }

    // =========================================================================
    // Execution
    // =========================================================================

    #[test]
    fn progress_steps_through_items_in_order() {
        let (backend, gate) = GatedBackend::new();
        let manager = manager(store_with(&["a", "b", "c"]), Arc::new(backend));
        let id = manager
            .create_task(&request(&["a", "b", "c"], ResizeMode::Stretch))
            .unwrap();

        let first = wait_for(&manager, &id, |s| s.status == TaskStatus::Processing);
        assert_eq!((first.completed, first.progress, first.total), (0, 0, 3));
        assert!(matches!(manager.result(&id), Err(TaskError::NotReady(_))));

        GatedBackend::release(&gate);
        let one = wait_for(&manager, &id, |s| s.completed == 1);
        assert_eq!(one.progress, 33);

        GatedBackend::release(&gate);
        let two = wait_for(&manager, &id, |s| s.completed == 2);
        assert_eq!(two.progress, 67);

        GatedBackend::release(&gate);
        let done = wait_until_terminal(&manager, &id);
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.progress, 100);
        assert_eq!(done.error, None);
    }

    #[test]
    fn completed_task_result_is_stable() {
        let manager = manager(store_with(&["a"]), Arc::new(MockBackend::new()));
        let id = manager.create_task(&request(&["a"], ResizeMode::Fit)).unwrap();
        wait_until_terminal(&manager, &id);

        let first = manager.result(&id).unwrap();
        let second = manager.result(&id).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.bytes, Bytes::from_static(b"mock-0"));
        assert_eq!(first.content_type, "image/png");
        assert_eq!(first.filename, "resized_a.png");
    }

    #[test]
    fn multi_item_task_is_zipped() {
        let manager = manager(store_with(&["a", "b"]), Arc::new(MockBackend::new()));
        let id = manager
            .create_task(&request(&["a", "b"], ResizeMode::Fit))
            .unwrap();
        wait_until_terminal(&manager, &id);

        let artifact = manager.result(&id).unwrap();
        assert_eq!(artifact.content_type, "application/zip");
        assert_eq!(artifact.filename, "resized_images.zip");
    }

    #[test]
    fn first_failure_stops_the_task() {
        let backend = Arc::new(MockBackend::failing_on(&[1]));
        let manager = manager(store_with(&["a", "b", "c"]), backend.clone());
        let id = manager
            .create_task(&request(&["a", "b", "c"], ResizeMode::Fit))
            .unwrap();

        let snapshot = wait_until_terminal(&manager, &id);
        assert_eq!(snapshot.status, TaskStatus::Error);
        assert_eq!(snapshot.completed, 1);
        assert_eq!(snapshot.progress, 33);
        let error = snapshot.error.unwrap();
        assert!(error.starts_with("b.png: "), "{error}");
        assert!(error.contains("mock failure"));

        // The third item was never attempted
        assert_eq!(backend.get_operations().len(), 2);
        assert!(matches!(manager.result(&id), Err(TaskError::NotReady(_))));
    }

    #[test]
    fn backend_panic_marks_task_failed() {
        let manager = manager(store_with(&["a"]), Arc::new(PanickingBackend));
        let id = manager.create_task(&request(&["a"], ResizeMode::Fit)).unwrap();

        let snapshot = wait_until_terminal(&manager, &id);
        assert_eq!(snapshot.status, TaskStatus::Error);
        assert!(snapshot.error.unwrap().contains("panicked"));
    }

    #[test]
    fn fill_colors_resolved_per_item() {
        let backend = Arc::new(MockBackend::new());
        let manager = manager(store_with(&["a", "b"]), backend.clone());
        let req = request(&["a", "b"], ResizeMode::Fill)
            .with_fill_color("#00ff00")
            .with_fill_colors(HashMap::from([(FileId::from("a"), "#ff0000".to_string())]));
        let id = manager.create_task(&req).unwrap();
        wait_until_terminal(&manager, &id);

        let colors: Vec<Option<HexColor>> = backend
            .get_operations()
            .into_iter()
            .filter_map(|op| match op {
                RecordedOp::Resize { fill_color, .. } => Some(fill_color),
                RecordedOp::Identify(_) => None,
            })
            .collect();
        assert_eq!(
            colors,
            vec![Some(HexColor([255, 0, 0])), Some(HexColor([0, 255, 0]))]
        );
    }

    #[test]
    fn concurrent_tasks_complete_independently() {
        let manager = manager(store_with(&["a", "b"]), Arc::new(MockBackend::new()));
        let first = manager.create_task(&request(&["a"], ResizeMode::Fit)).unwrap();
        let second = manager
            .create_task(&request(&["a", "b"], ResizeMode::Stretch))
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(wait_until_terminal(&manager, &first).status, TaskStatus::Completed);
        assert_eq!(wait_until_terminal(&manager, &second).status, TaskStatus::Completed);
        assert_eq!(manager.len(), 2);
    }

    // =========================================================================
    // Cleanup and expiry
    // =========================================================================

    #[test]
    fn cleanup_keeps_sources_shared_with_other_tasks() {
        let store = store_with(&["a", "b"]);
        let manager = manager(Arc::clone(&store), Arc::new(MockBackend::new()));
        let first = manager
            .create_task(&request(&["a", "b"], ResizeMode::Fit))
            .unwrap();
        let second = manager.create_task(&request(&["b"], ResizeMode::Fit)).unwrap();
        wait_until_terminal(&manager, &first);
        wait_until_terminal(&manager, &second);

        manager.cleanup(&first).unwrap();

        assert!(matches!(manager.progress(&first), Err(TaskError::TaskNotFound(_))));
        assert!(!store.contains(&"a".into()));
        assert!(store.contains(&"b".into()));
        assert!(manager.progress(&second).is_ok());
    }

    #[test]
    fn purge_drops_old_terminal_tasks_and_their_sources() {
        let store = store_with(&["a", "idle"]);
        let manager = manager(Arc::clone(&store), Arc::new(MockBackend::new()));
        let id = manager.create_task(&request(&["a"], ResizeMode::Fit)).unwrap();
        wait_until_terminal(&manager, &id);

        // Within the window nothing goes
        assert_eq!(manager.purge_expired(Utc::now()), PurgeStats::default());

        let stats = manager.purge_expired(Utc::now() + Duration::hours(2));
        assert_eq!(stats, PurgeStats { tasks: 1, uploads: 2 });
        assert!(manager.is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn purge_spares_running_tasks() {
        let (backend, gate) = GatedBackend::new();
        let store = store_with(&["a"]);
        let manager = manager(Arc::clone(&store), Arc::new(backend));
        let id = manager.create_task(&request(&["a"], ResizeMode::Fit)).unwrap();
        wait_for(&manager, &id, |s| s.status == TaskStatus::Processing);

        let stats = manager.purge_expired(Utc::now() + Duration::hours(2));
        assert_eq!(stats, PurgeStats::default());
        assert!(store.contains(&"a".into()));

        GatedBackend::release(&gate);
        assert_eq!(wait_until_terminal(&manager, &id).status, TaskStatus::Completed);
    }
}
