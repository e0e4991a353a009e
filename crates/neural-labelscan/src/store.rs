//! The label scan store: a label → node secondary index bound to one directory.
//!
//! # State machine
//!
//! ```text
//!                init                 begin_rebuild            end_rebuild(true)
//!   ┌───────────────┐ absent / partial ┌──────────────┐ ───────────────► ┌───────┐
//!   │ Uninitialized │ ───────────────► │  Rebuilding  │                  │ Ready │
//!   └───────────────┘                  └──────────────┘ ◄─────────────── └───────┘
//!          ▲                                  │          begin_rebuild
//!          │ drop_index                       │ end_rebuild(false)
//!   ┌──────┴───┐ ◄────────────────────────────┘
//!   │  Failed  │   (also: init on a corrupt index)
//!   └──────────┘
//! ```
//!
//! Queries are served only when `Ready`. Writes are serialized behind a single
//! mutex; while `Rebuilding` they are queued and replayed in arrival order
//! before the store becomes `Ready`.

use crate::backend::{Completeness, DirectoryFactory, IndexBackend, NodeIds, TantivyDirectoryFactory};
use crate::document::DocumentStructure;
use crate::error::{BackendError, LabelScanError, Result};
use crate::fs::{DirectoryLease, FileSystem, LocalFileSystem};
use crate::monitor::{LabelScanMonitor, TracingMonitor};
use crate::rebuild::{RebuildCoordinator, RebuildSummary, DEFAULT_REBUILD_BATCH_SIZE};
use crate::update::{FullStoreLabelUpdateStream, NodeLabelUpdate, NodeLabels};
use neural_core::{LabelId, LabelSet, NodeEntity, Transaction};
use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

/// Lifecycle state of a label scan store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreState {
    /// No usable index; a full rebuild is required.
    Uninitialized,
    /// A full rebuild is running. Queries fail fast.
    Rebuilding,
    /// Serving queries and accepting updates.
    Ready,
    /// The index is corrupt or the last rebuild was aborted.
    Failed,
}

impl StoreState {
    fn as_str(self) -> &'static str {
        match self {
            StoreState::Uninitialized => "uninitialized",
            StoreState::Rebuilding => "rebuilding",
            StoreState::Ready => "ready",
            StoreState::Failed => "failed",
        }
    }
}

impl fmt::Display for StoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Serving {
    state: StoreState,
    /// `None` before `init`, after `shutdown`, and when the index could not be opened.
    backend: Option<Arc<dyn IndexBackend>>,
}

/// Label → node index over a single directory.
///
/// # Example
///
/// ```ignore
/// use neural_labelscan::{LabelScanStore, NodeLabelUpdate};
/// use neural_core::{LabelId, NodeId};
///
/// let store = LabelScanStore::builder("/data/schema/label/tantivy")
///     .full_store_stream(primary_store_labels)
///     .build()?;
/// store.start()?;
///
/// store.apply_update(NodeLabelUpdate::added(NodeId::new(1), [LabelId::new(3)]))?;
/// store.commit()?;
/// let people: Vec<_> = store.query(LabelId::new(3))?.collect();
/// ```
pub struct LabelScanStore {
    path: PathBuf,
    factory: Arc<dyn DirectoryFactory>,
    file_system: Arc<dyn FileSystem>,
    full_store: Arc<dyn FullStoreLabelUpdateStream>,
    monitor: Arc<dyn LabelScanMonitor>,
    rebuild_batch_size: usize,
    rebuild_on_corruption: bool,
    structure: DocumentStructure,
    serving: RwLock<Serving>,
    /// Single-writer lock. Holds the updates that arrived during a rebuild.
    writes: Mutex<VecDeque<NodeLabelUpdate>>,
    /// Why the last `init` found the index unusable.
    corruption: Mutex<Option<String>>,
    lease: Mutex<Option<DirectoryLease>>,
}

impl LabelScanStore {
    /// Starts building a store bound to `path`.
    pub fn builder(path: impl Into<PathBuf>) -> LabelScanStoreBuilder {
        LabelScanStoreBuilder::new(path)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the index directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> StoreState {
        self.serving().state
    }

    /// Returns the name of the backend implementation.
    pub fn backend_name(&self) -> &str {
        self.factory.name()
    }

    pub(crate) fn monitor(&self) -> &dyn LabelScanMonitor {
        self.monitor.as_ref()
    }

    fn serving(&self) -> RwLockReadGuard<'_, Serving> {
        self.serving.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn serving_mut(&self) -> RwLockWriteGuard<'_, Serving> {
        self.serving.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn writes(&self) -> MutexGuard<'_, VecDeque<NodeLabelUpdate>> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_corruption(&self, reason: Option<String>) {
        *self.corruption.lock().unwrap_or_else(PoisonError::into_inner) = reason;
    }

    fn corrupt_store_error(&self) -> Option<LabelScanError> {
        let reason = self
            .corruption
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()?;
        Some(LabelScanError::CorruptStore {
            path: self.path.clone(),
            reason,
        })
    }

    fn ensure_leased(&self) -> Result<()> {
        let lease = self.lease.lock().unwrap_or_else(PoisonError::into_inner);
        match lease.as_ref() {
            Some(_) => Ok(()),
            None => Err(LabelScanError::Shutdown(self.path.clone())),
        }
    }

    /// Returns the backend if the store is in one of `states`.
    fn backend_in(&self, states: &[StoreState]) -> Result<Arc<dyn IndexBackend>> {
        let serving = self.serving();
        match &serving.backend {
            Some(backend) if states.contains(&serving.state) => Ok(Arc::clone(backend)),
            _ => Err(LabelScanError::NotReady(serving.state)),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Opens the on-disk index and reports what was found.
    ///
    /// `Ready` for a complete index, `Uninitialized` for a missing index or one
    /// left behind by an unfinished rebuild, `Failed` for a corrupt one.
    /// A store that was `Ready` commits its accepted writes before reopening.
    pub fn init(&self) -> Result<StoreState> {
        self.ensure_leased()?;
        let _writes = self.writes();
        // Close the previous backend first; tantivy allows one writer per directory
        let (previous_state, previous) = {
            let mut serving = self.serving_mut();
            let state = serving.state;
            serving.state = StoreState::Uninitialized;
            (state, serving.backend.take())
        };
        if let (StoreState::Ready, Some(backend)) = (previous_state, previous) {
            backend
                .commit(Completeness::Complete)
                .map_err(LabelScanError::BackendWrite)?;
        }

        let (state, backend) = match self.factory.open(&self.path) {
            Ok(backend) => match backend.last_commit() {
                Ok(Some(Completeness::Complete)) => (StoreState::Ready, Some(backend)),
                Ok(Some(Completeness::Partial)) => {
                    self.monitor.incomplete_index(&self.path);
                    (StoreState::Uninitialized, Some(backend))
                }
                Ok(None) => {
                    self.monitor.no_index(&self.path);
                    (StoreState::Uninitialized, Some(backend))
                }
                Err(BackendError::Corrupt(reason)) => {
                    self.monitor.corrupt_index(&self.path, &reason);
                    self.set_corruption(Some(reason));
                    (StoreState::Failed, None)
                }
                Err(e) => return Err(LabelScanError::Backend(e)),
            },
            Err(BackendError::Corrupt(reason)) => {
                self.monitor.corrupt_index(&self.path, &reason);
                self.set_corruption(Some(reason));
                (StoreState::Failed, None)
            }
            Err(e) => return Err(LabelScanError::Backend(e)),
        };

        if state != StoreState::Failed {
            self.set_corruption(None);
        }
        {
            let mut serving = self.serving_mut();
            serving.state = state;
            serving.backend = backend;
        }

        self.monitor.init(&self.path, state);
        Ok(state)
    }

    /// Brings the store to `Ready`: recovers a complete index, otherwise
    /// rebuilds it from the full store stream.
    ///
    /// A corrupt index is deleted and rebuilt when `rebuild_on_corruption` is
    /// set; otherwise its `CorruptStore` error is returned.
    pub fn start(&self) -> Result<StoreState> {
        match self.init()? {
            StoreState::Ready => {
                tracing::info!(path = %self.path.display(), "Recovered label scan store");
            }
            StoreState::Failed => {
                if !self.rebuild_on_corruption {
                    return Err(self.corrupt_store_error().unwrap_or_else(|| {
                        LabelScanError::NotReady(StoreState::Failed)
                    }));
                }
                tracing::warn!(
                    path = %self.path.display(),
                    "Deleting corrupt label scan index before rebuilding"
                );
                self.drop_index()?;
                self.rebuild()?;
            }
            StoreState::Uninitialized | StoreState::Rebuilding => {
                self.rebuild()?;
            }
        }
        Ok(self.state())
    }

    /// Rebuilds the index from the configured full store stream.
    pub fn rebuild(&self) -> Result<RebuildSummary> {
        let coordinator = RebuildCoordinator::new(self.rebuild_batch_size);
        Ok(coordinator.rebuild(self, self.full_store.as_ref())?)
    }

    /// Returns the full store stream rebuilds read from.
    pub fn full_store_stream(&self) -> Arc<dyn FullStoreLabelUpdateStream> {
        Arc::clone(&self.full_store)
    }

    /// Returns the configured rebuild commit interval.
    pub fn rebuild_batch_size(&self) -> usize {
        self.rebuild_batch_size
    }

    /// Commits outstanding writes, closes the backend and releases the directory.
    ///
    /// A running rebuild fails on its next write. Calling this twice is a no-op.
    pub fn shutdown(&self) -> Result<()> {
        let mut queue = self.writes();
        let (state, backend) = {
            let mut serving = self.serving_mut();
            let state = serving.state;
            serving.state = StoreState::Uninitialized;
            (state, serving.backend.take())
        };
        queue.clear();

        let committed = match (state, backend) {
            (StoreState::Ready, Some(backend)) => backend
                .commit(Completeness::Complete)
                .map_err(LabelScanError::BackendWrite),
            _ => Ok(()),
        };

        if let Some(lease) = self.lease.lock().unwrap_or_else(PoisonError::into_inner).take() {
            tracing::info!(path = %lease.path().display(), %state, "Label scan store shut down");
        }
        committed
    }

    /// Deletes the index directory. The store is left `Uninitialized` and
    /// keeps its lease; a rebuild recreates the index.
    pub fn drop_index(&self) -> Result<()> {
        self.ensure_leased()?;
        let mut queue = self.writes();
        {
            let mut serving = self.serving_mut();
            serving.backend = None;
            serving.state = StoreState::Uninitialized;
        }
        queue.clear();

        self.factory
            .destroy(&self.path)
            .map_err(LabelScanError::Backend)?;
        self.file_system.delete_recursively(&self.path)?;
        self.file_system.mkdirs(&self.path)?;
        self.set_corruption(None);

        tracing::info!(path = %self.path.display(), "Dropped label scan index");
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Returns the nodes carrying `label` as of the last commit.
    ///
    /// Fails with `NotReady` unless the store is `Ready`; never waits for a
    /// rebuild. The sequence is lazy and unaffected by later writes; issue the
    /// query again to observe them.
    pub fn query(&self, label: LabelId) -> Result<NodeIds> {
        let backend = self.backend_in(&[StoreState::Ready])?;
        backend.search(label).map_err(LabelScanError::Backend)
    }

    /// Counts the nodes carrying `label` as of the last commit.
    pub fn node_count_for(&self, label: LabelId) -> Result<u64> {
        let backend = self.backend_in(&[StoreState::Ready])?;
        backend.count(label).map_err(LabelScanError::Backend)
    }

    /// Returns the indexed labels of `node` for use inside `transaction`.
    ///
    /// The node handle must pass the entity affinity check for `transaction`.
    pub fn labels_of(&self, transaction: &Transaction, node: &NodeEntity) -> Result<LabelSet> {
        let node = transaction.validate_same_db(node)?;
        let backend = self.backend_in(&[StoreState::Ready])?;
        let document = backend
            .read_document(node.id())
            .map_err(LabelScanError::Backend)?;
        Ok(document
            .map(|document| self.structure.labels(&document))
            .unwrap_or_default())
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Applies one node's label change.
    ///
    /// In `Ready` the change is written to the backend and becomes visible at
    /// the next [`commit`](Self::commit). In `Rebuilding` it is queued and
    /// replayed when the rebuild completes. Any other state rejects it.
    pub fn apply_update(&self, update: NodeLabelUpdate) -> Result<()> {
        let mut queue = self.writes();
        let (state, backend) = {
            let serving = self.serving();
            (serving.state, serving.backend.clone())
        };

        match (state, backend) {
            (StoreState::Ready, Some(backend)) => self
                .write_update(backend.as_ref(), &update)
                .map_err(LabelScanError::BackendWrite),
            (StoreState::Rebuilding, _) => {
                queue.push_back(update);
                self.monitor.update_queued(queue.len());
                Ok(())
            }
            (state, _) => Err(LabelScanError::NotReady(state)),
        }
    }

    /// Makes written updates durable and visible to queries.
    ///
    /// During a rebuild this records a partial commit.
    pub fn commit(&self) -> Result<()> {
        let _writes = self.writes();
        let state = self.state();
        let completeness = match state {
            StoreState::Ready => Completeness::Complete,
            StoreState::Rebuilding => Completeness::Partial,
            other => return Err(LabelScanError::NotReady(other)),
        };
        let backend = self.backend_in(&[state])?;
        backend
            .commit(completeness)
            .map_err(LabelScanError::BackendWrite)
    }

    /// Writes the document for `update`, replacing the node's previous one.
    fn write_update(
        &self,
        backend: &dyn IndexBackend,
        update: &NodeLabelUpdate,
    ) -> std::result::Result<(), BackendError> {
        let node = update.node();
        if update.is_node_deleted() {
            return backend.delete_document(node);
        }

        let current = backend
            .read_document(node)?
            .map(|document| self.structure.labels(&document))
            .unwrap_or_default();
        let next = update.apply_to(&current);

        if next == current {
            Ok(())
        } else if next.is_empty() {
            backend.delete_document(node)
        } else {
            backend.write_document(&self.structure.document(node, &next))
        }
    }

    // =========================================================================
    // Rebuild protocol
    // =========================================================================

    /// Enters `Rebuilding`, discarding the current index content.
    ///
    /// Valid from `Ready`, `Uninitialized`, and `Failed` after an aborted
    /// rebuild. A store that found its index corrupt must be dropped first.
    pub fn begin_rebuild(&self) -> Result<()> {
        self.ensure_leased()?;
        let mut queue = self.writes();

        let backend = {
            let mut serving = self.serving_mut();
            if serving.state == StoreState::Rebuilding {
                return Err(LabelScanError::NotReady(StoreState::Rebuilding));
            }
            let backend = if let Some(backend) = serving.backend.clone() {
                backend
            } else {
                if let Some(err) = self.corrupt_store_error() {
                    return Err(err);
                }
                let backend = self.factory.open(&self.path).map_err(|e| match e {
                    BackendError::Corrupt(reason) => LabelScanError::CorruptStore {
                        path: self.path.clone(),
                        reason,
                    },
                    other => LabelScanError::Backend(other),
                })?;
                serving.backend = Some(Arc::clone(&backend));
                backend
            };
            serving.state = StoreState::Rebuilding;
            backend
        };
        queue.clear();

        let cleared = backend
            .delete_all()
            .and_then(|()| backend.commit(Completeness::Partial));
        if let Err(e) = cleared {
            self.serving_mut().state = StoreState::Failed;
            return Err(LabelScanError::BackendWrite(e));
        }

        self.monitor.rebuilding();
        Ok(())
    }

    /// Writes one node of the full store stream.
    pub(crate) fn write_rebuild_record(&self, item: NodeLabels) -> Result<()> {
        let _writes = self.writes();
        let backend = self.backend_in(&[StoreState::Rebuilding])?;
        self.write_update(backend.as_ref(), &NodeLabelUpdate::from(item))
            .map_err(LabelScanError::BackendWrite)
    }

    /// Leaves `Rebuilding`.
    ///
    /// On success the queued updates are replayed in arrival order and
    /// committed before the store becomes `Ready`. On failure they are
    /// discarded and the store becomes `Failed`.
    pub fn end_rebuild(&self, success: bool) -> Result<StoreState> {
        let mut queue = self.writes();
        let backend = self.backend_in(&[StoreState::Rebuilding])?;

        if !success {
            let discarded = queue.len();
            queue.clear();
            self.serving_mut().state = StoreState::Failed;
            tracing::debug!(discarded, "Discarded label updates queued during failed rebuild");
            return Ok(StoreState::Failed);
        }

        let replayed = queue.len();
        let result = queue
            .drain(..)
            .try_for_each(|update| self.write_update(backend.as_ref(), &update))
            .and_then(|()| backend.commit(Completeness::Complete));
        if let Err(e) = result {
            queue.clear();
            self.serving_mut().state = StoreState::Failed;
            return Err(LabelScanError::BackendWrite(e));
        }
        self.monitor.updates_replayed(replayed);

        self.serving_mut().state = StoreState::Ready;
        self.set_corruption(None);
        Ok(StoreState::Ready)
    }
}

impl fmt::Debug for LabelScanStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LabelScanStore")
            .field("path", &self.path)
            .field("backend", &self.factory.name())
            .field("state", &self.state())
            .field("rebuild_batch_size", &self.rebuild_batch_size)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// LabelScanStoreBuilder
// =============================================================================

/// Builder for [`LabelScanStore`].
///
/// `build` creates the directory and takes its lease; nothing is opened until
/// [`LabelScanStore::init`] or [`LabelScanStore::start`].
pub struct LabelScanStoreBuilder {
    path: PathBuf,
    factory: Option<Arc<dyn DirectoryFactory>>,
    file_system: Option<Arc<dyn FileSystem>>,
    full_store: Option<Arc<dyn FullStoreLabelUpdateStream>>,
    monitor: Option<Arc<dyn LabelScanMonitor>>,
    rebuild_batch_size: usize,
    rebuild_on_corruption: bool,
}

impl LabelScanStoreBuilder {
    /// Creates a builder with the tantivy backend and default settings.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            factory: None,
            file_system: None,
            full_store: None,
            monitor: None,
            rebuild_batch_size: DEFAULT_REBUILD_BATCH_SIZE,
            rebuild_on_corruption: false,
        }
    }

    pub fn directory_factory(mut self, factory: Arc<dyn DirectoryFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn file_system(mut self, file_system: Arc<dyn FileSystem>) -> Self {
        self.file_system = Some(file_system);
        self
    }

    /// Sets the authoritative node enumeration used by rebuilds.
    pub fn full_store_stream(mut self, stream: Arc<dyn FullStoreLabelUpdateStream>) -> Self {
        self.full_store = Some(stream);
        self
    }

    pub fn monitor(mut self, monitor: Arc<dyn LabelScanMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Sets how many nodes a rebuild writes between commits.
    pub fn rebuild_batch_size(mut self, batch_size: usize) -> Self {
        self.rebuild_batch_size = batch_size;
        self
    }

    pub fn rebuild_on_corruption(mut self, enabled: bool) -> Self {
        self.rebuild_on_corruption = enabled;
        self
    }

    /// Creates the index directory, leases it and returns the store.
    pub fn build(self) -> Result<LabelScanStore> {
        if self.rebuild_batch_size == 0 {
            return Err(crate::config::ConfigError::Invalid {
                key: crate::config::REBUILD_BATCH_SIZE,
                value: "0".into(),
                reason: "must be at least 1".into(),
            }
            .into());
        }

        let file_system = self
            .file_system
            .unwrap_or_else(|| Arc::new(LocalFileSystem::new()));
        file_system.mkdirs(&self.path)?;
        let lease = file_system.lease(&self.path)?;

        Ok(LabelScanStore {
            path: self.path,
            factory: self
                .factory
                .unwrap_or_else(|| Arc::new(TantivyDirectoryFactory::default())),
            file_system,
            full_store: self
                .full_store
                .unwrap_or_else(|| Arc::new(Vec::<NodeLabels>::new())),
            monitor: self.monitor.unwrap_or_else(|| Arc::new(TracingMonitor)),
            rebuild_batch_size: self.rebuild_batch_size,
            rebuild_on_corruption: self.rebuild_on_corruption,
            structure: DocumentStructure,
            serving: RwLock::new(Serving {
                state: StoreState::Uninitialized,
                backend: None,
            }),
            writes: Mutex::new(VecDeque::new()),
            corruption: Mutex::new(None),
            lease: Mutex::new(Some(lease)),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryDirectoryFactory;
    use neural_core::{label_set, NodeId, TransactionManager};
    use tempfile::TempDir;

    fn memory_store(temp_dir: &TempDir) -> LabelScanStore {
        LabelScanStore::builder(temp_dir.path().join("label"))
            .directory_factory(Arc::new(InMemoryDirectoryFactory::new()))
            .build()
            .unwrap()
    }

    fn ready_store(temp_dir: &TempDir) -> LabelScanStore {
        let store = memory_store(temp_dir);
        assert_eq!(store.init().unwrap(), StoreState::Uninitialized);
        store.begin_rebuild().unwrap();
        store.end_rebuild(true).unwrap();
        store
    }

    fn nodes(store: &LabelScanStore, label: u32) -> Vec<u64> {
        let mut ids: Vec<u64> = store
            .query(LabelId::new(label))
            .unwrap()
            .map(NodeId::as_u64)
            .collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn test_state_display() {
        assert_eq!(StoreState::Ready.to_string(), "ready");
        assert_eq!(StoreState::Uninitialized.to_string(), "uninitialized");
    }

    #[test]
    fn test_queries_before_init_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let store = memory_store(&temp_dir);

        assert_eq!(store.state(), StoreState::Uninitialized);
        assert!(matches!(
            store.query(LabelId::new(1)),
            Err(LabelScanError::NotReady(StoreState::Uninitialized))
        ));
        assert!(matches!(
            store.apply_update(NodeLabelUpdate::added(NodeId::new(1), [LabelId::new(1)])),
            Err(LabelScanError::NotReady(StoreState::Uninitialized))
        ));
    }

    #[test]
    fn test_updates_after_commit_are_visible() {
        let temp_dir = TempDir::new().unwrap();
        let store = ready_store(&temp_dir);

        store
            .apply_update(NodeLabelUpdate::added(NodeId::new(1), [LabelId::new(1), LabelId::new(2)]))
            .unwrap();
        store
            .apply_update(NodeLabelUpdate::added(NodeId::new(2), [LabelId::new(2)]))
            .unwrap();
        assert!(nodes(&store, 2).is_empty());

        store.commit().unwrap();
        assert_eq!(nodes(&store, 1), vec![1]);
        assert_eq!(nodes(&store, 2), vec![1, 2]);
        assert_eq!(store.node_count_for(LabelId::new(2)).unwrap(), 2);
    }

    #[test]
    fn test_same_node_updates_apply_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let store = ready_store(&temp_dir);
        let node = NodeId::new(7);

        store
            .apply_update(NodeLabelUpdate::added(node, [LabelId::new(1), LabelId::new(2)]))
            .unwrap();
        store
            .apply_update(NodeLabelUpdate::removed(node, [LabelId::new(1)]))
            .unwrap();
        store
            .apply_update(NodeLabelUpdate::added(node, [LabelId::new(3)]))
            .unwrap();
        store.commit().unwrap();

        assert!(nodes(&store, 1).is_empty());
        assert_eq!(nodes(&store, 2), vec![7]);
        assert_eq!(nodes(&store, 3), vec![7]);
    }

    #[test]
    fn test_deleted_node_leaves_no_associations() {
        let temp_dir = TempDir::new().unwrap();
        let store = ready_store(&temp_dir);
        let node = NodeId::new(3);

        store
            .apply_update(NodeLabelUpdate::added(node, [LabelId::new(1)]))
            .unwrap();
        store.commit().unwrap();
        store.apply_update(NodeLabelUpdate::node_deleted(node)).unwrap();
        // Id reuse starts from an empty label set
        store
            .apply_update(NodeLabelUpdate::added(node, [LabelId::new(2)]))
            .unwrap();
        store.commit().unwrap();

        assert!(nodes(&store, 1).is_empty());
        assert_eq!(nodes(&store, 2), vec![3]);
    }

    #[test]
    fn test_queries_fail_fast_while_rebuilding() {
        let temp_dir = TempDir::new().unwrap();
        let store = ready_store(&temp_dir);

        store.begin_rebuild().unwrap();
        assert!(matches!(
            store.query(LabelId::new(1)),
            Err(LabelScanError::NotReady(StoreState::Rebuilding))
        ));
        assert!(matches!(
            store.begin_rebuild(),
            Err(LabelScanError::NotReady(StoreState::Rebuilding))
        ));
    }

    #[test]
    fn test_failed_rebuild_discards_queue() {
        let temp_dir = TempDir::new().unwrap();
        let store = ready_store(&temp_dir);

        store.begin_rebuild().unwrap();
        store
            .apply_update(NodeLabelUpdate::added(NodeId::new(1), [LabelId::new(1)]))
            .unwrap();
        assert_eq!(store.end_rebuild(false).unwrap(), StoreState::Failed);
        assert!(store.query(LabelId::new(1)).is_err());

        // A failed store can rebuild again
        store.begin_rebuild().unwrap();
        assert_eq!(store.end_rebuild(true).unwrap(), StoreState::Ready);
        assert!(nodes(&store, 1).is_empty());
    }

    #[test]
    fn test_end_rebuild_requires_rebuilding() {
        let temp_dir = TempDir::new().unwrap();
        let store = ready_store(&temp_dir);
        assert!(matches!(
            store.end_rebuild(true),
            Err(LabelScanError::NotReady(StoreState::Ready))
        ));
    }

    #[test]
    fn test_labels_of_checks_affinity() {
        let temp_dir = TempDir::new().unwrap();
        let store = ready_store(&temp_dir);
        store
            .apply_update(NodeLabelUpdate::added(NodeId::new(1), [LabelId::new(4)]))
            .unwrap();
        store.commit().unwrap();

        let graph = TransactionManager::new("graph");
        let tx = graph.begin();
        let node = tx.node(NodeId::new(1));
        assert_eq!(store.labels_of(&tx, &node).unwrap(), label_set([4]));

        let other = TransactionManager::new("other").begin();
        assert!(matches!(
            store.labels_of(&other, &node),
            Err(LabelScanError::Affinity(_))
        ));

        tx.commit().unwrap();
        let next = graph.begin();
        assert!(matches!(
            store.labels_of(&next, &node),
            Err(LabelScanError::Affinity(_))
        ));
    }

    #[test]
    fn test_shutdown_releases_directory() {
        let temp_dir = TempDir::new().unwrap();
        let fs: Arc<dyn FileSystem> = Arc::new(LocalFileSystem::new());
        let path = temp_dir.path().join("label");

        let store = LabelScanStore::builder(&path)
            .directory_factory(Arc::new(InMemoryDirectoryFactory::new()))
            .file_system(Arc::clone(&fs))
            .build()
            .unwrap();
        let second = LabelScanStore::builder(&path)
            .file_system(Arc::clone(&fs))
            .build();
        assert!(matches!(second, Err(LabelScanError::DirectoryInUse(_))));

        store.shutdown().unwrap();
        store.shutdown().unwrap();
        assert!(matches!(store.init(), Err(LabelScanError::Shutdown(_))));

        assert!(LabelScanStore::builder(&path).file_system(fs).build().is_ok());
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let result = LabelScanStore::builder(temp_dir.path())
            .rebuild_batch_size(0)
            .build();
        assert!(matches!(result, Err(LabelScanError::InvalidConfig(_))));
    }
}
