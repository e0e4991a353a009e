//! Heap-resident label index for tests and embedded use.
//!
//! Committed content lives as encoded documents plus an inverted
//! label → node map. Indexes are kept per path by the factory, so reopening a
//! path within one process sees its last commit, like a directory would.

use super::{Completeness, DirectoryFactory, IndexBackend, NodeIds};
use crate::document::IndexDocument;
use crate::error::BackendError;
use neural_core::{LabelId, NodeId};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

#[derive(Debug, Default)]
struct Committed {
    /// Encoded documents, by node.
    documents: BTreeMap<NodeId, Vec<u8>>,
    by_label: HashMap<LabelId, BTreeSet<NodeId>>,
    last_commit: Option<Completeness>,
}

impl Committed {
    fn remove(&mut self, node: NodeId) -> Result<(), BackendError> {
        if let Some(bytes) = self.documents.remove(&node) {
            let previous = IndexDocument::from_bytes(&bytes)?;
            for label in previous.labels() {
                if let Some(nodes) = self.by_label.get_mut(label) {
                    nodes.remove(&node);
                    if nodes.is_empty() {
                        self.by_label.remove(label);
                    }
                }
            }
        }
        Ok(())
    }

    fn insert(&mut self, document: &IndexDocument) -> Result<(), BackendError> {
        self.remove(document.node())?;
        for label in document.labels() {
            self.by_label.entry(*label).or_default().insert(document.node());
        }
        self.documents.insert(document.node(), document.to_bytes()?);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Pending {
    /// Writes in arrival order; `None` marks a delete.
    writes: Vec<(NodeId, Option<IndexDocument>)>,
    latest: HashMap<NodeId, Option<IndexDocument>>,
    cleared: bool,
}

/// An in-process label index.
#[derive(Debug, Default)]
pub struct MemoryLabelIndex {
    committed: RwLock<Committed>,
    pending: Mutex<Pending>,
}

impl MemoryLabelIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn pending(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, node: NodeId, document: Option<IndexDocument>) {
        let mut pending = self.pending();
        pending.latest.insert(node, document.clone());
        pending.writes.push((node, document));
    }
}

impl IndexBackend for MemoryLabelIndex {
    fn write_document(&self, document: &IndexDocument) -> Result<(), BackendError> {
        self.record(document.node(), Some(document.clone()));
        Ok(())
    }

    fn delete_document(&self, node: NodeId) -> Result<(), BackendError> {
        self.record(node, None);
        Ok(())
    }

    fn read_document(&self, node: NodeId) -> Result<Option<IndexDocument>, BackendError> {
        {
            let pending = self.pending();
            if let Some(document) = pending.latest.get(&node) {
                return Ok(document.clone());
            }
            if pending.cleared {
                return Ok(None);
            }
        }
        let committed = self.committed.read().unwrap_or_else(PoisonError::into_inner);
        committed
            .documents
            .get(&node)
            .map(|bytes| IndexDocument::from_bytes(bytes))
            .transpose()
    }

    fn delete_all(&self) -> Result<(), BackendError> {
        let mut pending = self.pending();
        pending.writes.clear();
        pending.latest.clear();
        pending.cleared = true;
        Ok(())
    }

    fn commit(&self, completeness: Completeness) -> Result<(), BackendError> {
        let mut pending = self.pending();
        let mut committed = self.committed.write().unwrap_or_else(PoisonError::into_inner);

        if pending.cleared {
            *committed = Committed::default();
        }
        for (node, document) in pending.writes.drain(..) {
            match document {
                Some(document) => committed.insert(&document)?,
                None => committed.remove(node)?,
            }
        }
        pending.latest.clear();
        pending.cleared = false;
        committed.last_commit = Some(completeness);
        Ok(())
    }

    fn last_commit(&self) -> Result<Option<Completeness>, BackendError> {
        let committed = self.committed.read().unwrap_or_else(PoisonError::into_inner);
        Ok(committed.last_commit)
    }

    fn search(&self, label: LabelId) -> Result<NodeIds, BackendError> {
        let committed = self.committed.read().unwrap_or_else(PoisonError::into_inner);
        // Snapshot of the label's list; later commits do not affect it
        let nodes: Vec<NodeId> = committed
            .by_label
            .get(&label)
            .map(|nodes| nodes.iter().copied().collect())
            .unwrap_or_default();
        Ok(Box::new(nodes.into_iter()))
    }

    fn count(&self, label: LabelId) -> Result<u64, BackendError> {
        let committed = self.committed.read().unwrap_or_else(PoisonError::into_inner);
        Ok(committed.by_label.get(&label).map_or(0, |nodes| nodes.len() as u64))
    }
}

/// Hands out one [`MemoryLabelIndex`] per path.
#[derive(Debug, Default)]
pub struct InMemoryDirectoryFactory {
    indexes: Mutex<HashMap<PathBuf, Arc<MemoryLabelIndex>>>,
}

impl InMemoryDirectoryFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DirectoryFactory for InMemoryDirectoryFactory {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn open(&self, path: &Path) -> Result<Arc<dyn IndexBackend>, BackendError> {
        let mut indexes = self.indexes.lock().unwrap_or_else(PoisonError::into_inner);
        let index = indexes
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(MemoryLabelIndex::new()));
        Ok(Arc::clone(index) as Arc<dyn IndexBackend>)
    }

    fn destroy(&self, path: &Path) -> Result<(), BackendError> {
        let mut indexes = self.indexes.lock().unwrap_or_else(PoisonError::into_inner);
        indexes.remove(path);
        Ok(())
    }
}
