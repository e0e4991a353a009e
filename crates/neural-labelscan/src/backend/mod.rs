//! Index backends: document storage and search behind the label scan store.
//!
//! A backend stores one [`IndexDocument`] per node and answers "which nodes
//! carry label L" from its last commit. Writes are buffered until
//! [`IndexBackend::commit`], which records whether the committed content is a
//! complete index or the intermediate state of a running rebuild.
//!
//! ```text
//!   LabelScanStore ──► DirectoryFactory::open(path) ──► Arc<dyn IndexBackend>
//!                                                          │
//!                        ┌─────────────────────────────────┴──────────┐
//!                        ▼                                            ▼
//!               TantivyLabelIndex (on disk)               MemoryLabelIndex
//! ```

pub mod memory;
pub mod tantivy_index;

pub use memory::{InMemoryDirectoryFactory, MemoryLabelIndex};
pub use tantivy_index::{TantivyDirectoryFactory, TantivyLabelIndex};

use crate::document::IndexDocument;
use crate::error::BackendError;
use neural_core::{LabelId, NodeId};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Lazy, finite sequence of node ids matching one label.
pub type NodeIds = Box<dyn Iterator<Item = NodeId> + Send>;

/// What a commit represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Completeness {
    /// The committed content is the full index.
    Complete,
    /// The commit was taken at a batch boundary of an unfinished rebuild.
    Partial,
}

impl Completeness {
    /// Returns the marker stored alongside a commit.
    pub fn as_str(self) -> &'static str {
        match self {
            Completeness::Complete => "complete",
            Completeness::Partial => "partial",
        }
    }

    /// Parses a stored commit marker.
    pub fn parse(marker: &str) -> Option<Self> {
        match marker {
            "complete" => Some(Completeness::Complete),
            "partial" => Some(Completeness::Partial),
            _ => None,
        }
    }
}

impl fmt::Display for Completeness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directory-backed document index.
///
/// Implementations are internally synchronized. Searches see the last commit
/// only; [`read_document`](Self::read_document) also sees pending writes.
pub trait IndexBackend: Send + Sync {
    /// Replaces the document of `document.node()`.
    fn write_document(&self, document: &IndexDocument) -> Result<(), BackendError>;

    /// Removes the document of `node`, if any.
    fn delete_document(&self, node: NodeId) -> Result<(), BackendError>;

    /// Returns the current document of `node`, including uncommitted writes.
    fn read_document(&self, node: NodeId) -> Result<Option<IndexDocument>, BackendError>;

    /// Removes every document.
    fn delete_all(&self) -> Result<(), BackendError>;

    /// Makes pending writes durable and visible to searches.
    fn commit(&self, completeness: Completeness) -> Result<(), BackendError>;

    /// Returns the marker of the last commit, or `None` if nothing was ever
    /// committed through this interface.
    fn last_commit(&self) -> Result<Option<Completeness>, BackendError>;

    /// Returns the nodes carrying `label` as of the last commit.
    fn search(&self, label: LabelId) -> Result<NodeIds, BackendError>;

    /// Counts the nodes carrying `label` as of the last commit.
    fn count(&self, label: LabelId) -> Result<u64, BackendError>;
}

/// Opens backends bound to a directory.
pub trait DirectoryFactory: Send + Sync {
    /// Backend name, used as the last path component of the index directory.
    fn name(&self) -> &str;

    /// Opens the index stored at `path`, creating an empty one when none exists.
    ///
    /// Structural problems with existing content are reported as
    /// [`BackendError::Corrupt`].
    fn open(&self, path: &Path) -> Result<Arc<dyn IndexBackend>, BackendError>;

    /// Discards backend state kept outside the directory itself.
    fn destroy(&self, _path: &Path) -> Result<(), BackendError> {
        Ok(())
    }
}
