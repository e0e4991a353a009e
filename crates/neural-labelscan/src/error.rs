//! Error types for the label scan store.

use crate::config::ConfigError;
use crate::store::StoreState;
use neural_core::AffinityError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by an index backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Error from tantivy
    #[error("Tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    /// The index directory could not be opened
    #[error("Failed to open index directory: {0}")]
    OpenDirectory(#[from] tantivy::directory::error::OpenDirectoryError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Document bytes could not be encoded or decoded
    #[error("Document encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    /// On-disk state failed structural validation
    #[error("Index is corrupt: {0}")]
    Corrupt(String),
}

/// Failure reported by the primary store while streaming node labels.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SourceError {
    message: String,
}

impl SourceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Reasons a full rebuild was aborted. The store is left `Failed`.
#[derive(Debug, Error)]
pub enum RebuildError {
    /// The store refused to enter or leave the rebuilding state
    #[error("Label scan store rejected the rebuild: {0}")]
    Store(#[source] Box<LabelScanError>),

    /// A document write or commit failed mid-stream
    #[error("Backend failed after {processed} nodes: {source}")]
    Backend {
        processed: u64,
        #[source]
        source: BackendError,
    },

    /// The full store stream failed mid-stream
    #[error("Full store stream failed after {processed} nodes: {source}")]
    Source {
        processed: u64,
        #[source]
        source: SourceError,
    },

    /// Cancellation was requested; observed at a commit boundary
    #[error("Rebuild cancelled after {processed} nodes")]
    Cancelled { processed: u64 },
}

impl RebuildError {
    pub(crate) fn from_store(processed: u64, error: LabelScanError) -> Self {
        match error {
            LabelScanError::BackendWrite(source) => Self::Backend { processed, source },
            other => Self::Store(Box::new(other)),
        }
    }
}

/// Errors that can occur during label scan store operations.
#[derive(Debug, Error)]
pub enum LabelScanError {
    /// Queried or written while not serving
    #[error("Label scan store is not ready (state: {0})")]
    NotReady(StoreState),

    /// On-disk index failed validation during init
    #[error("Label scan store at {} is corrupt: {reason}", .path.display())]
    CorruptStore { path: PathBuf, reason: String },

    /// A document write, delete or commit failed; the update was not applied
    #[error("Backend write failed: {0}")]
    BackendWrite(#[source] BackendError),

    /// A backend read or open failed
    #[error("Backend error: {0}")]
    Backend(#[source] BackendError),

    /// Full rebuild aborted
    #[error("Rebuild failed: {0}")]
    Rebuild(#[from] RebuildError),

    /// Entity handle rejected at a transaction boundary
    #[error(transparent)]
    Affinity(#[from] AffinityError),

    /// Bad or missing configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// Another store instance holds the directory
    #[error("Directory {} is already leased by another label scan store", .0.display())]
    DirectoryInUse(PathBuf),

    /// The store was shut down and released its directory
    #[error("Label scan store at {} has been shut down", .0.display())]
    Shutdown(PathBuf),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for label scan operations.
pub type Result<T> = std::result::Result<T, LabelScanError>;
