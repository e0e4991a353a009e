//! # Neural Labelscan
//!
//! Label scan store for NeuralGraphDB: a secondary index answering "which
//! nodes carry label L" without scanning the node store.
//!
//! ```text
//!  LabelScanExtensionFactory ──create──► LabelScanStoreProvider ──► LabelScanProviders::select
//!                                               │
//!                                               ▼
//!  FullStoreLabelUpdateStream ──► RebuildCoordinator ──► LabelScanStore ──► IndexBackend
//!                                                          ▲    │            (tantivy / in-memory)
//!                                 apply_update / query ────┘    └─► DocumentStructure
//! ```
//!
//! On startup the store recovers a complete on-disk index or rebuilds it
//! from the primary store. In steady state every label change goes through
//! [`LabelScanStore::apply_update`] and reads through [`LabelScanStore::query`].

pub mod backend;
pub mod config;
pub mod document;
pub mod error;
pub mod extension;
pub mod fs;
pub mod logging;
pub mod monitor;
pub mod provider;
pub mod rebuild;
pub mod store;
pub mod update;

// Re-exports
pub use backend::{Completeness, DirectoryFactory, IndexBackend, NodeIds};
pub use config::{ConfigError, ConfigLookup, LabelScanConfig, LabelScanSettings};
pub use document::{DocumentStructure, IndexDocument};
pub use error::{BackendError, LabelScanError, RebuildError, Result, SourceError};
pub use extension::{
    label_scan_store_path, ExtensionDependencies, InMemoryLabelScanExtension,
    LabelScanDependencies, LabelScanExtensionFactory, TantivyLabelScanExtension,
};
pub use fs::{DirectoryLease, FileSystem, LocalFileSystem};
pub use monitor::{LabelScanMonitor, TracingMonitor};
pub use provider::{LabelScanProviders, LabelScanStoreProvider};
pub use rebuild::{RebuildCancellation, RebuildCoordinator, RebuildSummary};
pub use store::{LabelScanStore, LabelScanStoreBuilder, StoreState};
pub use update::{FullStoreLabelUpdateStream, NodeLabelUpdate, NodeLabels};
