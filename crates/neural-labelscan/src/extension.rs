//! Extension factories: build a label scan store and its provider from the
//! host's dependencies.
//!
//! The store lives at `<storage.store_dir>/schema/label/<backend-name>`.
//! Creating a provider makes that directory and leases it; the index itself
//! is opened later by [`LabelScanStore::start`].

use crate::backend::tantivy_index::MIN_WRITER_HEAP_BYTES;
use crate::backend::{DirectoryFactory, InMemoryDirectoryFactory, TantivyDirectoryFactory};
use crate::config::{ConfigError, ConfigLookup, LabelScanSettings, StorageConfig, WRITER_HEAP_BYTES};
use crate::error::Result;
use crate::fs::{FileSystem, LocalFileSystem};
use crate::monitor::{LabelScanMonitor, TracingMonitor};
use crate::provider::LabelScanStoreProvider;
use crate::store::LabelScanStore;
use crate::update::FullStoreLabelUpdateStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Priority of the tantivy provider.
pub const TANTIVY_PRIORITY: i32 = 10;
/// Priority of the in-memory provider.
pub const IN_MEMORY_PRIORITY: i32 = 1;

/// What the host supplies to extension factories.
pub trait LabelScanDependencies {
    fn config(&self) -> &dyn ConfigLookup;
    fn file_system(&self) -> Arc<dyn FileSystem>;
    /// Full-rebuild stream over the primary store.
    fn full_store_stream(&self) -> Arc<dyn FullStoreLabelUpdateStream>;
    /// Log sink.
    fn monitor(&self) -> Arc<dyn LabelScanMonitor>;
}

/// Plain [`LabelScanDependencies`] holder.
#[derive(Clone)]
pub struct ExtensionDependencies {
    config: Arc<dyn ConfigLookup>,
    file_system: Arc<dyn FileSystem>,
    full_store: Arc<dyn FullStoreLabelUpdateStream>,
    monitor: Arc<dyn LabelScanMonitor>,
}

impl ExtensionDependencies {
    /// Uses the local file system and the tracing monitor.
    pub fn new(
        config: Arc<dyn ConfigLookup>,
        full_store: Arc<dyn FullStoreLabelUpdateStream>,
    ) -> Self {
        Self {
            config,
            file_system: Arc::new(LocalFileSystem::new()),
            full_store,
            monitor: Arc::new(TracingMonitor),
        }
    }

    pub fn with_file_system(mut self, file_system: Arc<dyn FileSystem>) -> Self {
        self.file_system = file_system;
        self
    }

    pub fn with_monitor(mut self, monitor: Arc<dyn LabelScanMonitor>) -> Self {
        self.monitor = monitor;
        self
    }
}

impl LabelScanDependencies for ExtensionDependencies {
    fn config(&self) -> &dyn ConfigLookup {
        self.config.as_ref()
    }

    fn file_system(&self) -> Arc<dyn FileSystem> {
        Arc::clone(&self.file_system)
    }

    fn full_store_stream(&self) -> Arc<dyn FullStoreLabelUpdateStream> {
        Arc::clone(&self.full_store)
    }

    fn monitor(&self) -> Arc<dyn LabelScanMonitor> {
        Arc::clone(&self.monitor)
    }
}

/// Returns the directory of the `backend` label index under `store_dir`.
pub fn label_scan_store_path(store_dir: &Path, backend: &str) -> PathBuf {
    store_dir.join("schema").join("label").join(backend)
}

/// Builds a [`LabelScanStoreProvider`] for one backend.
pub trait LabelScanExtensionFactory {
    /// Backend name; also the provider name and the last path component.
    fn name(&self) -> &str;

    fn priority(&self) -> i32;

    /// Returns the factory that opens this backend's index.
    fn directory_factory(&self, settings: &LabelScanSettings) -> Result<Arc<dyn DirectoryFactory>>;

    /// Resolves configuration, creates and leases the store directory, and
    /// returns the provider.
    fn create(&self, dependencies: &dyn LabelScanDependencies) -> Result<LabelScanStoreProvider> {
        let config = dependencies.config();
        let store_dir = StorageConfig::store_dir(config)?;
        let settings = LabelScanSettings::from_lookup(config)?;
        let path = label_scan_store_path(&store_dir, self.name());

        let store = LabelScanStore::builder(&path)
            .directory_factory(self.directory_factory(&settings)?)
            .file_system(dependencies.file_system())
            .full_store_stream(dependencies.full_store_stream())
            .monitor(dependencies.monitor())
            .rebuild_batch_size(settings.rebuild_batch_size)
            .rebuild_on_corruption(settings.rebuild_on_corruption)
            .build()?;

        tracing::info!(
            backend = self.name(),
            priority = self.priority(),
            path = %path.display(),
            "Created label scan store provider"
        );
        Ok(LabelScanStoreProvider::new(
            self.name(),
            self.priority(),
            Arc::new(store),
        ))
    }
}

/// The on-disk tantivy label index.
#[derive(Debug, Clone, Copy, Default)]
pub struct TantivyLabelScanExtension;

impl LabelScanExtensionFactory for TantivyLabelScanExtension {
    fn name(&self) -> &str {
        "tantivy"
    }

    fn priority(&self) -> i32 {
        TANTIVY_PRIORITY
    }

    fn directory_factory(&self, settings: &LabelScanSettings) -> Result<Arc<dyn DirectoryFactory>> {
        if settings.writer_heap_bytes < MIN_WRITER_HEAP_BYTES {
            return Err(ConfigError::Invalid {
                key: WRITER_HEAP_BYTES,
                value: settings.writer_heap_bytes.to_string(),
                reason: format!("must be at least {MIN_WRITER_HEAP_BYTES}"),
            }
            .into());
        }
        Ok(Arc::new(TantivyDirectoryFactory::new(settings.writer_heap_bytes)))
    }
}

/// The heap-resident label index.
///
/// Indexes outlive their stores for as long as this extension lives, so a
/// store recreated through the same extension recovers its last commit.
#[derive(Debug, Default)]
pub struct InMemoryLabelScanExtension {
    factory: Arc<InMemoryDirectoryFactory>,
}

impl InMemoryLabelScanExtension {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LabelScanExtensionFactory for InMemoryLabelScanExtension {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn priority(&self) -> i32 {
        IN_MEMORY_PRIORITY
    }

    fn directory_factory(&self, _settings: &LabelScanSettings) -> Result<Arc<dyn DirectoryFactory>> {
        Ok(Arc::clone(&self.factory) as Arc<dyn DirectoryFactory>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{REBUILD_BATCH_SIZE, STORE_DIR};
    use crate::error::LabelScanError;
    use crate::update::NodeLabels;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn dependencies(pairs: &[(&str, &str)]) -> ExtensionDependencies {
        let config: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ExtensionDependencies::new(Arc::new(config), Arc::new(Vec::<NodeLabels>::new()))
    }

    #[test]
    fn test_store_path_layout() {
        assert_eq!(
            label_scan_store_path(Path::new("/db"), "tantivy"),
            PathBuf::from("/db/schema/label/tantivy")
        );
    }

    #[test]
    fn test_create_makes_leased_directory() {
        let temp_dir = TempDir::new().unwrap();
        let store_dir = temp_dir.path().to_str().unwrap();
        let deps = dependencies(&[(STORE_DIR, store_dir)]);

        let provider = TantivyLabelScanExtension.create(&deps).unwrap();
        assert_eq!(provider.name(), "tantivy");
        assert_eq!(provider.priority(), TANTIVY_PRIORITY);
        assert!(temp_dir.path().join("schema/label/tantivy").is_dir());
        assert_eq!(
            provider.store().path(),
            temp_dir.path().join("schema").join("label").join("tantivy")
        );

        // Same file system, same directory
        let err = TantivyLabelScanExtension.create(&deps).unwrap_err();
        assert!(matches!(err, LabelScanError::DirectoryInUse(_)));
    }

    #[test]
    fn test_missing_store_dir_is_invalid_config() {
        let err = InMemoryLabelScanExtension::new()
            .create(&dependencies(&[]))
            .unwrap_err();
        assert!(matches!(
            err,
            LabelScanError::InvalidConfig(ConfigError::Missing(STORE_DIR))
        ));
    }

    #[test]
    fn test_bad_values_are_invalid_config() {
        let temp_dir = TempDir::new().unwrap();
        let store_dir = temp_dir.path().to_str().unwrap();

        let err = InMemoryLabelScanExtension::new()
            .create(&dependencies(&[(STORE_DIR, store_dir), (REBUILD_BATCH_SIZE, "-1")]))
            .unwrap_err();
        assert!(matches!(err, LabelScanError::InvalidConfig(_)));

        let err = TantivyLabelScanExtension
            .create(&dependencies(&[(STORE_DIR, store_dir), (WRITER_HEAP_BYTES, "1024")]))
            .unwrap_err();
        assert!(matches!(err, LabelScanError::InvalidConfig(_)));
    }
}
