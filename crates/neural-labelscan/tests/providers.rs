//! Extension factories, provider selection and transaction-scoped reads.

use neural_core::{label_set, AffinityError, LabelId, NodeId, TransactionManager};
use neural_labelscan::config::{REBUILD_BATCH_SIZE, STORE_DIR};
use neural_labelscan::{
    ExtensionDependencies, FileSystem, InMemoryLabelScanExtension, LabelScanConfig,
    LabelScanError, LabelScanExtensionFactory, LabelScanProviders, LocalFileSystem, NodeLabels,
    StoreState, TantivyLabelScanExtension,
};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

fn primary_store() -> Vec<NodeLabels> {
    vec![
        NodeLabels::new(NodeId::new(1), label_set([1, 2])),
        NodeLabels::new(NodeId::new(2), label_set([2])),
    ]
}

fn dependencies(store_dir: &str) -> ExtensionDependencies {
    let config: HashMap<String, String> = [
        (STORE_DIR.to_string(), store_dir.to_string()),
        (REBUILD_BATCH_SIZE.to_string(), "1".to_string()),
    ]
    .into_iter()
    .collect();
    ExtensionDependencies::new(Arc::new(config), Arc::new(primary_store()))
}

#[test]
fn test_tantivy_provider_is_selected() {
    let temp_dir = TempDir::new().unwrap();
    let deps = dependencies(temp_dir.path().to_str().unwrap());

    let factories: Vec<Box<dyn LabelScanExtensionFactory>> = vec![
        Box::new(InMemoryLabelScanExtension::new()),
        Box::new(TantivyLabelScanExtension),
    ];
    let mut providers = LabelScanProviders::new();
    for factory in &factories {
        providers.register(factory.create(&deps).unwrap());
    }

    let selected = providers.select().unwrap();
    assert_eq!(selected.name(), "tantivy");
    assert_eq!(selected.priority(), 10);

    let store = selected.store();
    assert_eq!(store.start().unwrap(), StoreState::Ready);
    assert_eq!(store.node_count_for(LabelId::new(2)).unwrap(), 2);
    assert!(temp_dir.path().join("schema/label/tantivy/meta.json").exists());

    // The losing provider is untouched until the host starts it
    let other = providers.iter().find(|p| p.name() == "in-memory").unwrap();
    assert_eq!(other.store().state(), StoreState::Uninitialized);
}

#[test]
fn test_in_memory_extension_recovers_through_same_factory() {
    let temp_dir = TempDir::new().unwrap();
    let deps = dependencies(temp_dir.path().to_str().unwrap());
    let extension = InMemoryLabelScanExtension::new();

    let provider = extension.create(&deps).unwrap();
    provider.store().start().unwrap();
    provider.store().shutdown().unwrap();
    drop(provider);

    let provider = extension.create(&deps).unwrap();
    assert_eq!(provider.store().init().unwrap(), StoreState::Ready);
    assert_eq!(provider.store().node_count_for(LabelId::new(1)).unwrap(), 1);
}

#[test]
fn test_directory_lease_is_exclusive() {
    let temp_dir = TempDir::new().unwrap();
    let fs: Arc<dyn FileSystem> = Arc::new(LocalFileSystem::new());
    let deps = dependencies(temp_dir.path().to_str().unwrap()).with_file_system(Arc::clone(&fs));

    let provider = TantivyLabelScanExtension.create(&deps).unwrap();
    let err = TantivyLabelScanExtension.create(&deps).unwrap_err();
    assert!(matches!(err, LabelScanError::DirectoryInUse(_)));

    provider.store().shutdown().unwrap();
    assert!(TantivyLabelScanExtension.create(&deps).is_ok());
}

#[test]
fn test_factory_reads_typed_config() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = LabelScanConfig::default();
    config.storage.store_dir = temp_dir.path().to_str().unwrap().to_string();
    config.label_scan.rebuild_batch_size = 1;

    let deps = ExtensionDependencies::new(Arc::new(config), Arc::new(primary_store()));
    let provider = TantivyLabelScanExtension.create(&deps).unwrap();
    assert_eq!(provider.store().rebuild_batch_size(), 1);

    let summary = provider.store().rebuild().unwrap();
    assert_eq!(summary.nodes, 2);
    assert_eq!(summary.batches, 3);
}

#[test]
fn test_labels_of_rejects_foreign_and_closed_handles() {
    let temp_dir = TempDir::new().unwrap();
    let deps = dependencies(temp_dir.path().to_str().unwrap());
    let provider = InMemoryLabelScanExtension::new().create(&deps).unwrap();
    let store = provider.store();
    store.start().unwrap();

    let graph = TransactionManager::new("graph");
    let audit = TransactionManager::new("audit");

    let tx = graph.begin();
    let node = tx.node(NodeId::new(1));
    assert_eq!(store.labels_of(&tx, &node).unwrap(), label_set([1, 2]));

    // Another database
    let foreign = audit.begin();
    match store.labels_of(&foreign, &node) {
        Err(LabelScanError::Affinity(AffinityError::CrossDatabase {
            entity_database,
            current_database,
        })) => {
            assert_eq!(entity_database.name(), "graph");
            assert_eq!(current_database.name(), "audit");
        }
        other => panic!("expected cross-database error, got {other:?}"),
    }

    // Closed transaction, regardless of database
    tx.rollback().unwrap();
    for current in [graph.begin(), audit.begin()] {
        assert!(matches!(
            store.labels_of(&current, &node),
            Err(LabelScanError::Affinity(AffinityError::NotInTransaction { .. }))
        ));
    }

    // Detached handles are not bound to a transaction
    let detached = neural_core::NodeEntity::detached(NodeId::new(2));
    assert_eq!(store.labels_of(&graph.begin(), &detached).unwrap(), label_set([2]));
}
