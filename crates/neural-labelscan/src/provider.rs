//! Label scan store providers and priority-based selection.

use crate::store::LabelScanStore;
use std::sync::Arc;

/// A label scan store offered under a name and a priority.
#[derive(Debug, Clone)]
pub struct LabelScanStoreProvider {
    name: String,
    priority: i32,
    store: Arc<LabelScanStore>,
}

impl LabelScanStoreProvider {
    pub fn new(name: impl Into<String>, priority: i32, store: Arc<LabelScanStore>) -> Self {
        Self {
            name: name.into(),
            priority,
            store,
        }
    }

    /// Implementation name, e.g. `tantivy`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Higher wins.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn store(&self) -> &Arc<LabelScanStore> {
        &self.store
    }
}

/// Registered providers; the host serves from the selected one.
#[derive(Debug, Default)]
pub struct LabelScanProviders {
    providers: Vec<LabelScanStoreProvider>,
}

impl LabelScanProviders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: LabelScanStoreProvider) {
        tracing::debug!(
            name = provider.name(),
            priority = provider.priority(),
            "Registered label scan store provider"
        );
        self.providers.push(provider);
    }

    /// Returns the provider with the highest priority. Among equal priorities
    /// the earliest registration wins.
    pub fn select(&self) -> Option<&LabelScanStoreProvider> {
        self.providers
            .iter()
            .rev()
            .max_by_key(|provider| provider.priority())
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LabelScanStoreProvider> {
        self.providers.iter()
    }
}
