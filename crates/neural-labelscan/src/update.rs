//! Label changes flowing into the store.

use crate::error::SourceError;
use neural_core::{LabelId, LabelSet, NodeId};

/// Labels added to and removed from one node in one logical change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLabelUpdate {
    node: NodeId,
    added: LabelSet,
    removed: LabelSet,
    deleted: bool,
}

impl NodeLabelUpdate {
    /// Creates an update adding `added` and removing `removed`.
    ///
    /// A label present in both sets ends up removed.
    pub fn new(node: NodeId, added: LabelSet, removed: LabelSet) -> Self {
        Self {
            node,
            added,
            removed,
            deleted: false,
        }
    }

    /// The add-only form used while rebuilding.
    pub fn added(node: NodeId, labels: impl IntoIterator<Item = LabelId>) -> Self {
        Self::new(node, labels.into_iter().collect(), LabelSet::new())
    }

    pub fn removed(node: NodeId, labels: impl IntoIterator<Item = LabelId>) -> Self {
        Self::new(node, LabelSet::new(), labels.into_iter().collect())
    }

    /// The node was deleted; all of its associations go away.
    pub fn node_deleted(node: NodeId) -> Self {
        Self {
            node,
            added: LabelSet::new(),
            removed: LabelSet::new(),
            deleted: true,
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn added_labels(&self) -> &LabelSet {
        &self.added
    }

    pub fn removed_labels(&self) -> &LabelSet {
        &self.removed
    }

    pub fn is_node_deleted(&self) -> bool {
        self.deleted
    }

    /// Computes the node's label set after this update.
    pub fn apply_to(&self, current: &LabelSet) -> LabelSet {
        if self.deleted {
            return LabelSet::new();
        }
        current
            .union(&self.added)
            .filter(|label| !self.removed.contains(label))
            .copied()
            .collect()
    }
}

/// One item of the full store stream: a node and its complete label set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLabels {
    pub node: NodeId,
    pub labels: LabelSet,
}

impl NodeLabels {
    pub fn new(node: NodeId, labels: LabelSet) -> Self {
        Self { node, labels }
    }
}

impl From<NodeLabels> for NodeLabelUpdate {
    fn from(item: NodeLabels) -> Self {
        NodeLabelUpdate::new(item.node, item.labels, LabelSet::new())
    }
}

/// Authoritative enumeration of every node and its labels, supplied by the
/// primary store for full rebuilds.
///
/// Each call to [`stream`](Self::stream) starts a fresh pass. Items are read
/// lazily; an `Err` item aborts the rebuild.
pub trait FullStoreLabelUpdateStream: Send + Sync {
    fn stream(&self) -> Box<dyn Iterator<Item = Result<NodeLabels, SourceError>> + Send + '_>;
}

impl FullStoreLabelUpdateStream for Vec<NodeLabels> {
    fn stream(&self) -> Box<dyn Iterator<Item = Result<NodeLabels, SourceError>> + Send + '_> {
        Box::new(self.iter().cloned().map(Ok))
    }
}
