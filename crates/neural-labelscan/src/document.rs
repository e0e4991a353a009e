//! Mapping between a node's label set and its index document.
//!
//! Each node is stored as exactly one document holding the node id and the
//! node's labels in ascending id order. The byte form is a bincode encoding
//! of that pair, so equal label sets always encode to equal bytes.

use crate::error::BackendError;
use neural_core::{LabelId, LabelSet, NodeId};
use serde::{Deserialize, Serialize};

/// The storage unit of a label index: one node and all of its labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexDocument {
    node: NodeId,
    /// Strictly ascending.
    labels: Vec<LabelId>,
}

impl IndexDocument {
    /// Returns the node this document describes.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Returns the labels in ascending id order.
    pub fn labels(&self) -> &[LabelId] {
        &self.labels
    }

    /// Encodes the document to its byte form.
    pub fn to_bytes(&self) -> Result<Vec<u8>, BackendError> {
        Ok(bincode::serialize(self)?)
    }

    /// Decodes a document, rejecting label lists that are not strictly ascending.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BackendError> {
        let document: Self = bincode::deserialize(bytes)?;
        if document.labels.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(BackendError::Corrupt(format!(
                "document for {} has unordered labels",
                document.node
            )));
        }
        Ok(document)
    }
}

/// Stateless translation between label sets and [`IndexDocument`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentStructure;

impl DocumentStructure {
    /// Builds the document for `node` carrying `labels`.
    pub fn document(&self, node: NodeId, labels: &LabelSet) -> IndexDocument {
        IndexDocument {
            node,
            labels: labels.iter().copied().collect(),
        }
    }

    /// Recovers the label set stored in `document`.
    pub fn labels(&self, document: &IndexDocument) -> LabelSet {
        document.labels.iter().copied().collect()
    }

    /// Encodes `labels` of `node` straight to document bytes.
    pub fn encode(&self, node: NodeId, labels: &LabelSet) -> Result<Vec<u8>, BackendError> {
        self.document(node, labels).to_bytes()
    }

    /// Decodes document bytes back to the node and its label set.
    pub fn decode(&self, bytes: &[u8]) -> Result<(NodeId, LabelSet), BackendError> {
        let document = IndexDocument::from_bytes(bytes)?;
        Ok((document.node, self.labels(&document)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neural_core::label_set;
    use proptest::prelude::*;

    #[test]
    fn test_document_labels_are_sorted() {
        let structure = DocumentStructure;
        let document = structure.document(NodeId::new(3), &label_set([30, 1, 7]));

        assert_eq!(document.node(), NodeId::new(3));
        assert_eq!(
            document.labels(),
            &[LabelId::new(1), LabelId::new(7), LabelId::new(30)]
        );
    }

    #[test]
    fn test_equal_sets_encode_to_equal_bytes() {
        let structure = DocumentStructure;
        let a = structure.encode(NodeId::new(9), &label_set([4, 2, 8])).unwrap();
        let b = structure.encode(NodeId::new(9), &label_set([8, 4, 2, 2])).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_label_set() {
        let structure = DocumentStructure;
        let bytes = structure.encode(NodeId::new(1), &LabelSet::new()).unwrap();
        let (node, labels) = structure.decode(&bytes).unwrap();
        assert_eq!(node, NodeId::new(1));
        assert!(labels.is_empty());
    }

    #[test]
    fn test_unordered_labels_are_corrupt() {
        let forged = IndexDocument {
            node: NodeId::new(1),
            labels: vec![LabelId::new(5), LabelId::new(2)],
        };
        let bytes = bincode::serialize(&forged).unwrap();
        assert!(matches!(
            IndexDocument::from_bytes(&bytes),
            Err(BackendError::Corrupt(_))
        ));
    }

    #[test]
    fn test_truncated_bytes_fail_to_decode() {
        let structure = DocumentStructure;
        let bytes = structure.encode(NodeId::new(1), &label_set([1, 2, 3])).unwrap();
        assert!(structure.decode(&bytes[..bytes.len() - 2]).is_err());
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(node in any::<u64>(), ids in proptest::collection::btree_set(any::<u32>(), 0..32)) {
            let structure = DocumentStructure;
            let labels: LabelSet = ids.into_iter().map(LabelId::new).collect();
            let bytes = structure.encode(NodeId::new(node), &labels).unwrap();
            let (decoded_node, decoded) = structure.decode(&bytes).unwrap();
            prop_assert_eq!(decoded_node, NodeId::new(node));
            prop_assert_eq!(decoded, labels);
        }
    }
}
