//! # Neural Core
//!
//! Core types shared by the NeuralGraphDB kernel components.
//!
//! This crate provides:
//! - [`NodeId`], [`RelationshipId`] and [`LabelId`] - Type-safe identifiers
//! - [`LabelSet`] - The ordered label set of a single node
//! - [`DatabaseId`] - Name of the database a transaction runs against
//! - [`transaction`] - Transactions and the entity handles they hand out
//! - [`affinity`] - The guard that keeps entity handles inside their transaction

pub mod affinity;
pub mod transaction;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

pub use affinity::{AffinityError, EntityAffinity, EntityAffinityGuard};
pub use transaction::{
    Entity, NodeEntity, RelationshipEntity, Transaction, TransactionError, TransactionId,
    TransactionManager, TransactionState,
};

// =============================================================================
// Identifiers (Newtypes for type safety)
// =============================================================================

/// Identifier of a node, unique within one database instance.
///
/// Stable until the node is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Creates a new NodeId from a u64.
    #[inline]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw u64 value.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl From<u64> for NodeId {
    #[inline]
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Identifier of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct RelationshipId(pub u64);

impl RelationshipId {
    #[inline]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

// =============================================================================
// Labels
// =============================================================================

/// A label token id (e.g. the id the token store assigned to `:Person`).
///
/// Label ids are dense and stay stable for the lifetime of the database,
/// so the index stores them instead of label names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct LabelId(pub u32);

impl LabelId {
    /// Creates a new LabelId.
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw u32 value.
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":L{}", self.0)
    }
}

impl From<u32> for LabelId {
    #[inline]
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// The labels carried by one node, in ascending id order.
pub type LabelSet = BTreeSet<LabelId>;

/// Builds a [`LabelSet`] from raw label ids.
pub fn label_set<I>(ids: I) -> LabelSet
where
    I: IntoIterator<Item = u32>,
{
    ids.into_iter().map(LabelId::new).collect()
}

// =============================================================================
// Databases
// =============================================================================

/// Name of a database hosted by the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DatabaseId(String);

impl DatabaseId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatabaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DatabaseId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DatabaseId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id() {
        let id = NodeId::new(42);
        assert_eq!(id.as_u64(), 42);
        assert_eq!(format!("{}", id), "n42");

        let id2: NodeId = 100u64.into();
        assert_eq!(id2.as_u64(), 100);
    }

    #[test]
    fn test_label_id_display() {
        assert_eq!(LabelId::new(7).to_string(), ":L7");
        assert_eq!(RelationshipId::new(3).to_string(), "r3");
    }

    #[test]
    fn test_label_set_is_ordered() {
        let labels = label_set([9, 2, 5, 2]);
        let ids: Vec<u32> = labels.iter().map(|l| l.as_u32()).collect();
        assert_eq!(ids, vec![2, 5, 9]);
    }

    #[test]
    fn test_database_id() {
        let db: DatabaseId = "movies".into();
        assert_eq!(db.name(), "movies");
        assert_eq!(db.to_string(), "movies");
        assert_ne!(db, DatabaseId::new("system"));
    }

    #[test]
    fn test_id_serialization() {
        let json = serde_json::to_string(&NodeId::new(5)).unwrap();
        assert_eq!(json, "5");
        let parsed: LabelId = serde_json::from_str("12").unwrap();
        assert_eq!(parsed, LabelId::new(12));
    }
}
