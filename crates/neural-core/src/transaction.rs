//! Transactions and the entity handles they hand out.
//!
//! A [`Transaction`] is shared behind an `Arc` so that every node or
//! relationship handle obtained through it can remember where it came from.
//! That back-reference is what [`crate::affinity`] inspects when a handle is
//! passed into another transaction.

use crate::affinity::{AffinityError, EntityAffinityGuard};
use crate::{DatabaseId, NodeId, RelationshipId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

/// Unique identifier for a transaction.
pub type TransactionId = u64;

/// Errors related to transaction lifecycle.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Transaction {0} is not active")]
    NotActive(TransactionId),
}

/// The state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    Aborted,
}

/// A transaction against a single database.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    database: DatabaseId,
    state: RwLock<TransactionState>,
}

impl Transaction {
    fn new(id: TransactionId, database: DatabaseId) -> Self {
        Self {
            id,
            database,
            state: RwLock::new(TransactionState::Active),
        }
    }

    /// Returns the transaction ID.
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the database this transaction runs against.
    pub fn database_id(&self) -> &DatabaseId {
        &self.database
    }

    /// Returns the current state.
    pub fn state(&self) -> TransactionState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns true while the transaction is neither committed nor rolled back.
    pub fn is_open(&self) -> bool {
        self.state() == TransactionState::Active
    }

    /// Commits the transaction.
    pub fn commit(&self) -> Result<(), TransactionError> {
        self.close(TransactionState::Committed)
    }

    /// Rolls back the transaction.
    pub fn rollback(&self) -> Result<(), TransactionError> {
        self.close(TransactionState::Aborted)
    }

    fn close(&self, outcome: TransactionState) -> Result<(), TransactionError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if *state != TransactionState::Active {
            return Err(TransactionError::NotActive(self.id));
        }
        *state = outcome;
        tracing::debug!(tx_id = self.id, database = %self.database, state = ?outcome, "Transaction closed");
        Ok(())
    }

    /// Returns a handle to a node, bound to this transaction.
    pub fn node(self: &Arc<Self>, id: NodeId) -> NodeEntity {
        NodeEntity {
            id,
            transaction: Some(Arc::clone(self)),
        }
    }

    /// Returns a handle to a relationship, bound to this transaction.
    pub fn relationship(self: &Arc<Self>, id: RelationshipId) -> RelationshipEntity {
        RelationshipEntity {
            id,
            transaction: Some(Arc::clone(self)),
        }
    }

    /// Checks that `entity` may be used by this transaction and hands it back.
    ///
    /// Every operation that accepts a previously obtained entity handle must
    /// route it through here before touching it.
    pub fn validate_same_db<E: Entity>(&self, entity: E) -> Result<E, AffinityError> {
        EntityAffinityGuard::validate(entity, self)
    }
}

/// Something a transaction hands out: a node or a relationship.
pub trait Entity {
    /// The transaction the handle was obtained from, if any.
    fn transaction(&self) -> Option<&Arc<Transaction>>;
}

impl<E: Entity + ?Sized> Entity for &E {
    fn transaction(&self) -> Option<&Arc<Transaction>> {
        (**self).transaction()
    }
}

/// A node handle.
#[derive(Debug, Clone)]
pub struct NodeEntity {
    id: NodeId,
    transaction: Option<Arc<Transaction>>,
}

impl NodeEntity {
    /// A handle that was never attached to a transaction.
    pub fn detached(id: NodeId) -> Self {
        Self {
            id,
            transaction: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }
}

impl Entity for NodeEntity {
    fn transaction(&self) -> Option<&Arc<Transaction>> {
        self.transaction.as_ref()
    }
}

/// A relationship handle.
#[derive(Debug, Clone)]
pub struct RelationshipEntity {
    id: RelationshipId,
    transaction: Option<Arc<Transaction>>,
}

impl RelationshipEntity {
    pub fn detached(id: RelationshipId) -> Self {
        Self {
            id,
            transaction: None,
        }
    }

    pub fn id(&self) -> RelationshipId {
        self.id
    }
}

impl Entity for RelationshipEntity {
    fn transaction(&self) -> Option<&Arc<Transaction>> {
        self.transaction.as_ref()
    }
}

/// Hands out transactions for one database.
#[derive(Debug)]
pub struct TransactionManager {
    database: DatabaseId,
    next_tx_id: AtomicU64,
}

impl TransactionManager {
    /// Creates a new TransactionManager for `database`.
    pub fn new(database: impl Into<DatabaseId>) -> Self {
        Self {
            database: database.into(),
            next_tx_id: AtomicU64::new(1),
        }
    }

    pub fn database_id(&self) -> &DatabaseId {
        &self.database
    }

    /// Starts a new transaction.
    pub fn begin(&self) -> Arc<Transaction> {
        let id = self.next_tx_id.fetch_add(1, Ordering::SeqCst);
        Arc::new(Transaction::new(id, self.database.clone()))
    }
}
