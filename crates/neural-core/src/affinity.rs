//! Entity affinity checks.
//!
//! An entity handle is only usable inside an open transaction against the
//! database that produced it. Handles that outlive their transaction, or
//! that leak from one database into another, are rejected here instead of
//! being silently resolved against the wrong store.

use crate::transaction::{Entity, Transaction, TransactionId};
use crate::DatabaseId;
use thiserror::Error;

/// Rejections raised by [`EntityAffinityGuard::validate`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AffinityError {
    /// The originating transaction has been committed or rolled back.
    #[error("Entity was obtained from transaction {transaction}, which is no longer open")]
    NotInTransaction { transaction: TransactionId },

    /// The originating transaction is open but runs against another database.
    #[error(
        "Entity passed in is from database '{entity_database}', but the current transaction runs against '{current_database}'. Not allowed to pass results from another database"
    )]
    CrossDatabase {
        entity_database: DatabaseId,
        current_database: DatabaseId,
    },
}

/// Where an entity handle stands relative to a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityAffinity {
    /// Never attached to a transaction.
    Detached,
    /// Obtained from an open transaction on the same database.
    SameDatabaseOpen,
    /// Obtained from a transaction that has since closed, whatever its database.
    Closed,
    /// Obtained from an open transaction on another database.
    Foreign,
}

/// Validates entity handles crossing a transaction boundary.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityAffinityGuard;

impl EntityAffinityGuard {
    /// Classifies `entity` with respect to `current`.
    pub fn classify<E: Entity + ?Sized>(entity: &E, current: &Transaction) -> EntityAffinity {
        match entity.transaction() {
            None => EntityAffinity::Detached,
            Some(origin) if !origin.is_open() => EntityAffinity::Closed,
            Some(origin) if origin.database_id() != current.database_id() => {
                EntityAffinity::Foreign
            }
            Some(_) => EntityAffinity::SameDatabaseOpen,
        }
    }

    /// Returns `entity` unchanged when `current` may use it.
    pub fn validate<E: Entity>(entity: E, current: &Transaction) -> Result<E, AffinityError> {
        match Self::classify(&entity, current) {
            EntityAffinity::Detached | EntityAffinity::SameDatabaseOpen => Ok(entity),
            EntityAffinity::Closed => Err(AffinityError::NotInTransaction {
                transaction: entity.transaction().map_or(0, |t| t.id()),
            }),
            EntityAffinity::Foreign => Err(AffinityError::CrossDatabase {
                entity_database: entity
                    .transaction()
                    .map(|t| t.database_id().clone())
                    .unwrap_or_else(|| current.database_id().clone()),
                current_database: current.database_id().clone(),
            }),
        }
    }
}
