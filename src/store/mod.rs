//! Database layer for persisting jobs, reservations, and nodes.
//!
//! Provides an abstraction over different storage backends:
//! - `MemStore`: In-memory storage for testing
//! - `PostgresStore`: PostgreSQL for production persistence
//!
//! Each row carries the object's scalar columns plus one text array holding
//! its attributes as alternating `name[.resource]` / `flags.value` strings.

pub mod data;
mod db;
mod store;

use std::error::Error;

use strum::{AsRefStr, EnumIter};

use crate::{PersistError, Result};

pub use db::{MemStore, PostgresStore};
pub use store::Store;

/// Maps database errors to PersistError.
fn map_db_err(err: impl Error) -> PersistError {
    PersistError::Store(err.to_string())
}

/// Identifiers for different storage collections.
#[derive(Debug, Clone, AsRefStr, PartialEq, Hash, Eq, EnumIter)]
pub enum StoreIden {
    #[strum(serialize = "jobs")]
    Jobs,
    #[strum(serialize = "resvs")]
    Resvs,
    #[strum(serialize = "nodes")]
    Nodes,
}

/// How `save` writes a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
pub enum SaveMode {
    /// Insert a row that must not exist yet.
    InsertNew,
    /// Replace every column of an existing row.
    UpdateFull,
    /// Replace the scalar columns of an existing row, keeping its attributes.
    UpdateQuick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
pub enum TxnEnd {
    Commit,
    Rollback,
}

/// Trait for types that can identify their storage collection.
pub trait DbCollectionIden {
    /// Returns the collection identifier for this type.
    fn iden() -> StoreIden;
}

/// Trait for rows stored in a collection.
pub trait DbRecord: Clone {
    fn id(&self) -> &str;

    /// Rows are enumerated in ascending key order, ties broken by id.
    fn sort_key(&self) -> i64 {
        0
    }

    /// Copies the columns a quick update writes from `other`.
    fn apply_quick(
        &mut self,
        other: &Self,
    );
}

/// Trait for database collection operations.
pub trait DbCollection: Send + Sync {
    /// The type of items stored in this collection.
    type Item;

    /// Finds a record by ID.
    fn find(
        &self,
        id: &str,
    ) -> Result<Option<Self::Item>>;

    /// IDs of every stored record, in recovery order.
    fn ids(&self) -> Result<Vec<String>>;

    /// Writes a record. `Ok(false)` means an update matched no row.
    fn save(
        &self,
        data: &Self::Item,
        mode: SaveMode,
    ) -> Result<bool>;

    /// Deletes a record by ID.
    fn delete(
        &self,
        id: &str,
    ) -> Result<bool>;
}

/// Connection-level transaction control.
pub trait DbTransaction: Send + Sync {
    fn begin(&self) -> Result<()>;

    fn end(
        &self,
        end: TxnEnd,
    ) -> Result<()>;
}

/// Trait for database store initialization.
pub trait DbStore {
    /// Initializes the database and registers collections with the store.
    fn init(
        &self,
        s: &Store,
    ) -> Result<()>;
}
