//! # Core Traits (Ports)
//!
//! Any storage adapter must implement these traits to be used by the services.
//!
//! # Developer Note
//! The store exposes no ambient transaction. Multi-step sequences ask for one
//! explicitly through [`DocumentStore::begin`]; an adapter that cannot scope
//! writes atomically answers `None` and the caller runs best-effort.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::StoreResult;
use crate::models::{BoardName, StoreLayout};
use crate::query::{Collection, DeleteOutcome, Document, Filter, FindQuery, Mutation, UpdateOutcome};

/// Definition of a board container (container layout only).
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerInfo {
    pub board: BoardName,
    pub created_on: DateTime<Utc>,
}

/// Data persistence contract over the Threads and Replies tables.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn layout(&self) -> StoreLayout;

    /// Persists a record and returns its identifier.
    async fn insert(&self, target: &Collection, record: Document) -> StoreResult<Uuid>;
    async fn update_one(
        &self,
        target: &Collection,
        filter: &Filter,
        mutation: &Mutation,
    ) -> StoreResult<UpdateOutcome>;
    async fn delete_one(&self, target: &Collection, filter: &Filter) -> StoreResult<DeleteOutcome>;
    async fn delete_many(&self, target: &Collection, filter: &Filter) -> StoreResult<DeleteOutcome>;
    async fn find(&self, target: &Collection, query: &FindQuery) -> StoreResult<Vec<Document>>;

    /// Starts a transaction, or `None` when the adapter cannot provide one.
    async fn begin(&self) -> StoreResult<Option<Box<dyn StoreTransaction>>>;

    // Container operations. Shared-table adapters answer `Unsupported`.

    /// Returns `false` when the container already existed.
    async fn create_container(&self, board: &BoardName) -> StoreResult<bool>;
    async fn read_container(&self, board: &BoardName) -> StoreResult<Option<ContainerInfo>>;
    /// Returns `false` when there was no container to drop.
    async fn drop_container(&self, board: &BoardName) -> StoreResult<bool>;
}

/// Writes and reads scoped to one atomic unit.
///
/// Dropping a transaction without committing discards its writes.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn insert(&mut self, target: &Collection, record: Document) -> StoreResult<Uuid>;
    async fn update_one(
        &mut self,
        target: &Collection,
        filter: &Filter,
        mutation: &Mutation,
    ) -> StoreResult<UpdateOutcome>;
    async fn delete_many(&mut self, target: &Collection, filter: &Filter) -> StoreResult<DeleteOutcome>;
    async fn find(&mut self, target: &Collection, query: &FindQuery) -> StoreResult<Vec<Document>>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
