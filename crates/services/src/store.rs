//! Timeout-bounded access to the shared store.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use domains::{
    Collection, DeleteOutcome, Document, DocumentStore, DomainError, Filter, FindQuery, Mutation,
    Result, StoreLayout, StoreResult, StoreTransaction, UpdateOutcome,
};
use uuid::Uuid;

/// The process-wide store plus the per-call time budget.
///
/// Cloning is cheap; every clone shares the same adapter (and its pool).
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<dyn DocumentStore>,
    timeout: Duration,
}

impl StoreHandle {
    pub fn new(inner: Arc<dyn DocumentStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn layout(&self) -> StoreLayout {
        self.inner.layout()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs one store call under the timeout and lifts its error.
    pub async fn call<T>(&self, fut: impl Future<Output = StoreResult<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(DomainError::from),
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "store call timed out");
                Err(DomainError::StoreTimeout(self.timeout))
            }
        }
    }

    pub async fn insert(&self, target: &Collection, record: Document) -> Result<Uuid> {
        self.call(self.inner.insert(target, record)).await
    }

    pub async fn update_one(
        &self,
        target: &Collection,
        filter: &Filter,
        mutation: &Mutation,
    ) -> Result<UpdateOutcome> {
        self.call(self.inner.update_one(target, filter, mutation)).await
    }

    pub async fn delete_one(&self, target: &Collection, filter: &Filter) -> Result<DeleteOutcome> {
        self.call(self.inner.delete_one(target, filter)).await
    }

    pub async fn delete_many(&self, target: &Collection, filter: &Filter) -> Result<DeleteOutcome> {
        self.call(self.inner.delete_many(target, filter)).await
    }

    pub async fn find(&self, target: &Collection, query: &FindQuery) -> Result<Vec<Document>> {
        self.call(self.inner.find(target, query)).await
    }

    pub async fn begin(&self) -> Result<Option<Box<dyn StoreTransaction>>> {
        self.call(self.inner.begin()).await
    }

    pub fn adapter(&self) -> &dyn DocumentStore {
        self.inner.as_ref()
    }
}
