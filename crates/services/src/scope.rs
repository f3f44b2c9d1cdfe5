//! # Transactional scope
//!
//! Runs a named sequence of store steps either inside a real transaction or,
//! when the adapter has none, one after another.
//!
//! - Atomic: failure rolls back and surfaces the step's own error kind.
//! - Best-effort: failure after a committed write surfaces
//!   `DomainError::PartialFailure` naming what was committed and which step
//!   failed. Nothing is compensated.
//!
//! Rollback is only ever invoked on a transaction that was actually begun.
//!
//! While an atomic scope is open the adapter may hold locks on behalf of
//! it, so every store access for the operation must go through the scope.

use domains::{
    Collection, DeleteOutcome, Document, DomainError, Filter, FindQuery, Mutation, Result,
    StoreTransaction, UpdateOutcome,
};
use uuid::Uuid;

use crate::store::StoreHandle;

pub struct TransactionalScope<'a> {
    operation: &'static str,
    store: &'a StoreHandle,
    tx: Option<Box<dyn StoreTransaction>>,
    /// Writes performed so far, in order
    committed: Vec<String>,
    failed_step: Option<String>,
}

impl<'a> TransactionalScope<'a> {
    pub async fn open(store: &'a StoreHandle, operation: &'static str) -> Result<Self> {
        let tx = store.begin().await?;
        if tx.is_none() {
            tracing::debug!(operation, "store has no transactions, running best-effort");
        }
        Ok(Self {
            operation,
            store,
            tx,
            committed: Vec::new(),
            failed_step: None,
        })
    }

    pub fn is_atomic(&self) -> bool {
        self.tx.is_some()
    }

    pub async fn insert(&mut self, step: &str, target: &Collection, record: Document) -> Result<Uuid> {
        let store = self.store;
        let result = match self.tx.as_mut() {
            Some(tx) => store.call(tx.insert(target, record)).await,
            None => store.insert(target, record).await,
        };
        self.track_write(step, result)
    }

    pub async fn update_one(
        &mut self,
        step: &str,
        target: &Collection,
        filter: &Filter,
        mutation: &Mutation,
    ) -> Result<UpdateOutcome> {
        let store = self.store;
        let result = match self.tx.as_mut() {
            Some(tx) => store.call(tx.update_one(target, filter, mutation)).await,
            None => store.update_one(target, filter, mutation).await,
        };
        self.track_write(step, result)
    }

    pub async fn delete_many(
        &mut self,
        step: &str,
        target: &Collection,
        filter: &Filter,
    ) -> Result<DeleteOutcome> {
        let store = self.store;
        let result = match self.tx.as_mut() {
            Some(tx) => store.call(tx.delete_many(target, filter)).await,
            None => store.delete_many(target, filter).await,
        };
        self.track_write(step, result)
    }

    pub async fn find(&mut self, step: &str, target: &Collection, query: &FindQuery) -> Result<Vec<Document>> {
        let store = self.store;
        let result = match self.tx.as_mut() {
            Some(tx) => store.call(tx.find(target, query)).await,
            None => store.find(target, query).await,
        };
        if result.is_err() {
            self.failed_step = Some(step.to_owned());
        }
        result
    }

    /// Marks a step that succeeded at the store but failed a business check,
    /// such as an update that matched nothing. The step is no longer counted
    /// as committed.
    pub fn reject(&mut self, step: &str, err: DomainError) -> DomainError {
        if self.committed.last().map(String::as_str) == Some(step) {
            self.committed.pop();
        }
        self.failed_step = Some(step.to_owned());
        err
    }

    /// Commits or rolls back according to `outcome` and shapes the error.
    pub async fn finish<T>(self, outcome: Result<T>) -> Result<T> {
        let Self {
            operation,
            store,
            tx,
            committed,
            failed_step,
        } = self;

        match (outcome, tx) {
            (Ok(value), Some(tx)) => {
                store.call(tx.commit()).await?;
                Ok(value)
            }
            (Ok(value), None) => Ok(value),
            (Err(err), Some(tx)) => {
                if let Err(rollback) = store.call(tx.rollback()).await {
                    tracing::error!(operation, error = %rollback, "rollback failed");
                }
                tracing::warn!(operation, step = ?failed_step, error = %err, "rolled back");
                Err(err)
            }
            (Err(err), None) if committed.is_empty() => Err(err),
            (Err(err), None) => {
                let failed_step = failed_step.unwrap_or_else(|| "unknown".to_owned());
                tracing::warn!(
                    operation,
                    committed = ?committed,
                    failed_step = %failed_step,
                    error = %err,
                    "partial failure"
                );
                Err(DomainError::PartialFailure {
                    operation,
                    committed,
                    failed_step,
                    source: Box::new(err),
                })
            }
        }
    }

    fn track_write<T>(&mut self, step: &str, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) if self.tx.is_none() => self.committed.push(step.to_owned()),
            Ok(_) => {}
            Err(_) => self.failed_step = Some(step.to_owned()),
        }
        result
    }
}
