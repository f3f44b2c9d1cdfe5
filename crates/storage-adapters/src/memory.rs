//! # In-memory store
//!
//! A process-local `DocumentStore` for tests, demos and single-node
//! deployments. Both layouts are supported; the layout is fixed at
//! construction.
//!
//! # Developer Note
//! Rows live behind one `RwLock`. A transaction takes the write half for its
//! whole lifetime and writes in place, keeping an undo log; commit forgets
//! the log, rollback (or dropping the transaction) replays it backwards.
//! Container registrations live in a `DashMap` and are not part of the
//! transactional state.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use domains::{
    timestamp, BoardName, Collection, ContainerInfo, DeleteOutcome, Document, DocumentStore, Filter,
    FindQuery, Mutation, StoreError, StoreLayout, StoreResult, StoreTransaction, Table,
    UpdateOutcome,
};
use serde_json::Value;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use uuid::Uuid;

/// Physical location of a table: the board is only part of the key under
/// the container layout.
type TableKey = (Option<BoardName>, Table);

#[derive(Debug, Default)]
struct Tables {
    rows: HashMap<TableKey, Vec<Document>>,
}

impl Tables {
    fn insert(&mut self, key: TableKey, mut record: Document) -> StoreResult<Uuid> {
        let id = match record.get("id") {
            Some(Value::String(raw)) => Uuid::parse_str(raw)
                .map_err(|e| StoreError::Backend(format!("invalid record id '{raw}': {e}")))?,
            Some(other) => {
                return Err(StoreError::Backend(format!("invalid record id {other}")));
            }
            None => {
                let id = Uuid::now_v7();
                record.insert("id".into(), Value::String(id.to_string()));
                id
            }
        };
        self.rows.entry(key).or_default().push(record);
        Ok(id)
    }

    fn len(&self, key: &TableKey) -> usize {
        self.rows.get(key).map_or(0, Vec::len)
    }

    /// Applies `mutation` to the first match; returns its position and the
    /// record as it was before.
    fn update_one(&mut self, key: &TableKey, filter: &Filter, mutation: &Mutation) -> Option<(usize, Document)> {
        let rows = self.rows.get_mut(key)?;
        let index = rows.iter().position(|doc| filter.matches(doc))?;
        let previous = rows[index].clone();
        mutation.apply(&mut rows[index]);
        Some((index, previous))
    }

    /// Removes matching records, returning each with its former position.
    fn delete(&mut self, key: &TableKey, filter: &Filter, only_first: bool) -> Vec<(usize, Document)> {
        let Some(rows) = self.rows.get_mut(key) else {
            return Vec::new();
        };

        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(rows.len());
        for (index, doc) in std::mem::take(rows).into_iter().enumerate() {
            let done = only_first && !removed.is_empty();
            if !done && filter.matches(&doc) {
                removed.push((index, doc));
            } else {
                kept.push(doc);
            }
        }
        *rows = kept;
        removed
    }

    fn find(&self, key: &TableKey, query: &FindQuery) -> Vec<Document> {
        let mut found: Vec<Document> = self
            .rows
            .get(key)
            .map(|rows| rows.iter().filter(|doc| query.filter.matches(doc)).cloned().collect())
            .unwrap_or_default();

        found.sort_by(|a, b| query.compare(a, b));
        if let Some(limit) = query.limit {
            found.truncate(limit);
        }
        found
            .into_iter()
            .map(|doc| query.project_document(doc))
            .collect()
    }

    fn drop_board(&mut self, board: &BoardName) {
        self.rows
            .retain(|(owner, _), _| owner.as_ref() != Some(board));
    }
}

/// Resolves the table key and enforces container existence.
#[derive(Clone)]
struct Router {
    layout: StoreLayout,
    containers: Arc<DashMap<BoardName, ContainerInfo>>,
}

impl Router {
    fn key(&self, target: &Collection) -> StoreResult<TableKey> {
        match self.layout {
            StoreLayout::SharedTable => Ok((None, target.table)),
            StoreLayout::ContainerPerBoard => {
                if !self.containers.contains_key(&target.board) {
                    return Err(StoreError::ContainerNotFound(target.board.to_string()));
                }
                Ok((Some(target.board.clone()), target.table))
            }
        }
    }
}

/// `DocumentStore` backed by process memory.
pub struct MemoryStore {
    router: Router,
    transactional: bool,
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new(layout: StoreLayout) -> Self {
        Self {
            router: Router {
                layout,
                containers: Arc::new(DashMap::new()),
            },
            transactional: true,
            tables: Arc::new(RwLock::new(Tables::default())),
        }
    }

    /// Shared tables partitioned by board name.
    pub fn shared() -> Self {
        Self::new(StoreLayout::SharedTable)
    }

    /// One container per board; boards must be created before use.
    pub fn containers() -> Self {
        Self::new(StoreLayout::ContainerPerBoard)
    }

    /// Makes [`DocumentStore::begin`] answer `None`, forcing callers onto
    /// their best-effort path.
    pub fn without_transactions(mut self) -> Self {
        self.transactional = false;
        self
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn layout(&self) -> StoreLayout {
        self.router.layout
    }

    async fn insert(&self, target: &Collection, record: Document) -> StoreResult<Uuid> {
        let key = self.router.key(target)?;
        let id = self.tables.write().await.insert(key, record)?;
        tracing::debug!(table = target.table.as_str(), %id, "inserted record");
        Ok(id)
    }

    async fn update_one(
        &self,
        target: &Collection,
        filter: &Filter,
        mutation: &Mutation,
    ) -> StoreResult<UpdateOutcome> {
        let key = self.router.key(target)?;
        Ok(updated(self.tables.write().await.update_one(&key, filter, mutation).is_some()))
    }

    async fn delete_one(&self, target: &Collection, filter: &Filter) -> StoreResult<DeleteOutcome> {
        let key = self.router.key(target)?;
        Ok(deleted(&self.tables.write().await.delete(&key, filter, true)))
    }

    async fn delete_many(&self, target: &Collection, filter: &Filter) -> StoreResult<DeleteOutcome> {
        let key = self.router.key(target)?;
        Ok(deleted(&self.tables.write().await.delete(&key, filter, false)))
    }

    async fn find(&self, target: &Collection, query: &FindQuery) -> StoreResult<Vec<Document>> {
        let key = self.router.key(target)?;
        Ok(self.tables.read().await.find(&key, query))
    }

    async fn begin(&self) -> StoreResult<Option<Box<dyn StoreTransaction>>> {
        if !self.transactional {
            return Ok(None);
        }
        let guard = self.tables.clone().write_owned().await;
        Ok(Some(Box::new(MemoryTransaction {
            router: self.router.clone(),
            guard,
            undo: Vec::new(),
        })))
    }

    async fn create_container(&self, board: &BoardName) -> StoreResult<bool> {
        if self.router.layout != StoreLayout::ContainerPerBoard {
            return Err(StoreError::Unsupported("create_container on a shared-table store"));
        }
        let mut created = false;
        self.router.containers.entry(board.clone()).or_insert_with(|| {
            created = true;
            ContainerInfo {
                board: board.clone(),
                created_on: timestamp::now(),
            }
        });
        Ok(created)
    }

    async fn read_container(&self, board: &BoardName) -> StoreResult<Option<ContainerInfo>> {
        if self.router.layout != StoreLayout::ContainerPerBoard {
            return Err(StoreError::Unsupported("read_container on a shared-table store"));
        }
        Ok(self.router.containers.get(board).map(|entry| entry.value().clone()))
    }

    async fn drop_container(&self, board: &BoardName) -> StoreResult<bool> {
        if self.router.layout != StoreLayout::ContainerPerBoard {
            return Err(StoreError::Unsupported("drop_container on a shared-table store"));
        }
        if self.router.containers.remove(board).is_none() {
            return Ok(false);
        }
        self.tables.write().await.drop_board(board);
        Ok(true)
    }
}

fn updated(matched: bool) -> UpdateOutcome {
    UpdateOutcome {
        matched_count: u64::from(matched),
    }
}

fn deleted(removed: &[(usize, Document)]) -> DeleteOutcome {
    DeleteOutcome {
        deleted_count: removed.len() as u64,
    }
}

/// How to take back one write.
enum Undo {
    Insert { key: TableKey, index: usize },
    Update { key: TableKey, index: usize, previous: Document },
    Delete { key: TableKey, removed: Vec<(usize, Document)> },
}

/// In-place writes under the store's write lock, undone unless committed.
pub struct MemoryTransaction {
    router: Router,
    guard: OwnedRwLockWriteGuard<Tables>,
    undo: Vec<Undo>,
}

impl MemoryTransaction {
    fn undo_all(&mut self) {
        while let Some(step) = self.undo.pop() {
            match step {
                Undo::Insert { key, index } => {
                    if let Some(rows) = self.guard.rows.get_mut(&key) {
                        rows.remove(index);
                    }
                }
                Undo::Update { key, index, previous } => {
                    if let Some(rows) = self.guard.rows.get_mut(&key) {
                        rows[index] = previous;
                    }
                }
                Undo::Delete { key, removed } => {
                    let rows = self.guard.rows.entry(key).or_default();
                    for (index, doc) in removed {
                        rows.insert(index, doc);
                    }
                }
            }
        }
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        self.undo_all();
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn insert(&mut self, target: &Collection, record: Document) -> StoreResult<Uuid> {
        let key = self.router.key(target)?;
        let index = self.guard.len(&key);
        let id = self.guard.insert(key.clone(), record)?;
        self.undo.push(Undo::Insert { key, index });
        Ok(id)
    }

    async fn update_one(
        &mut self,
        target: &Collection,
        filter: &Filter,
        mutation: &Mutation,
    ) -> StoreResult<UpdateOutcome> {
        let key = self.router.key(target)?;
        let Some((index, previous)) = self.guard.update_one(&key, filter, mutation) else {
            return Ok(updated(false));
        };
        self.undo.push(Undo::Update { key, index, previous });
        Ok(updated(true))
    }

    async fn delete_many(&mut self, target: &Collection, filter: &Filter) -> StoreResult<DeleteOutcome> {
        let key = self.router.key(target)?;
        let removed = self.guard.delete(&key, filter, false);
        let outcome = deleted(&removed);
        if !removed.is_empty() {
            self.undo.push(Undo::Delete { key, removed });
        }
        Ok(outcome)
    }

    async fn find(&mut self, target: &Collection, query: &FindQuery) -> StoreResult<Vec<Document>> {
        let key = self.router.key(target)?;
        Ok(self.guard.find(&key, query))
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let mut tx = self;
        tx.undo.clear();
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        let mut tx = self;
        tx.undo_all();
        Ok(())
    }
}
