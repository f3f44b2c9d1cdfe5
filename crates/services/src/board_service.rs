//! # Board Service
//!
//! Boards are first-class containers under the container layout and mere
//! partition keys under the shared-table layout. This service hides which.

use domains::{
    BoardCreation, BoardInfo, BoardName, Collection, DomainError, Filter, FindQuery, Result,
    StoreLayout,
};
use tracing::instrument;

use crate::scope::TransactionalScope;
use crate::store::StoreHandle;

/// What a board deletion removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardDeletion {
    pub threads_deleted: u64,
    pub replies_deleted: u64,
}

#[derive(Clone)]
pub struct BoardService {
    store: StoreHandle,
}

fn partition(board: &BoardName) -> Filter {
    Filter::new().eq("board", board.as_str())
}

impl BoardService {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    #[instrument(skip(self), err(Display))]
    pub async fn create_board(&self, name: &str) -> Result<BoardCreation> {
        let board = BoardName::parse(name)?;
        match self.store.layout() {
            StoreLayout::SharedTable => Ok(BoardCreation::NotRequired),
            StoreLayout::ContainerPerBoard => {
                let created = self
                    .store
                    .call(self.store.adapter().create_container(&board))
                    .await?;
                if created {
                    tracing::info!(%board, "board created");
                    Ok(BoardCreation::Created)
                } else {
                    Ok(BoardCreation::AlreadyExists)
                }
            }
        }
    }

    #[instrument(skip(self), err(Display))]
    pub async fn get_board(&self, name: &str) -> Result<BoardInfo> {
        let board = BoardName::parse(name)?;
        let layout = self.store.layout();

        let created_on = match layout {
            StoreLayout::SharedTable => None,
            StoreLayout::ContainerPerBoard => {
                let info = self
                    .store
                    .call(self.store.adapter().read_container(&board))
                    .await?
                    .ok_or_else(|| DomainError::not_found("board", &board))?;
                Some(info.created_on)
            }
        };

        let thread_count = self.count(&Collection::threads(&board)).await?;
        if layout == StoreLayout::SharedTable && thread_count == 0 {
            return Err(DomainError::not_found("board", &board));
        }

        Ok(BoardInfo {
            name: board,
            layout,
            thread_count,
            created_on,
        })
    }

    /// Removes a board and everything posted on it.
    #[instrument(skip(self), err(Display))]
    pub async fn delete_board(&self, name: &str) -> Result<BoardDeletion> {
        let board = BoardName::parse(name)?;
        let threads = Collection::threads(&board);
        let replies = Collection::replies(&board);

        let deletion = match self.store.layout() {
            StoreLayout::ContainerPerBoard => {
                let deletion = BoardDeletion {
                    threads_deleted: self.count(&threads).await? as u64,
                    replies_deleted: self.count(&replies).await? as u64,
                };
                let dropped = self
                    .store
                    .call(self.store.adapter().drop_container(&board))
                    .await?;
                if !dropped {
                    return Err(DomainError::not_found("board", &board));
                }
                deletion
            }
            StoreLayout::SharedTable => {
                if self.count(&threads).await? == 0 && self.count(&replies).await? == 0 {
                    return Err(DomainError::not_found("board", &board));
                }
                let mut scope = TransactionalScope::open(&self.store, "delete_board").await?;
                let outcome = async {
                    let replies_deleted = scope
                        .delete_many("delete_replies", &replies, &partition(&board))
                        .await?
                        .deleted_count;
                    let threads_deleted = scope
                        .delete_many("delete_threads", &threads, &partition(&board))
                        .await?
                        .deleted_count;
                    Ok::<_, DomainError>(BoardDeletion {
                        threads_deleted,
                        replies_deleted,
                    })
                }
                .await;
                scope.finish(outcome).await?
            }
        };

        tracing::info!(
            %board,
            threads = deletion.threads_deleted,
            replies = deletion.replies_deleted,
            "board deleted"
        );
        Ok(deletion)
    }

    async fn count(&self, target: &Collection) -> Result<usize> {
        let query = FindQuery::new(partition(&target.board)).project(&["id"]);
        Ok(self.store.find(target, &query).await?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use domains::{DeleteOutcome, MockDocumentStore, StoreError, Table};
    use serde_json::json;

    fn service(store: MockDocumentStore) -> BoardService {
        BoardService::new(StoreHandle::new(Arc::new(store), Duration::from_secs(1)))
    }

    fn rows(n: usize) -> Vec<domains::Document> {
        (0..n)
            .map(|i| json!({ "id": i.to_string() }).as_object().cloned().unwrap_or_default())
            .collect()
    }

    #[tokio::test]
    async fn shared_layout_does_not_create_boards() {
        let mut store = MockDocumentStore::new();
        store.expect_layout().return_const(StoreLayout::SharedTable);
        let svc = service(store);

        assert_eq!(svc.create_board("general").await.unwrap(), BoardCreation::NotRequired);
    }

    #[tokio::test]
    async fn container_creation_reports_existing_boards() {
        let mut store = MockDocumentStore::new();
        store.expect_layout().return_const(StoreLayout::ContainerPerBoard);
        store.expect_create_container().returning(|_| Ok(false));
        let svc = service(store);

        assert_eq!(
            svc.create_board("general").await.unwrap(),
            BoardCreation::AlreadyExists
        );
    }

    #[tokio::test]
    async fn empty_shared_board_is_not_found() {
        let mut store = MockDocumentStore::new();
        store.expect_layout().return_const(StoreLayout::SharedTable);
        store.expect_find().returning(|_, _| Ok(Vec::new()));
        let svc = service(store);

        assert!(matches!(
            svc.get_board("general").await,
            Err(DomainError::NotFound { resource: "board", .. })
        ));
        assert!(matches!(
            svc.delete_board("general").await,
            Err(DomainError::NotFound { resource: "board", .. })
        ));
    }

    #[tokio::test]
    async fn best_effort_board_delete_names_the_failed_step() {
        let mut store = MockDocumentStore::new();
        store.expect_layout().return_const(StoreLayout::SharedTable);
        store.expect_begin().returning(|| Ok(None));
        store.expect_find().returning(|_, _| Ok(rows(2)));
        store.expect_delete_many().returning(|target, _| match target.table {
            Table::Replies => Ok(DeleteOutcome { deleted_count: 2 }),
            Table::Threads => Err(StoreError::Backend("disk full".into())),
        });
        let svc = service(store);

        match svc.delete_board("general").await {
            Err(DomainError::PartialFailure {
                committed,
                failed_step,
                ..
            }) => {
                assert_eq!(committed, vec!["delete_replies".to_string()]);
                assert_eq!(failed_step, "delete_threads");
            }
            other => panic!("expected partial failure, got {other:?}"),
        }
    }
}
