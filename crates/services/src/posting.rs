//! # Posting workflow
//!
//! Posting a reply touches both tables: the reply is inserted, its thread is
//! bumped and gains the reply reference, and the board's front page is read
//! back. The steps share one transactional scope.

use domains::{
    from_document, timestamp, to_document, Collection, DomainError, Filter, FindQuery, PostedReply,
    Result, ThreadHeadline,
};
use tracing::instrument;
use uuid::Uuid;

use crate::reply_service::build_reply;
use crate::scope::TransactionalScope;
use crate::store::StoreHandle;
use crate::thread_service::{bump_mutation, single_thread, thread_filter};
use crate::ServiceOptions;

#[derive(Clone)]
pub struct PostingService {
    store: StoreHandle,
    options: ServiceOptions,
}

impl PostingService {
    pub fn new(store: StoreHandle, options: ServiceOptions) -> Self {
        Self { store, options }
    }

    #[instrument(skip(self, text, delete_password), err(Display))]
    pub async fn post_reply(
        &self,
        board: &str,
        thread_id: Uuid,
        text: &str,
        delete_password: &str,
    ) -> Result<PostedReply> {
        let now = timestamp::now();
        let reply = build_reply(board, thread_id, text, delete_password, now)?;
        let board = reply.board.clone();
        let threads = Collection::threads(&board);
        let record = to_document(&reply)?;

        let mut scope = TransactionalScope::open(&self.store, "post_reply").await?;
        let outcome = async {
            scope
                .insert("insert_reply", &Collection::replies(&board), record)
                .await?;

            let filter = thread_filter(&board, thread_id);
            let bumped = scope
                .update_one(
                    "bump_thread",
                    &threads,
                    &filter,
                    &bump_mutation(&now, None, Some(reply.id)),
                )
                .await?;
            if bumped.matched_count == 0 {
                return Err(scope.reject("bump_thread", DomainError::not_found("thread", thread_id)));
            }

            let front_page = FindQuery::new(Filter::new().eq("board", board.as_str()))
                .newest_first("bumped_on")
                .limit(self.options.thread_limit)
                .project(&["text", "bumped_on"]);
            let front_page = scope
                .find("read_front_page", &threads, &front_page)
                .await?
                .into_iter()
                .map(from_document::<ThreadHeadline>)
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let thread = scope
                .find("read_thread", &threads, &FindQuery::new(filter).limit(1))
                .await?;
            let thread = single_thread(thread, thread_id)?;

            Ok::<_, DomainError>((thread, front_page))
        }
        .await;
        let (thread, front_page) = scope.finish(outcome).await?;

        tracing::info!(reply_id = %reply.id, %thread_id, "reply posted");
        Ok(PostedReply {
            reply,
            thread,
            front_page,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use domains::{MockDocumentStore, StoreError, UpdateOutcome};

    fn service(store: MockDocumentStore) -> PostingService {
        let options = ServiceOptions::default();
        PostingService::new(StoreHandle::new(Arc::new(store), options.call_timeout), options)
    }

    #[tokio::test]
    async fn invalid_input_touches_nothing() {
        let svc = service(MockDocumentStore::new());
        let err = svc
            .post_reply("general", Uuid::now_v7(), "", "pw")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn best_effort_bump_failure_is_partial() {
        let mut store = MockDocumentStore::new();
        store.expect_begin().returning(|| Ok(None));
        store.expect_insert().times(1).returning(|_, _| Ok(Uuid::now_v7()));
        store
            .expect_update_one()
            .returning(|_, _, _| Err(StoreError::Connection("reset".into())));
        let svc = service(store);

        match svc.post_reply("general", Uuid::now_v7(), "hi", "pw").await {
            Err(DomainError::PartialFailure {
                operation,
                committed,
                failed_step,
                ..
            }) => {
                assert_eq!(operation, "post_reply");
                assert_eq!(committed, vec!["insert_reply".to_string()]);
                assert_eq!(failed_step, "bump_thread");
            }
            other => panic!("expected partial failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn best_effort_missing_thread_is_partial_after_insert() {
        let mut store = MockDocumentStore::new();
        store.expect_begin().returning(|| Ok(None));
        store.expect_insert().returning(|_, _| Ok(Uuid::now_v7()));
        store
            .expect_update_one()
            .returning(|_, _, _| Ok(UpdateOutcome { matched_count: 0 }));
        let svc = service(store);

        match svc.post_reply("general", Uuid::now_v7(), "hi", "pw").await {
            Err(DomainError::PartialFailure {
                committed, source, ..
            }) => {
                assert_eq!(committed, vec!["insert_reply".to_string()]);
                assert!(matches!(*source, DomainError::NotFound { resource: "thread", .. }));
            }
            other => panic!("expected partial failure, got {other:?}"),
        }
    }
}
