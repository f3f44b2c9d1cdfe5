//! # Thread Service
//!
//! Creates, bumps, reports, deletes and lists threads.

use chrono::{DateTime, Utc};
use domains::{
    from_document, timestamp, to_document, BoardName, Collection, DomainError, Filter, FindQuery,
    Mutation, Result, Thread, ThreadWithReplies,
};
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::instrument;
use uuid::Uuid;

use crate::reply_service::recent_replies;
use crate::scope::TransactionalScope;
use crate::store::StoreHandle;
use crate::{page_size, require_text, ReplyRetention, ServiceOptions};

/// What a thread deletion removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadDeletion {
    /// Replies removed alongside the thread (always zero when orphaning)
    pub replies_deleted: u64,
}

#[derive(Clone)]
pub struct ThreadService {
    store: StoreHandle,
    options: ServiceOptions,
}

/// Matches one thread on one board.
pub(crate) fn thread_filter(board: &BoardName, thread_id: Uuid) -> Filter {
    Filter::new()
        .eq("board", board.as_str())
        .eq("id", thread_id.to_string())
}

/// The bump applied on any thread activity: `bumped_on` moves to `now`,
/// optionally with appended text and a new reply reference.
pub(crate) fn bump_mutation(now: &DateTime<Utc>, text: Option<&str>, reply: Option<Uuid>) -> Mutation {
    let mut mutation = Mutation::new().set("bumped_on", timestamp::to_value(now));
    if let Some(text) = text {
        mutation = mutation.append_text("text", format!("\n{text}"));
    }
    if let Some(reply) = reply {
        mutation = mutation.push("replies", reply.to_string());
    }
    mutation
}

/// Decodes the single thread a find returned, if any.
pub(crate) fn single_thread(docs: Vec<domains::Document>, thread_id: Uuid) -> Result<Thread> {
    let doc = docs
        .into_iter()
        .next()
        .ok_or_else(|| DomainError::not_found("thread", thread_id))?;
    Ok(from_document(doc)?)
}

impl ThreadService {
    pub fn new(store: StoreHandle, options: ServiceOptions) -> Self {
        Self { store, options }
    }

    #[instrument(skip(self, text, delete_password), err(Display))]
    pub async fn create_thread(&self, board: &str, text: &str, delete_password: &str) -> Result<Thread> {
        let board = BoardName::parse(board)?;
        let text = require_text(text)?;
        let thread = Thread::new(board, text, delete_password.to_owned(), timestamp::now());

        self.store
            .insert(&Collection::threads(&thread.board), to_document(&thread)?)
            .await?;

        tracing::info!(thread_id = %thread.id, board = %thread.board, "thread created");
        Ok(thread)
    }

    /// Bumps a thread, optionally appending text and recording a reply.
    ///
    /// Returns the thread as stored after the bump.
    #[instrument(skip(self, text), err(Display))]
    pub async fn bump_and_append_text(
        &self,
        board: &str,
        thread_id: Uuid,
        text: Option<&str>,
        reply_reference: Option<Uuid>,
    ) -> Result<Thread> {
        let board = BoardName::parse(board)?;
        let text = text.map(require_text).transpose()?;
        let mutation = bump_mutation(&timestamp::now(), text.as_deref(), reply_reference);
        self.apply_and_read(&board, thread_id, &mutation).await
    }

    /// Appends text and reports the thread in one update.
    ///
    /// Returns the thread as stored, carrying the new `bumped_on`.
    #[instrument(skip(self, text), err(Display))]
    pub async fn bump_and_report(&self, board: &str, thread_id: Uuid, text: &str) -> Result<Thread> {
        let board = BoardName::parse(board)?;
        let text = require_text(text)?;
        let mutation = bump_mutation(&timestamp::now(), Some(&text), None).set("reported", true);
        let thread = self.apply_and_read(&board, thread_id, &mutation).await?;

        tracing::info!(%thread_id, "thread bumped and reported");
        Ok(thread)
    }

    /// Applies `mutation` to one thread and reads it back.
    async fn apply_and_read(&self, board: &BoardName, thread_id: Uuid, mutation: &Mutation) -> Result<Thread> {
        let threads = Collection::threads(board);
        let filter = thread_filter(board, thread_id);

        let outcome = self.store.update_one(&threads, &filter, mutation).await?;
        if outcome.matched_count == 0 {
            return Err(DomainError::not_found("thread", thread_id));
        }

        let docs = self
            .store
            .find(&threads, &FindQuery::new(filter).limit(1))
            .await?;
        single_thread(docs, thread_id)
    }

    /// Flags a thread for moderation. Reporting twice is harmless.
    #[instrument(skip(self), err(Display))]
    pub async fn report_thread(&self, board: &str, thread_id: Uuid) -> Result<()> {
        let board = BoardName::parse(board)?;
        let mutation = Mutation::new()
            .set("reported", true)
            .set("bumped_on", timestamp::to_value(&timestamp::now()));

        let outcome = self
            .store
            .update_one(&Collection::threads(&board), &thread_filter(&board, thread_id), &mutation)
            .await?;
        if outcome.matched_count == 0 {
            return Err(DomainError::not_found("thread", thread_id));
        }

        tracing::info!(%thread_id, "thread reported");
        Ok(())
    }

    /// Hard-deletes a thread; its replies follow the configured retention.
    #[instrument(skip(self), err(Display))]
    pub async fn delete_thread(&self, board: &str, thread_id: Uuid) -> Result<ThreadDeletion> {
        let board = BoardName::parse(board)?;
        let threads = Collection::threads(&board);
        let filter = thread_filter(&board, thread_id);

        let deletion = match self.options.reply_retention {
            ReplyRetention::Orphan => {
                let outcome = self.store.delete_one(&threads, &filter).await?;
                if outcome.deleted_count == 0 {
                    return Err(DomainError::not_found("thread", thread_id));
                }
                ThreadDeletion { replies_deleted: 0 }
            }
            ReplyRetention::Cascade => {
                let mut scope = TransactionalScope::open(&self.store, "delete_thread").await?;
                let outcome = async {
                    let removed = scope.delete_many("delete_thread", &threads, &filter).await?;
                    if removed.deleted_count == 0 {
                        return Err(scope.reject(
                            "delete_thread",
                            DomainError::not_found("thread", thread_id),
                        ));
                    }
                    let replies = Filter::new()
                        .eq("board", board.as_str())
                        .eq("thread_id", thread_id.to_string());
                    let removed = scope
                        .delete_many("delete_replies", &Collection::replies(&board), &replies)
                        .await?;
                    Ok::<_, DomainError>(ThreadDeletion {
                        replies_deleted: removed.deleted_count,
                    })
                }
                .await;
                scope.finish(outcome).await?
            }
        };

        tracing::info!(%thread_id, replies_deleted = deletion.replies_deleted, "thread deleted");
        Ok(deletion)
    }

    /// The board's most recently bumped threads, each with its most recently
    /// bumped replies.
    ///
    /// Reply lookups run concurrently (bounded by `fan_out_concurrency`) and
    /// are joined in thread order. Any failed lookup fails the listing.
    #[instrument(skip(self), err(Display))]
    pub async fn list_recent_threads(
        &self,
        board: &str,
        limit: Option<usize>,
        reply_limit: Option<usize>,
    ) -> Result<Vec<ThreadWithReplies>> {
        let board = BoardName::parse(board)?;
        let limit = page_size(limit, self.options.thread_limit, "limit")?;
        let reply_limit = page_size(reply_limit, self.options.reply_preview_limit, "reply_limit")?;

        let query = FindQuery::new(Filter::new().eq("board", board.as_str()))
            .newest_first("bumped_on")
            .limit(limit);
        let threads = self
            .store
            .find(&Collection::threads(&board), &query)
            .await?
            .into_iter()
            .map(from_document::<Thread>)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let store = &self.store;
        let board = &board;
        stream::iter(threads)
            .map(|thread| async move {
                match recent_replies(store, board, thread.id, reply_limit).await {
                    Ok(recent_replies) => Ok(ThreadWithReplies {
                        thread,
                        recent_replies,
                    }),
                    Err(source) => Err(DomainError::PartialFailure {
                        operation: "list_recent_threads",
                        committed: Vec::new(),
                        failed_step: format!("fetch_replies({})", thread.id),
                        source: Box::new(source),
                    }),
                }
            })
            .buffered(self.options.fan_out_concurrency)
            .try_collect()
            .await
    }
}
