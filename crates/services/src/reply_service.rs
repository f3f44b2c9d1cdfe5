//! # Reply Service
//!
//! Replies are created, reported, soft-deleted and listed here. Posting a
//! reply *and* bumping its thread is the job of [`crate::PostingService`].

use chrono::{DateTime, Utc};
use domains::{
    from_document, timestamp, to_document, BoardName, Collection, DomainError, Filter, FindQuery,
    Mutation, Reply, Result, TOMBSTONE,
};
use tracing::instrument;
use uuid::Uuid;

use crate::store::StoreHandle;
use crate::{page_size, require_text, ServiceOptions};

#[derive(Clone)]
pub struct ReplyService {
    store: StoreHandle,
    options: ServiceOptions,
}

/// Validates input and builds the record a reply insert persists.
pub(crate) fn build_reply(
    board: &str,
    thread_id: Uuid,
    text: &str,
    delete_password: &str,
    now: DateTime<Utc>,
) -> Result<Reply> {
    let board = BoardName::parse(board)?;
    if thread_id.is_nil() {
        return Err(DomainError::validation("thread_id is required"));
    }
    let text = require_text(text)?;
    Ok(Reply::new(board, thread_id, text, delete_password.to_owned(), now))
}

fn reply_filter(board: &BoardName, thread_id: Uuid, reply_id: Uuid) -> Filter {
    Filter::new()
        .eq("board", board.as_str())
        .eq("thread_id", thread_id.to_string())
        .eq("id", reply_id.to_string())
}

/// The most recently bumped replies of one thread.
pub(crate) async fn recent_replies(
    store: &StoreHandle,
    board: &BoardName,
    thread_id: Uuid,
    limit: usize,
) -> Result<Vec<Reply>> {
    let query = FindQuery::new(
        Filter::new()
            .eq("board", board.as_str())
            .eq("thread_id", thread_id.to_string()),
    )
    .newest_first("bumped_on")
    .limit(limit);

    let replies = store
        .find(&Collection::replies(board), &query)
        .await?
        .into_iter()
        .map(from_document::<Reply>)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(replies)
}

impl ReplyService {
    pub fn new(store: StoreHandle, options: ServiceOptions) -> Self {
        Self { store, options }
    }

    /// Persists a reply. The parent thread is left untouched.
    #[instrument(skip(self, text, delete_password), err(Display))]
    pub async fn create_reply(
        &self,
        board: &str,
        thread_id: Uuid,
        text: &str,
        delete_password: &str,
    ) -> Result<Reply> {
        let reply = build_reply(board, thread_id, text, delete_password, timestamp::now())?;
        self.store
            .insert(&Collection::replies(&reply.board), to_document(&reply)?)
            .await?;

        tracing::info!(reply_id = %reply.id, %thread_id, "reply created");
        Ok(reply)
    }

    #[instrument(skip(self), err(Display))]
    pub async fn report_reply(&self, board: &str, thread_id: Uuid, reply_id: Uuid) -> Result<()> {
        let board = BoardName::parse(board)?;
        let mutation = Mutation::new()
            .set("reported", true)
            .set("bumped_on", timestamp::to_value(&timestamp::now()));

        self.update(&board, thread_id, reply_id, &mutation).await?;
        tracing::info!(%reply_id, "reply reported");
        Ok(())
    }

    /// Replaces the reply text with the tombstone. The record stays.
    #[instrument(skip(self), err(Display))]
    pub async fn soft_delete_reply(&self, board: &str, thread_id: Uuid, reply_id: Uuid) -> Result<()> {
        let board = BoardName::parse(board)?;
        let mutation = Mutation::new().set("reply", TOMBSTONE);

        self.update(&board, thread_id, reply_id, &mutation).await?;
        tracing::info!(%reply_id, "reply deleted");
        Ok(())
    }

    #[instrument(skip(self), err(Display))]
    pub async fn list_recent_replies(
        &self,
        board: &str,
        thread_id: Uuid,
        limit: Option<usize>,
    ) -> Result<Vec<Reply>> {
        let board = BoardName::parse(board)?;
        let limit = page_size(limit, self.options.reply_limit, "limit")?;
        recent_replies(&self.store, &board, thread_id, limit).await
    }

    async fn update(
        &self,
        board: &BoardName,
        thread_id: Uuid,
        reply_id: Uuid,
        mutation: &Mutation,
    ) -> Result<()> {
        let outcome = self
            .store
            .update_one(
                &Collection::replies(board),
                &reply_filter(board, thread_id, reply_id),
                mutation,
            )
            .await?;
        if outcome.matched_count == 0 {
            tracing::warn!(%reply_id, %thread_id, "no reply matched");
            return Err(DomainError::not_found("reply", reply_id));
        }
        Ok(())
    }
}
