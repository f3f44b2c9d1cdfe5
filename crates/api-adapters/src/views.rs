//! Response bodies. None of them carries a `delete_password`.

use chrono::{DateTime, Utc};
use domains::{
    BoardCreation, BoardName, PostedReply, Reply, Thread, ThreadHeadline, ThreadWithReplies,
};
use serde::Serialize;
use services::{BoardDeletion, ThreadDeletion};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct ThreadView {
    pub id: Uuid,
    pub board: BoardName,
    pub text: String,
    #[serde(serialize_with = "domains::timestamp::serialize")]
    pub created_on: DateTime<Utc>,
    #[serde(serialize_with = "domains::timestamp::serialize")]
    pub bumped_on: DateTime<Utc>,
    pub reported: bool,
    pub replies: Vec<Uuid>,
}

impl From<Thread> for ThreadView {
    fn from(t: Thread) -> Self {
        Self {
            id: t.id,
            board: t.board,
            text: t.text,
            created_on: t.created_on,
            bumped_on: t.bumped_on,
            reported: t.reported,
            replies: t.replies,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReplyView {
    pub id: Uuid,
    pub board: BoardName,
    pub thread_id: Uuid,
    pub text: String,
    #[serde(serialize_with = "domains::timestamp::serialize")]
    pub created_on: DateTime<Utc>,
    #[serde(serialize_with = "domains::timestamp::serialize")]
    pub bumped_on: DateTime<Utc>,
    pub reported: bool,
}

impl From<Reply> for ReplyView {
    fn from(r: Reply) -> Self {
        Self {
            id: r.id,
            board: r.board,
            thread_id: r.thread_id,
            text: r.text,
            created_on: r.created_on,
            bumped_on: r.bumped_on,
            reported: r.reported,
        }
    }
}

/// A thread as shown on the board listing: the reply references are
/// swapped for the most recent replies themselves.
#[derive(Debug, Serialize)]
pub struct ThreadListingView {
    pub id: Uuid,
    pub board: BoardName,
    pub text: String,
    #[serde(serialize_with = "domains::timestamp::serialize")]
    pub created_on: DateTime<Utc>,
    #[serde(serialize_with = "domains::timestamp::serialize")]
    pub bumped_on: DateTime<Utc>,
    pub reported: bool,
    /// Every reply the thread has received, not just the ones shown
    pub replycount: usize,
    pub replies: Vec<ReplyView>,
}

impl From<ThreadWithReplies> for ThreadListingView {
    fn from(entry: ThreadWithReplies) -> Self {
        let ThreadWithReplies {
            thread,
            recent_replies,
        } = entry;
        Self {
            id: thread.id,
            board: thread.board,
            text: thread.text,
            created_on: thread.created_on,
            bumped_on: thread.bumped_on,
            reported: thread.reported,
            replycount: thread.replies.len(),
            replies: recent_replies.into_iter().map(ReplyView::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostedReplyView {
    pub reply: ReplyView,
    pub thread: ThreadView,
    pub front_page: Vec<ThreadHeadline>,
}

impl From<PostedReply> for PostedReplyView {
    fn from(posted: PostedReply) -> Self {
        Self {
            reply: posted.reply.into(),
            thread: posted.thread.into(),
            front_page: posted.front_page,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BoardCreationView {
    pub board: BoardName,
    pub outcome: BoardCreation,
}

#[derive(Debug, Serialize)]
pub struct BoardDeletionView {
    pub board: BoardName,
    pub threads_deleted: u64,
    pub replies_deleted: u64,
}

impl BoardDeletionView {
    pub fn new(board: BoardName, deletion: BoardDeletion) -> Self {
        Self {
            board,
            threads_deleted: deletion.threads_deleted,
            replies_deleted: deletion.replies_deleted,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ThreadDeletionView {
    pub thread_id: Uuid,
    pub replies_deleted: u64,
}

impl ThreadDeletionView {
    pub fn new(thread_id: Uuid, deletion: ThreadDeletion) -> Self {
        Self {
            thread_id,
            replies_deleted: deletion.replies_deleted,
        }
    }
}

/// Plain acknowledgement, e.g. `{"result":"reported"}`.
#[derive(Debug, Serialize)]
pub struct Ack {
    pub result: &'static str,
}

impl Ack {
    pub const REPORTED: Ack = Ack { result: "reported" };
    pub const DELETED: Ack = Ack { result: "deleted" };
}
