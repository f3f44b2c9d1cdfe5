//! # Domain Models
//!
//! These structs represent the core entities of the message board.
//! We use UUID v7 for time-ordered, globally unique identification, which
//! also gives adapters a stable tie-breaker when two records share a
//! `bumped_on` value.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{DomainError, Result};

/// Text that replaces a reply's body when it is soft-deleted.
pub const TOMBSTONE: &str = "[deleted]";

/// Maximum length for board names
const MAX_BOARD_NAME_LEN: usize = 64;

/// Validated board name.
///
/// Doubles as a container identifier under the container layout, so only
/// ASCII alphanumerics, `-` and `_` are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BoardName(String);

impl BoardName {
    pub fn parse(raw: &str) -> Result<Self> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(DomainError::validation("board name is required"));
        }
        if name.len() > MAX_BOARD_NAME_LEN {
            return Err(DomainError::validation(format!(
                "board name exceeds {MAX_BOARD_NAME_LEN} characters"
            )));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(DomainError::validation(
                "board name may only contain letters, digits, '-' and '_'",
            ));
        }
        Ok(Self(name.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BoardName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<BoardName> for String {
    fn from(name: BoardName) -> Self {
        name.0
    }
}

impl AsRef<str> for BoardName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BoardName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A top-level post on a board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: Uuid,
    pub board: BoardName,
    pub text: String,
    #[serde(with = "crate::timestamp")]
    pub created_on: DateTime<Utc>,
    /// The timestamp used for sorting threads by activity
    #[serde(with = "crate::timestamp")]
    pub bumped_on: DateTime<Utc>,
    #[serde(default)]
    pub reported: bool,
    /// Stored as given. Never hashed and never returned by the API.
    #[serde(default)]
    pub delete_password: String,
    /// Identifiers of replies, in posting order
    #[serde(default)]
    pub replies: Vec<Uuid>,
}

impl Thread {
    pub fn new(board: BoardName, text: String, delete_password: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            board,
            text,
            created_on: now,
            bumped_on: now,
            reported: false,
            delete_password,
            replies: Vec::new(),
        }
    }
}

/// A child post attached to exactly one thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub id: Uuid,
    pub board: BoardName,
    /// Non-owning reference to the parent thread
    pub thread_id: Uuid,
    #[serde(rename = "reply")]
    pub text: String,
    #[serde(with = "crate::timestamp")]
    pub created_on: DateTime<Utc>,
    #[serde(with = "crate::timestamp")]
    pub bumped_on: DateTime<Utc>,
    #[serde(default)]
    pub reported: bool,
    #[serde(default)]
    pub delete_password: String,
}

impl Reply {
    pub fn new(
        board: BoardName,
        thread_id: Uuid,
        text: String,
        delete_password: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            board,
            thread_id,
            text,
            created_on: now,
            bumped_on: now,
            reported: false,
            delete_password,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.text == TOMBSTONE
    }
}

/// A thread together with its most recently bumped replies.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadWithReplies {
    pub thread: Thread,
    pub recent_replies: Vec<Reply>,
}

/// The projected shape read back after a reply is posted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadHeadline {
    pub id: Uuid,
    pub text: String,
    #[serde(with = "crate::timestamp")]
    pub bumped_on: DateTime<Utc>,
}

/// Result of the posting workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct PostedReply {
    pub reply: Reply,
    /// The parent thread after its bump
    pub thread: Thread,
    /// The board's most recently bumped threads after the bump
    pub front_page: Vec<ThreadHeadline>,
}

/// How the store maps boards onto physical storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreLayout {
    /// Two shared tables; `board` is a partition key on every record
    SharedTable,
    /// Every board is its own container holding both tables
    ContainerPerBoard,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardInfo {
    pub name: BoardName,
    pub layout: StoreLayout,
    pub thread_count: usize,
    /// Only known when the board is a first-class container
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_on: Option<DateTime<Utc>>,
}

/// Outcome of a board creation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardCreation {
    Created,
    AlreadyExists,
    /// Shared-table layout: boards exist as soon as a thread names them
    NotRequired,
}
