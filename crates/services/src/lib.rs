//! # services
//!
//! The message board's business operations. Every service talks to the
//! store through a [`StoreHandle`], which bounds each call with a timeout,
//! and runs multi-step writes inside a [`scope::TransactionalScope`].

pub mod board_service;
pub mod posting;
pub mod reply_service;
pub mod scope;
pub mod store;
pub mod thread_service;

use std::sync::Arc;
use std::time::Duration;

use domains::{DocumentStore, DomainError, Result};

pub use board_service::{BoardDeletion, BoardService};
pub use posting::PostingService;
pub use reply_service::ReplyService;
pub use store::StoreHandle;
pub use thread_service::{ThreadDeletion, ThreadService};

/// Largest page any listing may ask for.
pub const MAX_PAGE_SIZE: usize = 100;

/// What happens to a thread's replies when the thread is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyRetention {
    /// Replies are left in place, still referencing the thread
    Orphan,
    /// Replies are deleted in the same scope as the thread
    Cascade,
}

/// Tunables shared by all services.
#[derive(Debug, Clone, Copy)]
pub struct ServiceOptions {
    pub call_timeout: Duration,
    pub thread_limit: usize,
    pub reply_preview_limit: usize,
    pub reply_limit: usize,
    pub fan_out_concurrency: usize,
    pub reply_retention: ReplyRetention,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(5),
            thread_limit: 10,
            reply_preview_limit: 3,
            reply_limit: 10,
            fan_out_concurrency: 10,
            reply_retention: ReplyRetention::Orphan,
        }
    }
}

/// All services wired to one shared store.
#[derive(Clone)]
pub struct Services {
    pub threads: ThreadService,
    pub replies: ReplyService,
    pub boards: BoardService,
    pub posting: PostingService,
}

impl Services {
    pub fn new(store: Arc<dyn DocumentStore>, options: ServiceOptions) -> Self {
        let handle = StoreHandle::new(store, options.call_timeout);
        Self {
            threads: ThreadService::new(handle.clone(), options),
            replies: ReplyService::new(handle.clone(), options),
            boards: BoardService::new(handle.clone()),
            posting: PostingService::new(handle, options),
        }
    }
}

/// Resolves an optional caller-supplied page size.
pub(crate) fn page_size(requested: Option<usize>, default: usize, field: &str) -> Result<usize> {
    match requested {
        None => Ok(default),
        Some(0) => Err(DomainError::validation(format!("{field} must be positive"))),
        Some(n) if n > MAX_PAGE_SIZE => Err(DomainError::validation(format!(
            "{field} must not exceed {MAX_PAGE_SIZE}"
        ))),
        Some(n) => Ok(n),
    }
}

/// Rejects missing or blank post bodies.
pub(crate) fn require_text(text: &str) -> Result<String> {
    if text.trim().is_empty() {
        return Err(DomainError::validation("text is required"));
    }
    Ok(text.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_defaults_and_bounds() {
        assert_eq!(page_size(None, 10, "limit").unwrap(), 10);
        assert_eq!(page_size(Some(3), 10, "limit").unwrap(), 3);
        assert!(page_size(Some(0), 10, "limit").is_err());
        assert!(page_size(Some(MAX_PAGE_SIZE + 1), 10, "limit").is_err());
    }

    #[test]
    fn blank_text_is_rejected() {
        assert!(require_text("  \n").is_err());
        assert_eq!(require_text(" hi ").unwrap(), " hi ");
    }
}
