use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use domains::{
    BoardName, Collection, ContainerInfo, DeleteOutcome, Document, DocumentStore, DomainError,
    Filter, FindQuery, Mutation, StoreLayout, StoreResult, StoreTransaction, Table, UpdateOutcome,
};
use integration_tests::{cascading, options, seed_thread, services, BOARD};
use services::ServiceOptions;
use storage_adapters::MemoryStore;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

/// Concurrent and peak number of reply lookups.
#[derive(Default)]
struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

/// Delegates to a `MemoryStore`, holding each reply lookup for the delay
/// registered under its thread id.
struct SlowReplies {
    inner: MemoryStore,
    delays: Arc<DashMap<String, Duration>>,
    gauge: Arc<Gauge>,
}

impl SlowReplies {
    fn delay_for(&self, query: &FindQuery) -> Option<Duration> {
        query
            .filter
            .conditions()
            .iter()
            .find(|(field, _)| field == "thread_id")
            .and_then(|(_, value)| value.as_str())
            .and_then(|id| self.delays.get(id).map(|entry| *entry.value()))
    }
}

#[async_trait]
impl DocumentStore for SlowReplies {
    fn layout(&self) -> StoreLayout {
        self.inner.layout()
    }
    async fn insert(&self, target: &Collection, record: Document) -> StoreResult<Uuid> {
        self.inner.insert(target, record).await
    }
    async fn update_one(
        &self,
        target: &Collection,
        filter: &Filter,
        mutation: &Mutation,
    ) -> StoreResult<UpdateOutcome> {
        self.inner.update_one(target, filter, mutation).await
    }
    async fn delete_one(&self, target: &Collection, filter: &Filter) -> StoreResult<DeleteOutcome> {
        self.inner.delete_one(target, filter).await
    }
    async fn delete_many(&self, target: &Collection, filter: &Filter) -> StoreResult<DeleteOutcome> {
        self.inner.delete_many(target, filter).await
    }
    async fn find(&self, target: &Collection, query: &FindQuery) -> StoreResult<Vec<Document>> {
        let delay = match target.table {
            Table::Replies => self.delay_for(query),
            Table::Threads => None,
        };
        let Some(delay) = delay else {
            return self.inner.find(target, query).await;
        };

        let now = self.gauge.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.gauge.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(delay).await;
        self.gauge.current.fetch_sub(1, Ordering::SeqCst);
        self.inner.find(target, query).await
    }
    async fn begin(&self) -> StoreResult<Option<Box<dyn StoreTransaction>>> {
        self.inner.begin().await
    }
    async fn create_container(&self, board: &BoardName) -> StoreResult<bool> {
        self.inner.create_container(board).await
    }
    async fn read_container(&self, board: &BoardName) -> StoreResult<Option<ContainerInfo>> {
        self.inner.read_container(board).await
    }
    async fn drop_container(&self, board: &BoardName) -> StoreResult<bool> {
        self.inner.drop_container(board).await
    }
}

#[tokio::test]
async fn general_board_scenario() {
    let svc = services(MemoryStore::shared(), options());

    let thread = svc.threads.create_thread(BOARD, "hello", "p1").await.unwrap();
    assert!(!thread.reported);
    assert!(thread.replies.is_empty());
    assert_eq!(thread.created_on, thread.bumped_on);

    let posted = svc
        .posting
        .post_reply(BOARD, thread.id, "hi there", "p2")
        .await
        .unwrap();

    let listing = svc.threads.list_recent_threads(BOARD, None, None).await.unwrap();
    assert_eq!(listing.len(), 1);
    let entry = &listing[0];
    assert!(entry.thread.bumped_on >= posted.reply.created_on);
    assert!(entry.thread.bumped_on >= thread.created_on);
    assert_eq!(entry.thread.replies, vec![posted.reply.id]);
    assert_eq!(entry.recent_replies.len(), 1);
    assert_eq!(entry.recent_replies[0].text, "hi there");

    svc.threads.report_thread(BOARD, thread.id).await.unwrap();
    let listing = svc.threads.list_recent_threads(BOARD, None, None).await.unwrap();
    assert!(listing[0].thread.reported);
}

#[tokio::test]
async fn listing_returns_the_ten_most_recently_bumped() {
    let svc = services(MemoryStore::shared(), options());
    let mut ids = Vec::new();
    for i in 0..15 {
        ids.push(seed_thread(&svc, BOARD, &format!("thread {i}")).await.id);
    }

    let listing = svc.threads.list_recent_threads(BOARD, Some(10), None).await.unwrap();
    let listed: Vec<Uuid> = listing.iter().map(|entry| entry.thread.id).collect();
    let expected: Vec<Uuid> = ids.iter().rev().take(10).copied().collect();
    assert_eq!(listed, expected);

    // Bumping an old thread moves it to the front.
    svc.threads
        .bump_and_append_text(BOARD, ids[0], Some("bump"), None)
        .await
        .unwrap();
    let listing = svc.threads.list_recent_threads(BOARD, Some(10), None).await.unwrap();
    assert_eq!(listing[0].thread.id, ids[0]);
    assert_eq!(listing[0].thread.text, "thread 0\nbump");
}

#[tokio::test]
async fn replies_per_thread_are_capped_and_newest_first() {
    let svc = services(MemoryStore::shared(), options());
    let thread = seed_thread(&svc, BOARD, "busy").await;
    for i in 0..5 {
        svc.posting
            .post_reply(BOARD, thread.id, &format!("reply {i}"), "")
            .await
            .unwrap();
    }

    let listing = svc.threads.list_recent_threads(BOARD, None, Some(3)).await.unwrap();
    let texts: Vec<&str> = listing[0]
        .recent_replies
        .iter()
        .map(|reply| reply.text.as_str())
        .collect();
    assert_eq!(texts, ["reply 4", "reply 3", "reply 2"]);
    assert_eq!(listing[0].thread.replies.len(), 5);
}

#[tokio::test]
async fn boards_do_not_leak_into_each_other() {
    let svc = services(MemoryStore::shared(), options());
    seed_thread(&svc, BOARD, "here").await;
    seed_thread(&svc, "random", "there").await;

    let listing = svc.threads.list_recent_threads(BOARD, None, None).await.unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].thread.text, "here");
}

#[tokio::test]
async fn reporting_is_idempotent_and_keeps_bumped_after_created() {
    let svc = services(MemoryStore::shared(), options());
    let thread = seed_thread(&svc, BOARD, "hello").await;

    assert_ok!(svc.threads.report_thread(BOARD, thread.id).await);
    assert_ok!(svc.threads.report_thread(BOARD, thread.id).await);

    let listing = svc.threads.list_recent_threads(BOARD, None, None).await.unwrap();
    let stored = &listing[0].thread;
    assert!(stored.reported);
    assert!(stored.bumped_on >= stored.created_on);
}

#[tokio::test]
async fn deleting_a_missing_thread_is_not_found() {
    let svc = services(MemoryStore::shared(), options());
    let err = assert_err!(svc.threads.delete_thread(BOARD, Uuid::now_v7()).await);
    assert!(matches!(err, DomainError::NotFound { resource: "thread", .. }));

    let thread = seed_thread(&svc, BOARD, "doomed").await;
    assert_ok!(svc.threads.delete_thread(BOARD, thread.id).await);
    let err = assert_err!(svc.threads.delete_thread(BOARD, thread.id).await);
    assert!(matches!(err, DomainError::NotFound { .. }));
}

#[tokio::test]
async fn orphan_policy_keeps_replies() {
    let svc = services(MemoryStore::shared(), options());
    let thread = seed_thread(&svc, BOARD, "parent").await;
    svc.posting.post_reply(BOARD, thread.id, "child", "").await.unwrap();

    let deletion = svc.threads.delete_thread(BOARD, thread.id).await.unwrap();
    assert_eq!(deletion.replies_deleted, 0);

    let replies = svc.replies.list_recent_replies(BOARD, thread.id, None).await.unwrap();
    assert_eq!(replies.len(), 1);
}

#[tokio::test]
async fn cascade_policy_removes_replies() {
    for store in [MemoryStore::shared(), MemoryStore::shared().without_transactions()] {
        let svc = services(store, cascading());
        let thread = seed_thread(&svc, BOARD, "parent").await;
        let sibling = seed_thread(&svc, BOARD, "sibling").await;
        svc.posting.post_reply(BOARD, thread.id, "child", "").await.unwrap();
        svc.posting.post_reply(BOARD, thread.id, "child", "").await.unwrap();
        svc.posting.post_reply(BOARD, sibling.id, "other", "").await.unwrap();

        let deletion = svc.threads.delete_thread(BOARD, thread.id).await.unwrap();
        assert_eq!(deletion.replies_deleted, 2);

        let orphans = svc.replies.list_recent_replies(BOARD, thread.id, None).await.unwrap();
        assert!(orphans.is_empty());
        let kept = svc.replies.list_recent_replies(BOARD, sibling.id, None).await.unwrap();
        assert_eq!(kept.len(), 1);
    }
}

#[tokio::test]
async fn container_layout_requires_the_board() {
    let svc = services(MemoryStore::containers(), options());
    assert_err!(svc.boards.get_board(BOARD).await);

    let err = assert_err!(svc.threads.create_thread(BOARD, "hello", "").await);
    assert!(matches!(err, DomainError::NotFound { resource: "board", .. }));

    svc.boards.create_board(BOARD).await.unwrap();
    let thread = svc.threads.create_thread(BOARD, "hello", "").await.unwrap();
    let info = svc.boards.get_board(BOARD).await.unwrap();
    assert_eq!(info.layout, StoreLayout::ContainerPerBoard);
    assert_eq!(info.thread_count, 1);
    assert!(info.created_on.is_some());

    let listing = svc.threads.list_recent_threads(BOARD, None, None).await.unwrap();
    assert_eq!(listing[0].thread.id, thread.id);
}

#[tokio::test]
async fn listing_limits_are_validated() {
    let svc = services(MemoryStore::shared(), options());
    let err = assert_err!(svc.threads.list_recent_threads(BOARD, Some(0), None).await);
    assert!(matches!(err, DomainError::Validation(_)));
    let err = assert_err!(svc.threads.list_recent_threads(BOARD, None, Some(1000)).await);
    assert!(matches!(err, DomainError::Validation(_)));
}

#[tokio::test]
async fn listing_keeps_thread_order_when_lookups_finish_out_of_order() {
    let delays = Arc::new(DashMap::new());
    let gauge = Arc::new(Gauge::default());
    let store = SlowReplies {
        inner: MemoryStore::shared(),
        delays: delays.clone(),
        gauge: gauge.clone(),
    };
    let svc = services(
        store,
        ServiceOptions {
            fan_out_concurrency: 4,
            ..options()
        },
    );

    let mut ids = Vec::new();
    for i in 0..4 {
        let thread = seed_thread(&svc, BOARD, &format!("thread {i}")).await;
        svc.replies
            .create_reply(BOARD, thread.id, &format!("reply {i}"), "")
            .await
            .unwrap();
        ids.push(thread.id);
    }
    // Newest first; the first listed thread gets the slowest lookup.
    ids.reverse();
    for (position, id) in ids.iter().enumerate() {
        let delay = Duration::from_millis(20 * (ids.len() - position) as u64);
        delays.insert(id.to_string(), delay);
    }

    let listing = svc.threads.list_recent_threads(BOARD, None, None).await.unwrap();

    let listed: Vec<Uuid> = listing.iter().map(|entry| entry.thread.id).collect();
    assert_eq!(listed, ids);
    for entry in &listing {
        assert_eq!(entry.recent_replies.len(), 1);
        assert_eq!(entry.recent_replies[0].thread_id, entry.thread.id);
    }
    assert!(gauge.peak.load(Ordering::SeqCst) > 1, "reply lookups never overlapped");
}
