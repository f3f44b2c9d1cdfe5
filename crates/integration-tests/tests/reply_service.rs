use domains::{DomainError, TOMBSTONE};
use integration_tests::{options, seed_thread, services, BOARD};
use storage_adapters::MemoryStore;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

#[tokio::test]
async fn creating_a_reply_leaves_the_thread_alone() {
    let svc = services(MemoryStore::shared(), options());
    let thread = seed_thread(&svc, BOARD, "hello").await;

    let reply = svc
        .replies
        .create_reply(BOARD, thread.id, "quiet", "pw")
        .await
        .unwrap();
    assert_eq!(reply.thread_id, thread.id);
    assert_eq!(reply.created_on, reply.bumped_on);
    assert!(!reply.reported);

    let listing = svc.threads.list_recent_threads(BOARD, None, None).await.unwrap();
    assert_eq!(listing[0].thread.bumped_on, thread.bumped_on);
    assert!(listing[0].thread.replies.is_empty());
    // The reply is still found by thread id.
    assert_eq!(listing[0].recent_replies.len(), 1);
}

#[tokio::test]
async fn reply_reports_are_idempotent_and_scoped_to_the_thread() {
    let svc = services(MemoryStore::shared(), options());
    let thread = seed_thread(&svc, BOARD, "hello").await;
    let other = seed_thread(&svc, BOARD, "other").await;
    let reply = svc.posting.post_reply(BOARD, thread.id, "hi", "").await.unwrap().reply;

    assert_ok!(svc.replies.report_reply(BOARD, thread.id, reply.id).await);
    assert_ok!(svc.replies.report_reply(BOARD, thread.id, reply.id).await);

    let err = assert_err!(svc.replies.report_reply(BOARD, other.id, reply.id).await);
    assert!(matches!(err, DomainError::NotFound { resource: "reply", .. }));

    let replies = svc.replies.list_recent_replies(BOARD, thread.id, None).await.unwrap();
    assert!(replies[0].reported);
    assert!(replies[0].bumped_on >= replies[0].created_on);
}

#[tokio::test]
async fn soft_delete_keeps_identity_and_timestamps() {
    let svc = services(MemoryStore::shared(), options());
    let thread = seed_thread(&svc, BOARD, "hello").await;
    let reply = svc.posting.post_reply(BOARD, thread.id, "oops", "").await.unwrap().reply;

    assert_ok!(svc.replies.soft_delete_reply(BOARD, thread.id, reply.id).await);

    let replies = svc.replies.list_recent_replies(BOARD, thread.id, None).await.unwrap();
    assert_eq!(replies.len(), 1);
    let stored = &replies[0];
    assert_eq!(stored.id, reply.id);
    assert_eq!(stored.text, TOMBSTONE);
    assert!(stored.is_deleted());
    assert_eq!(stored.created_on, reply.created_on);
    assert_eq!(stored.bumped_on, reply.bumped_on);

    let err = assert_err!(svc.replies.soft_delete_reply(BOARD, thread.id, Uuid::now_v7()).await);
    assert!(matches!(err, DomainError::NotFound { .. }));
}

#[tokio::test]
async fn reply_listing_is_newest_first_and_limited() {
    let svc = services(MemoryStore::shared(), options());
    let thread = seed_thread(&svc, BOARD, "hello").await;
    for i in 0..12 {
        svc.replies
            .create_reply(BOARD, thread.id, &format!("r{i}"), "")
            .await
            .unwrap();
    }

    let replies = svc.replies.list_recent_replies(BOARD, thread.id, None).await.unwrap();
    assert_eq!(replies.len(), 10);
    assert_eq!(replies[0].text, "r11");
    assert!(replies.windows(2).all(|pair| pair[0].bumped_on >= pair[1].bumped_on));

    let replies = svc
        .replies
        .list_recent_replies(BOARD, thread.id, Some(2))
        .await
        .unwrap();
    assert_eq!(replies.len(), 2);
}

#[tokio::test]
async fn reply_validation() {
    let svc = services(MemoryStore::shared(), options());
    let thread = seed_thread(&svc, BOARD, "hello").await;

    let err = assert_err!(svc.replies.create_reply(BOARD, thread.id, "  ", "").await);
    assert!(matches!(err, DomainError::Validation(_)));
    let err = assert_err!(svc.replies.create_reply("", thread.id, "hi", "").await);
    assert!(matches!(err, DomainError::Validation(_)));
    let err = assert_err!(svc.replies.create_reply(BOARD, Uuid::nil(), "hi", "").await);
    assert!(matches!(err, DomainError::Validation(_)));
}
