//! Post-publish batches end to end over an in-memory store.

mod common;

use gbphub_client::RemoteError;
use gbphub_database::store::PostStore;
use gbphub_entity::batch::{BatchFilter, BatchStatus, Workload};
use gbphub_entity::item::FailureClass;
use gbphub_entity::post::PostStatus;
use gbphub_worker::StartOutcome;

use common::{PostHarness, rejected, start_batch};

#[tokio::test(start_paused = true)]
async fn test_publishes_due_posts_and_isolates_rejections() {
    let h = PostHarness::new();
    let tenant = h.tenant();
    let ok = h.due_post(tenant, "loc-ok").await;
    let gone = h.due_post(tenant, "loc-gone").await;
    h.api.script("loc-gone", vec![Err(rejected(404))]);

    let batch_id = start_batch(&h.controller, BatchFilter::default()).await;
    let snapshot = h.controller.wait(batch_id).await.unwrap().unwrap();

    assert_eq!(snapshot.workload, Workload::PostPublish);
    assert_eq!(snapshot.status, BatchStatus::Completed);
    assert_eq!(snapshot.processed_items, 2);
    assert_eq!(snapshot.failed_items, 1);

    let published = h.store.find_post(ok).await.unwrap().unwrap();
    assert_eq!(published.status, PostStatus::Published);
    assert!(published.remote_post_name.is_some());
    assert!(published.published_at.is_some());

    let failed = h.store.find_post(gone).await.unwrap().unwrap();
    assert_eq!(failed.status, PostStatus::Failed);
    assert_eq!(failed.retry_count, 1);
    assert!(failed.last_error.is_some());

    let success = snapshot.results.iter().find(|r| r.success).unwrap();
    let value = success.value.as_ref().unwrap();
    assert_eq!(
        value["post_name"].as_str(),
        published.remote_post_name.as_deref()
    );
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_is_retried_by_next_batch() {
    let h = PostHarness::new();
    let tenant = h.tenant();
    let post = h.due_post(tenant, "loc-busy").await;
    let unavailable = || RemoteError::Status {
        status: 503,
        message: "backend unavailable".to_string(),
    };
    h.api.script(
        "loc-busy",
        vec![Err(unavailable()), Err(unavailable()), Err(unavailable())],
    );

    let first = start_batch(&h.controller, BatchFilter::default()).await;
    let snapshot = h.controller.wait(first).await.unwrap().unwrap();
    assert_eq!(snapshot.status, BatchStatus::Failed);
    assert_eq!(snapshot.results[0].failure, Some(FailureClass::Transient));
    assert!(snapshot.results[0].will_retry);

    let pending = h.store.find_post(post).await.unwrap().unwrap();
    assert_eq!(pending.status, PostStatus::Scheduled);
    assert_eq!(pending.retry_count, 1);

    let second = start_batch(&h.controller, BatchFilter::default()).await;
    let snapshot = h.controller.wait(second).await.unwrap().unwrap();
    assert_eq!(snapshot.status, BatchStatus::Completed);

    let published = h.store.find_post(post).await.unwrap().unwrap();
    assert_eq!(published.status, PostStatus::Published);
    assert_eq!(h.api.calls().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_post_fails_once_retry_cap_is_reached() {
    let h = PostHarness::new();
    let tenant = h.tenant();
    let post = h.due_post(tenant, "loc-down").await;
    let unavailable = || RemoteError::Status {
        status: 503,
        message: "backend unavailable".to_string(),
    };
    h.api
        .script("loc-down", (0..9).map(|_| Err(unavailable())).collect());

    for round in 1..=3 {
        let batch_id = start_batch(&h.controller, BatchFilter::default()).await;
        let snapshot = h.controller.wait(batch_id).await.unwrap().unwrap();
        assert_eq!(snapshot.status, BatchStatus::Failed);
        assert_eq!(snapshot.results[0].attempts, round);
        assert_eq!(snapshot.results[0].will_retry, round < 3);
    }

    let failed = h.store.find_post(post).await.unwrap().unwrap();
    assert_eq!(failed.retry_count, failed.max_retries);
    assert_eq!(failed.status, PostStatus::Failed);

    let outcome = h.controller.start(BatchFilter::default()).await.unwrap();
    assert_eq!(outcome, StartOutcome::NothingToDo);
    assert_eq!(h.api.calls().len(), 9);
}

#[tokio::test(start_paused = true)]
async fn test_published_posts_are_not_picked_up_again() {
    let h = PostHarness::new();
    let tenant = h.tenant();
    h.due_post(tenant, "loc-1").await;

    let batch_id = start_batch(&h.controller, BatchFilter::default()).await;
    h.controller.wait(batch_id).await.unwrap();

    let outcome = h.controller.start(BatchFilter::default()).await.unwrap();
    assert_eq!(outcome, StartOutcome::NothingToDo);
    assert_eq!(h.api.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_expired_credential_rejects_post() {
    let h = PostHarness::new();
    let tenant = h.tenant();
    let post = h.due_post(tenant, "loc-auth").await;
    h.api.script(
        "loc-auth",
        vec![Err(RemoteError::Unauthorized("token expired".to_string()))],
    );

    let batch_id = start_batch(&h.controller, BatchFilter::default()).await;
    let snapshot = h.controller.wait(batch_id).await.unwrap().unwrap();

    assert_eq!(snapshot.results[0].failure, Some(FailureClass::Credential));
    assert_eq!(h.api.calls().len(), 1);
    let failed = h.store.find_post(post).await.unwrap().unwrap();
    assert_eq!(failed.status, PostStatus::Failed);
}
