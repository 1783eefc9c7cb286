//! Integration tests for batch start, status and cancellation.

use axum::http::StatusCode;
use serde_json::json;

use crate::helpers::TestApp;

fn batch_id(body: &serde_json::Value) -> String {
    body["data"]["batchId"]
        .as_str()
        .expect("batchId in response")
        .to_string()
}

#[tokio::test(start_paused = true)]
async fn test_health_lists_workloads() {
    let app = TestApp::new();

    let resp = app.request("GET", "/api/health", None).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["success"], json!(true));
    assert_eq!(resp.body["data"]["status"], json!("ok"));
    assert_eq!(
        resp.body["data"]["workloads"],
        json!(["rank_check", "post_publish"])
    );
}

#[tokio::test(start_paused = true)]
async fn test_start_with_nothing_eligible_is_not_found() {
    let app = TestApp::new();

    let resp = app.request("POST", "/api/batches/rank-check", None).await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.body["error"], json!("NOT_FOUND"));
    assert!(
        resp.body["message"]
            .as_str()
            .unwrap_or_default()
            .contains("nothing to update")
    );
    assert_eq!(app.store.batch_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_start_then_poll_until_completed() {
    let app = TestApp::new();
    let tenant = app.tenant();
    app.keyword(tenant, "roof repair").await;
    app.keyword(tenant, "gutter cleaning").await;

    let started = app
        .request("POST", "/api/batches/rank-check", Some(json!({})))
        .await;
    assert_eq!(started.status, StatusCode::ACCEPTED);
    assert_eq!(started.body["data"]["totalItems"], json!(2));
    assert_eq!(started.body["data"]["status"], json!("running"));
    assert_eq!(started.body["data"]["workload"], json!("rank_check"));
    assert!(started.body["data"]["estimatedDurationMinutes"].as_u64() >= Some(1));

    let id = batch_id(&started.body);
    app.wait("rank_check", &id).await;

    let status = app
        .request("GET", &format!("/api/batches/rank_check/{id}"), None)
        .await;
    assert_eq!(status.status, StatusCode::OK);
    let data = &status.body["data"];
    assert_eq!(data["status"], json!("completed"));
    assert_eq!(data["processedItems"], json!(2));
    assert_eq!(data["failedItems"], json!(0));
    assert_eq!(data["progressPercent"], json!(100.0));
    assert_eq!(data["results"].as_array().map(Vec::len), Some(2));
    assert_eq!(data["results"][0]["value"]["position"], json!(7));
}

#[tokio::test(start_paused = true)]
async fn test_filter_by_tenant() {
    let app = TestApp::new();
    let wanted = app.tenant();
    let other = app.tenant();
    app.keyword(wanted, "a").await;
    app.keyword(other, "b").await;
    app.keyword(other, "c").await;

    let resp = app
        .request(
            "POST",
            "/api/batches/rank_check",
            Some(json!({ "tenantId": wanted.into_uuid() })),
        )
        .await;

    assert_eq!(resp.status, StatusCode::ACCEPTED);
    assert_eq!(resp.body["data"]["totalItems"], json!(1));
    app.wait("rank_check", &batch_id(&resp.body)).await;
}

#[tokio::test(start_paused = true)]
async fn test_invalid_filter_is_rejected() {
    let app = TestApp::new();

    let resp = app
        .request(
            "POST",
            "/api/batches/rank-check",
            Some(json!({ "location": "" })),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.body["error"], json!("VALIDATION_ERROR"));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_workload_is_not_found() {
    let app = TestApp::new();

    let resp = app.request("POST", "/api/batches/reviews", None).await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn test_second_start_conflicts() {
    let app = TestApp::new();
    let tenant = app.tenant();
    for name in ["a", "b", "c"] {
        app.keyword(tenant, name).await;
    }

    let first = app.request("POST", "/api/batches/rank-check", None).await;
    assert_eq!(first.status, StatusCode::ACCEPTED);

    let second = app.request("POST", "/api/batches/rank-check", None).await;
    assert_eq!(second.status, StatusCode::CONFLICT);
    assert_eq!(second.body["error"], json!("CONFLICT"));

    // The other workload is independent.
    app.due_post(tenant, "loc-1").await;
    let posts = app.request("POST", "/api/batches/post-publish", None).await;
    assert_eq!(posts.status, StatusCode::ACCEPTED);

    app.wait("rank_check", &batch_id(&first.body)).await;
    app.wait("post_publish", &batch_id(&posts.body)).await;
}

#[tokio::test(start_paused = true)]
async fn test_cancel_running_batch() {
    let app = TestApp::new();
    let tenant = app.tenant();
    for n in 0..5 {
        app.keyword(tenant, &format!("kw{n}")).await;
    }

    let started = app.request("POST", "/api/batches/rank-check", None).await;
    let id = batch_id(&started.body);

    let cancel = app
        .request("POST", &format!("/api/batches/rank-check/{id}/cancel"), None)
        .await;
    assert_eq!(cancel.status, StatusCode::ACCEPTED);
    assert_eq!(cancel.body["data"]["batchId"], json!(id));

    app.wait("rank_check", &id).await;
    let status = app
        .request("GET", &format!("/api/batches/rank-check/{id}"), None)
        .await;
    assert_eq!(status.body["data"]["status"], json!("cancelled"));
    assert!(status.body["data"]["processedItems"].as_i64() < Some(5));

    let again = app
        .request("POST", &format!("/api/batches/rank-check/{id}/cancel"), None)
        .await;
    assert_eq!(again.status, StatusCode::CONFLICT);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_batch_is_not_found() {
    let app = TestApp::new();
    let id = uuid::Uuid::new_v4();

    let status = app
        .request("GET", &format!("/api/batches/rank-check/{id}"), None)
        .await;
    assert_eq!(status.status, StatusCode::NOT_FOUND);

    let cancel = app
        .request("POST", &format!("/api/batches/rank-check/{id}/cancel"), None)
        .await;
    assert_eq!(cancel.status, StatusCode::NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn test_status_is_scoped_to_workload() {
    let app = TestApp::new();
    let tenant = app.tenant();
    app.due_post(tenant, "loc-9").await;

    let started = app.request("POST", "/api/batches/post-publish", None).await;
    let id = batch_id(&started.body);
    app.wait("post_publish", &id).await;

    let wrong = app
        .request("GET", &format!("/api/batches/rank-check/{id}"), None)
        .await;
    assert_eq!(wrong.status, StatusCode::NOT_FOUND);

    let right = app
        .request("GET", &format!("/api/batches/post-publish/{id}"), None)
        .await;
    assert_eq!(right.status, StatusCode::OK);
    assert_eq!(right.body["data"]["status"], json!("completed"));
}
