mod common;

use axum::http::StatusCode;
use common::*;
use skillsite_edge::http::build_router;
use skillsite_edge::invalidation::TargetKind;
use std::sync::Arc;
use tower::ServiceExt;

fn bearer() -> String {
    format!("Bearer {SECRET}")
}

fn app(recorder: &RecordingRevalidator) -> axum::Router {
    build_router(state_with(&test_config(Some(SECRET)), Arc::new(recorder.clone())))
}

#[tokio::test]
async fn content_publish_revalidates_article_and_listings() {
    let recorder = RecordingRevalidator::default();
    let body = entry(Some("content"), Some("logical-thinking")).to_string();
    let response = app(&recorder)
        .oneshot(webhook_request(Some(bearer().as_str()), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = read_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(
        json["revalidated"]["paths"],
        serde_json::json!(["/articles", "/", "/categories", "/search", "/articles/logical-thinking"])
    );
    assert_eq!(
        json["revalidated"]["tags"],
        serde_json::json!(["articles", "content", "contentful"])
    );
    assert_eq!(json["contentType"], "content");
    assert_eq!(json["entryId"], "entry-1");
    assert_eq!(json["spaceId"], "space-1");
    assert_eq!(json["eventType"], "ContentManagement.Entry.publish");
    assert_eq!(json["environment"], "test");
    assert!(json["timestamp"].as_str().unwrap().ends_with('Z'));

    assert_eq!(
        recorder.values(TargetKind::Path).await,
        vec!["/articles", "/", "/categories", "/search", "/articles/logical-thinking"]
    );
    assert_eq!(
        recorder.values(TargetKind::Tag).await,
        vec!["articles", "content", "contentful"]
    );
}

#[tokio::test]
async fn content_without_slug_skips_article_path() {
    let recorder = RecordingRevalidator::default();
    let body = entry(Some("content"), None).to_string();
    let response = app(&recorder)
        .oneshot(webhook_request(Some(bearer().as_str()), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = read_json(response).await;
    assert_eq!(
        json["revalidated"]["paths"],
        serde_json::json!(["/articles", "/", "/categories", "/search"])
    );
}

#[tokio::test]
async fn unknown_content_type_uses_fallback_targets() {
    let recorder = RecordingRevalidator::default();
    let body = entry(Some("author"), Some("ignored")).to_string();
    let response = app(&recorder)
        .oneshot(webhook_request(Some(bearer().as_str()), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = read_json(response).await;
    assert_eq!(json["revalidated"]["paths"], serde_json::json!(["/", "/articles"]));
    assert_eq!(
        json["revalidated"]["tags"],
        serde_json::json!(["contentful-content", "contentful"])
    );
    assert_eq!(json["contentType"], "author");
}

#[tokio::test]
async fn bad_credentials_are_rejected_before_parsing() {
    let wrong = "Bearer wrong".to_string();
    let raw = SECRET.to_string();
    for auth in [None, Some(wrong.as_str()), Some(raw.as_str())] {
        for body in [entry(Some("content"), None).to_string(), "{not json".to_string()] {
            let recorder = RecordingRevalidator::default();
            let response = app(&recorder)
                .oneshot(webhook_request(auth, body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(read_json(response).await, serde_json::json!({ "message": "Unauthorized" }));
            assert!(recorder.calls().await.is_empty());
        }
    }
}

#[tokio::test]
async fn unset_secret_rejects_everything() {
    let recorder = RecordingRevalidator::default();
    let router = build_router(state_with(&test_config(None), Arc::new(recorder.clone())));
    let body = entry(Some("tag"), None).to_string();
    let response = router
        .oneshot(webhook_request(Some("Bearer "), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(recorder.calls().await.is_empty());
}

#[tokio::test]
async fn missing_content_type_is_bad_request() {
    let recorder = RecordingRevalidator::default();
    let body = entry(None, Some("x")).to_string();
    let response = app(&recorder)
        .oneshot(webhook_request(Some(bearer().as_str()), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        read_json(response).await,
        serde_json::json!({ "message": "Content type not found" })
    );
    assert!(recorder.calls().await.is_empty());
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let recorder = RecordingRevalidator::default();
    let response = app(&recorder)
        .oneshot(webhook_request(Some(bearer().as_str()), "{\"sys\":"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        read_json(response).await,
        serde_json::json!({ "message": "Invalid JSON payload" })
    );
}

#[tokio::test]
async fn partial_failure_reports_stale_targets() {
    let recorder = RecordingRevalidator::failing_on(&["/search", "tags"]);
    let body = entry(Some("tag"), None).to_string();
    let response = app(&recorder)
        .oneshot(webhook_request(Some(bearer().as_str()), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    // Every target is still attempted.
    assert_eq!(recorder.calls().await.len(), 5);

    let json = read_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Revalidation failed");
    assert_eq!(json["message"], "2 of 5 revalidation targets failed");
    assert_eq!(json["failed"]["paths"][0]["value"], "/search");
    assert_eq!(json["failed"]["tags"][0]["value"], "tags");
    assert_eq!(json["failed"]["tags"][0]["kind"], "tag");
    assert_eq!(json["environment"], "test");
}

#[tokio::test]
async fn health_check_needs_no_auth() {
    let recorder = RecordingRevalidator::default();
    let response = app(&recorder).oneshot(get("/api/revalidate")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = read_json(response).await;
    assert_eq!(json["status"], "OK");
    assert_eq!(json["secretConfigured"], true);
    assert_eq!(json["environment"], "test");
    assert!(recorder.calls().await.is_empty());

    let router = build_router(state_with(&test_config(None), Arc::new(recorder.clone())));
    let json = read_json(router.oneshot(get("/api/revalidate")).await.unwrap()).await;
    assert_eq!(json["secretConfigured"], false);
}

#[tokio::test]
async fn repeated_notifications_yield_same_targets() {
    let recorder = RecordingRevalidator::default();
    let router = app(&recorder);
    let body = entry(Some("category"), None).to_string();
    let first = read_json(
        router
            .clone()
            .oneshot(webhook_request(Some(bearer().as_str()), body.clone()))
            .await
            .unwrap(),
    )
    .await;
    let second = read_json(
        router
            .oneshot(webhook_request(Some(bearer().as_str()), body))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(first["revalidated"], second["revalidated"]);
    assert_eq!(
        first["revalidated"]["paths"],
        serde_json::json!(["/articles", "/categories", "/"])
    );
}
