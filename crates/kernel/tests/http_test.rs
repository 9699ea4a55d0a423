//! HTTP surface: status codes, error bodies, cron and metrics.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use axum::http::StatusCode;
use common::{CRON_KEY, TestApp, id_of, now};
use serde_json::json;
use uuid::Uuid;
use vetrina_test_utils::{assert, test_component, test_page};

#[tokio::test]
async fn health_reports_memory_store() {
    let app = TestApp::new();
    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert::str_eq(&body, "status", "healthy");
    assert::str_eq(&body, "store", "memory");
}

#[tokio::test]
async fn mutations_need_an_actor() {
    let app = TestApp::new();

    let (status, body) = app.anonymous("POST", "/api/pages").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("X-Actor-Id"), "{body}");

    // Reads do not.
    let (status, _) = app.anonymous("GET", "/api/pages").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn create_rejects_bad_slug_and_missing_parent() {
    let app = TestApp::new();

    let (status, body) = app
        .post("/api/pages", test_page("Home", "Not A Slug").to_json())
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert::str_eq(&body, "error", "invalid_operation");

    let orphan = test_page("Child", "child").with_parent(Uuid::now_v7());
    let (status, _) = app.post("/api/pages", orphan.to_json()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn page_crud_and_children() {
    let app = TestApp::new();
    let parent = app.create_page("docs").await;
    let parent_id = id_of(&parent);
    assert::str_eq(&parent, "status", "draft");
    assert::i64_eq(&parent, "revision", 1);

    let child = test_page("Intro", "docs-intro").with_parent(parent_id.parse().unwrap());
    let (status, child) = app.post("/api/pages", child.to_json()).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, children) = app.get(&format!("/api/pages/{parent_id}/children")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(children.as_array().unwrap().len(), 1);

    // A page with children can't be deleted.
    let (status, _) = app.delete(&format!("/api/pages/{parent_id}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.delete(&format!("/api/pages/{}", id_of(&child))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.delete(&format!("/api/pages/{parent_id}")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app.get(&format!("/api/pages/{parent_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert::str_eq(&body, "error", "not_found");
}

#[tokio::test]
async fn page_listing_clamps_paging() {
    let app = TestApp::new();
    app.create_page("home").await;
    app.create_page("about").await;

    let (status, pages) = app.get("/api/pages?offset=-1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pages.as_array().unwrap().len(), 2);

    let (status, pages) = app.get("/api/pages?limit=-5&offset=-3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pages.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn stale_revision_is_a_conflict() {
    let app = TestApp::new();
    let page = app.create_page("home").await;
    let id = id_of(&page);
    let hero = test_component("hero", json!({"title": "Welcome"}));

    let saved = app.save_components(&id, 1, &[hero.clone()]).await;
    assert_eq!(saved["page"]["revision"], 2);
    assert_eq!(saved["version"]["version_number"], 2);

    let (status, body) = app
        .put(
            &format!("/api/pages/{id}/components"),
            vetrina_test_utils::save_body(1, &[hero]),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert::str_eq(&body, "error", "conflict");

    let (status, body) = app
        .patch(&format!("/api/pages/{id}"), json!({"revision": 1, "title": "Old"}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let (status, body) = app
        .patch(&format!("/api/pages/{id}"), json!({"revision": 2, "title": "New"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert::str_eq(&body, "title", "New");
    assert::i64_eq(&body, "revision", 3);

    let (_, metrics) = app.anonymous("GET", "/metrics").await;
    assert!(metrics.contains("page_revision_conflicts_total 2"), "{metrics}");
}

#[tokio::test]
async fn publish_routes() {
    let app = TestApp::new();
    let id = id_of(&app.create_page("home").await);

    let (status, page) = app.post_empty(&format!("/api/pages/{id}/publish")).await;
    assert_eq!(status, StatusCode::OK);
    assert::str_eq(&page, "status", "published");
    assert!(page["published_at"].is_i64());

    // Published to published is not a transition.
    let (status, body) = app.post_empty(&format!("/api/pages/{id}/publish")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert::str_eq(&body, "error", "invalid_transition");

    let (status, page) = app.post_empty(&format!("/api/pages/{id}/archive")).await;
    assert_eq!(status, StatusCode::OK);
    assert::str_eq(&page, "status", "archived");

    let (status, _) = app
        .post_empty(&format!("/api/pages/{}/publish", Uuid::now_v7()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn schedule_routes() {
    let app = TestApp::new();
    let id = id_of(&app.create_page("launch").await);

    let (status, _) = app
        .post(
            &format!("/api/pages/{id}/schedule"),
            json!({"scheduled_for": now() - 60}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let at = now() + 3600;
    let (status, page) = app
        .post(
            &format!("/api/pages/{id}/schedule"),
            json!({"scheduled_for": at, "expires_at": at + 60}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert::str_eq(&page, "status", "scheduled");
    assert::i64_eq(&page, "scheduled_for", at);

    let (status, listed) = app.get("/api/schedule").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (_, overdue) = app.get("/api/schedule/overdue").await;
    assert!(overdue.as_array().unwrap().is_empty());

    let (status, page) = app
        .post_empty(&format!("/api/pages/{id}/cancel-schedule"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert::str_eq(&page, "status", "draft");
    assert!(page["scheduled_for"].is_null());
}

#[tokio::test]
async fn workflow_routes() {
    let app = TestApp::new();
    let id = id_of(&app.create_page("gated").await);

    let (status, wf) = app.get(&format!("/api/pages/{id}/workflow")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(wf["requires_approval"], false);

    let (status, wf) = app
        .put(
            &format!("/api/pages/{id}/workflow"),
            json!({"requires_approval": true}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert::str_eq(&wf, "approval_status", "pending");

    let (status, body) = app.post_empty(&format!("/api/pages/{id}/publish")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert::str_eq(&body, "error", "approval_required");

    let (_, pending) = app.get("/api/workflow/pending").await;
    assert_eq!(pending.as_array().unwrap().len(), 1);
    assert_eq!(pending[0]["slug"], "gated");

    let (status, _) = app
        .post(
            &format!("/api/pages/{id}/workflow/reject"),
            json!({"reason": "  "}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, wf) = app
        .post(
            &format!("/api/pages/{id}/workflow/reject"),
            json!({"reason": "typo in hero"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert::str_eq(&wf, "approval_status", "rejected");
    assert::str_eq(&wf, "rejection_reason", "typo in hero");

    // Only pending workflows can be decided.
    let (status, _) = app
        .post_empty(&format!("/api/pages/{id}/workflow/approve"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.post_empty(&format!("/api/pages/{id}/workflow/request"))
        .await;
    let (status, outcome) = app
        .post_empty(&format!("/api/pages/{id}/workflow/approve"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["published"], true);
    assert_eq!(outcome["page"]["status"], "published");
}

#[tokio::test]
async fn cron_requires_key_and_returns_summary() {
    let app = TestApp::new();

    let (status, body) = app.post_empty("/cron/wrong").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert::str_eq(&body, "error", "forbidden");

    let (status, summary) = app.post_empty(&format!("/cron/{CRON_KEY}")).await;
    assert_eq!(status, StatusCode::OK);
    assert::i64_eq(&summary, "published", 0);
    assert::i64_eq(&summary, "archived", 0);
    assert::has_key(&summary, "duration_ms");
}

#[tokio::test]
async fn metrics_expose_transitions_and_ticks() {
    let app = TestApp::new();
    let id = id_of(&app.create_page("home").await);
    app.post_empty(&format!("/api/pages/{id}/publish")).await;
    app.post_empty(&format!("/cron/{CRON_KEY}")).await;

    let (status, body) = app.anonymous("GET", "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("page_transitions_total{"), "{body}");
    assert!(body.contains("to=\"published\""), "{body}");
    assert!(body.contains("scheduler_ticks_total 1"), "{body}");
    assert!(body.contains("http_requests_total{"), "{body}");
    assert!(body.contains("path=\"/cron/{key}\""), "{body}");
    assert!(!body.contains(CRON_KEY), "cron key leaked into labels");
}
