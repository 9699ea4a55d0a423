#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! [`TestApp`] wires the real services and router over a fresh in-memory
//! store, so every test starts from an empty database and tests can run in
//! parallel.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use vetrina_kernel::store::{MemoryPageStore, PageStore};
use vetrina_kernel::{AppState, Config};
use vetrina_test_utils::{TestComponent, save_body, test_actor, test_page};

/// Cron key used by test apps.
pub const CRON_KEY: &str = "test-cron-key";

/// Test application wrapper using the REAL kernel routes and state.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    /// Actor sent in `X-Actor-Id` by the request helpers.
    pub actor: Uuid,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let store: Arc<dyn PageStore> = Arc::new(MemoryPageStore::new());
        Self::with_store(config, store)
    }

    pub fn with_store(config: Config, store: Arc<dyn PageStore>) -> Self {
        let state = AppState::with_store(config, store);
        let router = vetrina_kernel::routes::app(state.clone());
        Self {
            router,
            state,
            actor: test_actor(),
        }
    }

    /// Send a request and return the status and JSON body (`Null` if empty).
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-actor-id", self.actor.to_string());
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&json).unwrap())
            }
            None => Body::empty(),
        };
        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, json)
    }

    /// Send a request without the actor header.
    pub async fn anonymous(&self, method: &str, uri: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request("GET", uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request("POST", uri, Some(body)).await
    }

    pub async fn post_empty(&self, uri: &str) -> (StatusCode, Value) {
        self.request("POST", uri, None).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request("PUT", uri, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request("PATCH", uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.request("DELETE", uri, None).await
    }

    /// Create a draft page through the API and return its JSON.
    pub async fn create_page(&self, slug: &str) -> Value {
        let (status, page) = self
            .post("/api/pages", test_page(&slug.to_uppercase(), slug).to_json())
            .await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {page}");
        page
    }

    /// Save components through the API and return the response JSON.
    pub async fn save_components(
        &self,
        page_id: &str,
        revision: i64,
        components: &[TestComponent],
    ) -> Value {
        let (status, saved) = self
            .put(
                &format!("/api/pages/{page_id}/components"),
                save_body(revision, components),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "save failed: {saved}");
        saved
    }
}

/// Configuration for tests: in-memory store, known cron key.
pub fn test_config() -> Config {
    Config {
        cron_key: CRON_KEY.to_string(),
        ..Config::default()
    }
}

/// Current unix time in seconds.
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// `id` field of a JSON object as a string.
pub fn id_of(value: &Value) -> String {
    value["id"].as_str().expect("id field").to_string()
}
