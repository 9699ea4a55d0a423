//! The same services over PostgreSQL.
//!
//! Skipped unless `DATABASE_URL` points at a scratch database. Tests share
//! the database, so slugs are made unique and assertions stick to the pages
//! each test created.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::{TestApp, id_of, now, test_config};
use serde_json::json;
use uuid::Uuid;
use vetrina_kernel::content::ContentError;
use vetrina_kernel::db;
use vetrina_kernel::models::{CreatePage, PageStatus};
use vetrina_kernel::store::{PageStore, PgPageStore};
use vetrina_test_utils::test_component;

async fn pg_app() -> Option<TestApp> {
    let url = std::env::var("DATABASE_URL").ok().filter(|u| !u.is_empty())?;
    let pool = db::create_pool(&url, 5).await.expect("connect");
    db::run_migrations(&pool).await.expect("migrate");
    assert!(db::check_health(&pool).await);
    let store: Arc<dyn PageStore> = Arc::new(PgPageStore::new(pool));
    Some(TestApp::with_store(test_config(), store))
}

fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::now_v7().simple())
}

#[tokio::test]
async fn pg_save_version_and_restore() {
    let Some(app) = pg_app().await else {
        return;
    };
    let page = app.create_page(&unique("pg-home")).await;
    let id = id_of(&page);

    let saved = app
        .save_components(
            &id,
            1,
            &[
                test_component("hero", json!({"title": "One"})),
                test_component("text", json!({"body": "Two"})),
            ],
        )
        .await;
    assert_eq!(saved["version"]["version_number"], 2);
    assert_eq!(saved["components"].as_array().unwrap().len(), 2);

    let v2 = saved["version"]["id"].as_str().unwrap().to_string();
    app.save_components(&id, 2, &[test_component("hero", json!({"title": "Only"}))])
        .await;

    let (status, restored) = app
        .post(
            &format!("/api/pages/{id}/versions/{v2}/restore"),
            json!({"revision": 3}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{restored}");
    assert_eq!(restored["version"]["version_number"], 4);
    assert_eq!(restored["components"].as_array().unwrap().len(), 2);

    let (_, diff) = app
        .get(&format!("/api/pages/{id}/versions/compare?from=2&to=4"))
        .await;
    assert_eq!(diff["summary"]["added"], 0);
    assert_eq!(diff["summary"]["removed"], 0);
    assert_eq!(diff["summary"]["modified"], 0);
}

#[tokio::test]
async fn pg_published_slug_is_unique() {
    let Some(app) = pg_app().await else {
        return;
    };
    let slug = unique("pg-shared");
    let publishing = app.state.publishing();

    let mut ids = Vec::new();
    for _ in 0..2 {
        let page = app
            .state
            .pages()
            .create(
                CreatePage {
                    title: "Shared".to_string(),
                    slug: slug.clone(),
                    ..CreatePage::default()
                },
                app.actor,
            )
            .await
            .unwrap();
        ids.push(page.id);
    }

    publishing.publish(ids[0], app.actor).await.unwrap();
    let err = publishing.publish(ids[1], app.actor).await.unwrap_err();
    assert!(matches!(err, ContentError::Conflict(_)), "{err:?}");
    assert_eq!(
        app.state.pages().get(ids[1]).await.unwrap().status,
        PageStatus::Draft
    );
}

#[tokio::test]
async fn pg_concurrent_ticks_publish_once() {
    let Some(app) = pg_app().await else {
        return;
    };
    let at = now() + 5;
    let page = app
        .state
        .pages()
        .create(
            CreatePage {
                title: "Launch".to_string(),
                slug: unique("pg-launch"),
                ..CreatePage::default()
            },
            app.actor,
        )
        .await
        .unwrap();
    app.state
        .publishing()
        .schedule(page.id, at, None, app.actor)
        .await
        .unwrap();

    let a = app.state.scheduler().clone();
    let b = app.state.scheduler().clone();
    let (first, second) = tokio::join!(
        tokio::spawn(async move { a.run_at(at + 1).await.unwrap() }),
        tokio::spawn(async move { b.run_at(at + 1).await.unwrap() }),
    );
    let (first, second) = (first.unwrap(), second.unwrap());
    assert!(first.published + second.published >= 1);

    let live = app.state.pages().get(page.id).await.unwrap();
    assert_eq!(live.status, PageStatus::Published);
    assert_eq!(live.published_at, Some(at + 1));

    let versions = app.state.pages().list_versions(page.id, 10, 0).await.unwrap();
    assert_eq!(versions.len(), 1);
}

#[tokio::test]
async fn pg_racing_publishes_of_one_slug_conflict() {
    let Some(app) = pg_app().await else {
        return;
    };
    let slug = unique("pg-race");

    for _ in 0..5 {
        let mut ids = Vec::new();
        for _ in 0..2 {
            let page = app
                .state
                .pages()
                .create(
                    CreatePage {
                        title: "Race".to_string(),
                        slug: slug.clone(),
                        ..CreatePage::default()
                    },
                    app.actor,
                )
                .await
                .unwrap();
            ids.push(page.id);
        }

        let (p1, p2) = (app.state.publishing().clone(), app.state.publishing().clone());
        let (id1, id2, actor) = (ids[0], ids[1], app.actor);
        let (first, second) = tokio::join!(
            tokio::spawn(async move { p1.publish(id1, actor).await }),
            tokio::spawn(async move { p2.publish(id2, actor).await }),
        );
        let results = [first.unwrap(), second.unwrap()];

        let published: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(published.len(), 1);
        for result in &results {
            if let Err(err) = result {
                assert!(matches!(err, ContentError::Conflict(_)), "{err:?}");
            }
        }

        // Free the slug for the next round.
        app.state
            .publishing()
            .unpublish(published[0].id, app.actor)
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn pg_negative_offset_is_clamped() {
    let Some(app) = pg_app().await else {
        return;
    };
    app.create_page(&unique("pg-list")).await;
    let (status, pages) = app.get("/api/pages?offset=-1&limit=1").await;
    assert_eq!(status, StatusCode::OK, "{pages}");
    assert_eq!(pages.as_array().unwrap().len(), 1);
}
