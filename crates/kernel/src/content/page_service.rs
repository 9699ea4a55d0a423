//! Page service.
//!
//! Page CRUD, editor saves and version history. Every committing edit of
//! a page's content records a version in the same transaction and bumps
//! the page revision; callers pass the revision they last read and get a
//! conflict when someone else saved in between.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use super::component_tree;
use super::diff::{self, DiffStrategyKind, VersionDiff};
use super::error::{ContentError, ContentResult};
use super::version_store;
use crate::metrics::Metrics;
use crate::models::{
    ComponentInput, CreatePage, Page, PageComponent, PageFilter, PageStatus, PageVersion,
    UpdatePage, VersionMetadata, VersionSummary, is_valid_slug,
};
use crate::store::{PageStore, PageTx};

/// Maximum title length, matching the `page.title` column.
const MAX_TITLE_LENGTH: usize = 255;

/// Current unix time in seconds.
pub(crate) fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Result of a save that replaced the component tree.
#[derive(Debug, Clone, Serialize)]
pub struct SavedPage {
    pub page: Page,
    pub components: Vec<PageComponent>,
    pub version: PageVersion,
}

/// Service for pages, their components and their history.
#[derive(Clone)]
pub struct PageService {
    inner: Arc<PageServiceInner>,
}

struct PageServiceInner {
    store: Arc<dyn PageStore>,
    metrics: Arc<Metrics>,
}

impl PageService {
    pub fn new(store: Arc<dyn PageStore>, metrics: Arc<Metrics>) -> Self {
        Self {
            inner: Arc::new(PageServiceInner { store, metrics }),
        }
    }

    /// Create a draft page and record version 1.
    pub async fn create(&self, input: CreatePage, actor: Uuid) -> ContentResult<Page> {
        let title = validate_title(&input.title)?;
        validate_slug(&input.slug)?;

        let mut tx = self.inner.store.begin().await?;
        if let Some(parent) = input.parent_id {
            require_page(tx.as_mut(), parent).await?;
        }

        let now = now();
        let page = Page {
            id: Uuid::now_v7(),
            title,
            slug: input.slug,
            parent_id: input.parent_id,
            template_id: input.template_id,
            status: PageStatus::Draft,
            metadata: input.metadata.unwrap_or_else(|| serde_json::json!({})),
            seo_config: input.seo_config.unwrap_or_else(|| serde_json::json!({})),
            scheduled_for: None,
            expires_at: None,
            created_by: actor,
            updated_by: actor,
            created: now,
            changed: now,
            published_at: None,
            revision: 1,
        };
        tx.insert_page(&page).await?;
        version_store::snapshot(
            tx.as_mut(),
            page.id,
            &[],
            VersionMetadata::of(&page),
            actor,
            now,
        )
        .await?;
        tx.commit().await?;

        self.inner.metrics.record_snapshot();
        info!(page_id = %page.id, slug = %page.slug, "page created");
        Ok(page)
    }

    pub async fn get(&self, id: Uuid) -> ContentResult<Page> {
        let mut tx = self.inner.store.begin().await?;
        require_page(tx.as_mut(), id).await
    }

    pub async fn list(&self, filter: &PageFilter) -> ContentResult<Vec<Page>> {
        let mut tx = self.inner.store.begin().await?;
        Ok(tx.list_pages(filter).await?)
    }

    /// Direct children of a page.
    pub async fn children(&self, id: Uuid) -> ContentResult<Vec<Page>> {
        let mut tx = self.inner.store.begin().await?;
        require_page(tx.as_mut(), id).await?;
        let filter = PageFilter {
            parent_id: Some(id),
            ..PageFilter::default()
        };
        Ok(tx.list_pages(&filter).await?)
    }

    /// Update core page fields.
    ///
    /// Changes to snapshotted fields (title, slug, template, metadata, SEO)
    /// record a new version.
    pub async fn update(
        &self,
        id: Uuid,
        expected_revision: i64,
        changes: UpdatePage,
        actor: Uuid,
    ) -> ContentResult<Page> {
        let mut tx = self.inner.store.begin().await?;
        let mut page = self.lock_at_revision(tx.as_mut(), id, expected_revision).await?;
        let snapshot = changes.touches_content();

        if let Some(title) = changes.title {
            page.title = validate_title(&title)?;
        }
        if let Some(slug) = changes.slug {
            validate_slug(&slug)?;
            if page.is_published() && slug != page.slug {
                if let Some(owner) = tx.published_slug_owner(&slug, id).await? {
                    return Err(ContentError::conflict(format!(
                        "slug {slug:?} is already used by published page {owner}"
                    )));
                }
            }
            page.slug = slug;
        }
        if let Some(parent_id) = changes.parent_id {
            if let Some(parent) = parent_id {
                check_parent(tx.as_mut(), id, parent).await?;
            }
            page.parent_id = parent_id;
        }
        if let Some(template_id) = changes.template_id {
            page.template_id = template_id;
        }
        if let Some(metadata) = changes.metadata {
            page.metadata = metadata;
        }
        if let Some(seo_config) = changes.seo_config {
            page.seo_config = seo_config;
        }
        if let Some(expires_at) = changes.expires_at {
            if let (Some(exp), Some(at)) = (expires_at, page.scheduled_for) {
                if exp <= at {
                    return Err(ContentError::invalid(format!(
                        "expires_at must be after scheduled_for {at}"
                    )));
                }
            }
            page.expires_at = expires_at;
        }

        let now = now();
        page.revision += 1;
        page.updated_by = actor;
        page.changed = now;
        tx.update_page(&page).await?;

        if snapshot {
            let components = tx.components(id).await?;
            version_store::snapshot(
                tx.as_mut(),
                id,
                &components,
                VersionMetadata::of(&page),
                actor,
                now,
            )
            .await?;
        }
        tx.commit().await?;

        if snapshot {
            self.inner.metrics.record_snapshot();
        }
        info!(page_id = %id, revision = page.revision, "page updated");
        Ok(page)
    }

    /// Delete a page that has no children.
    pub async fn delete(&self, id: Uuid) -> ContentResult<()> {
        let mut tx = self.inner.store.begin().await?;
        require_locked(tx.as_mut(), id).await?;
        let children = tx.count_children(id).await?;
        if children > 0 {
            return Err(ContentError::invalid(format!(
                "page {id} still has {children} child page(s)"
            )));
        }
        tx.delete_page(id).await?;
        tx.commit().await?;

        info!(page_id = %id, "page deleted");
        Ok(())
    }

    pub async fn components(&self, id: Uuid) -> ContentResult<Vec<PageComponent>> {
        let mut tx = self.inner.store.begin().await?;
        require_page(tx.as_mut(), id).await?;
        component_tree::get_components(tx.as_mut(), id).await
    }

    /// Editor save: replace the component tree and record a version.
    pub async fn save_components(
        &self,
        id: Uuid,
        expected_revision: i64,
        input: Vec<ComponentInput>,
        actor: Uuid,
        note: Option<String>,
    ) -> ContentResult<SavedPage> {
        let mut tx = self.inner.store.begin().await?;
        let mut page = self.lock_at_revision(tx.as_mut(), id, expected_revision).await?;

        let now = now();
        let components = component_tree::replace_components(tx.as_mut(), id, input).await?;
        page.revision += 1;
        page.updated_by = actor;
        page.changed = now;
        tx.update_page(&page).await?;

        let version = version_store::snapshot(
            tx.as_mut(),
            id,
            &components,
            VersionMetadata::of(&page).with_note(note),
            actor,
            now,
        )
        .await?;
        tx.commit().await?;

        self.inner.metrics.record_snapshot();
        info!(
            page_id = %id,
            components = components.len(),
            version = version.version_number,
            "components saved"
        );
        Ok(SavedPage {
            page,
            components,
            version,
        })
    }

    /// Record the page's current state as a new version.
    pub async fn snapshot_page(
        &self,
        id: Uuid,
        actor: Uuid,
        note: Option<String>,
    ) -> ContentResult<PageVersion> {
        let mut tx = self.inner.store.begin().await?;
        let page = require_locked(tx.as_mut(), id).await?;
        let components = tx.components(id).await?;
        let version = version_store::snapshot(
            tx.as_mut(),
            id,
            &components,
            VersionMetadata::of(&page).with_note(note),
            actor,
            now(),
        )
        .await?;
        tx.commit().await?;

        self.inner.metrics.record_snapshot();
        info!(page_id = %id, version = version.version_number, "version saved");
        Ok(version)
    }

    /// Version summaries, newest first.
    pub async fn list_versions(
        &self,
        id: Uuid,
        limit: i64,
        offset: i64,
    ) -> ContentResult<Vec<VersionSummary>> {
        let mut tx = self.inner.store.begin().await?;
        require_page(tx.as_mut(), id).await?;
        let current = tx.max_version_number(id).await?.unwrap_or(0);
        let versions = version_store::list_versions(tx.as_mut(), id, limit, offset).await?;
        Ok(versions
            .iter()
            .map(|v| VersionSummary::of(v, current))
            .collect())
    }

    pub async fn get_version(&self, id: Uuid, version_id: Uuid) -> ContentResult<PageVersion> {
        let mut tx = self.inner.store.begin().await?;
        version_store::get_version(tx.as_mut(), id, version_id).await
    }

    /// Delete an older version. The current version can't be deleted.
    pub async fn delete_version(&self, id: Uuid, version_id: Uuid) -> ContentResult<()> {
        let mut tx = self.inner.store.begin().await?;
        require_locked(tx.as_mut(), id).await?;
        let version = version_store::delete_version(tx.as_mut(), id, version_id).await?;
        tx.commit().await?;

        info!(page_id = %id, version = version.version_number, "version deleted");
        Ok(())
    }

    /// Roll the page back to an older version.
    ///
    /// The live components, title, metadata and SEO config are replaced by
    /// the version's copy and the result is recorded as a new version
    /// carrying `restored_from`. The slug stays as it is.
    pub async fn restore_version(
        &self,
        id: Uuid,
        version_id: Uuid,
        expected_revision: i64,
        actor: Uuid,
    ) -> ContentResult<SavedPage> {
        let mut tx = self.inner.store.begin().await?;
        let mut page = self.lock_at_revision(tx.as_mut(), id, expected_revision).await?;
        let target = version_store::get_version(tx.as_mut(), id, version_id).await?;

        let components = component_tree::restore_components(tx.as_mut(), &target).await?;

        let now = now();
        page.title = target.metadata.title.clone();
        page.metadata = target.metadata.metadata.clone();
        page.seo_config = target.metadata.seo_config.clone();
        page.revision += 1;
        page.updated_by = actor;
        page.changed = now;
        tx.update_page(&page).await?;

        let mut metadata = VersionMetadata::of(&page);
        metadata.restored_from = Some(target.version_number);
        let version =
            version_store::snapshot(tx.as_mut(), id, &components, metadata, actor, now).await?;
        tx.commit().await?;

        self.inner.metrics.record_snapshot();
        info!(
            page_id = %id,
            restored_from = target.version_number,
            version = version.version_number,
            "version restored"
        );
        Ok(SavedPage {
            page,
            components,
            version,
        })
    }

    /// Diff two versions of a page, addressed by version number.
    pub async fn compare_versions(
        &self,
        id: Uuid,
        from: i32,
        to: i32,
        strategy: DiffStrategyKind,
    ) -> ContentResult<VersionDiff> {
        let mut tx = self.inner.store.begin().await?;
        require_page(tx.as_mut(), id).await?;
        let a = version_store::get_version_by_number(tx.as_mut(), id, from).await?;
        let b = version_store::get_version_by_number(tx.as_mut(), id, to).await?;
        Ok(diff::compare(&a, &b, strategy.strategy()))
    }

    /// Lock the page and check the caller's revision token.
    async fn lock_at_revision(
        &self,
        tx: &mut dyn PageTx,
        id: Uuid,
        expected_revision: i64,
    ) -> ContentResult<Page> {
        let page = require_locked(tx, id).await?;
        if page.revision != expected_revision {
            self.inner.metrics.record_conflict();
            debug!(
                page_id = %id,
                expected = expected_revision,
                actual = page.revision,
                "stale revision"
            );
            return Err(ContentError::conflict(format!(
                "page {id} is at revision {}, not {expected_revision}",
                page.revision
            )));
        }
        Ok(page)
    }
}

impl std::fmt::Debug for PageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageService")
            .field("store", &self.inner.store.backend())
            .finish()
    }
}

pub(crate) async fn require_page(tx: &mut dyn PageTx, id: Uuid) -> ContentResult<Page> {
    tx.page(id)
        .await?
        .ok_or_else(|| ContentError::not_found(format!("page {id}")))
}

pub(crate) async fn require_locked(tx: &mut dyn PageTx, id: Uuid) -> ContentResult<Page> {
    tx.lock_page(id)
        .await?
        .ok_or_else(|| ContentError::not_found(format!("page {id}")))
}

fn validate_title(title: &str) -> ContentResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ContentError::invalid("title must not be empty"));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ContentError::invalid(format!(
            "title must be at most {MAX_TITLE_LENGTH} characters"
        )));
    }
    Ok(title.to_string())
}

fn validate_slug(slug: &str) -> ContentResult<()> {
    if is_valid_slug(slug) {
        Ok(())
    } else {
        Err(ContentError::invalid(format!(
            "invalid slug {slug:?}: use lowercase letters, digits and single hyphens"
        )))
    }
}

/// Reject a parent that is missing or would create a cycle.
async fn check_parent(tx: &mut dyn PageTx, id: Uuid, parent: Uuid) -> ContentResult<()> {
    let mut cursor = Some(parent);
    while let Some(ancestor) = cursor {
        if ancestor == id {
            return Err(ContentError::invalid(format!(
                "page {parent} is a descendant of page {id}"
            )));
        }
        cursor = require_page(tx, ancestor).await?.parent_id;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::store::MemoryPageStore;

    fn service() -> PageService {
        PageService::new(Arc::new(MemoryPageStore::new()), Arc::new(Metrics::new()))
    }

    fn create(slug: &str) -> CreatePage {
        CreatePage {
            title: slug.to_uppercase(),
            slug: slug.to_string(),
            ..CreatePage::default()
        }
    }

    #[tokio::test]
    async fn create_records_first_version() {
        let pages = service();
        let page = pages.create(create("home"), Uuid::nil()).await.unwrap();
        assert_eq!(page.status, PageStatus::Draft);
        assert_eq!(page.revision, 1);

        let versions = pages.list_versions(page.id, 10, 0).await.unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].version_number, 1);
        assert!(versions[0].is_current);
    }

    #[tokio::test]
    async fn create_validates_input() {
        let pages = service();
        let err = pages.create(create("Bad Slug"), Uuid::nil()).await.unwrap_err();
        assert!(matches!(err, ContentError::InvalidOperation(_)));

        let mut blank = create("blank");
        blank.title = "  ".to_string();
        assert!(pages.create(blank, Uuid::nil()).await.is_err());

        let mut orphan = create("orphan");
        orphan.parent_id = Some(Uuid::now_v7());
        let err = pages.create(orphan, Uuid::nil()).await.unwrap_err();
        assert!(matches!(err, ContentError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_rejects_parent_cycles() {
        let pages = service();
        let root = pages.create(create("root"), Uuid::nil()).await.unwrap();
        let mut child_input = create("child");
        child_input.parent_id = Some(root.id);
        let child = pages.create(child_input, Uuid::nil()).await.unwrap();

        let err = pages
            .update(
                root.id,
                root.revision,
                UpdatePage {
                    parent_id: Some(Some(child.id)),
                    ..UpdatePage::default()
                },
                Uuid::nil(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::InvalidOperation(_)));

        let err = pages.delete(root.id).await.unwrap_err();
        assert!(matches!(err, ContentError::InvalidOperation(_)));
        pages.delete(child.id).await.unwrap();
        pages.delete(root.id).await.unwrap();
    }

    #[tokio::test]
    async fn stale_revision_conflicts() {
        let pages = service();
        let page = pages.create(create("home"), Uuid::nil()).await.unwrap();
        let saved = pages
            .save_components(
                page.id,
                page.revision,
                vec![ComponentInput::new("hero", serde_json::json!({}))],
                Uuid::nil(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(saved.page.revision, 2);
        assert_eq!(saved.version.version_number, 2);

        let err = pages
            .save_components(page.id, page.revision, Vec::new(), Uuid::nil(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::Conflict(_)));
        assert_eq!(pages.components(page.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn metadata_only_update_skips_snapshot() {
        let pages = service();
        let page = pages.create(create("home"), Uuid::nil()).await.unwrap();
        let updated = pages
            .update(
                page.id,
                page.revision,
                UpdatePage {
                    expires_at: Some(Some(4_000_000_000)),
                    ..UpdatePage::default()
                },
                Uuid::nil(),
            )
            .await
            .unwrap();
        assert_eq!(updated.expires_at, Some(4_000_000_000));
        assert_eq!(pages.list_versions(page.id, 10, 0).await.unwrap().len(), 1);

        pages
            .update(
                page.id,
                updated.revision,
                UpdatePage {
                    title: Some("Welcome".to_string()),
                    ..UpdatePage::default()
                },
                Uuid::nil(),
            )
            .await
            .unwrap();
        let versions = pages.list_versions(page.id, 10, 0).await.unwrap();
        assert_eq!(versions[0].version_number, 2);
        assert_eq!(versions[0].title, "Welcome");
    }
}
