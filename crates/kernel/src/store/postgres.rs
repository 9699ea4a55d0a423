//! PostgreSQL page store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{DEFAULT_LIST_LIMIT, PageStore, PageTx, SlugTaken};
use crate::models::page::PageRow;
use crate::models::version::PageVersionRow;
use crate::models::workflow::PublishingWorkflowRow;
use crate::models::{
    Page, PageComponent, PageFilter, PageStatus, PageVersion, PendingApproval, PublishingWorkflow,
};

const PAGE_COLUMNS: &str = "id, title, slug, parent_id, template_id, status, metadata, seo_config, \
     scheduled_for, expires_at, created_by, updated_by, created, changed, published_at, revision";

const VERSION_COLUMNS: &str =
    "id, page_id, version_number, components, metadata, created_by, created";

const WORKFLOW_COLUMNS: &str = "page_id, requires_approval, approval_status, requested_by, \
     requested_at, approved_by, approved_at, rejected_by, rejected_at, rejection_reason, changed";

/// Name of the partial unique index on published slugs.
const PUBLISHED_SLUG_INDEX: &str = "page_published_slug";

/// Turn a published-slug unique violation into [`SlugTaken`].
fn page_write_error(err: sqlx::Error, slug: &str, context: &'static str) -> anyhow::Error {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() && db.constraint() == Some(PUBLISHED_SLUG_INDEX) {
            return SlugTaken {
                slug: slug.to_string(),
            }
            .into();
        }
    }
    anyhow::Error::new(err).context(context)
}

/// PostgreSQL-backed [`PageStore`].
#[derive(Clone)]
pub struct PgPageStore {
    pool: PgPool,
}

impl PgPageStore {
    /// Create a store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl std::fmt::Debug for PgPageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgPageStore").finish()
    }
}

#[async_trait]
impl PageStore for PgPageStore {
    async fn begin(&self) -> Result<Box<dyn PageTx>> {
        let tx = self
            .pool
            .begin()
            .await
            .context("failed to start transaction")?;
        Ok(Box::new(PgPageTx { tx }))
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn healthy(&self) -> bool {
        crate::db::check_health(&self.pool).await
    }
}

struct PgPageTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl PageTx for PgPageTx {
    async fn page(&mut self, id: Uuid) -> Result<Option<Page>> {
        let row = sqlx::query_as::<_, PageRow>(&format!(
            "SELECT {PAGE_COLUMNS} FROM page WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .context("failed to fetch page by id")?;

        row.map(Page::try_from).transpose()
    }

    async fn lock_page(&mut self, id: Uuid) -> Result<Option<Page>> {
        // FOR UPDATE holds the row until commit so concurrent transitions
        // re-read the status this transaction wrote.
        let row = sqlx::query_as::<_, PageRow>(&format!(
            "SELECT {PAGE_COLUMNS} FROM page WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .context("failed to lock page")?;

        row.map(Page::try_from).transpose()
    }

    async fn insert_page(&mut self, page: &Page) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO page (id, title, slug, parent_id, template_id, status, metadata, seo_config,
                              scheduled_for, expires_at, created_by, updated_by, created, changed,
                              published_at, revision)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(page.id)
        .bind(&page.title)
        .bind(&page.slug)
        .bind(page.parent_id)
        .bind(page.template_id)
        .bind(page.status.as_str())
        .bind(&page.metadata)
        .bind(&page.seo_config)
        .bind(page.scheduled_for)
        .bind(page.expires_at)
        .bind(page.created_by)
        .bind(page.updated_by)
        .bind(page.created)
        .bind(page.changed)
        .bind(page.published_at)
        .bind(page.revision)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| page_write_error(e, &page.slug, "failed to insert page"))?;

        Ok(())
    }

    async fn update_page(&mut self, page: &Page) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE page SET
                title = $1,
                slug = $2,
                parent_id = $3,
                template_id = $4,
                status = $5,
                metadata = $6,
                seo_config = $7,
                scheduled_for = $8,
                expires_at = $9,
                updated_by = $10,
                changed = $11,
                published_at = $12,
                revision = $13
            WHERE id = $14
            "#,
        )
        .bind(&page.title)
        .bind(&page.slug)
        .bind(page.parent_id)
        .bind(page.template_id)
        .bind(page.status.as_str())
        .bind(&page.metadata)
        .bind(&page.seo_config)
        .bind(page.scheduled_for)
        .bind(page.expires_at)
        .bind(page.updated_by)
        .bind(page.changed)
        .bind(page.published_at)
        .bind(page.revision)
        .bind(page.id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| page_write_error(e, &page.slug, "failed to update page"))?;

        Ok(())
    }

    async fn delete_page(&mut self, id: Uuid) -> Result<bool> {
        // Components, versions and workflow are deleted via CASCADE
        let result = sqlx::query("DELETE FROM page WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .context("failed to delete page")?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_pages(&mut self, filter: &PageFilter) -> Result<Vec<Page>> {
        let mut query = format!("SELECT {PAGE_COLUMNS} FROM page WHERE 1=1");
        let mut param_idx = 1;

        if filter.status.is_some() {
            query.push_str(&format!(" AND status = ${param_idx}"));
            param_idx += 1;
        }
        if filter.parent_id.is_some() {
            query.push_str(&format!(" AND parent_id = ${param_idx}"));
            param_idx += 1;
        }

        query.push_str(&format!(
            " ORDER BY changed DESC, id DESC LIMIT ${} OFFSET ${}",
            param_idx,
            param_idx + 1
        ));

        let mut query_builder = sqlx::query_as::<_, PageRow>(&query);

        if let Some(status) = filter.status {
            query_builder = query_builder.bind(status.as_str());
        }
        if let Some(parent_id) = filter.parent_id {
            query_builder = query_builder.bind(parent_id);
        }

        let rows = query_builder
            .bind(filter.limit.unwrap_or(DEFAULT_LIST_LIMIT))
            .bind(filter.offset.unwrap_or(0).max(0))
            .fetch_all(&mut *self.tx)
            .await
            .context("failed to list pages")?;

        rows.into_iter().map(Page::try_from).collect()
    }

    async fn count_children(&mut self, id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM page WHERE parent_id = $1")
            .bind(id)
            .fetch_one(&mut *self.tx)
            .await
            .context("failed to count child pages")?;

        Ok(count)
    }

    async fn published_slug_owner(&mut self, slug: &str, except: Uuid) -> Result<Option<Uuid>> {
        let owner: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM page WHERE slug = $1 AND status = $2 AND id != $3 LIMIT 1",
        )
        .bind(slug)
        .bind(PageStatus::Published.as_str())
        .bind(except)
        .fetch_optional(&mut *self.tx)
        .await
        .context("failed to check published slug")?;

        Ok(owner)
    }

    async fn due_scheduled(&mut self, now: i64) -> Result<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM page
            WHERE status = $1
              AND scheduled_for IS NOT NULL
              AND scheduled_for <= $2
            ORDER BY scheduled_for ASC, id ASC
            "#,
        )
        .bind(PageStatus::Scheduled.as_str())
        .bind(now)
        .fetch_all(&mut *self.tx)
        .await
        .context("failed to select due scheduled pages")?;

        Ok(ids)
    }

    async fn due_expired(&mut self, now: i64) -> Result<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM page
            WHERE status = $1
              AND expires_at IS NOT NULL
              AND expires_at <= $2
            ORDER BY expires_at ASC, id ASC
            "#,
        )
        .bind(PageStatus::Published.as_str())
        .bind(now)
        .fetch_all(&mut *self.tx)
        .await
        .context("failed to select expired pages")?;

        Ok(ids)
    }

    async fn components(&mut self, page_id: Uuid) -> Result<Vec<PageComponent>> {
        let components = sqlx::query_as::<_, PageComponent>(
            r#"
            SELECT id, page_id, component_type, position, props, styles, responsive_config
            FROM page_component
            WHERE page_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(page_id)
        .fetch_all(&mut *self.tx)
        .await
        .context("failed to fetch page components")?;

        Ok(components)
    }

    async fn replace_components(
        &mut self,
        page_id: Uuid,
        components: &[PageComponent],
    ) -> Result<()> {
        sqlx::query("DELETE FROM page_component WHERE page_id = $1")
            .bind(page_id)
            .execute(&mut *self.tx)
            .await
            .context("failed to clear page components")?;

        for component in components {
            sqlx::query(
                r#"
                INSERT INTO page_component (id, page_id, component_type, position, props, styles, responsive_config)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(component.id)
            .bind(page_id)
            .bind(&component.component_type)
            .bind(component.position)
            .bind(&component.props)
            .bind(&component.styles)
            .bind(&component.responsive_config)
            .execute(&mut *self.tx)
            .await
            .context("failed to insert page component")?;
        }

        Ok(())
    }

    async fn max_version_number(&mut self, page_id: Uuid) -> Result<Option<i32>> {
        let max: Option<i32> =
            sqlx::query_scalar("SELECT MAX(version_number) FROM page_version WHERE page_id = $1")
                .bind(page_id)
                .fetch_one(&mut *self.tx)
                .await
                .context("failed to read latest version number")?;

        Ok(max)
    }

    async fn insert_version(&mut self, version: &PageVersion) -> Result<()> {
        let components =
            serde_json::to_value(&version.components).context("failed to encode components")?;
        let metadata =
            serde_json::to_value(&version.metadata).context("failed to encode version metadata")?;

        sqlx::query(
            r#"
            INSERT INTO page_version (id, page_id, version_number, components, metadata, created_by, created)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(version.id)
        .bind(version.page_id)
        .bind(version.version_number)
        .bind(components)
        .bind(metadata)
        .bind(version.created_by)
        .bind(version.created)
        .execute(&mut *self.tx)
        .await
        .context("failed to insert page version")?;

        Ok(())
    }

    async fn version(&mut self, version_id: Uuid) -> Result<Option<PageVersion>> {
        let row = sqlx::query_as::<_, PageVersionRow>(&format!(
            "SELECT {VERSION_COLUMNS} FROM page_version WHERE id = $1"
        ))
        .bind(version_id)
        .fetch_optional(&mut *self.tx)
        .await
        .context("failed to fetch page version")?;

        row.map(PageVersion::try_from).transpose()
    }

    async fn version_by_number(
        &mut self,
        page_id: Uuid,
        version_number: i32,
    ) -> Result<Option<PageVersion>> {
        let row = sqlx::query_as::<_, PageVersionRow>(&format!(
            "SELECT {VERSION_COLUMNS} FROM page_version WHERE page_id = $1 AND version_number = $2"
        ))
        .bind(page_id)
        .bind(version_number)
        .fetch_optional(&mut *self.tx)
        .await
        .context("failed to fetch page version by number")?;

        row.map(PageVersion::try_from).transpose()
    }

    async fn list_versions(
        &mut self,
        page_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PageVersion>> {
        let rows = sqlx::query_as::<_, PageVersionRow>(&format!(
            "SELECT {VERSION_COLUMNS} FROM page_version WHERE page_id = $1 \
             ORDER BY version_number DESC LIMIT $2 OFFSET $3"
        ))
        .bind(page_id)
        .bind(limit)
        .bind(offset.max(0))
        .fetch_all(&mut *self.tx)
        .await
        .context("failed to list page versions")?;

        rows.into_iter().map(PageVersion::try_from).collect()
    }

    async fn delete_version(&mut self, version_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM page_version WHERE id = $1")
            .bind(version_id)
            .execute(&mut *self.tx)
            .await
            .context("failed to delete page version")?;

        Ok(result.rows_affected() > 0)
    }

    async fn workflow(&mut self, page_id: Uuid) -> Result<Option<PublishingWorkflow>> {
        let row = sqlx::query_as::<_, PublishingWorkflowRow>(&format!(
            "SELECT {WORKFLOW_COLUMNS} FROM publishing_workflow WHERE page_id = $1"
        ))
        .bind(page_id)
        .fetch_optional(&mut *self.tx)
        .await
        .context("failed to fetch publishing workflow")?;

        row.map(PublishingWorkflow::try_from).transpose()
    }

    async fn save_workflow(&mut self, workflow: &PublishingWorkflow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO publishing_workflow (page_id, requires_approval, approval_status, requested_by,
                                             requested_at, approved_by, approved_at, rejected_by,
                                             rejected_at, rejection_reason, changed)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (page_id) DO UPDATE SET
                requires_approval = EXCLUDED.requires_approval,
                approval_status = EXCLUDED.approval_status,
                requested_by = EXCLUDED.requested_by,
                requested_at = EXCLUDED.requested_at,
                approved_by = EXCLUDED.approved_by,
                approved_at = EXCLUDED.approved_at,
                rejected_by = EXCLUDED.rejected_by,
                rejected_at = EXCLUDED.rejected_at,
                rejection_reason = EXCLUDED.rejection_reason,
                changed = EXCLUDED.changed
            "#,
        )
        .bind(workflow.page_id)
        .bind(workflow.requires_approval)
        .bind(workflow.approval_status.as_str())
        .bind(workflow.requested_by)
        .bind(workflow.requested_at)
        .bind(workflow.approved_by)
        .bind(workflow.approved_at)
        .bind(workflow.rejected_by)
        .bind(workflow.rejected_at)
        .bind(&workflow.rejection_reason)
        .bind(workflow.changed)
        .execute(&mut *self.tx)
        .await
        .context("failed to save publishing workflow")?;

        Ok(())
    }

    async fn pending_approvals(&mut self) -> Result<Vec<PendingApproval>> {
        #[derive(sqlx::FromRow)]
        struct PendingRow {
            page_id: Uuid,
            title: String,
            slug: String,
            status: String,
            scheduled_for: Option<i64>,
            requested_by: Option<Uuid>,
            requested_at: Option<i64>,
        }

        let rows = sqlx::query_as::<_, PendingRow>(
            r#"
            SELECT w.page_id, p.title, p.slug, p.status, p.scheduled_for,
                   w.requested_by, w.requested_at
            FROM publishing_workflow w
            JOIN page p ON p.id = w.page_id
            WHERE w.requires_approval AND w.approval_status = 'pending'
            ORDER BY w.requested_at ASC NULLS LAST, w.page_id ASC
            "#,
        )
        .fetch_all(&mut *self.tx)
        .await
        .context("failed to list pending approvals")?;

        rows.into_iter()
            .map(|row| -> Result<PendingApproval> {
                Ok(PendingApproval {
                    page_id: row.page_id,
                    title: row.title,
                    slug: row.slug,
                    page_status: row.status.parse()?,
                    scheduled_for: row.scheduled_for,
                    requested_by: row.requested_by,
                    requested_at: row.requested_at,
                })
            })
            .collect()
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let PgPageTx { tx } = *self;
        tx.commit().await.context("failed to commit transaction")?;
        Ok(())
    }
}
