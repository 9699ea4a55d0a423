//! Transactional page storage.
//!
//! Every write in the publishing engine runs inside one [`PageTx`]. Services
//! open a transaction, read and lock the rows they need, apply their rules,
//! and commit; dropping a transaction without committing rolls it back.
//!
//! Two backends implement the interface:
//!
//! - [`PgPageStore`]: PostgreSQL via sqlx. Row locks use `SELECT ... FOR UPDATE`.
//! - [`MemoryPageStore`]: in-process store for tests and local development.
//!   Transactions are fully serialized.

mod memory;
mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

pub use memory::MemoryPageStore;
pub use postgres::PgPageStore;

use crate::models::{
    Page, PageComponent, PageFilter, PageVersion, PendingApproval, PublishingWorkflow,
};

/// Default page size for listings when the caller gives none.
pub const DEFAULT_LIST_LIMIT: i64 = 50;

/// A page write collided with another published page's slug.
///
/// Returned (inside `anyhow::Error`) by `insert_page` and `update_page` when
/// the published-slug uniqueness rule rejects the row.
#[derive(Debug, thiserror::Error)]
#[error("slug {slug:?} is already used by another published page")]
pub struct SlugTaken {
    pub slug: String,
}

/// Source of transactions.
#[async_trait]
pub trait PageStore: Send + Sync {
    /// Open a new transaction.
    async fn begin(&self) -> Result<Box<dyn PageTx>>;

    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;

    /// Check whether the backend is reachable.
    async fn healthy(&self) -> bool;
}

/// One unit of work against the page tables.
///
/// The component set, version history and workflow row of a page are only
/// written through this interface.
#[async_trait]
pub trait PageTx: Send {
    // Pages

    /// Read a page without locking it.
    async fn page(&mut self, id: Uuid) -> Result<Option<Page>>;

    /// Read a page and hold a row lock on it until commit/rollback.
    async fn lock_page(&mut self, id: Uuid) -> Result<Option<Page>>;

    async fn insert_page(&mut self, page: &Page) -> Result<()>;

    /// Overwrite every mutable column of an existing page.
    async fn update_page(&mut self, page: &Page) -> Result<()>;

    /// Delete a page; components, versions and workflow cascade.
    async fn delete_page(&mut self, id: Uuid) -> Result<bool>;

    async fn list_pages(&mut self, filter: &PageFilter) -> Result<Vec<Page>>;

    async fn count_children(&mut self, id: Uuid) -> Result<i64>;

    /// Id of a published page other than `except` that uses `slug`.
    async fn published_slug_owner(&mut self, slug: &str, except: Uuid) -> Result<Option<Uuid>>;

    /// Ids of scheduled pages whose `scheduled_for` has elapsed, oldest first.
    async fn due_scheduled(&mut self, now: i64) -> Result<Vec<Uuid>>;

    /// Ids of published pages whose `expires_at` has elapsed, oldest first.
    async fn due_expired(&mut self, now: i64) -> Result<Vec<Uuid>>;

    // Components

    /// Components of a page ordered by position.
    async fn components(&mut self, page_id: Uuid) -> Result<Vec<PageComponent>>;

    /// Delete the page's component set and insert `components` in its place.
    async fn replace_components(
        &mut self,
        page_id: Uuid,
        components: &[PageComponent],
    ) -> Result<()>;

    // Versions

    /// Highest version number recorded for the page.
    async fn max_version_number(&mut self, page_id: Uuid) -> Result<Option<i32>>;

    async fn insert_version(&mut self, version: &PageVersion) -> Result<()>;

    async fn version(&mut self, version_id: Uuid) -> Result<Option<PageVersion>>;

    async fn version_by_number(
        &mut self,
        page_id: Uuid,
        version_number: i32,
    ) -> Result<Option<PageVersion>>;

    /// Versions of a page, newest first.
    async fn list_versions(
        &mut self,
        page_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PageVersion>>;

    async fn delete_version(&mut self, version_id: Uuid) -> Result<bool>;

    // Workflow

    async fn workflow(&mut self, page_id: Uuid) -> Result<Option<PublishingWorkflow>>;

    /// Insert or overwrite the page's workflow row.
    async fn save_workflow(&mut self, workflow: &PublishingWorkflow) -> Result<()>;

    /// Workflows waiting for review, oldest request first.
    async fn pending_approvals(&mut self) -> Result<Vec<PendingApproval>>;

    /// Make the transaction's writes durable.
    async fn commit(self: Box<Self>) -> Result<()>;
}
