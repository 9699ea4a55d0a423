//! In-memory page store.
//!
//! A transaction holds the store-wide lock for its whole lifetime and works
//! on a private copy of the data, which replaces the shared state on commit.
//! Transactions are therefore serializable, and an uncommitted transaction
//! leaves no trace. Intended for tests and single-process development; data
//! is lost on restart.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{DEFAULT_LIST_LIMIT, PageStore, PageTx, SlugTaken};
use crate::models::{
    ApprovalStatus, Page, PageComponent, PageFilter, PageStatus, PageVersion, PendingApproval,
    PublishingWorkflow,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    pages: HashMap<Uuid, Page>,
    /// Keyed by page id, kept sorted by position.
    components: HashMap<Uuid, Vec<PageComponent>>,
    /// Keyed by page id, kept sorted by version number ascending.
    versions: HashMap<Uuid, Vec<PageVersion>>,
    workflows: HashMap<Uuid, PublishingWorkflow>,
}

/// In-memory [`PageStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryPageStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryPageStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PageStore for MemoryPageStore {
    async fn begin(&self) -> Result<Box<dyn PageTx>> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryTx { guard, work }))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn healthy(&self) -> bool {
        true
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

impl MemoryTx {
    /// Mirror of the `page_published_slug` partial unique index.
    fn check_published_slug(&self, page: &Page) -> Result<()> {
        if page.status != PageStatus::Published {
            return Ok(());
        }
        let taken = self
            .work
            .pages
            .values()
            .any(|p| p.id != page.id && p.status == PageStatus::Published && p.slug == page.slug);
        if taken {
            return Err(SlugTaken {
                slug: page.slug.clone(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl PageTx for MemoryTx {
    async fn page(&mut self, id: Uuid) -> Result<Option<Page>> {
        Ok(self.work.pages.get(&id).cloned())
    }

    async fn lock_page(&mut self, id: Uuid) -> Result<Option<Page>> {
        // The transaction already holds the store-wide lock.
        self.page(id).await
    }

    async fn insert_page(&mut self, page: &Page) -> Result<()> {
        if self.work.pages.contains_key(&page.id) {
            bail!("page {} already exists", page.id);
        }
        if let Some(parent) = page.parent_id {
            if !self.work.pages.contains_key(&parent) {
                bail!("parent page {parent} does not exist");
            }
        }
        self.check_published_slug(page)?;
        self.work.pages.insert(page.id, page.clone());
        Ok(())
    }

    async fn update_page(&mut self, page: &Page) -> Result<()> {
        if !self.work.pages.contains_key(&page.id) {
            bail!("page {} does not exist", page.id);
        }
        self.check_published_slug(page)?;
        self.work.pages.insert(page.id, page.clone());
        Ok(())
    }

    async fn delete_page(&mut self, id: Uuid) -> Result<bool> {
        if self.work.pages.values().any(|p| p.parent_id == Some(id)) {
            bail!("page {id} still has child pages");
        }
        let existed = self.work.pages.remove(&id).is_some();
        self.work.components.remove(&id);
        self.work.versions.remove(&id);
        self.work.workflows.remove(&id);
        Ok(existed)
    }

    async fn list_pages(&mut self, filter: &PageFilter) -> Result<Vec<Page>> {
        let mut pages: Vec<Page> = self
            .work
            .pages
            .values()
            .filter(|p| filter.status.is_none_or(|s| p.status == s))
            .filter(|p| filter.parent_id.is_none_or(|parent| p.parent_id == Some(parent)))
            .cloned()
            .collect();
        pages.sort_by(|a, b| b.changed.cmp(&a.changed).then(b.id.cmp(&a.id)));

        let offset = filter.offset.unwrap_or(0).max(0) as usize;
        let limit = filter.limit.unwrap_or(DEFAULT_LIST_LIMIT).max(0) as usize;
        Ok(pages.into_iter().skip(offset).take(limit).collect())
    }

    async fn count_children(&mut self, id: Uuid) -> Result<i64> {
        let count = self
            .work
            .pages
            .values()
            .filter(|p| p.parent_id == Some(id))
            .count();
        Ok(count as i64)
    }

    async fn published_slug_owner(&mut self, slug: &str, except: Uuid) -> Result<Option<Uuid>> {
        Ok(self
            .work
            .pages
            .values()
            .find(|p| p.id != except && p.status == PageStatus::Published && p.slug == slug)
            .map(|p| p.id))
    }

    async fn due_scheduled(&mut self, now: i64) -> Result<Vec<Uuid>> {
        let mut due: Vec<(i64, Uuid)> = self
            .work
            .pages
            .values()
            .filter(|p| p.is_due(now))
            .filter_map(|p| p.scheduled_for.map(|at| (at, p.id)))
            .collect();
        due.sort();
        Ok(due.into_iter().map(|(_, id)| id).collect())
    }

    async fn due_expired(&mut self, now: i64) -> Result<Vec<Uuid>> {
        let mut due: Vec<(i64, Uuid)> = self
            .work
            .pages
            .values()
            .filter(|p| p.is_expired(now))
            .filter_map(|p| p.expires_at.map(|at| (at, p.id)))
            .collect();
        due.sort();
        Ok(due.into_iter().map(|(_, id)| id).collect())
    }

    async fn components(&mut self, page_id: Uuid) -> Result<Vec<PageComponent>> {
        Ok(self
            .work
            .components
            .get(&page_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn replace_components(
        &mut self,
        page_id: Uuid,
        components: &[PageComponent],
    ) -> Result<()> {
        if !self.work.pages.contains_key(&page_id) {
            bail!("page {page_id} does not exist");
        }
        let mut sorted = components.to_vec();
        sorted.sort_by_key(|c| c.position);
        for pair in sorted.windows(2) {
            if pair[0].position == pair[1].position {
                bail!("duplicate component position {} on page {page_id}", pair[0].position);
            }
        }
        // Mirror of the `page_component` primary key across pages.
        let foreign = self
            .work
            .components
            .iter()
            .filter(|(owner, _)| **owner != page_id)
            .flat_map(|(_, set)| set.iter())
            .find(|existing| sorted.iter().any(|c| c.id == existing.id));
        if let Some(existing) = foreign {
            bail!(
                "duplicate key value violates unique constraint \"page_component_pkey\" (id {})",
                existing.id
            );
        }
        self.work.components.insert(page_id, sorted);
        Ok(())
    }

    async fn max_version_number(&mut self, page_id: Uuid) -> Result<Option<i32>> {
        Ok(self
            .work
            .versions
            .get(&page_id)
            .and_then(|versions| versions.iter().map(|v| v.version_number).max()))
    }

    async fn insert_version(&mut self, version: &PageVersion) -> Result<()> {
        if !self.work.pages.contains_key(&version.page_id) {
            bail!("page {} does not exist", version.page_id);
        }
        let versions = self.work.versions.entry(version.page_id).or_default();
        if versions
            .iter()
            .any(|v| v.version_number == version.version_number)
        {
            bail!(
                "version {} already exists for page {}",
                version.version_number,
                version.page_id
            );
        }
        versions.push(version.clone());
        versions.sort_by_key(|v| v.version_number);
        Ok(())
    }

    async fn version(&mut self, version_id: Uuid) -> Result<Option<PageVersion>> {
        Ok(self
            .work
            .versions
            .values()
            .flatten()
            .find(|v| v.id == version_id)
            .cloned())
    }

    async fn version_by_number(
        &mut self,
        page_id: Uuid,
        version_number: i32,
    ) -> Result<Option<PageVersion>> {
        Ok(self.work.versions.get(&page_id).and_then(|versions| {
            versions
                .iter()
                .find(|v| v.version_number == version_number)
                .cloned()
        }))
    }

    async fn list_versions(
        &mut self,
        page_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PageVersion>> {
        let Some(versions) = self.work.versions.get(&page_id) else {
            return Ok(Vec::new());
        };
        Ok(versions
            .iter()
            .rev()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn delete_version(&mut self, version_id: Uuid) -> Result<bool> {
        for versions in self.work.versions.values_mut() {
            if let Some(idx) = versions.iter().position(|v| v.id == version_id) {
                versions.remove(idx);
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn workflow(&mut self, page_id: Uuid) -> Result<Option<PublishingWorkflow>> {
        Ok(self.work.workflows.get(&page_id).cloned())
    }

    async fn save_workflow(&mut self, workflow: &PublishingWorkflow) -> Result<()> {
        if !self.work.pages.contains_key(&workflow.page_id) {
            bail!("page {} does not exist", workflow.page_id);
        }
        self.work
            .workflows
            .insert(workflow.page_id, workflow.clone());
        Ok(())
    }

    async fn pending_approvals(&mut self) -> Result<Vec<PendingApproval>> {
        let mut pending: Vec<PendingApproval> = self
            .work
            .workflows
            .values()
            .filter(|wf| wf.requires_approval && wf.approval_status == ApprovalStatus::Pending)
            .filter_map(|wf| {
                self.work.pages.get(&wf.page_id).map(|page| PendingApproval {
                    page_id: page.id,
                    title: page.title.clone(),
                    slug: page.slug.clone(),
                    page_status: page.status,
                    scheduled_for: page.scheduled_for,
                    requested_by: wf.requested_by,
                    requested_at: wf.requested_at,
                })
            })
            .collect();
        pending.sort_by_key(|p| (p.requested_at.unwrap_or(i64::MAX), p.page_id));
        Ok(pending)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTx { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }
}
