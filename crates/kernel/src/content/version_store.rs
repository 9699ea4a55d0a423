//! Version store.
//!
//! Append-only snapshots of a page. A snapshot is always written in the
//! same transaction as the change it records, numbered one past the
//! highest number the page has ever used. Deleted numbers are never reused
//! because the current (highest) version can't be deleted.

use uuid::Uuid;

use super::error::{ContentError, ContentResult};
use crate::models::{PageComponent, PageVersion, VersionComponent, VersionMetadata};
use crate::store::PageTx;

/// Record a new version of `page_id`.
pub async fn snapshot(
    tx: &mut dyn PageTx,
    page_id: Uuid,
    components: &[PageComponent],
    metadata: VersionMetadata,
    actor: Uuid,
    now: i64,
) -> ContentResult<PageVersion> {
    let next = tx.max_version_number(page_id).await?.unwrap_or(0) + 1;
    let version = PageVersion {
        id: Uuid::now_v7(),
        page_id,
        version_number: next,
        components: components.iter().map(VersionComponent::from).collect(),
        metadata,
        created_by: actor,
        created: now,
    };
    tx.insert_version(&version).await?;
    Ok(version)
}

/// Versions of a page, newest first.
pub async fn list_versions(
    tx: &mut dyn PageTx,
    page_id: Uuid,
    limit: i64,
    offset: i64,
) -> ContentResult<Vec<PageVersion>> {
    Ok(tx.list_versions(page_id, limit, offset).await?)
}

/// Load a version, which must belong to `page_id`.
pub async fn get_version(
    tx: &mut dyn PageTx,
    page_id: Uuid,
    version_id: Uuid,
) -> ContentResult<PageVersion> {
    match tx.version(version_id).await? {
        Some(version) if version.page_id == page_id => Ok(version),
        _ => Err(ContentError::not_found(format!("version {version_id}"))),
    }
}

/// Load a version by its per-page number.
pub async fn get_version_by_number(
    tx: &mut dyn PageTx,
    page_id: Uuid,
    version_number: i32,
) -> ContentResult<PageVersion> {
    tx.version_by_number(page_id, version_number)
        .await?
        .ok_or_else(|| ContentError::not_found(format!("version {version_number}")))
}

/// Delete an older version. The current version is kept.
pub async fn delete_version(
    tx: &mut dyn PageTx,
    page_id: Uuid,
    version_id: Uuid,
) -> ContentResult<PageVersion> {
    let version = get_version(tx, page_id, version_id).await?;
    let current = tx.max_version_number(page_id).await?;
    if current == Some(version.version_number) {
        return Err(ContentError::invalid(format!(
            "version {} is the current version and cannot be deleted",
            version.version_number
        )));
    }
    tx.delete_version(version_id).await?;
    Ok(version)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::{Page, PageStatus};
    use crate::store::{MemoryPageStore, PageStore};

    fn page() -> Page {
        Page {
            id: Uuid::now_v7(),
            title: "About".to_string(),
            slug: "about".to_string(),
            parent_id: None,
            template_id: None,
            status: PageStatus::Draft,
            metadata: serde_json::json!({}),
            seo_config: serde_json::json!({}),
            scheduled_for: None,
            expires_at: None,
            created_by: Uuid::nil(),
            updated_by: Uuid::nil(),
            created: 0,
            changed: 0,
            published_at: None,
            revision: 1,
        }
    }

    async fn seeded(versions: usize) -> (MemoryPageStore, Page, Vec<PageVersion>) {
        let store = MemoryPageStore::new();
        let page = page();
        let mut tx = store.begin().await.unwrap();
        tx.insert_page(&page).await.unwrap();
        let mut out = Vec::new();
        for i in 0..versions {
            let v = snapshot(
                tx.as_mut(),
                page.id,
                &[],
                VersionMetadata::of(&page),
                Uuid::nil(),
                i as i64,
            )
            .await
            .unwrap();
            out.push(v);
        }
        tx.commit().await.unwrap();
        (store, page, out)
    }

    #[tokio::test]
    async fn numbers_increase_and_skip_deleted() {
        let (store, page, versions) = seeded(3).await;
        assert_eq!(
            versions.iter().map(|v| v.version_number).collect::<Vec<_>>(),
            [1, 2, 3]
        );

        let mut tx = store.begin().await.unwrap();
        delete_version(tx.as_mut(), page.id, versions[1].id)
            .await
            .unwrap();
        let next = snapshot(
            tx.as_mut(),
            page.id,
            &[],
            VersionMetadata::of(&page),
            Uuid::nil(),
            10,
        )
        .await
        .unwrap();
        assert_eq!(next.version_number, 4);

        let listed = list_versions(tx.as_mut(), page.id, 10, 0).await.unwrap();
        assert_eq!(
            listed.iter().map(|v| v.version_number).collect::<Vec<_>>(),
            [4, 3, 1]
        );
    }

    #[tokio::test]
    async fn current_version_cannot_be_deleted() {
        let (store, page, versions) = seeded(2).await;
        let mut tx = store.begin().await.unwrap();
        let err = delete_version(tx.as_mut(), page.id, versions[1].id)
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::InvalidOperation(_)));
    }

    #[tokio::test]
    async fn version_of_another_page_is_not_found() {
        let (store, _page, versions) = seeded(1).await;
        let mut tx = store.begin().await.unwrap();
        let err = get_version(tx.as_mut(), Uuid::now_v7(), versions[0].id)
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::NotFound(_)));
    }
}
