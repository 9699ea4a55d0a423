//! Component tree store.
//!
//! Owns the ordered component set of each page. Replacement is always the
//! full set: the old rows are deleted and the normalized input inserted in
//! the caller's transaction, so a failed write leaves the old set intact.

use std::collections::HashSet;

use uuid::Uuid;

use super::error::ContentResult;
use crate::models::{ComponentInput, PageComponent, PageVersion, normalize_components};
use crate::store::PageTx;

/// Replace the page's components with `input`.
///
/// Positions in the input are sort keys; the persisted set is renumbered
/// to `0..n-1`. Supplied ids survive only if they belong to the page's
/// current components. Returns the set as persisted.
pub async fn replace_components(
    tx: &mut dyn PageTx,
    page_id: Uuid,
    input: Vec<ComponentInput>,
) -> ContentResult<Vec<PageComponent>> {
    let owned = current_ids(tx, page_id).await?;
    write(tx, page_id, input, &owned).await
}

/// Replace the page's components with the content of one of its versions.
///
/// Component ids recorded in the version are reused, so identity diffs
/// against the restored version stay empty.
pub async fn restore_components(
    tx: &mut dyn PageTx,
    version: &PageVersion,
) -> ContentResult<Vec<PageComponent>> {
    let mut owned = current_ids(tx, version.page_id).await?;
    owned.extend(version.components.iter().filter_map(|c| c.component_id));

    let input = version
        .components
        .iter()
        .map(|c| ComponentInput {
            id: c.component_id,
            component_type: c.component_type.clone(),
            position: Some(c.position),
            props: Some(c.props.clone()),
            styles: Some(c.styles.clone()),
            responsive_config: Some(c.responsive_config.clone()),
        })
        .collect();
    write(tx, version.page_id, input, &owned).await
}

async fn current_ids(tx: &mut dyn PageTx, page_id: Uuid) -> ContentResult<HashSet<Uuid>> {
    Ok(tx
        .components(page_id)
        .await?
        .into_iter()
        .map(|c| c.id)
        .collect())
}

async fn write(
    tx: &mut dyn PageTx,
    page_id: Uuid,
    input: Vec<ComponentInput>,
    owned: &HashSet<Uuid>,
) -> ContentResult<Vec<PageComponent>> {
    let components = normalize_components(page_id, input, owned);
    tx.replace_components(page_id, &components).await?;
    Ok(components)
}

/// Components of a page ordered by position.
pub async fn get_components(
    tx: &mut dyn PageTx,
    page_id: Uuid,
) -> ContentResult<Vec<PageComponent>> {
    Ok(tx.components(page_id).await?)
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
            title: "Home".to_string(),
            slug: "home".to_string(),
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

    #[tokio::test]
    async fn replace_renumbers_densely() {
        let store = MemoryPageStore::new();
        let page = page();
        let mut tx = store.begin().await.unwrap();
        tx.insert_page(&page).await.unwrap();

        let mut sparse = vec![
            ComponentInput::new("footer", serde_json::json!({})),
            ComponentInput::new("hero", serde_json::json!({})),
        ];
        sparse[0].position = Some(40);
        sparse[1].position = Some(3);
        replace_components(tx.as_mut(), page.id, sparse).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let stored = get_components(tx.as_mut(), page.id).await.unwrap();
        let types: Vec<_> = stored.iter().map(|c| c.component_type.as_str()).collect();
        let positions: Vec<_> = stored.iter().map(|c| c.position).collect();
        assert_eq!(types, ["hero", "footer"]);
        assert_eq!(positions, [0, 1]);
    }

    #[tokio::test]
    async fn uncommitted_replacement_leaves_old_set() {
        let store = MemoryPageStore::new();
        let page = page();
        let mut tx = store.begin().await.unwrap();
        tx.insert_page(&page).await.unwrap();
        replace_components(
            tx.as_mut(),
            page.id,
            vec![ComponentInput::new("text", serde_json::json!({"body": "a"}))],
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        {
            let mut tx = store.begin().await.unwrap();
            replace_components(tx.as_mut(), page.id, Vec::new())
                .await
                .unwrap();
            // dropped without commit
        }

        let mut tx = store.begin().await.unwrap();
        assert_eq!(get_components(tx.as_mut(), page.id).await.unwrap().len(), 1);
    }
}
