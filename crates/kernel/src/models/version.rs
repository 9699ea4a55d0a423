//! Page version model.
//!
//! A version is an immutable snapshot of a page's component tree and core
//! fields. Version numbers start at 1 and strictly increase per page; the
//! highest-numbered version is the page's current version.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::component::PageComponent;
use super::page::Page;

/// Frozen copy of one component inside a version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionComponent {
    /// Id of the live component this entry was copied from.
    #[serde(default)]
    pub component_id: Option<Uuid>,
    pub component_type: String,
    pub position: i32,
    pub props: serde_json::Value,
    pub styles: serde_json::Value,
    #[serde(default = "empty_object")]
    pub responsive_config: serde_json::Value,
}

fn empty_object() -> serde_json::Value {
    serde_json::json!({})
}

impl From<&PageComponent> for VersionComponent {
    fn from(c: &PageComponent) -> Self {
        Self {
            component_id: Some(c.id),
            component_type: c.component_type.clone(),
            position: c.position,
            props: c.props.clone(),
            styles: c.styles.clone(),
            responsive_config: c.responsive_config.clone(),
        }
    }
}

/// Core page fields captured alongside the components.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionMetadata {
    pub title: String,
    pub slug: String,
    pub template_id: Option<Uuid>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub seo_config: serde_json::Value,
    /// Set when this version was produced by restoring an older one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restored_from: Option<i32>,
    /// Free-form save note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl VersionMetadata {
    /// Capture the snapshotted fields of a page.
    pub fn of(page: &Page) -> Self {
        Self {
            title: page.title.clone(),
            slug: page.slug.clone(),
            template_id: page.template_id,
            metadata: page.metadata.clone(),
            seo_config: page.seo_config.clone(),
            restored_from: None,
            note: None,
        }
    }

    /// Attach a save note.
    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note.filter(|n| !n.trim().is_empty());
        self
    }
}

/// Immutable page version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageVersion {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    /// Owning page.
    pub page_id: Uuid,

    /// Per-page sequence number, starting at 1.
    pub version_number: i32,

    /// Components at snapshot time, ordered by position.
    pub components: Vec<VersionComponent>,

    /// Page fields at snapshot time.
    pub metadata: VersionMetadata,

    /// User who produced the snapshot.
    pub created_by: Uuid,

    /// Unix timestamp when the snapshot was taken.
    pub created: i64,
}

/// Row type for reading PageVersion from the database (JSONB columns).
#[derive(sqlx::FromRow)]
pub(crate) struct PageVersionRow {
    pub id: Uuid,
    pub page_id: Uuid,
    pub version_number: i32,
    pub components: serde_json::Value,
    pub metadata: serde_json::Value,
    pub created_by: Uuid,
    pub created: i64,
}

impl TryFrom<PageVersionRow> for PageVersion {
    type Error = anyhow::Error;

    fn try_from(row: PageVersionRow) -> anyhow::Result<Self> {
        use anyhow::Context;

        Ok(Self {
            id: row.id,
            page_id: row.page_id,
            version_number: row.version_number,
            components: serde_json::from_value(row.components)
                .context("failed to decode version components")?,
            metadata: serde_json::from_value(row.metadata)
                .context("failed to decode version metadata")?,
            created_by: row.created_by,
            created: row.created,
        })
    }
}

/// Version listing entry without the component payload.
#[derive(Debug, Clone, Serialize)]
pub struct VersionSummary {
    pub id: Uuid,
    pub version_number: i32,
    pub component_count: usize,
    pub title: String,
    pub restored_from: Option<i32>,
    pub note: Option<String>,
    pub created_by: Uuid,
    pub created: i64,
    pub is_current: bool,
}

impl VersionSummary {
    /// Summarize a version; `current` is the page's highest version number.
    pub fn of(version: &PageVersion, current: i32) -> Self {
        Self {
            id: version.id,
            version_number: version.version_number,
            component_count: version.components.len(),
            title: version.metadata.title.clone(),
            restored_from: version.metadata.restored_from,
            note: version.metadata.note.clone(),
            created_by: version.created_by,
            created: version.created,
            is_current: version.version_number == current,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn version_component_copies_live_component() {
        let live = PageComponent {
            id: Uuid::now_v7(),
            page_id: Uuid::now_v7(),
            component_type: "hero".to_string(),
            position: 2,
            props: serde_json::json!({"title": "Hi"}),
            styles: serde_json::json!({"color": "red"}),
            responsive_config: serde_json::json!({}),
        };
        let frozen = VersionComponent::from(&live);
        assert_eq!(frozen.component_id, Some(live.id));
        assert_eq!(frozen.position, 2);
        assert_eq!(frozen.props, live.props);
    }

    #[test]
    fn metadata_omits_empty_annotations() {
        let meta = VersionMetadata {
            title: "Home".to_string(),
            slug: "home".to_string(),
            ..VersionMetadata::default()
        }
        .with_note(Some("   ".to_string()));
        let json = serde_json::to_value(&meta).unwrap();
        assert!(json.get("restored_from").is_none());
        assert!(json.get("note").is_none());
    }

    #[test]
    fn legacy_component_entries_decode() {
        let entry: VersionComponent = serde_json::from_value(serde_json::json!({
            "component_type": "text",
            "position": 0,
            "props": {},
            "styles": {}
        }))
        .unwrap();
        assert_eq!(entry.component_id, None);
        assert_eq!(entry.responsive_config, serde_json::json!({}));
    }
}
