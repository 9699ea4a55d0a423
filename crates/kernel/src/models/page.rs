//! Page model.
//!
//! Pages are the content units of an app: a titled, slugged record with a
//! lifecycle status and an ordered tree of components. Timestamps are Unix
//! seconds, matching the rest of the kernel.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum slug length accepted on create/update.
pub const MAX_SLUG_LENGTH: usize = 128;

/// Page lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    /// Editable, not visible to app users.
    Draft,
    /// Waiting for `scheduled_for` to elapse.
    Scheduled,
    /// Live.
    Published,
    /// Retired after publication.
    Archived,
}

impl PageStatus {
    /// Return the string representation stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Scheduled => "scheduled",
            Self::Published => "published",
            Self::Archived => "archived",
        }
    }
}

impl std::str::FromStr for PageStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "draft" => Ok(Self::Draft),
            "scheduled" => Ok(Self::Scheduled),
            "published" => Ok(Self::Published),
            "archived" => Ok(Self::Archived),
            _ => Err(anyhow::anyhow!(
                "invalid page status: {s:?} (expected draft, scheduled, published, or archived)"
            )),
        }
    }
}

impl std::fmt::Display for PageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Page record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    /// Page title.
    pub title: String,

    /// URL segment. Unique among published pages.
    pub slug: String,

    /// Parent page for navigation nesting.
    pub parent_id: Option<Uuid>,

    /// Layout template, if any.
    pub template_id: Option<Uuid>,

    /// Lifecycle status.
    pub status: PageStatus,

    /// Opaque key/value metadata.
    pub metadata: serde_json::Value,

    /// Opaque SEO configuration.
    pub seo_config: serde_json::Value,

    /// When a scheduled page should go live.
    pub scheduled_for: Option<i64>,

    /// When a published page should be archived.
    pub expires_at: Option<i64>,

    /// User who created the page.
    pub created_by: Uuid,

    /// User who last edited the page.
    pub updated_by: Uuid,

    /// Unix timestamp when created.
    pub created: i64,

    /// Unix timestamp when last changed.
    pub changed: i64,

    /// Unix timestamp of the most recent entry into `published`.
    pub published_at: Option<i64>,

    /// Optimistic-concurrency token, bumped on every content edit.
    pub revision: i64,
}

/// Row type for reading Page from the database (status stored as VARCHAR).
#[derive(sqlx::FromRow)]
pub(crate) struct PageRow {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub parent_id: Option<Uuid>,
    pub template_id: Option<Uuid>,
    pub status: String,
    pub metadata: serde_json::Value,
    pub seo_config: serde_json::Value,
    pub scheduled_for: Option<i64>,
    pub expires_at: Option<i64>,
    pub created_by: Uuid,
    pub updated_by: Uuid,
    pub created: i64,
    pub changed: i64,
    pub published_at: Option<i64>,
    pub revision: i64,
}

impl TryFrom<PageRow> for Page {
    type Error = anyhow::Error;

    fn try_from(row: PageRow) -> anyhow::Result<Self> {
        Ok(Self {
            id: row.id,
            title: row.title,
            slug: row.slug,
            parent_id: row.parent_id,
            template_id: row.template_id,
            status: row.status.parse()?,
            metadata: row.metadata,
            seo_config: row.seo_config,
            scheduled_for: row.scheduled_for,
            expires_at: row.expires_at,
            created_by: row.created_by,
            updated_by: row.updated_by,
            created: row.created,
            changed: row.changed,
            published_at: row.published_at,
            revision: row.revision,
        })
    }
}

/// Input for creating a new page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePage {
    pub title: String,
    pub slug: String,
    pub parent_id: Option<Uuid>,
    pub template_id: Option<Uuid>,
    pub metadata: Option<serde_json::Value>,
    pub seo_config: Option<serde_json::Value>,
}

/// Input for updating a page's core fields.
///
/// `None` leaves a field unchanged. Nullable fields use a nested `Option` so
/// callers can clear them (`Some(None)`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePage {
    pub title: Option<String>,
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub parent_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub template_id: Option<Option<Uuid>>,
    pub metadata: Option<serde_json::Value>,
    pub seo_config: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub expires_at: Option<Option<i64>>,
}

impl UpdatePage {
    /// Whether the update touches any field recorded in a version snapshot.
    pub fn touches_content(&self) -> bool {
        self.title.is_some()
            || self.slug.is_some()
            || self.template_id.is_some()
            || self.metadata.is_some()
            || self.seo_config.is_some()
    }
}

/// Distinguish an absent field from an explicit `null`.
fn deserialize_nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Filters for listing pages.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageFilter {
    pub status: Option<PageStatus>,
    pub parent_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Check whether a slug is a valid URL segment.
///
/// Lowercase ASCII letters and digits separated by single hyphens.
pub fn is_valid_slug(slug: &str) -> bool {
    static SLUG_RE: std::sync::LazyLock<Option<regex::Regex>> =
        std::sync::LazyLock::new(|| regex::Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").ok());

    if slug.is_empty() || slug.len() > MAX_SLUG_LENGTH {
        return false;
    }
    SLUG_RE.as_ref().is_some_and(|re| re.is_match(slug))
}

impl Page {
    /// Check if this page is live.
    pub fn is_published(&self) -> bool {
        self.status == PageStatus::Published
    }

    /// Whether a scheduled page is due at `now`.
    pub fn is_due(&self, now: i64) -> bool {
        self.status == PageStatus::Scheduled && self.scheduled_for.is_some_and(|at| at <= now)
    }

    /// Whether a published page has expired at `now`.
    pub fn is_expired(&self, now: i64) -> bool {
        self.status == PageStatus::Published && self.expires_at.is_some_and(|at| at <= now)
    }
}
