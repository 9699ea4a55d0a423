//! Version diff engine.
//!
//! Compares the component lists of two versions. How components of the two
//! sides are paired is a [`DiffStrategy`]; everything else (field-level
//! comparison, metadata changes, the summary) is shared.
//!
//! The default [`PositionalDiff`] pairs entries by position, so inserting or
//! removing a component mid-list reports every later slot as modified.
//! [`IdentityDiff`] pairs entries by the id of the live component they were
//! copied from and reports moves as a `position` change.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::{PageVersion, VersionComponent, VersionMetadata};

/// One changed field. Nested object keys use dotted paths (`props.title`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub path: String,
    pub old: Option<Value>,
    pub new: Option<Value>,
}

/// A component present on both sides with at least one changed field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModifiedComponent {
    pub component_id: Option<Uuid>,
    pub old_position: i32,
    pub new_position: i32,
    pub changes: Vec<FieldChange>,
}

/// Component-level result of a strategy.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComponentDiff {
    pub added: Vec<VersionComponent>,
    pub removed: Vec<VersionComponent>,
    pub modified: Vec<ModifiedComponent>,
}

impl ComponentDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}

/// Counts for a diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
    pub unchanged: usize,
    pub metadata_changed: bool,
}

/// Full comparison report between two versions of a page.
#[derive(Debug, Clone, Serialize)]
pub struct VersionDiff {
    pub from_version: i32,
    pub to_version: i32,
    pub strategy: &'static str,
    pub added: Vec<VersionComponent>,
    pub removed: Vec<VersionComponent>,
    pub modified: Vec<ModifiedComponent>,
    /// Changes to the snapshotted page fields (title, slug, ...).
    pub metadata: Vec<FieldChange>,
    pub summary: DiffSummary,
}

impl VersionDiff {
    /// No component was added, removed or modified.
    pub fn components_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}

/// Pairing rule for matching components across two versions.
pub trait DiffStrategy: Send + Sync {
    /// Name used to select the strategy.
    fn name(&self) -> &'static str;

    /// Compare two component lists.
    fn compare(&self, from: &[VersionComponent], to: &[VersionComponent]) -> ComponentDiff;
}

/// Pairs components by position.
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionalDiff;

impl DiffStrategy for PositionalDiff {
    fn name(&self) -> &'static str {
        "positional"
    }

    fn compare(&self, from: &[VersionComponent], to: &[VersionComponent]) -> ComponentDiff {
        let old: BTreeMap<i32, &VersionComponent> = from.iter().map(|c| (c.position, c)).collect();
        let new: BTreeMap<i32, &VersionComponent> = to.iter().map(|c| (c.position, c)).collect();
        let positions: BTreeSet<i32> = old.keys().chain(new.keys()).copied().collect();

        let mut diff = ComponentDiff::default();
        for position in positions {
            match (old.get(&position), new.get(&position)) {
                (Some(a), Some(b)) => push_modified(&mut diff, a, b),
                (Some(a), None) => diff.removed.push((*a).clone()),
                (None, Some(b)) => diff.added.push((*b).clone()),
                (None, None) => {}
            }
        }
        diff
    }
}

/// Pairs components by their originating component id.
///
/// Entries without an id on either side fall back to positional pairing
/// among themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityDiff;

impl DiffStrategy for IdentityDiff {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn compare(&self, from: &[VersionComponent], to: &[VersionComponent]) -> ComponentDiff {
        let new_by_id: HashMap<Uuid, &VersionComponent> = to
            .iter()
            .filter_map(|c| c.component_id.map(|id| (id, c)))
            .collect();
        let old_ids: BTreeSet<Uuid> = from.iter().filter_map(|c| c.component_id).collect();

        let mut diff = ComponentDiff::default();
        let mut unmatched_old = Vec::new();
        for a in from {
            match a.component_id.and_then(|id| new_by_id.get(&id)) {
                Some(b) => push_modified(&mut diff, a, b),
                None => unmatched_old.push(a.clone()),
            }
        }
        let unmatched_new: Vec<VersionComponent> = to
            .iter()
            .filter(|c| c.component_id.is_none_or(|id| !old_ids.contains(&id)))
            .cloned()
            .collect();

        // Entries with an id that vanished are plain removals/additions;
        // only id-less entries get a positional second chance.
        let (anonymous_old, removed): (Vec<_>, Vec<_>) = unmatched_old
            .into_iter()
            .partition(|c| c.component_id.is_none());
        let (anonymous_new, added): (Vec<_>, Vec<_>) = unmatched_new
            .into_iter()
            .partition(|c| c.component_id.is_none());
        diff.removed.extend(removed);
        diff.added.extend(added);

        let fallback = PositionalDiff.compare(&anonymous_old, &anonymous_new);
        diff.added.extend(fallback.added);
        diff.removed.extend(fallback.removed);
        diff.modified.extend(fallback.modified);

        diff.added.sort_by_key(|c| c.position);
        diff.removed.sort_by_key(|c| c.position);
        diff.modified.sort_by_key(|m| m.new_position);
        diff
    }
}

/// Strategy selector, as accepted in query strings.
///
/// [`Positional`](Self::Positional) is the default when a caller names none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffStrategyKind {
    #[default]
    Positional,
    Identity,
}

impl DiffStrategyKind {
    pub fn strategy(self) -> &'static dyn DiffStrategy {
        match self {
            Self::Positional => &PositionalDiff,
            Self::Identity => &IdentityDiff,
        }
    }
}

impl std::str::FromStr for DiffStrategyKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "positional" => Ok(Self::Positional),
            "identity" => Ok(Self::Identity),
            _ => Err(anyhow::anyhow!(
                "unknown diff strategy: {s:?} (expected positional or identity)"
            )),
        }
    }
}

/// Compare two versions of the same page.
pub fn compare(from: &PageVersion, to: &PageVersion, strategy: &dyn DiffStrategy) -> VersionDiff {
    let components = strategy.compare(&from.components, &to.components);
    let metadata = metadata_changes(&from.metadata, &to.metadata);

    let paired = to.components.len() - components.added.len();
    let summary = DiffSummary {
        added: components.added.len(),
        removed: components.removed.len(),
        modified: components.modified.len(),
        unchanged: paired.saturating_sub(components.modified.len()),
        metadata_changed: !metadata.is_empty(),
    };

    VersionDiff {
        from_version: from.version_number,
        to_version: to.version_number,
        strategy: strategy.name(),
        added: components.added,
        removed: components.removed,
        modified: components.modified,
        metadata,
        summary,
    }
}

fn push_modified(diff: &mut ComponentDiff, a: &VersionComponent, b: &VersionComponent) {
    let changes = component_changes(a, b);
    if !changes.is_empty() {
        diff.modified.push(ModifiedComponent {
            component_id: b.component_id.or(a.component_id),
            old_position: a.position,
            new_position: b.position,
            changes,
        });
    }
}

/// Field-level changes between two components.
pub fn component_changes(a: &VersionComponent, b: &VersionComponent) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    if a.component_type != b.component_type {
        changes.push(FieldChange {
            path: "component_type".to_string(),
            old: Some(Value::String(a.component_type.clone())),
            new: Some(Value::String(b.component_type.clone())),
        });
    }
    if a.position != b.position {
        changes.push(FieldChange {
            path: "position".to_string(),
            old: Some(Value::from(a.position)),
            new: Some(Value::from(b.position)),
        });
    }
    diff_value("props", Some(&a.props), Some(&b.props), &mut changes);
    diff_value("styles", Some(&a.styles), Some(&b.styles), &mut changes);
    diff_value(
        "responsive_config",
        Some(&a.responsive_config),
        Some(&b.responsive_config),
        &mut changes,
    );
    changes
}

fn metadata_changes(a: &VersionMetadata, b: &VersionMetadata) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    let (Ok(old), Ok(new)) = (serde_json::to_value(a), serde_json::to_value(b)) else {
        return changes;
    };
    for key in ["title", "slug", "template_id", "metadata", "seo_config"] {
        diff_value(key, old.get(key), new.get(key), &mut changes);
    }
    changes
}

/// Recursively compare two JSON values, descending into objects.
fn diff_value(path: &str, old: Option<&Value>, new: Option<&Value>, out: &mut Vec<FieldChange>) {
    match (old, new) {
        (Some(Value::Object(a)), Some(Value::Object(b))) => {
            let keys: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
            for key in keys {
                diff_value(&format!("{path}.{key}"), a.get(key), b.get(key), out);
            }
        }
        (a, b) if a != b => out.push(FieldChange {
            path: path.to_string(),
            old: a.cloned(),
            new: b.cloned(),
        }),
        _ => {}
    }
}
