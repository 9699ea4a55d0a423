//! Page component model.
//!
//! A component is one typed, positioned node of a page's rendered tree. The
//! `props`, `styles` and `responsive_config` payloads are opaque to the
//! kernel; the editor and the mobile client own their schemas.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted page component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PageComponent {
    /// Stable component identifier, carried across saves when the editor
    /// sends it back.
    pub id: Uuid,

    /// Owning page.
    pub page_id: Uuid,

    /// Registered component type name (e.g. "hero", "text", "gallery").
    pub component_type: String,

    /// Zero-based, dense position within the page.
    pub position: i32,

    pub props: serde_json::Value,

    pub styles: serde_json::Value,

    pub responsive_config: serde_json::Value,
}

/// Component as submitted by the editor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentInput {
    /// Existing component id to keep; a new one is assigned when absent.
    pub id: Option<Uuid>,
    pub component_type: String,
    /// Explicit ordering key. Falls back to the list index.
    pub position: Option<i32>,
    #[serde(default)]
    pub props: Option<serde_json::Value>,
    #[serde(default)]
    pub styles: Option<serde_json::Value>,
    #[serde(default)]
    pub responsive_config: Option<serde_json::Value>,
}

impl ComponentInput {
    /// Shorthand for a component with only a type and props.
    pub fn new(component_type: impl Into<String>, props: serde_json::Value) -> Self {
        Self {
            component_type: component_type.into(),
            props: Some(props),
            ..Self::default()
        }
    }
}

/// Order submitted components and assign dense positions.
///
/// Explicit positions are honored as sort keys and entries without one sort
/// by their list index. Ties keep submission order. The result is always
/// numbered `0..n-1`.
///
/// A supplied id is kept only when it is in `owned`, the ids this page may
/// reuse; anything else gets a fresh id so a component never changes pages.
pub fn normalize_components(
    page_id: Uuid,
    input: Vec<ComponentInput>,
    owned: &HashSet<Uuid>,
) -> Vec<PageComponent> {
    let mut keyed: Vec<(i64, usize, ComponentInput)> = input
        .into_iter()
        .enumerate()
        .map(|(index, c)| {
            let key = c.position.map_or(index as i64, i64::from);
            (key, index, c)
        })
        .collect();
    keyed.sort_by_key(|(key, index, _)| (*key, *index));

    // A repeated id would collide on insert; later duplicates get fresh ids.
    let mut seen = HashSet::new();
    keyed
        .into_iter()
        .enumerate()
        .map(|(position, (_, _, c))| PageComponent {
            id: c
                .id
                .filter(|id| owned.contains(id) && seen.insert(*id))
                .unwrap_or_else(Uuid::now_v7),
            page_id,
            component_type: c.component_type,
            position: position as i32,
            props: c.props.unwrap_or_else(|| serde_json::json!({})),
            styles: c.styles.unwrap_or_else(|| serde_json::json!({})),
            responsive_config: c.responsive_config.unwrap_or_else(|| serde_json::json!({})),
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn input(component_type: &str, position: Option<i32>) -> ComponentInput {
        ComponentInput {
            component_type: component_type.to_string(),
            position,
            ..ComponentInput::default()
        }
    }

    #[test]
    fn list_order_when_no_positions() {
        let page_id = Uuid::now_v7();
        let out = normalize_components(
            page_id,
            vec![input("a", None), input("b", None)],
            &HashSet::new(),
        );
        let types: Vec<_> = out.iter().map(|c| c.component_type.as_str()).collect();
        assert_eq!(types, ["a", "b"]);
        assert_eq!(out[1].position, 1);
        assert!(out.iter().all(|c| c.page_id == page_id));
    }

    #[test]
    fn explicit_positions_reorder_and_compact() {
        let out = normalize_components(
            Uuid::now_v7(),
            vec![input("c", Some(30)), input("a", Some(-5)), input("b", Some(10))],
            &HashSet::new(),
        );
        let types: Vec<_> = out.iter().map(|c| c.component_type.as_str()).collect();
        assert_eq!(types, ["a", "b", "c"]);
        let positions: Vec<_> = out.iter().map(|c| c.position).collect();
        assert_eq!(positions, [0, 1, 2]);
    }

    #[test]
    fn duplicate_positions_keep_submission_order() {
        let out = normalize_components(
            Uuid::now_v7(),
            vec![input("first", Some(1)), input("second", Some(1)), input("zero", Some(0))],
            &HashSet::new(),
        );
        let types: Vec<_> = out.iter().map(|c| c.component_type.as_str()).collect();
        assert_eq!(types, ["zero", "first", "second"]);
    }

    #[test]
    fn keeps_owned_ids_and_fills_payloads() {
        let id = Uuid::now_v7();
        let mut c = input("hero", None);
        c.id = Some(id);
        let out = normalize_components(Uuid::now_v7(), vec![c], &HashSet::from([id]));
        assert_eq!(out[0].id, id);
        assert_eq!(out[0].props, serde_json::json!({}));
        assert_eq!(out[0].responsive_config, serde_json::json!({}));
    }

    #[test]
    fn foreign_and_repeated_ids_are_replaced() {
        let mine = Uuid::now_v7();
        let foreign = Uuid::now_v7();
        let mut a = input("hero", None);
        a.id = Some(mine);
        let mut b = input("text", None);
        b.id = Some(mine);
        let mut c = input("gallery", None);
        c.id = Some(foreign);

        let out = normalize_components(Uuid::now_v7(), vec![a, b, c], &HashSet::from([mine]));
        assert_eq!(out[0].id, mine);
        assert_ne!(out[1].id, mine);
        assert_ne!(out[2].id, foreign);
    }
}
