//! Vetrina test utilities.
//!
//! Request-body fixtures for pages and components, test actors, and
//! assertion helpers for JSON responses.

use serde_json::{Value as JsonValue, json};
use uuid::Uuid;

/// Create a test page with default values.
pub fn test_page(title: &str, slug: &str) -> TestPage {
    TestPage {
        title: title.to_string(),
        slug: slug.to_string(),
        parent_id: None,
        template_id: None,
        metadata: json!({}),
        seo_config: json!({}),
    }
}

/// A page builder producing the body of `POST /api/pages`.
#[derive(Debug, Clone)]
pub struct TestPage {
    pub title: String,
    pub slug: String,
    pub parent_id: Option<Uuid>,
    pub template_id: Option<Uuid>,
    pub metadata: JsonValue,
    pub seo_config: JsonValue,
}

impl TestPage {
    /// Nest under a parent page.
    pub fn with_parent(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Set the layout template.
    pub fn with_template(mut self, template_id: Uuid) -> Self {
        self.template_id = Some(template_id);
        self
    }

    /// Add a single metadata entry.
    pub fn with_meta(mut self, key: &str, value: JsonValue) -> Self {
        if let Some(obj) = self.metadata.as_object_mut() {
            obj.insert(key.to_string(), value);
        }
        self
    }

    /// Set the SEO config.
    pub fn with_seo(mut self, seo_config: JsonValue) -> Self {
        self.seo_config = seo_config;
        self
    }

    /// Request body.
    pub fn to_json(&self) -> JsonValue {
        json!({
            "title": self.title,
            "slug": self.slug,
            "parent_id": self.parent_id,
            "template_id": self.template_id,
            "metadata": self.metadata,
            "seo_config": self.seo_config,
        })
    }
}

/// Create a test component of `component_type` with `props`.
pub fn test_component(component_type: &str, props: JsonValue) -> TestComponent {
    TestComponent {
        id: None,
        component_type: component_type.to_string(),
        position: None,
        props,
        styles: json!({}),
    }
}

/// A component builder producing one entry of a components save.
#[derive(Debug, Clone)]
pub struct TestComponent {
    pub id: Option<Uuid>,
    pub component_type: String,
    pub position: Option<i32>,
    pub props: JsonValue,
    pub styles: JsonValue,
}

impl TestComponent {
    /// Keep an existing component id.
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    /// Give an explicit ordering key.
    pub fn at(mut self, position: i32) -> Self {
        self.position = Some(position);
        self
    }

    /// Set styles.
    pub fn with_styles(mut self, styles: JsonValue) -> Self {
        self.styles = styles;
        self
    }

    pub fn to_json(&self) -> JsonValue {
        json!({
            "id": self.id,
            "component_type": self.component_type,
            "position": self.position,
            "props": self.props,
            "styles": self.styles,
        })
    }
}

/// Body of `PUT /api/pages/{id}/components`.
pub fn save_body(revision: i64, components: &[TestComponent]) -> JsonValue {
    json!({
        "revision": revision,
        "components": components.iter().map(TestComponent::to_json).collect::<Vec<_>>(),
    })
}

/// A fresh actor id for the `X-Actor-Id` header.
pub fn test_actor() -> Uuid {
    Uuid::now_v7()
}

/// Assertion helpers for JSON content.
pub mod assert {
    use serde_json::Value;

    /// Assert that a JSON value has a specific key.
    pub fn has_key(value: &Value, key: &str) {
        assert!(
            value.get(key).is_some(),
            "Expected JSON to have key '{key}', got: {value}"
        );
    }

    /// Assert that `value[key]` is the given string.
    pub fn str_eq(value: &Value, key: &str, expected: &str) {
        assert_eq!(
            value.get(key).and_then(Value::as_str),
            Some(expected),
            "Expected '{key}' to be {expected:?} in: {value}"
        );
    }

    /// Assert that `value[key]` is the given integer.
    pub fn i64_eq(value: &Value, key: &str, expected: i64) {
        assert_eq!(
            value.get(key).and_then(Value::as_i64),
            Some(expected),
            "Expected '{key}' to be {expected} in: {value}"
        );
    }

    /// Assert that `value[key]` is an array of `len` entries.
    pub fn array_len(value: &Value, key: &str, len: usize) {
        let actual = value.get(key).and_then(Value::as_array).map(Vec::len);
        assert_eq!(actual, Some(len), "Expected '{key}' to have {len} entries in: {value}");
    }
}
