//! The narrow interface between the HTTP core and the wiki content model.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::HandlerError;

/// Title of the tiddler holding the site title; used as the server name in
/// authentication challenges and log lines.
pub const SITE_TITLE_TIDDLER: &str = "$:/SiteTitle";

// =============================================================================
// Tiddler
// =============================================================================

/// The wiki's atomic content unit: a title plus a flat string field map.
///
/// The body text lives in the `text` field like any other field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tiddler {
    /// Unique title identifying the tiddler
    pub title: String,

    /// All other fields, including `text`
    pub fields: HashMap<String, String>,
}

impl Tiddler {
    /// Create a tiddler with the given title and no fields.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            fields: HashMap::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// The `text` field, if present.
    pub fn text(&self) -> Option<&str> {
        self.fields.get("text").map(String::as_str)
    }

    /// Whether the title marks this as a system tiddler.
    pub fn is_system(&self) -> bool {
        self.title.starts_with("$:/")
    }

    /// Build a tiddler from a flat JSON object.
    ///
    /// Field values that are not strings are stringified, since tiddler
    /// fields are always strings. `title` may be supplied in the object or
    /// separately; the explicit argument wins.
    pub fn from_json(title: &str, value: &Value) -> Result<Self, HandlerError> {
        let object: &Map<String, Value> = value
            .as_object()
            .ok_or_else(|| HandlerError::InvalidBody("expected a JSON object".to_string()))?;

        let mut fields = HashMap::new();
        for (name, field_value) in object {
            if name == "title" {
                continue;
            }
            let text = match field_value {
                Value::String(s) => s.clone(),
                Value::Null => continue,
                other => other.to_string(),
            };
            fields.insert(name.clone(), text);
        }

        Ok(Self {
            title: title.to_string(),
            fields,
        })
    }

    /// Serialize to the flat JSON object shape used on the wire, tagging the
    /// tiddler with its revision and bag.
    pub fn to_json(&self, revision: u64) -> Value {
        let mut object = Map::new();
        object.insert("title".to_string(), Value::String(self.title.clone()));
        for (name, value) in &self.fields {
            object.insert(name.clone(), Value::String(value.clone()));
        }
        object.insert("revision".to_string(), Value::String(revision.to_string()));
        object.insert("bag".to_string(), Value::String("default".to_string()));
        Value::Object(object)
    }
}

// =============================================================================
// WikiStore
// =============================================================================

/// Narrow interface to the wiki content store.
///
/// Implementations provide a flat title-keyed tiddler map with per-title
/// revision counters and a rendering hook. All methods take `&self`;
/// implementations use interior mutability and must be safe to share across
/// concurrent requests.
pub trait WikiStore: Send + Sync {
    /// Fetch a tiddler by title.
    fn get_tiddler(&self, title: &str) -> Option<Tiddler>;

    /// Insert or replace a tiddler, returning its new revision.
    fn put_tiddler(&self, tiddler: Tiddler) -> u64;

    /// Delete a tiddler by title; returns false when it did not exist.
    fn delete_tiddler(&self, title: &str) -> bool;

    /// All tiddler titles, sorted.
    fn tiddler_titles(&self) -> Vec<String>;

    /// The revision counter for a title (0 when never written).
    fn change_count(&self, title: &str) -> u64;

    /// Convenience accessor for a tiddler's `text` field.
    fn get_tiddler_text(&self, title: &str) -> Option<String> {
        self.get_tiddler(title).and_then(|t| t.fields.get("text").cloned())
    }

    /// Render a tiddler to the given content type.
    ///
    /// Rendering is the store's concern, not the server's; the server only
    /// forwards the configured render/serve types.
    fn render_tiddler(&self, title: &str, content_type: &str) -> Option<String>;
}

// =============================================================================
// Tests
// =============================================================================
