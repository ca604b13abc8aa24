//! In-memory tiddler store.

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value;

use crate::error::HandlerError;

use super::store::{Tiddler, WikiStore};

/// A process-local [`WikiStore`] backed by a title → tiddler map.
///
/// Revisions are per-title monotonic counters bumped on every write, so the
/// `Etag` handed out for a PUT changes whenever the tiddler does.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    tiddlers: HashMap<String, Tiddler>,
    change_counts: HashMap<String, u64>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion, for composition and tests.
    pub fn with_tiddler(self, tiddler: Tiddler) -> Self {
        self.put_tiddler(tiddler);
        self
    }

    /// Load tiddlers from a JSON export: an array of flat field objects,
    /// each carrying a `title`.
    pub fn load_json(&self, json: &str) -> Result<usize, HandlerError> {
        let value: Value = serde_json::from_str(json)?;
        let entries = value
            .as_array()
            .ok_or_else(|| HandlerError::InvalidBody("expected a JSON array of tiddlers".to_string()))?;

        let mut loaded = 0;
        for entry in entries {
            let title = entry
                .get("title")
                .and_then(Value::as_str)
                .ok_or_else(|| HandlerError::InvalidBody("tiddler without a title".to_string()))?;
            self.put_tiddler(Tiddler::from_json(title, entry)?);
            loaded += 1;
        }
        Ok(loaded)
    }
}

impl WikiStore for MemoryStore {
    fn get_tiddler(&self, title: &str) -> Option<Tiddler> {
        self.inner.read().expect("store lock poisoned").tiddlers.get(title).cloned()
    }

    fn put_tiddler(&self, tiddler: Tiddler) -> u64 {
        let mut inner = self.inner.write().expect("store lock poisoned");
        let count = inner.change_counts.entry(tiddler.title.clone()).or_insert(0);
        *count += 1;
        let revision = *count;
        inner.tiddlers.insert(tiddler.title.clone(), tiddler);
        revision
    }

    fn delete_tiddler(&self, title: &str) -> bool {
        let mut inner = self.inner.write().expect("store lock poisoned");
        let existed = inner.tiddlers.remove(title).is_some();
        if existed {
            *inner.change_counts.entry(title.to_string()).or_insert(0) += 1;
        }
        existed
    }

    fn tiddler_titles(&self) -> Vec<String> {
        let inner = self.inner.read().expect("store lock poisoned");
        let mut titles: Vec<String> = inner.tiddlers.keys().cloned().collect();
        titles.sort();
        titles
    }

    fn change_count(&self, title: &str) -> u64 {
        self.inner
            .read()
            .expect("store lock poisoned")
            .change_counts
            .get(title)
            .copied()
            .unwrap_or(0)
    }

    fn render_tiddler(&self, title: &str, content_type: &str) -> Option<String> {
        let tiddler = self.get_tiddler(title)?;
        let text = tiddler.text().unwrap_or("");
        match content_type {
            "text/html" => Some(format!(
                "<!doctype html><html><head><meta charset=\"utf-8\"><title>{}</title></head>\
                 <body><pre>{}</pre></body></html>",
                escape_html(&tiddler.title),
                escape_html(text)
            )),
            _ => Some(text.to_string()),
        }
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// =============================================================================
// Tests
// =============================================================================
