//! Database layer (Firestore, plus an in-memory store for offline mode).

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::error::AppError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const COMPANIES: &str = "companies";
    pub const CUSTOM_DOMAINS: &str = "custom_domains";
    pub const DOMAIN_MAILBOXES: &str = "custom_domain_mailboxes";
    pub const WEBMAIL_SETTINGS: &str = "webmail_settings";
    /// Last completed registration step, keyed by uid
    pub const REGISTRATION_PROGRESS: &str = "registration_progress";
}

/// A loosely typed document body.
pub type Document = Map<String, Value>;

/// Value of a single field in a partial write.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchValue {
    Set(Value),
    /// Remove the field from the stored document.
    Delete,
}

/// Partial write keyed by dotted field path (`"step1.firstName"`).
///
/// Dotted keys address nested map fields; plain keys address top-level
/// fields. Fields not named in the patch are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldPatch {
    fields: BTreeMap<String, PatchValue>,
}

impl FieldPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, path: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(path.into(), PatchValue::Set(value.into()));
        self
    }

    /// Set the field only when a value is present.
    pub fn set_opt<V: Into<Value>>(&mut self, path: impl Into<String>, value: Option<V>) -> &mut Self {
        if let Some(value) = value {
            self.set(path, value);
        }
        self
    }

    pub fn delete(&mut self, path: impl Into<String>) -> &mut Self {
        self.fields.insert(path.into(), PatchValue::Delete);
        self
    }

    pub fn get(&self, path: &str) -> Option<&PatchValue> {
        self.fields.get(path)
    }

    /// Value written at `path`, if the patch sets it.
    pub fn value(&self, path: &str) -> Option<&Value> {
        match self.fields.get(path) {
            Some(PatchValue::Set(v)) => Some(v),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PatchValue)> {
        self.fields.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Merge another patch into this one; later values win.
    pub fn extend(&mut self, other: FieldPatch) {
        self.fields.extend(other.fields);
    }

    /// Flatten a nested document into leaf-level dotted paths.
    ///
    /// Used for merge writes so nested maps are merged instead of replaced.
    pub fn from_document(doc: &Document) -> Self {
        let mut patch = Self::new();
        flatten_into(&mut patch, None, doc);
        patch
    }

    /// Build the nested object holding every `Set` value of this patch.
    pub fn to_nested(&self) -> Document {
        let mut root = Document::new();
        for (path, value) in &self.fields {
            if let PatchValue::Set(v) = value {
                set_path(&mut root, path, v.clone());
            }
        }
        root
    }

    /// Apply this patch to a stored document in place.
    pub fn apply_to(&self, doc: &mut Document) {
        for (path, value) in &self.fields {
            match value {
                PatchValue::Set(v) => set_path(doc, path, v.clone()),
                PatchValue::Delete => remove_path(doc, path),
            }
        }
    }
}

fn flatten_into(patch: &mut FieldPatch, prefix: Option<&str>, doc: &Document) {
    for (key, value) in doc {
        let path = match prefix {
            Some(p) => format!("{p}.{key}"),
            None => key.clone(),
        };
        match value {
            Value::Object(inner) if !inner.is_empty() => flatten_into(patch, Some(&path), inner),
            other => {
                patch.set(path, other.clone());
            }
        }
    }
}

/// Set `value` at a dotted path, creating (or replacing non-object) intermediates.
pub fn set_path(doc: &mut Document, path: &str, value: Value) {
    let mut segments = path.split('.').peekable();
    let mut current = doc;
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.insert(segment.to_string(), value);
            return;
        }
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        current = match entry {
            Value::Object(map) => map,
            _ => return,
        };
    }
}

/// Remove the field at a dotted path if it exists.
pub fn remove_path(doc: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            doc.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Value::Object(inner)) = doc.get_mut(head) {
                remove_path(inner, rest);
            }
        }
    }
}

/// Document database operations used by the services.
///
/// `set_merge` creates the document when missing; `update` requires it to
/// exist. Neither uses a version check: last writer wins.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, AppError>;

    async fn set_merge(&self, collection: &str, id: &str, patch: &FieldPatch)
        -> Result<(), AppError>;

    async fn update(&self, collection: &str, id: &str, patch: &FieldPatch) -> Result<(), AppError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), AppError>;

    /// Documents whose top-level string `field` equals `value`.
    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<Document>, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: Value) -> Document {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn apply_sets_nested_and_deletes() {
        let mut stored = doc(json!({"step1": {"firstName": "Old", "city": "Berlin"}, "x": 1}));
        let mut patch = FieldPatch::new();
        patch.set("step1.firstName", "New").delete("x").set("flat", true);
        patch.apply_to(&mut stored);

        assert_eq!(
            Value::Object(stored),
            json!({"step1": {"firstName": "New", "city": "Berlin"}, "flat": true})
        );
    }

    #[test]
    fn set_replaces_non_object_intermediate() {
        let mut stored = doc(json!({"step2": "legacy string"}));
        set_path(&mut stored, "step2.companyName", json!("Acme"));
        assert_eq!(stored["step2"], json!({"companyName": "Acme"}));
    }

    #[test]
    fn from_document_flattens_to_leaves() {
        let patch = FieldPatch::from_document(&doc(json!({
            "common": {"tosAcceptanceIp": "1.2.3.4"},
            "tags": ["a"],
            "empty": {}
        })));
        let paths: Vec<&str> = patch.paths().collect();
        assert_eq!(paths, vec!["common.tosAcceptanceIp", "empty", "tags"]);
    }

    #[test]
    fn to_nested_skips_deletes() {
        let mut patch = FieldPatch::new();
        patch.set("a.b", 1).delete("a.c");
        assert_eq!(Value::Object(patch.to_nested()), json!({"a": {"b": 1}}));
    }
}
