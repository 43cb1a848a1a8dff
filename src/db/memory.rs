// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory document store for offline mode and tests.
//!
//! Mirrors the Firestore semantics the services rely on: `update` fails on
//! missing documents, dotted paths address nested maps, no transactions.
//! Every write is recorded so tests can assert on call order.

use super::{Document, DocumentStore, FieldPatch};
use crate::error::AppError;
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use serde_json::Value;
use std::sync::Mutex;

/// Kind of write recorded by [`MemoryStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    SetMerge,
    Update,
    Delete,
}

/// One recorded write, successful or not.
#[derive(Debug, Clone)]
pub struct WriteCall {
    pub kind: WriteKind,
    pub collection: String,
    pub id: String,
    pub patch: FieldPatch,
    pub succeeded: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    docs: DashMap<(String, String), Document>,
    failing_collections: DashSet<String>,
    unreadable_collections: DashSet<String>,
    writes: Mutex<Vec<WriteCall>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document directly, bypassing the write log.
    pub fn insert(&self, collection: &str, id: &str, doc: Document) {
        self.docs
            .insert((collection.to_string(), id.to_string()), doc);
    }

    /// Snapshot of a stored document.
    pub fn document(&self, collection: &str, id: &str) -> Option<Document> {
        self.docs
            .get(&(collection.to_string(), id.to_string()))
            .map(|d| d.value().clone())
    }

    /// Make every subsequent write to `collection` fail.
    pub fn fail_writes_to(&self, collection: &str) {
        self.failing_collections.insert(collection.to_string());
    }

    /// Make `get` on `collection` report every document as missing while
    /// writes still land, as a lagging replica would.
    pub fn hide_reads_from(&self, collection: &str) {
        self.unreadable_collections.insert(collection.to_string());
    }

    pub fn writes(&self) -> Vec<WriteCall> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }

    /// Writes (of any kind) addressed to one collection.
    pub fn writes_to(&self, collection: &str) -> Vec<WriteCall> {
        self.writes()
            .into_iter()
            .filter(|w| w.collection == collection)
            .collect()
    }

    fn record(&self, kind: WriteKind, collection: &str, id: &str, patch: &FieldPatch) -> bool {
        let succeeded = !self.failing_collections.contains(collection);
        if let Ok(mut writes) = self.writes.lock() {
            writes.push(WriteCall {
                kind,
                collection: collection.to_string(),
                id: id.to_string(),
                patch: patch.clone(),
                succeeded,
            });
        }
        succeeded
    }

    fn injected_failure(collection: &str) -> AppError {
        AppError::Database(format!("simulated write failure on {collection}"))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, AppError> {
        if self.unreadable_collections.contains(collection) {
            return Ok(None);
        }
        Ok(self.document(collection, id))
    }

    async fn set_merge(
        &self,
        collection: &str,
        id: &str,
        patch: &FieldPatch,
    ) -> Result<(), AppError> {
        if !self.record(WriteKind::SetMerge, collection, id, patch) {
            return Err(Self::injected_failure(collection));
        }
        let mut entry = self
            .docs
            .entry((collection.to_string(), id.to_string()))
            .or_default();
        patch.apply_to(entry.value_mut());
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, patch: &FieldPatch) -> Result<(), AppError> {
        if !self.record(WriteKind::Update, collection, id, patch) {
            return Err(Self::injected_failure(collection));
        }
        match self.docs.get_mut(&(collection.to_string(), id.to_string())) {
            Some(mut doc) => {
                patch.apply_to(doc.value_mut());
                Ok(())
            }
            None => Err(AppError::NotFound(format!("{collection}/{id}"))),
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), AppError> {
        if !self.record(WriteKind::Delete, collection, id, &FieldPatch::new()) {
            return Err(Self::injected_failure(collection));
        }
        self.docs.remove(&(collection.to_string(), id.to_string()));
        Ok(())
    }

    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<Document>, AppError> {
        Ok(self
            .docs
            .iter()
            .filter(|entry| entry.key().0 == collection)
            .filter(|entry| entry.value().get(field).and_then(Value::as_str) == Some(value))
            .map(|entry| entry.value().clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn update_requires_existing_document() {
        let store = MemoryStore::new();
        let mut patch = FieldPatch::new();
        patch.set("firstName", "Max");

        let err = store.update("users", "u1", &patch).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        store.set_merge("users", "u1", &patch).await.unwrap();
        store.update("users", "u1", &patch).await.unwrap();
        assert_eq!(store.writes_to("users").len(), 3);
    }

    #[tokio::test]
    async fn merge_keeps_unrelated_fields() {
        let store = MemoryStore::new();
        let mut seed = Document::new();
        seed.insert("keep".into(), json!("me"));
        store.insert("users", "u1", seed);

        let mut patch = FieldPatch::new();
        patch.set("step1.city", "Berlin");
        store.set_merge("users", "u1", &patch).await.unwrap();

        let doc = store.document("users", "u1").unwrap();
        assert_eq!(doc["keep"], json!("me"));
        assert_eq!(doc["step1"]["city"], json!("Berlin"));
    }

    #[tokio::test]
    async fn injected_failures_are_recorded() {
        let store = MemoryStore::new();
        store.fail_writes_to("companies");
        let mut patch = FieldPatch::new();
        patch.set("x", 1);

        assert!(store.set_merge("companies", "c1", &patch).await.is_err());
        let writes = store.writes_to("companies");
        assert_eq!(writes.len(), 1);
        assert!(!writes[0].succeeded);
        assert!(store.document("companies", "c1").is_none());
    }

    #[tokio::test]
    async fn hidden_reads_still_keep_writes() {
        let store = MemoryStore::new();
        store.hide_reads_from("users");
        let mut patch = FieldPatch::new();
        patch.set("firstName", "Max");

        store.set_merge("users", "u1", &patch).await.unwrap();
        assert!(store.get("users", "u1").await.unwrap().is_none());
        assert_eq!(store.document("users", "u1").unwrap()["firstName"], json!("Max"));
    }

    #[tokio::test]
    async fn find_by_field_filters_collection() {
        let store = MemoryStore::new();
        let mut a = Document::new();
        a.insert("ownerUid".into(), json!("u1"));
        store.insert("custom_domains", "d1", a.clone());
        store.insert("other", "d2", a);

        let found = store
            .find_by_field("custom_domains", "ownerUid", "u1")
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }
}
