// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running.
//! Run with `FIRESTORE_EMULATOR_HOST` pointing at it.

use serde_json::json;
use taskilo_api::db::{DocumentStore, FieldPatch};

mod common;
use common::test_db;

/// Unique document id so runs against a shared emulator don't collide.
fn unique_id(prefix: &str) -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{prefix}-{nanos}")
}

#[tokio::test]
async fn set_merge_creates_then_merges_nested_fields() {
    require_emulator!();

    let db = test_db().await;
    let id = unique_id("user");

    let mut first = FieldPatch::new();
    first
        .set("firstName", "Max")
        .set("step1.city", "Berlin")
        .set("step1.postalCode", "10115");
    db.set_merge("users", &id, &first).await.unwrap();

    // Only the masked leaf changes; its sibling survives.
    let mut second = FieldPatch::new();
    second.set("step1.city", "Hamburg");
    db.set_merge("users", &id, &second).await.unwrap();

    let stored = db.get("users", &id).await.unwrap().expect("document");
    assert_eq!(stored["firstName"], "Max");
    assert_eq!(stored["step1"]["city"], "Hamburg");
    assert_eq!(stored["step1"]["postalCode"], "10115");
}

#[tokio::test]
async fn update_requires_existing_document() {
    require_emulator!();

    let db = test_db().await;
    let id = unique_id("company");

    let mut patch = FieldPatch::new();
    patch.set("companyName", "Muster GmbH");
    assert!(db.update("companies", &id, &patch).await.is_err());
    assert!(db.get("companies", &id).await.unwrap().is_none());

    db.set_merge("companies", &id, &patch).await.unwrap();
    let mut rename = FieldPatch::new();
    rename.set("companyName", "Muster AG").delete("legacyField");
    db.update("companies", &id, &rename).await.unwrap();

    let stored = db.get("companies", &id).await.unwrap().expect("document");
    assert_eq!(stored["companyName"], "Muster AG");
    assert!(stored.get("legacyField").is_none());
}

#[tokio::test]
async fn find_by_field_matches_exact_value() {
    require_emulator!();

    let db = test_db().await;
    let owner = unique_id("owner");

    for domain in ["a.example.de", "b.example.de"] {
        let mut patch = FieldPatch::new();
        patch
            .set("ownerUid", owner.as_str())
            .set("domain", domain)
            .set("dnsRecords", json!([{"type": "TXT", "value": "x"}]));
        db.set_merge("custom_domains", &unique_id("domain"), &patch)
            .await
            .unwrap();
    }

    let found = db
        .find_by_field("custom_domains", "ownerUid", &owner)
        .await
        .unwrap();
    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|d| d["ownerUid"] == owner.as_str()));

    let none = db
        .find_by_field("custom_domains", "ownerUid", "nobody-owns-this")
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn delete_removes_document() {
    require_emulator!();

    let db = test_db().await;
    let id = unique_id("settings");

    let mut patch = FieldPatch::new();
    patch.set("pageSize", 25);
    db.set_merge("webmail_settings", &id, &patch).await.unwrap();
    db.delete("webmail_settings", &id).await.unwrap();

    assert!(db.get("webmail_settings", &id).await.unwrap().is_none());
}
