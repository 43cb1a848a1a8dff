// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper implementing [`DocumentStore`].
//!
//! Partial writes are sent as a nested object plus an update mask, so
//! only the named fields change. A masked path that is absent from the
//! object is deleted by Firestore, which is how [`PatchValue::Delete`]
//! is expressed.
//!
//! [`PatchValue::Delete`]: super::PatchValue::Delete

use super::{Document, DocumentStore, FieldPatch};
use crate::error::AppError;
use async_trait::async_trait;
use firestore::FirestoreWritePrecondition;
use serde_json::Value;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a disconnected client (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Masked writes ───────────────────────────────────────────

    async fn write_masked(
        &self,
        collection: &str,
        id: &str,
        patch: &FieldPatch,
        precondition: Option<FirestoreWritePrecondition>,
    ) -> Result<(), AppError> {
        if patch.is_empty() {
            return Ok(());
        }

        let body = Value::Object(patch.to_nested());
        let mask: Vec<String> = patch.paths().map(str::to_string).collect();

        let builder = self
            .get_client()?
            .fluent()
            .update()
            .fields(mask)
            .in_col(collection);

        let builder = match precondition {
            Some(p) => builder.precondition(p),
            None => builder,
        };

        let builder = builder.document_id(id).object(&body);

        let _: () = builder
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::debug!(
            collection = collection,
            id = id,
            fields = patch.len(),
            "Firestore masked write"
        );
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FirestoreDb {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, AppError> {
        let value: Option<Value> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(value.and_then(|v| match v {
            Value::Object(map) => Some(map),
            _ => None,
        }))
    }

    async fn set_merge(
        &self,
        collection: &str,
        id: &str,
        patch: &FieldPatch,
    ) -> Result<(), AppError> {
        self.write_masked(collection, id, patch, None).await
    }

    async fn update(&self, collection: &str, id: &str, patch: &FieldPatch) -> Result<(), AppError> {
        self.write_masked(
            collection,
            id,
            patch,
            Some(FirestoreWritePrecondition::Exists(true)),
        )
        .await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collection)
            .document_id(id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<Document>, AppError> {
        let value = value.to_string();
        let field = field.to_string();
        let docs: Vec<Value> = self
            .get_client()?
            .fluent()
            .select()
            .from(collection)
            .filter(move |q| q.for_all([q.field(field.as_str()).eq(value.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(docs
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect())
    }
}
