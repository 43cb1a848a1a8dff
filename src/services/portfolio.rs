// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Portfolio entries on `companies/{uid}`.
//!
//! The whole `portfolio` array is read, modified and written back.
//! Concurrent edits are last writer wins.

use crate::db::{collections, DocumentStore, FieldPatch};
use crate::error::AppError;
use crate::models::files::{FileSlot, StoredObject};
use crate::models::portfolio::PortfolioItem;
use crate::services::identity::Session;
use crate::services::storage::{portfolio_path, BlobStore};
use crate::services::uploads::{StagingOwner, UploadStaging};
use crate::time_utils::{now_millis, now_rfc3339};
use ring::rand::{SecureRandom, SystemRandom};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

const MAX_TITLE_LEN: usize = 100;

/// Fields supplied when adding an entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewPortfolioItem {
    pub title: String,
    pub description: String,
    pub category: Option<String>,
}

#[derive(Clone)]
pub struct PortfolioService {
    store: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    staging: Arc<UploadStaging>,
    rng: SystemRandom,
}

impl PortfolioService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        staging: Arc<UploadStaging>,
    ) -> Self {
        Self {
            store,
            blobs,
            staging,
            rng: SystemRandom::new(),
        }
    }

    pub async fn list(&self, uid: &str) -> Result<Vec<PortfolioItem>, AppError> {
        let company = self
            .store
            .get(collections::COMPANIES, uid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("company {uid}")))?;
        Ok(parse_items(company.get("portfolio")))
    }

    /// Append an entry, uploading the staged portfolio image if there is one.
    pub async fn add(
        &self,
        session: &Session,
        item: NewPortfolioItem,
    ) -> Result<PortfolioItem, AppError> {
        let title = item.title.trim();
        if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
            return Err(AppError::Validation(format!(
                "Titel muss zwischen 1 und {MAX_TITLE_LEN} Zeichen lang sein."
            )));
        }
        let uid = session.uid.as_str();
        let mut items = self.list(uid).await?;

        let owner = StagingOwner::User(uid.to_string());
        let image = match self.staging.get(&owner, FileSlot::PortfolioImage) {
            Some(file) => {
                let path = portfolio_path(uid, now_millis(), &file);
                Some(self.blobs.upload(&path, &file, &session.id_token).await?)
            }
            None => None,
        };

        let entry = PortfolioItem {
            id: self.new_id()?,
            title: title.to_string(),
            description: item.description.trim().to_string(),
            category: item.category.filter(|c| !c.trim().is_empty()),
            image_url: image.as_ref().map(|i| i.download_url.clone()),
            image_path: image.map(|i| i.path),
            created_at: now_rfc3339(),
        };
        items.push(entry.clone());
        self.write(uid, &items).await?;

        self.staging.clear(&owner, FileSlot::PortfolioImage);
        tracing::info!(uid = %uid, item_id = %entry.id, "Portfolio item added");
        Ok(entry)
    }

    /// Remove an entry. Deleting its image is best effort.
    pub async fn remove(&self, session: &Session, item_id: &str) -> Result<(), AppError> {
        let uid = session.uid.as_str();
        let mut items = self.list(uid).await?;
        let index = items
            .iter()
            .position(|i| i.id == item_id)
            .ok_or_else(|| AppError::NotFound(format!("portfolio item {item_id}")))?;
        let removed = items.remove(index);
        self.write(uid, &items).await?;

        if let Some(path) = removed.image_path {
            if let Err(e) = self.blobs.delete(&path, &session.id_token).await {
                tracing::warn!(uid = %uid, path = %path, error = %e, "Portfolio image delete failed");
            }
        }
        tracing::info!(uid = %uid, item_id, "Portfolio item removed");
        Ok(())
    }

    /// Stored portfolio images of the caller.
    pub async fn list_files(&self, session: &Session) -> Result<Vec<StoredObject>, AppError> {
        self.blobs
            .list(&format!("portfolio/{}/", session.uid), &session.id_token)
            .await
    }

    async fn write(&self, uid: &str, items: &[PortfolioItem]) -> Result<(), AppError> {
        let value = serde_json::to_value(items).map_err(anyhow::Error::from)?;
        let mut patch = FieldPatch::new();
        patch
            .set("portfolio", value)
            .set("updatedAt", now_rfc3339());
        self.store.update(collections::COMPANIES, uid, &patch).await
    }

    fn new_id(&self) -> Result<String, AppError> {
        let mut bytes = [0u8; 8];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| anyhow::anyhow!("system random source failed"))?;
        Ok(format!("{}_{}", now_millis(), hex::encode(bytes)))
    }
}

/// Entries that fail to parse are skipped.
fn parse_items(value: Option<&Value>) -> Vec<PortfolioItem> {
    let Some(Value::Array(entries)) = value else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| match serde_json::from_value(entry.clone()) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping malformed portfolio entry");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::models::files::PendingFile;
    use crate::services::storage::MemoryBlobStore;
    use crate::services::uploads::PreviewRegistry;
    use axum::body::Bytes;
    use serde_json::json;

    fn session() -> Session {
        Session {
            uid: "u1".into(),
            email: "max@example.com".into(),
            id_token: "token".into(),
        }
    }

    fn setup() -> (PortfolioService, Arc<MemoryStore>, Arc<MemoryBlobStore>, Arc<UploadStaging>) {
        let store = Arc::new(MemoryStore::new());
        store.insert(
            collections::COMPANIES,
            "u1",
            json!({"portfolio": [{"bogus": true}]}).as_object().cloned().unwrap(),
        );
        let blobs = Arc::new(MemoryBlobStore::new());
        let staging = Arc::new(UploadStaging::new(Arc::new(PreviewRegistry::new())));
        let service = PortfolioService::new(store.clone(), blobs.clone(), staging.clone());
        (service, store, blobs, staging)
    }

    #[tokio::test]
    async fn add_with_image_then_remove() {
        let (service, _store, blobs, staging) = setup();
        staging
            .stage(
                &StagingOwner::User("u1".into()),
                FileSlot::PortfolioImage,
                PendingFile::new("bad.jpg", "image/jpeg", Bytes::from_static(b"jpg")),
            )
            .unwrap();

        let item = service
            .add(
                &session(),
                NewPortfolioItem {
                    title: " Badsanierung ".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(item.title, "Badsanierung");
        assert!(item.image_path.as_deref().unwrap().starts_with("portfolio/u1/"));
        assert_eq!(service.list("u1").await.unwrap(), vec![item.clone()]);
        assert_eq!(service.list_files(&session()).await.unwrap().len(), 1);

        service.remove(&session(), &item.id).await.unwrap();
        assert!(service.list("u1").await.unwrap().is_empty());
        assert!(blobs.is_empty());
    }

    #[tokio::test]
    async fn empty_title_is_rejected() {
        let (service, store, _, _) = setup();
        let err = service
            .add(&session(), NewPortfolioItem::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(store.writes().is_empty());
    }
}
