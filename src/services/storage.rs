// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Blob storage for profile pictures, banners and portfolio images.
//!
//! Uploads go through the Firebase Storage REST API with the caller's ID
//! token, so the bucket's security rules apply exactly as they would for
//! a browser upload.

use crate::error::AppError;
use crate::models::files::{PendingFile, StoredObject};
use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::future::try_join_all;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};

const STORAGE_API_URL: &str = "https://firebasestorage.googleapis.com/v0/b";

/// `profilePictures/{uid}/profile_picture_{ts}_{name}`
pub fn profile_picture_path(uid: &str, timestamp_ms: i64, file: &PendingFile) -> String {
    format!(
        "profilePictures/{uid}/profile_picture_{timestamp_ms}_{}",
        file.safe_name()
    )
}

/// `profileBanners/{uid}/banner_{ts}_{name}`
pub fn banner_path(uid: &str, timestamp_ms: i64, file: &PendingFile) -> String {
    format!("profileBanners/{uid}/banner_{timestamp_ms}_{}", file.safe_name())
}

/// `portfolio/{uid}/{ts}_{name}`
pub fn portfolio_path(uid: &str, timestamp_ms: i64, file: &PendingFile) -> String {
    format!("portfolio/{uid}/{timestamp_ms}_{}", file.safe_name())
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `file` at `path` and return its download URL.
    async fn upload(
        &self,
        path: &str,
        file: &PendingFile,
        id_token: &str,
    ) -> Result<StoredObject, AppError>;

    /// Objects whose path starts with `prefix`.
    async fn list(&self, prefix: &str, id_token: &str) -> Result<Vec<StoredObject>, AppError>;

    async fn delete(&self, path: &str, id_token: &str) -> Result<(), AppError>;
}

/// Firebase Storage REST client.
#[derive(Clone)]
pub struct FirebaseStorageClient {
    http: reqwest::Client,
    base_url: String,
    bucket: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMetadata {
    name: String,
    #[serde(default)]
    download_tokens: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ListResponse {
    #[serde(default)]
    items: Vec<ObjectMetadata>,
}

impl FirebaseStorageClient {
    pub fn new(bucket: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: STORAGE_API_URL.to_string(),
            bucket,
        }
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/{}/o/{}",
            self.base_url,
            self.bucket,
            urlencoding::encode(path)
        )
    }

    fn download_url(&self, meta: &ObjectMetadata) -> String {
        let mut url = format!("{}?alt=media", self.object_url(&meta.name));
        // Several tokens may be present; any one of them grants access.
        if let Some(token) = meta
            .download_tokens
            .as_deref()
            .and_then(|t| t.split(',').next())
        {
            url.push_str("&token=");
            url.push_str(token);
        }
        url
    }

    async fn metadata(&self, path: &str, id_token: &str) -> Result<ObjectMetadata, AppError> {
        let response = self
            .http
            .get(self.object_url(path))
            .header("Authorization", format!("Firebase {id_token}"))
            .send()
            .await
            .map_err(|e| AppError::Upload(format!("Storage request failed: {e}")))?;
        check_response_json(response).await
    }
}

async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, AppError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status.as_u16() == 404 {
            return Err(AppError::NotFound(body));
        }
        return Err(AppError::Upload(format!("HTTP {status}: {body}")));
    }
    response
        .json()
        .await
        .map_err(|e| AppError::Upload(format!("JSON parse error: {e}")))
}

#[async_trait]
impl BlobStore for FirebaseStorageClient {
    async fn upload(
        &self,
        path: &str,
        file: &PendingFile,
        id_token: &str,
    ) -> Result<StoredObject, AppError> {
        let url = format!("{}/{}/o", self.base_url, self.bucket);
        let response = self
            .http
            .post(&url)
            .query(&[("name", path)])
            .header("Authorization", format!("Firebase {id_token}"))
            .header("Content-Type", file.content_type.as_str())
            .body(file.bytes.clone())
            .send()
            .await
            .map_err(|e| AppError::Upload(format!("Storage upload failed: {e}")))?;

        let meta: ObjectMetadata = check_response_json(response).await?;
        tracing::debug!(path = %meta.name, bytes = file.len(), "Blob uploaded");

        Ok(StoredObject {
            download_url: self.download_url(&meta),
            path: meta.name,
        })
    }

    async fn list(&self, prefix: &str, id_token: &str) -> Result<Vec<StoredObject>, AppError> {
        let url = format!("{}/{}/o", self.base_url, self.bucket);
        let response = self
            .http
            .get(&url)
            .query(&[("prefix", prefix)])
            .header("Authorization", format!("Firebase {id_token}"))
            .send()
            .await
            .map_err(|e| AppError::Upload(format!("Storage list failed: {e}")))?;
        let listing: ListResponse = check_response_json(response).await?;

        // Listing omits download tokens; fetch metadata per object.
        try_join_all(listing.items.iter().map(|item| async move {
            let meta = self.metadata(&item.name, id_token).await?;
            Ok::<_, AppError>(StoredObject {
                download_url: self.download_url(&meta),
                path: meta.name,
            })
        }))
        .await
    }

    async fn delete(&self, path: &str, id_token: &str) -> Result<(), AppError> {
        let response = self
            .http
            .delete(self.object_url(path))
            .header("Authorization", format!("Firebase {id_token}"))
            .send()
            .await
            .map_err(|e| AppError::Upload(format!("Storage delete failed: {e}")))?;

        if response.status().is_success() || response.status().as_u16() == 404 {
            return Ok(());
        }
        Err(AppError::Upload(format!(
            "Storage delete returned {}",
            response.status()
        )))
    }
}

/// In-memory blob store for offline mode and tests.
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: DashMap<String, PendingFile>,
    failing: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent upload fail.
    pub fn fail_uploads(&self, fail: bool) {
        self.failing.store(fail, Ordering::SeqCst);
    }

    pub fn contains(&self, path: &str) -> bool {
        self.objects.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn url_for(path: &str) -> String {
        format!("memory://{path}")
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(
        &self,
        path: &str,
        file: &PendingFile,
        _id_token: &str,
    ) -> Result<StoredObject, AppError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Upload(format!("simulated upload failure for {path}")));
        }
        self.objects.insert(path.to_string(), file.clone());
        Ok(StoredObject {
            path: path.to_string(),
            download_url: Self::url_for(path),
        })
    }

    async fn list(&self, prefix: &str, _id_token: &str) -> Result<Vec<StoredObject>, AppError> {
        let mut objects: Vec<StoredObject> = self
            .objects
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| StoredObject {
                path: entry.key().clone(),
                download_url: Self::url_for(entry.key()),
            })
            .collect();
        objects.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(objects)
    }

    async fn delete(&self, path: &str, _id_token: &str) -> Result<(), AppError> {
        self.objects.remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;

    fn file(name: &str) -> PendingFile {
        PendingFile::new(name, "image/jpeg", Bytes::from_static(b"jpg"))
    }

    #[test]
    fn object_paths() {
        assert_eq!(
            profile_picture_path("u1", 1700000000000, &file("me.jpg")),
            "profilePictures/u1/profile_picture_1700000000000_me.jpg"
        );
        assert_eq!(
            portfolio_path("u1", 5, &file("a b.png")),
            "portfolio/u1/5_a_b.png"
        );
    }

    #[test]
    fn download_url_uses_first_token() {
        let client = FirebaseStorageClient::new("bucket".into());
        let meta = ObjectMetadata {
            name: "portfolio/u1/x.png".into(),
            download_tokens: Some("t1,t2".into()),
        };
        assert_eq!(
            client.download_url(&meta),
            "https://firebasestorage.googleapis.com/v0/b/bucket/o/portfolio%2Fu1%2Fx.png?alt=media&token=t1"
        );
    }

    #[tokio::test]
    async fn memory_store_lists_by_prefix() {
        let store = MemoryBlobStore::new();
        store.upload("portfolio/u1/a", &file("a"), "t").await.unwrap();
        store.upload("portfolio/u2/b", &file("b"), "t").await.unwrap();
        let listed = store.list("portfolio/u1/", "t").await.unwrap();
        assert_eq!(listed.len(), 1);
        store.delete("portfolio/u1/a", "t").await.unwrap();
        assert!(!store.contains("portfolio/u1/a"));
    }
}
