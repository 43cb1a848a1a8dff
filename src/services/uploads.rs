// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Staged files and their preview URLs.
//!
//! A file picked in a form is held here until the form is saved. Each
//! staged file owns exactly one preview URL; replacing, clearing or
//! dropping the file releases that URL and no other.

use crate::error::AppError;
use crate::models::files::{FileSlot, PendingFile};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use dashmap::DashMap;
use ring::rand::{SecureRandom, SystemRandom};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Route prefix under which previews are served.
pub const PREVIEW_PATH_PREFIX: &str = "/previews/";

/// Creates and releases preview URLs for local files.
pub trait ObjectUrls: Send + Sync {
    fn create(&self, file: &PendingFile) -> Result<String, AppError>;

    fn revoke(&self, url: &str);
}

/// Serves staged files under unguessable `/previews/{token}` URLs.
pub struct PreviewRegistry {
    entries: DashMap<String, PendingFile>,
    rng: SystemRandom,
}

impl Default for PreviewRegistry {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            rng: SystemRandom::new(),
        }
    }
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, token: &str) -> Option<PendingFile> {
        self.entries.get(token).map(|f| f.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ObjectUrls for PreviewRegistry {
    fn create(&self, file: &PendingFile) -> Result<String, AppError> {
        let mut bytes = [0u8; 18];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| anyhow::anyhow!("system random source failed"))?;
        let token = URL_SAFE_NO_PAD.encode(bytes);
        self.entries.insert(token.clone(), file.clone());
        Ok(format!("{PREVIEW_PATH_PREFIX}{token}"))
    }

    fn revoke(&self, url: &str) {
        if let Some(token) = url.strip_prefix(PREVIEW_PATH_PREFIX) {
            self.entries.remove(token);
        }
    }
}

/// A preview URL that is revoked when dropped.
pub struct PreviewHandle {
    url: String,
    urls: Arc<dyn ObjectUrls>,
}

impl PreviewHandle {
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewHandle").field("url", &self.url).finish()
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.urls.revoke(&self.url);
    }
}

#[derive(Debug)]
struct StagedFile {
    file: PendingFile,
    preview: PreviewHandle,
}

/// Whose form a staged file belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StagingOwner {
    /// Settings or portfolio form of a signed-in user.
    User(String),
    /// Registration draft.
    Draft(String),
}

impl fmt::Display for StagingOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StagingOwner::User(uid) => write!(f, "user:{uid}"),
            StagingOwner::Draft(id) => write!(f, "draft:{id}"),
        }
    }
}

/// Files picked but not yet saved, one per owner and slot.
pub struct UploadStaging {
    slots: DashMap<(StagingOwner, FileSlot), StagedFile>,
    urls: Arc<dyn ObjectUrls>,
}

impl UploadStaging {
    pub fn new(urls: Arc<dyn ObjectUrls>) -> Self {
        Self {
            slots: DashMap::new(),
            urls,
        }
    }

    /// Stage `file`, replacing (and revoking the preview of) any previous one.
    pub fn stage(
        &self,
        owner: &StagingOwner,
        slot: FileSlot,
        file: PendingFile,
    ) -> Result<String, AppError> {
        if file.is_empty() {
            return Err(AppError::BadRequest(format!("{} ist leer", slot.label())));
        }
        if file.len() > slot.max_bytes() {
            return Err(AppError::BadRequest(format!(
                "{} ist zu groß (max. {} MB)",
                slot.label(),
                slot.max_bytes() / (1024 * 1024)
            )));
        }

        let url = self.urls.create(&file)?;
        let preview = PreviewHandle {
            url: url.clone(),
            urls: self.urls.clone(),
        };
        let previous = self
            .slots
            .insert((owner.clone(), slot), StagedFile { file, preview });
        // Revoke outside the map's shard lock.
        drop(previous);

        tracing::debug!(owner = %owner, slot = %slot, "File staged");
        Ok(url)
    }

    /// Remove the staged file of one slot. Returns whether there was one.
    pub fn clear(&self, owner: &StagingOwner, slot: FileSlot) -> bool {
        self.slots.remove(&(owner.clone(), slot)).is_some()
    }

    /// Remove every staged file of `owner`.
    pub fn clear_owner(&self, owner: &StagingOwner) {
        self.slots.retain(|(o, _), _| o != owner);
    }

    /// Remove the given slots of `owner`, e.g. after they were saved.
    pub fn clear_slots(&self, owner: &StagingOwner, slots: impl IntoIterator<Item = FileSlot>) {
        for slot in slots {
            self.clear(owner, slot);
        }
    }

    pub fn get(&self, owner: &StagingOwner, slot: FileSlot) -> Option<PendingFile> {
        self.slots
            .get(&(owner.clone(), slot))
            .map(|s| s.file.clone())
    }

    pub fn files(&self, owner: &StagingOwner) -> HashMap<FileSlot, PendingFile> {
        self.slots
            .iter()
            .filter(|entry| &entry.key().0 == owner)
            .map(|entry| (entry.key().1, entry.value().file.clone()))
            .collect()
    }

    /// Preview URL per staged slot.
    pub fn previews(&self, owner: &StagingOwner) -> HashMap<FileSlot, String> {
        self.slots
            .iter()
            .filter(|entry| &entry.key().0 == owner)
            .map(|entry| (entry.key().1, entry.value().preview.url().to_string()))
            .collect()
    }
}
