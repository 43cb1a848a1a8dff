// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Dashboard settings: load the merged profile and split-save edits.

use crate::db::{collections, DocumentStore};
use crate::error::AppError;
use crate::models::files::{FileSlot, UploadedDocuments};
use crate::models::profile::{ProfileForm, USER_TYPE_COMPANY};
use crate::services::identity::Session;
use crate::services::normalizer::{self, SplitInputs};
use crate::services::payments::{partition_uploads, upload_all, PaymentsGateway};
use crate::services::storage::{banner_path, profile_picture_path, BlobStore};
use crate::services::uploads::{StagingOwner, UploadStaging};
use crate::time_utils::{now_millis, now_rfc3339};
use std::sync::Arc;

#[derive(Clone)]
pub struct SettingsService {
    store: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    payments: Arc<dyn PaymentsGateway>,
    staging: Arc<UploadStaging>,
}

impl SettingsService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        payments: Arc<dyn PaymentsGateway>,
        staging: Arc<UploadStaging>,
    ) -> Self {
        Self {
            store,
            blobs,
            payments,
            staging,
        }
    }

    /// Merged and normalized profile of `uid`.
    pub async fn load(&self, uid: &str) -> Result<ProfileForm, AppError> {
        let (user, company) = futures_util::try_join!(
            self.store.get(collections::USERS, uid),
            self.store.get(collections::COMPANIES, uid),
        )?;
        if user.is_none() && company.is_none() {
            return Err(AppError::NotFound(format!("profile {uid}")));
        }

        let merged = normalizer::merge_records(user.as_ref(), company.as_ref());
        let mut form = normalizer::normalize(&merged);
        if form.uid.is_empty() {
            form.uid = uid.to_string();
        }
        // Older company records never stored the discriminator.
        if form.user_type.is_empty() && company.is_some() {
            form.user_type = USER_TYPE_COMPANY.to_string();
        }
        Ok(form)
    }

    /// Upload staged files, then write `users/{uid}` and `companies/{uid}`.
    ///
    /// Upload failures abort before any record is written. A failed company
    /// write leaves the already written user record in place.
    pub async fn save(&self, session: &Session, mut form: ProfileForm) -> Result<ProfileForm, AppError> {
        let uid = session.uid.as_str();
        let owner = StagingOwner::User(uid.to_string());
        form.uid = uid.to_string();

        let (stored_user, stored_company) = futures_util::try_join!(
            self.store.get(collections::USERS, uid),
            self.store.get(collections::COMPANIES, uid),
        )?;
        let mut inputs = SplitInputs {
            now: now_rfc3339(),
            stored_user,
            stored_company,
            ..SplitInputs::default()
        };
        let mut saved_slots = Vec::new();

        if let Some(file) = self.staging.get(&owner, FileSlot::ProfilePicture) {
            let path = profile_picture_path(uid, now_millis(), &file);
            let stored = self
                .blobs
                .upload(&path, &file, &session.id_token)
                .await
                .map_err(|e| AppError::Upload(format!("Profilbild: {e}")))?;
            inputs.profile_picture_url = Some(stored.download_url);
            saved_slots.push(FileSlot::ProfilePicture);
        }

        if let Some(file) = self.staging.get(&owner, FileSlot::ProfileBanner) {
            let path = banner_path(uid, now_millis(), &file);
            let stored = self
                .blobs
                .upload(&path, &file, &session.id_token)
                .await
                .map_err(|e| AppError::Upload(format!("Bannerbild: {e}")))?;
            inputs.banner_url = Some(stored.download_url);
            saved_slots.push(FileSlot::ProfileBanner);
        }

        inputs.documents = self.upload_documents(&owner, session).await?;
        saved_slots.extend(inputs.documents.keys().copied());

        let payloads = normalizer::split(&form, &inputs);

        self.store
            .update(collections::USERS, uid, payloads.user.fields())
            .await
            .map_err(|e| AppError::UserUpdateFailed(e.to_string()))?;

        if let Some(company) = &payloads.company {
            self.store
                .update(collections::COMPANIES, uid, company.fields())
                .await
                .map_err(|e| {
                    tracing::error!(uid = %uid, error = %e, "Company record update failed after user record was written");
                    AppError::CompanyUpdateFailed(e.to_string())
                })?;
        }

        self.staging.clear_slots(&owner, saved_slots);
        tracing::info!(uid = %uid, company = payloads.company.is_some(), "Settings saved");
        self.load(uid).await
    }

    async fn upload_documents(
        &self,
        owner: &StagingOwner,
        session: &Session,
    ) -> Result<UploadedDocuments, AppError> {
        let staged: Vec<_> = FileSlot::DOCUMENTS
            .iter()
            .filter_map(|slot| Some((*slot, self.staging.get(owner, *slot)?)))
            .collect();
        if staged.is_empty() {
            return Ok(UploadedDocuments::new());
        }

        let batch = staged
            .iter()
            .filter_map(|(slot, file)| Some((*slot, file, slot.registration_purpose()?)))
            .collect();
        let results = upload_all(self.payments.as_ref(), batch, &session.uid, &session.id_token).await;
        let (uploaded, failed) = partition_uploads(results);
        if !failed.is_empty() {
            let labels: Vec<&str> = failed.iter().map(|slot| slot.label()).collect();
            return Err(AppError::Upload(format!(
                "Folgende Dateien konnten nicht hochgeladen werden: {}",
                labels.join(", ")
            )));
        }
        Ok(uploaded)
    }
}
