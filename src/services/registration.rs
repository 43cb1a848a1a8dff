// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Company registration: wizard drafts and the commit sequence.
//!
//! A draft collects wizard data and staged files across screens. Submit
//! validates everything locally, then runs the commit steps strictly in
//! order:
//!
//! 1. resolve or create the identity
//! 2. look up the client IP (non-fatal)
//! 3. upload compliance documents to the payments relay, concurrently
//! 4. merge-write `users/{uid}`
//! 5. read `users/{uid}` back
//! 6. merge-write `companies/{uid}`
//! 7. provision the payments account
//! 8. record the provisioning result on `users/{uid}`
//!
//! Nothing is rolled back on failure. The last completed step is kept on
//! the draft and persisted to `registration_progress/{uid}`; a resubmit
//! starts again from step 1.

use crate::db::{collections, Document, DocumentStore, FieldPatch};
use crate::error::AppError;
use crate::models::files::{FileSlot, PendingFile, UploadedDocuments};
use crate::models::profile::{
    BankStep, CompanyStep, ComplianceStep, PersonalStep, ProfileForm, CATEGORY_PLACEHOLDER,
    USER_TYPE_COMPANY,
};
use crate::models::provisioning::ProvisioningRequest;
use crate::models::registration::{
    OwnershipDetails, RegistrationForm, RegistrationMeta, RegistrationOutcome,
    RegistrationProgress, RegistrationStep,
};
use crate::services::functions::{is_usable_ip, RemoteFunctions, IP_NOT_DETERMINED};
use crate::services::identity::{IdentityProvider, Session};
use crate::services::normalizer::{self, number_value, SplitInputs};
use crate::services::payments::{partition_uploads, upload_all, PaymentsGateway};
use crate::services::state::StateCell;
use crate::services::taxonomy::{find_category_by_subcategory, mcc_for_industry};
use crate::services::uploads::{StagingOwner, UploadStaging};
use crate::services::validation::{normalize_phone_number, validate, LegalForm};
use crate::time_utils::now_rfc3339;
use dashmap::DashMap;
use ring::rand::{SecureRandom, SystemRandom};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Slots uploaded during commit, with whether each is required.
const COMMIT_UPLOADS: [(FileSlot, bool); 5] = [
    (FileSlot::ProfilePicture, true),
    (FileSlot::BusinessLicense, true),
    (FileSlot::IdentityFront, true),
    (FileSlot::IdentityBack, true),
    (FileSlot::MasterCraftsmanCertificate, false),
];

// ─── Drafts ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct DraftState {
    id: String,
    form: RegistrationForm,
    files: HashMap<FileSlot, String>,
    progress: RegistrationProgress,
    /// Last change made through the wizard or the commit.
    touched: Instant,
}

/// What a wizard screen sees of a draft. The password is never included.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSnapshot {
    pub id: String,
    pub form: RegistrationForm,
    /// Preview URL per staged slot.
    pub files: HashMap<FileSlot, String>,
    pub progress: RegistrationProgress,
}

impl From<&DraftState> for DraftSnapshot {
    fn from(state: &DraftState) -> Self {
        let mut form = state.form.clone();
        form.password = None;
        Self {
            id: state.id.clone(),
            form,
            files: state.files.clone(),
            progress: state.progress.clone(),
        }
    }
}

/// In-process registration drafts, keyed by an unguessable id.
///
/// A draft untouched for longer than the TTL is evicted together with its
/// staged files. Eviction runs on every [`create`](Self::create) and from
/// the periodic sweep started by the server.
pub struct RegistrationDrafts {
    drafts: DashMap<String, Arc<StateCell<DraftState>>>,
    staging: Arc<UploadStaging>,
    rng: SystemRandom,
    ttl: Duration,
}

impl RegistrationDrafts {
    pub fn new(staging: Arc<UploadStaging>, ttl: Duration) -> Self {
        Self {
            drafts: DashMap::new(),
            staging,
            rng: SystemRandom::new(),
            ttl,
        }
    }

    /// Modify a draft and mark it as recently used.
    fn touch(cell: &StateCell<DraftState>, f: impl FnOnce(&mut DraftState)) {
        cell.update(|state| {
            f(state);
            state.touched = Instant::now();
        });
    }

    /// Number of live drafts.
    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }

    /// Drop every idle draft untouched for at least the TTL. Drafts with a
    /// commit in flight are kept. Returns the number evicted.
    pub fn evict_stale(&self) -> usize {
        let stale: Vec<String> = self
            .drafts
            .iter()
            .filter(|entry| {
                let state = entry.value().snapshot();
                !state.progress.in_flight && state.touched.elapsed() >= self.ttl
            })
            .map(|entry| entry.key().clone())
            .collect();

        let evicted = stale.iter().filter(|id| self.remove(id)).count();
        if evicted > 0 {
            tracing::info!(evicted, remaining = self.drafts.len(), "Evicted stale registration drafts");
        }
        evicted
    }

    fn cell(&self, id: &str) -> Result<Arc<StateCell<DraftState>>, AppError> {
        self.drafts
            .get(id)
            .map(|c| c.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("registration draft {id}")))
    }

    fn ensure_idle(cell: &StateCell<DraftState>) -> Result<(), AppError> {
        if cell.snapshot().progress.in_flight {
            return Err(AppError::Conflict(
                "Registrierung wird bereits verarbeitet".to_string(),
            ));
        }
        Ok(())
    }

    pub fn create(&self, initial: RegistrationForm) -> Result<DraftSnapshot, AppError> {
        let mut bytes = [0u8; 16];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| anyhow::anyhow!("system random source failed"))?;
        let id = hex::encode(bytes);

        self.evict_stale();

        let state = DraftState {
            id: id.clone(),
            form: initial,
            files: HashMap::new(),
            progress: RegistrationProgress::default(),
            touched: Instant::now(),
        };
        let snapshot = DraftSnapshot::from(&state);
        self.drafts.insert(id.clone(), Arc::new(StateCell::new(state)));
        tracing::debug!(draft_id = %id, "Registration draft created");
        Ok(snapshot)
    }

    /// Shallow-merge `partial` (camelCase wizard fields) into the draft.
    pub fn update(&self, id: &str, partial: Value) -> Result<DraftSnapshot, AppError> {
        let cell = self.cell(id)?;
        Self::ensure_idle(&cell)?;
        let Value::Object(partial) = partial else {
            return Err(AppError::BadRequest("expected a JSON object".to_string()));
        };

        let current = cell.snapshot();
        let mut merged = match serde_json::to_value(&current.form) {
            Ok(Value::Object(map)) => map,
            _ => Document::new(),
        };
        merged.extend(partial);
        let form: RegistrationForm = serde_json::from_value(Value::Object(merged))
            .map_err(|e| AppError::BadRequest(format!("invalid registration data: {e}")))?;

        Self::touch(&cell, |state| state.form = form);
        Ok(DraftSnapshot::from(&cell.snapshot()))
    }

    pub fn stage_file(
        &self,
        id: &str,
        slot: FileSlot,
        file: PendingFile,
    ) -> Result<DraftSnapshot, AppError> {
        let cell = self.cell(id)?;
        Self::ensure_idle(&cell)?;
        let url = self
            .staging
            .stage(&StagingOwner::Draft(id.to_string()), slot, file)?;
        Self::touch(&cell, |state| {
            state.files.insert(slot, url);
        });
        Ok(DraftSnapshot::from(&cell.snapshot()))
    }

    pub fn clear_file(&self, id: &str, slot: FileSlot) -> Result<DraftSnapshot, AppError> {
        let cell = self.cell(id)?;
        Self::ensure_idle(&cell)?;
        self.staging.clear(&StagingOwner::Draft(id.to_string()), slot);
        Self::touch(&cell, |state| {
            state.files.remove(&slot);
        });
        Ok(DraftSnapshot::from(&cell.snapshot()))
    }

    pub fn snapshot(&self, id: &str) -> Result<DraftSnapshot, AppError> {
        Ok(DraftSnapshot::from(&self.cell(id)?.snapshot()))
    }

    /// Receiver notified on every change of the draft.
    pub fn subscribe(&self, id: &str) -> Result<DraftWatch, AppError> {
        Ok(DraftWatch {
            rx: self.cell(id)?.subscribe(),
        })
    }

    /// Drop the draft and release its staged files.
    pub fn remove(&self, id: &str) -> bool {
        self.staging.clear_owner(&StagingOwner::Draft(id.to_string()));
        self.drafts.remove(id).is_some()
    }

    fn progress(&self, id: &str, f: impl FnOnce(&mut RegistrationProgress)) {
        if let Ok(cell) = self.cell(id) {
            Self::touch(&cell, |state| {
                f(&mut state.progress);
                state.progress.updated_at = now_rfc3339();
            });
        }
    }
}

/// Change feed of one draft.
pub struct DraftWatch {
    rx: watch::Receiver<DraftState>,
}

impl DraftWatch {
    pub fn snapshot(&self) -> DraftSnapshot {
        DraftSnapshot::from(&*self.rx.borrow())
    }

    /// Wait for the next change. `None` once the draft is gone.
    pub async fn changed(&mut self) -> Option<DraftSnapshot> {
        self.rx.changed().await.ok()?;
        Some(DraftSnapshot::from(&*self.rx.borrow_and_update()))
    }
}

// ─── Commit ──────────────────────────────────────────────────

/// Runs the registration commit sequence.
#[derive(Clone)]
pub struct RegistrationService {
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    functions: Arc<dyn RemoteFunctions>,
    payments: Arc<dyn PaymentsGateway>,
    drafts: Arc<RegistrationDrafts>,
    staging: Arc<UploadStaging>,
    app_url: String,
}

impl RegistrationService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        functions: Arc<dyn RemoteFunctions>,
        payments: Arc<dyn PaymentsGateway>,
        drafts: Arc<RegistrationDrafts>,
        staging: Arc<UploadStaging>,
        app_url: String,
    ) -> Self {
        Self {
            store,
            identity,
            functions,
            payments,
            drafts,
            staging,
            app_url,
        }
    }

    pub fn drafts(&self) -> &RegistrationDrafts {
        &self.drafts
    }

    /// Validate and commit a draft.
    ///
    /// `session` is the caller's existing identity, if signed in.
    pub async fn submit(
        &self,
        draft_id: &str,
        session: Option<Session>,
        user_agent: &str,
    ) -> Result<RegistrationOutcome, AppError> {
        let cell = self.drafts.cell(draft_id)?;
        let mut started = false;
        RegistrationDrafts::touch(&cell, |state| {
            if !state.progress.in_flight {
                started = true;
                state.progress = RegistrationProgress {
                    in_flight: true,
                    ..RegistrationProgress::default()
                };
            }
        });
        if !started {
            return Err(AppError::Conflict(
                "Registrierung wird bereits verarbeitet".to_string(),
            ));
        }

        let form = cell.snapshot().form;
        let files = self
            .staging
            .files(&StagingOwner::Draft(draft_id.to_string()));

        let mut run = CommitRun {
            service: self,
            draft_id,
            uid: None,
        };
        let result = run.execute(&form, &files, session, user_agent).await;

        let error = result.as_ref().err().map(|e| e.to_string());
        self.drafts.progress(draft_id, |p| {
            p.in_flight = false;
            p.error = error.clone();
        });
        run.persist_progress().await;

        match &result {
            Ok(outcome) => {
                self.drafts.remove(draft_id);
                tracing::info!(uid = %outcome.uid, draft_id, "Registration completed");
            }
            Err(e) => {
                tracing::warn!(draft_id, uid = ?run.uid, error = %e, "Registration stopped");
            }
        }
        result
    }
}

/// State of one submit attempt.
struct CommitRun<'a> {
    service: &'a RegistrationService,
    draft_id: &'a str,
    uid: Option<String>,
}

impl CommitRun<'_> {
    async fn advance(&self, step: RegistrationStep) {
        self.service.drafts.progress(self.draft_id, |p| {
            p.last_completed = step;
            p.uid = self.uid.clone();
        });
        tracing::debug!(draft_id = self.draft_id, step = ?step, "Registration step completed");
        self.persist_progress().await;
    }

    /// Best effort; the marker is informational.
    async fn persist_progress(&self) {
        let Some(uid) = &self.uid else {
            return;
        };
        let Ok(progress) = self.service.drafts.snapshot(self.draft_id).map(|s| s.progress) else {
            return;
        };
        let mut patch = match serde_json::to_value(&progress) {
            Ok(Value::Object(doc)) => FieldPatch::from_document(&doc),
            _ => return,
        };
        patch.set("draftId", self.draft_id);
        if let Err(e) = self
            .service
            .store
            .set_merge(collections::REGISTRATION_PROGRESS, uid, &patch)
            .await
        {
            tracing::warn!(uid = %uid, error = %e, "Failed to persist registration progress");
        }
    }

    async fn execute(
        &mut self,
        form: &RegistrationForm,
        files: &HashMap<FileSlot, PendingFile>,
        session: Option<Session>,
        user_agent: &str,
    ) -> Result<RegistrationOutcome, AppError> {
        let svc = self.service;

        validate(form, files, session.is_some())?;
        self.advance(RegistrationStep::Validated).await;

        // 1. Identity
        let session = match session {
            Some(session) => session,
            None => {
                let password = form.password.as_deref().unwrap_or_default();
                svc.identity.sign_up(form.email.trim(), password).await?
            }
        };
        let uid = session.uid.clone();
        self.uid = Some(uid.clone());
        self.advance(RegistrationStep::IdentityResolved).await;

        // 2. Client IP
        let client_ip = match svc.functions.client_ip(&session.id_token).await {
            Ok(ip) if is_usable_ip(&ip) => ip,
            Ok(ip) => {
                tracing::warn!(uid = %uid, ip = %ip, "Client IP not usable");
                IP_NOT_DETERMINED.to_string()
            }
            Err(e) => {
                tracing::warn!(uid = %uid, error = %e, "Client IP lookup failed");
                IP_NOT_DETERMINED.to_string()
            }
        };
        self.advance(RegistrationStep::ClientIpResolved).await;

        // 3. Documents
        let documents = self.upload_documents(files, &uid, &session.id_token).await?;
        self.advance(RegistrationStep::DocumentsUploaded).await;

        // 4. users/{uid}
        let now = now_rfc3339();
        let profile = registration_profile(form, &uid);
        let inputs = SplitInputs {
            now: now.clone(),
            profile_picture_url: documents
                .get(&FileSlot::ProfilePicture)
                .and_then(|d| d.firebase_storage_url.clone()),
            banner_url: None,
            documents: documents.clone(),
            registration: Some(RegistrationMeta {
                uid: uid.clone(),
                client_ip: client_ip.clone(),
                user_agent: user_agent.to_string(),
                app_url: svc.app_url.clone(),
                ownership: OwnershipDetails::from(form),
            }),
            ..SplitInputs::default()
        };
        let payloads = normalizer::split(&profile, &inputs);

        svc.store
            .set_merge(collections::USERS, &uid, payloads.user.fields())
            .await
            .map_err(|e| AppError::UserUpdateFailed(e.to_string()))?;
        self.advance(RegistrationStep::UserRecordWritten).await;

        // 5. Read back
        if svc.store.get(collections::USERS, &uid).await?.is_none() {
            return Err(AppError::DocumentNotFoundAfterWrite(format!("users/{uid}")));
        }
        self.advance(RegistrationStep::UserRecordConfirmed).await;

        // 6. companies/{uid}
        if let Some(company) = &payloads.company {
            svc.store
                .set_merge(collections::COMPANIES, &uid, company.fields())
                .await
                .map_err(|e| AppError::CompanyUpdateFailed(e.to_string()))?;
        }
        self.advance(RegistrationStep::CompanyRecordWritten).await;

        // 7. Provisioning
        let request = provisioning_request(form, &profile, &uid, &client_ip, &documents);
        let result = match svc.functions.create_account(&request, &session.id_token).await {
            Ok(result) if result.success && result.account_id.is_some() => result,
            Ok(result) => {
                let message = result
                    .message
                    .clone()
                    .unwrap_or_else(|| "Unbekannter Fehler.".to_string());
                return Err(self
                    .provisioning_pending(&uid, message, result.missing_fields, &now)
                    .await);
            }
            Err(e) => {
                return Err(self
                    .provisioning_pending(&uid, e.to_string(), Vec::new(), &now)
                    .await);
            }
        };
        self.advance(RegistrationStep::AccountProvisioned).await;

        // 8. Record result
        let patch = normalizer::provisioning_patch(&result, &now_rfc3339());
        svc.store
            .update(collections::USERS, &uid, patch.fields())
            .await?;
        self.advance(RegistrationStep::Completed).await;

        Ok(RegistrationOutcome {
            stripe_account_id: result.account_id.unwrap_or_default(),
            details_submitted: result.details_submitted.unwrap_or(false),
            redirect_to: format!("/dashboard/company/{uid}"),
            uid,
        })
    }

    async fn upload_documents(
        &self,
        files: &HashMap<FileSlot, PendingFile>,
        uid: &str,
        id_token: &str,
    ) -> Result<UploadedDocuments, AppError> {
        let batch: Vec<_> = COMMIT_UPLOADS
            .iter()
            .filter_map(|(slot, _)| {
                let file = files.get(slot)?;
                let purpose = slot.registration_purpose()?;
                Some((*slot, file, purpose))
            })
            .collect();

        let results = upload_all(self.service.payments.as_ref(), batch, uid, id_token).await;
        let (uploaded, failed) = partition_uploads(results);

        let fatal: Vec<&str> = failed
            .iter()
            .filter(|slot| COMMIT_UPLOADS.iter().any(|(s, required)| s == *slot && *required))
            .map(|slot| slot.label())
            .collect();
        if !fatal.is_empty() {
            return Err(AppError::Upload(format!(
                "Folgende Dateien konnten nicht hochgeladen werden: {}",
                fatal.join(", ")
            )));
        }
        Ok(uploaded)
    }

    async fn provisioning_pending(
        &self,
        uid: &str,
        message: String,
        missing_fields: Vec<String>,
        now: &str,
    ) -> AppError {
        let patch = normalizer::provisioning_pending_patch(&message, &missing_fields, now);
        if let Err(e) = self
            .service
            .store
            .set_merge(collections::USERS, uid, patch.fields())
            .await
        {
            tracing::warn!(uid = %uid, error = %e, "Failed to record pending provisioning");
        }
        AppError::ProvisioningPending {
            message,
            missing_fields,
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Industry chosen in the wizard: the category, else the subcategory's category.
fn registration_industry(form: &RegistrationForm) -> String {
    form.selected_category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty() && *c != CATEGORY_PLACEHOLDER)
        .or_else(|| {
            form.selected_subcategory
                .as_deref()
                .and_then(find_category_by_subcategory)
        })
        .unwrap_or_default()
        .to_string()
}

/// View-model of a freshly registered company.
pub fn registration_profile(form: &RegistrationForm, uid: &str) -> ProfileForm {
    let personal_country = form
        .personal_country
        .as_deref()
        .and_then(non_empty)
        .unwrap_or_else(|| "DE".to_string());
    let company_country = form
        .company_country
        .as_deref()
        .and_then(non_empty)
        .unwrap_or_else(|| "DE".to_string());
    let industry = registration_industry(form);

    ProfileForm {
        uid: uid.to_string(),
        email: form.email.trim().to_string(),
        user_type: USER_TYPE_COMPANY.to_string(),
        step1: PersonalStep {
            first_name: form.first_name.trim().to_string(),
            last_name: form.last_name.trim().to_string(),
            email: form.email.trim().to_string(),
            phone_number: normalize_phone_number(&form.phone_number, Some(&personal_country)),
            date_of_birth: form.date_of_birth.clone(),
            personal_street: form.personal_street.trim().to_string(),
            personal_house_number: form.personal_house_number.trim().to_string(),
            personal_postal_code: form.personal_postal_code.trim().to_string(),
            personal_city: form.personal_city.trim().to_string(),
            personal_country: personal_country.clone(),
            is_managing_director_owner: form.is_managing_director_owner.unwrap_or(true),
        },
        step2: CompanyStep {
            company_name: form.company_name.trim().to_string(),
            company_phone_number: normalize_phone_number(
                &form.company_phone_number,
                Some(&company_country),
            ),
            legal_form: form.legal_form.as_deref().and_then(non_empty),
            address: form.company_address_line(),
            street: form.company_street.trim().to_string(),
            house_number: form.company_house_number.trim().to_string(),
            postal_code: form.company_postal_code.trim().to_string(),
            city: form.company_city.trim().to_string(),
            country: company_country.clone(),
            website: form.company_website.trim().to_string(),
            description: form.description.trim().to_string(),
            industry_mcc: mcc_for_industry(Some(industry.as_str())).to_string(),
            industry,
            ..CompanyStep::default()
        },
        step3: ComplianceStep {
            hourly_rate: number_value(form.hourly_rate_value()).to_string(),
            tax_number: form.tax_number.trim().to_string(),
            vat_id: form.vat_id.trim().to_string(),
            company_register: form.company_register.trim().to_string(),
            ..ComplianceStep::default()
        },
        step4: BankStep {
            account_holder: form.account_holder.trim().to_string(),
            iban: form.iban.split_whitespace().collect::<String>().to_uppercase(),
            bic: form.bic.trim().to_uppercase(),
            bank_name: form.bank_name.trim().to_string(),
            bank_country: Some(company_country),
        },
        lat: form.lat,
        lng: form.lng,
        radius_km: form.radius_km.unwrap_or(30.0),
        selected_category: None,
        selected_subcategory: form.selected_subcategory.as_deref().and_then(non_empty),
        ..ProfileForm::default()
    }
}

/// Payload for the provisioning function.
///
/// Sole proprietors and freelancers have no separate business address, so
/// their personal address fields carry the company address.
pub fn provisioning_request(
    form: &RegistrationForm,
    profile: &ProfileForm,
    uid: &str,
    client_ip: &str,
    documents: &UploadedDocuments,
) -> ProvisioningRequest {
    let file_id = |slot: FileSlot| {
        documents
            .get(&slot)
            .map(|d| d.stripe_file_id.clone())
            .unwrap_or_default()
    };
    let file_url = |slot: FileSlot| documents.get(&slot).and_then(|d| d.firebase_storage_url.clone());
    let ownership = OwnershipDetails::from(form);
    let step1 = &profile.step1;
    let step2 = &profile.step2;
    let individual = LegalForm::classify(step2.legal_form.as_deref()).is_individual();

    let (street, house_number, postal_code, city, country) = if individual {
        (
            step2.street.clone(),
            step2.house_number.clone(),
            step2.postal_code.clone(),
            step2.city.clone(),
            step2.country.clone(),
        )
    } else {
        (
            step1.personal_street.clone(),
            step1.personal_house_number.clone(),
            step1.personal_postal_code.clone(),
            step1.personal_city.clone(),
            step1.personal_country.clone(),
        )
    };

    ProvisioningRequest {
        user_id: uid.to_string(),
        client_ip: client_ip.to_string(),
        first_name: step1.first_name.clone(),
        last_name: step1.last_name.clone(),
        email: step1.email.clone(),
        phone_number: non_empty(&step1.phone_number),
        date_of_birth: non_empty(&step1.date_of_birth),
        personal_street: non_empty(&street),
        personal_house_number: non_empty(&house_number),
        personal_postal_code: non_empty(&postal_code),
        personal_city: non_empty(&city),
        personal_country: non_empty(&country),
        is_managing_director_owner: step1.is_managing_director_owner,
        ownership_percentage: ownership.ownership_percentage,
        is_actual_director: ownership.is_actual_director,
        is_actual_owner: ownership.is_actual_owner,
        actual_ownership_percentage: ownership.actual_ownership_percentage,
        is_actual_executive: ownership.is_actual_executive,
        actual_representative_title: ownership.actual_representative_title,
        company_name: step2.company_name.clone(),
        legal_form: step2.legal_form.clone(),
        company_address_line1: step2.address.clone(),
        company_city: step2.city.clone(),
        company_postal_code: step2.postal_code.clone(),
        company_country: non_empty(&step2.country),
        company_phone_number: non_empty(&step2.company_phone_number),
        company_website: non_empty(&step2.website),
        company_register: non_empty(&profile.step3.company_register),
        tax_number: non_empty(&profile.step3.tax_number),
        vat_id: non_empty(&profile.step3.vat_id),
        mcc: step2.industry_mcc.clone(),
        iban: profile.step4.iban.clone(),
        account_holder: profile.step4.account_holder.clone(),
        bic: profile.step4.bic.clone(),
        bank_name: profile.step4.bank_name.clone(),
        profile_picture_file_id: file_id(FileSlot::ProfilePicture),
        business_license_file_id: file_id(FileSlot::BusinessLicense),
        master_craftsman_certificate_file_id: documents
            .get(&FileSlot::MasterCraftsmanCertificate)
            .map(|d| d.stripe_file_id.clone()),
        identity_front_file_id: file_id(FileSlot::IdentityFront),
        identity_back_file_id: file_id(FileSlot::IdentityBack),
        profile_picture_url: file_url(FileSlot::ProfilePicture),
        business_license_url: file_url(FileSlot::BusinessLicense),
        master_craftsman_certificate_url: file_url(FileSlot::MasterCraftsmanCertificate),
        identity_front_url: file_url(FileSlot::IdentityFront),
        identity_back_url: file_url(FileSlot::IdentityBack),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::uploads::PreviewRegistry;
    use axum::body::Bytes;
    use serde_json::json;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn staging() -> Arc<UploadStaging> {
        Arc::new(UploadStaging::new(Arc::new(PreviewRegistry::new())))
    }

    fn drafts() -> RegistrationDrafts {
        RegistrationDrafts::new(staging(), DAY)
    }

    fn id_photo() -> PendingFile {
        PendingFile::new("id.jpg", "image/jpeg", Bytes::from_static(b"id"))
    }

    #[test]
    fn update_merges_partial_fields() {
        let drafts = drafts();
        let draft = drafts.create(RegistrationForm::default()).unwrap();
        drafts
            .update(&draft.id, json!({"firstName": "Max", "companyName": "Acme"}))
            .unwrap();
        let snapshot = drafts
            .update(&draft.id, json!({"companyName": "Acme GmbH", "password": "secret12"}))
            .unwrap();
        assert_eq!(snapshot.form.first_name, "Max");
        assert_eq!(snapshot.form.company_name, "Acme GmbH");
        assert_eq!(snapshot.form.password, None);
    }

    #[test]
    fn update_rejects_wrong_types() {
        let drafts = drafts();
        let draft = drafts.create(RegistrationForm::default()).unwrap();
        assert!(matches!(
            drafts.update(&draft.id, json!({"lat": "north"})),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            drafts.update("missing", json!({})),
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn subscribers_see_staged_files() {
        let drafts = drafts();
        let draft = drafts.create(RegistrationForm::default()).unwrap();
        let mut watch = drafts.subscribe(&draft.id).unwrap();
        drafts
            .stage_file(&draft.id, FileSlot::IdentityFront, id_photo())
            .unwrap();
        let seen = watch.changed().await.unwrap();
        assert!(seen.files.contains_key(&FileSlot::IdentityFront));

        drafts.clear_file(&draft.id, FileSlot::IdentityFront).unwrap();
        assert!(drafts.snapshot(&draft.id).unwrap().files.is_empty());
    }

    #[test]
    fn stale_drafts_are_evicted_with_their_files() {
        let staging = staging();
        let drafts = RegistrationDrafts::new(staging.clone(), Duration::ZERO);
        let draft = drafts.create(RegistrationForm::default()).unwrap();
        drafts
            .stage_file(&draft.id, FileSlot::IdentityFront, id_photo())
            .unwrap();
        let owner = StagingOwner::Draft(draft.id.clone());
        assert_eq!(staging.files(&owner).len(), 1);

        assert_eq!(drafts.evict_stale(), 1);
        assert!(drafts.is_empty());
        assert!(staging.files(&owner).is_empty());
        assert!(matches!(drafts.snapshot(&draft.id), Err(AppError::NotFound(_))));
    }

    #[test]
    fn recently_touched_drafts_survive_the_sweep() {
        let drafts = drafts();
        let draft = drafts.create(RegistrationForm::default()).unwrap();
        drafts.update(&draft.id, json!({"firstName": "Max"})).unwrap();
        assert_eq!(drafts.evict_stale(), 0);
        assert_eq!(drafts.snapshot(&draft.id).unwrap().form.first_name, "Max");
    }

    #[test]
    fn creating_a_draft_sweeps_abandoned_ones() {
        let drafts = RegistrationDrafts::new(staging(), Duration::ZERO);
        let abandoned = drafts.create(RegistrationForm::default()).unwrap();
        let current = drafts.create(RegistrationForm::default()).unwrap();
        assert_eq!(drafts.len(), 1);
        assert!(drafts.snapshot(&abandoned.id).is_err());
        assert!(drafts.snapshot(&current.id).is_ok());
    }

    #[test]
    fn in_flight_drafts_are_not_evicted() {
        let drafts = RegistrationDrafts::new(staging(), Duration::ZERO);
        let draft = drafts.create(RegistrationForm::default()).unwrap();
        drafts.progress(&draft.id, |p| p.in_flight = true);
        assert_eq!(drafts.evict_stale(), 0);
        drafts.progress(&draft.id, |p| p.in_flight = false);
        assert_eq!(drafts.evict_stale(), 1);
    }

    #[test]
    fn profile_from_registration() {
        let form = RegistrationForm {
            email: " max@example.com ".into(),
            first_name: "Max".into(),
            phone_number: "0171 123".into(),
            company_name: "Acme".into(),
            company_street: "Hauptstr.".into(),
            company_house_number: "5".into(),
            selected_subcategory: Some("Elektriker".into()),
            hourly_rate: "42,50".into(),
            iban: "de89 3704 0044".into(),
            ..Default::default()
        };
        let profile = registration_profile(&form, "u1");
        assert_eq!(profile.email, "max@example.com");
        assert_eq!(profile.step1.phone_number, "+49171123");
        assert_eq!(profile.step2.address, "Hauptstr. 5");
        assert_eq!(profile.step2.industry, "Handwerk");
        assert_eq!(profile.step2.industry_mcc, "1731");
        assert_eq!(profile.step3.hourly_rate, "42.5");
        assert_eq!(profile.step4.iban, "DE8937040044");
        assert!(profile.is_company());
    }

    #[test]
    fn sole_proprietor_uses_company_address_for_provisioning() {
        let form = RegistrationForm {
            legal_form: Some("Einzelunternehmen".into()),
            personal_city: "Berlin".into(),
            company_city: "Potsdam".into(),
            ..Default::default()
        };
        let profile = registration_profile(&form, "u1");
        let request = provisioning_request(&form, &profile, "u1", "1.2.3.4", &UploadedDocuments::new());
        assert_eq!(request.personal_city.as_deref(), Some("Potsdam"));
        assert_eq!(request.mcc, "5999");
    }
}
