// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::{to_bytes, Body, Bytes};
use axum::http::{header, Request, Response};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use taskilo_api::config::Config;
use taskilo_api::db::{Document, FirestoreDb, MemoryStore};
use taskilo_api::error::AppError;
use taskilo_api::models::domain::{CustomDomain, DkimKey};
use taskilo_api::models::files::{PendingFile, UploadPurpose, UploadedDocument};
use taskilo_api::models::portfolio::{AccountBalance, PayoutReceipt};
use taskilo_api::models::provisioning::{ProvisioningRequest, ProvisioningResult};
use taskilo_api::routes::create_router;
use taskilo_api::services::id_token::mint_shared_secret_token;
use taskilo_api::services::{
    DnsVerifier, IdentityProvider, MailServer, MemoryBlobStore, PaymentsGateway, RemoteFunctions,
    Session,
};
use taskilo_api::{AppState, Collaborators};

/// Check if emulator is available via environment variable.
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

pub const TEST_PASSWORD: &str = "geheim123";

/// ID token accepted by the test configuration.
pub fn token_for(uid: &str, email: &str) -> String {
    let config = Config::test_default();
    let secret = config.id_token_shared_secret.expect("test secret");
    mint_shared_secret_token(uid, Some(email), &config.gcp_project_id, &secret)
        .expect("mint token")
}

pub fn doc(value: serde_json::Value) -> Document {
    value.as_object().cloned().expect("object")
}

// ─── Recording fakes ─────────────────────────────────────────

/// Accepts [`TEST_PASSWORD`] for every address; records sign-ups.
#[derive(Default)]
pub struct FakeIdentity {
    pub sign_ups: Mutex<Vec<String>>,
    pub password_updates: Mutex<Vec<String>>,
}

impl FakeIdentity {
    fn session(uid: &str, email: &str) -> Session {
        Session {
            uid: uid.to_string(),
            email: email.to_string(),
            id_token: token_for(uid, email),
        }
    }

    pub fn sign_up_count(&self) -> usize {
        self.sign_ups.lock().unwrap().len()
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn sign_up(&self, email: &str, _password: &str) -> Result<Session, AppError> {
        let mut sign_ups = self.sign_ups.lock().unwrap();
        sign_ups.push(email.to_string());
        Ok(Self::session(&format!("new-user-{}", sign_ups.len()), email))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AppError> {
        if password != TEST_PASSWORD {
            return Err(AppError::Identity("Falsches Passwort.".into()));
        }
        Ok(Self::session("user-1", email))
    }

    async fn update_password(
        &self,
        id_token: &str,
        _new_password: &str,
    ) -> Result<Session, AppError> {
        self.password_updates
            .lock()
            .unwrap()
            .push(id_token.to_string());
        Ok(Self::session("user-1", "max@example.com"))
    }
}

/// Records every relay upload; files whose name is listed in `failing` fail.
pub struct FakePayments {
    pub uploads: Mutex<Vec<(String, UploadPurpose)>>,
    pub failing: Mutex<HashSet<String>>,
    pub payouts: Mutex<Vec<i64>>,
    pub available: i64,
}

impl Default for FakePayments {
    fn default() -> Self {
        Self {
            uploads: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            payouts: Mutex::new(Vec::new()),
            available: 10_000,
        }
    }
}

impl FakePayments {
    pub fn fail_file(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentsGateway for FakePayments {
    async fn upload_file(
        &self,
        file: &PendingFile,
        purpose: UploadPurpose,
        _user_id: &str,
        _id_token: &str,
    ) -> Result<UploadedDocument, AppError> {
        self.uploads
            .lock()
            .unwrap()
            .push((file.name.clone(), purpose));
        if self.failing.lock().unwrap().contains(&file.name) {
            return Err(AppError::Upload(format!("relay rejected {}", file.name)));
        }
        Ok(UploadedDocument {
            stripe_file_id: format!("file_{}", file.name),
            firebase_storage_url: Some(format!("https://storage.test/{}", file.name)),
            firebase_storage_path: Some(format!("stripe-uploads/{}", file.name)),
        })
    }

    async fn balance(&self, _user_id: &str, _id_token: &str) -> Result<AccountBalance, AppError> {
        Ok(AccountBalance {
            available: self.available,
            pending: 2_500,
            currency: "eur".into(),
            source: "stripe".into(),
        })
    }

    async fn payout(
        &self,
        _user_id: &str,
        amount: i64,
        _id_token: &str,
    ) -> Result<PayoutReceipt, AppError> {
        self.payouts.lock().unwrap().push(amount);
        Ok(PayoutReceipt {
            payout_id: "po_test".into(),
            amount,
            currency: "eur".into(),
            status: Some("pending".into()),
            arrival_date: None,
        })
    }
}

/// Records provisioning requests and answers with a fixed account, or with
/// the rejection set by [`FakeFunctions::reject_provisioning`].
#[derive(Default)]
pub struct FakeFunctions {
    pub ip_lookups: Mutex<usize>,
    pub provisioning: Mutex<Vec<ProvisioningRequest>>,
    pub rejection: Mutex<Option<ProvisioningResult>>,
}

impl FakeFunctions {
    /// Answer every later provisioning call with `success: false`.
    pub fn reject_provisioning(&self, message: &str, missing_fields: &[&str]) {
        *self.rejection.lock().unwrap() = Some(ProvisioningResult {
            success: false,
            message: Some(message.to_string()),
            missing_fields: missing_fields.iter().map(|f| f.to_string()).collect(),
            ..Default::default()
        });
    }
}

#[async_trait]
impl RemoteFunctions for FakeFunctions {
    async fn client_ip(&self, _id_token: &str) -> Result<String, AppError> {
        *self.ip_lookups.lock().unwrap() += 1;
        Ok("203.0.113.7".into())
    }

    async fn create_account(
        &self,
        request: &ProvisioningRequest,
        _id_token: &str,
    ) -> Result<ProvisioningResult, AppError> {
        self.provisioning.lock().unwrap().push(request.clone());
        if let Some(rejection) = self.rejection.lock().unwrap().clone() {
            return Ok(rejection);
        }
        Ok(ProvisioningResult {
            success: true,
            account_id: Some("acct_test".into()),
            person_id: Some("person_test".into()),
            details_submitted: Some(false),
            payouts_enabled: Some(false),
            ..Default::default()
        })
    }
}

/// Serves whatever TXT records the test publishes.
#[derive(Default)]
pub struct FakeDns {
    pub records: Mutex<Vec<String>>,
}

impl FakeDns {
    pub fn publish(&self, value: &str) {
        self.records.lock().unwrap().push(value.to_string());
    }
}

#[async_trait]
impl DnsVerifier for FakeDns {
    async fn txt_records(&self, _name: &str) -> Result<Vec<String>, AppError> {
        Ok(self.records.lock().unwrap().clone())
    }
}

/// Records mail-server calls.
#[derive(Default)]
pub struct FakeMail {
    pub calls: Mutex<Vec<String>>,
}

#[async_trait]
impl MailServer for FakeMail {
    async fn add_domain(&self, domain: &CustomDomain) -> Result<(), AppError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("add_domain {}", domain.domain));
        Ok(())
    }

    async fn generate_dkim(&self, domain: &str) -> Result<DkimKey, AppError> {
        self.calls.lock().unwrap().push(format!("dkim {domain}"));
        Ok(DkimKey {
            selector: "dkim".into(),
            public_key: "v=DKIM1; k=rsa; p=MIIB".into(),
        })
    }

    async fn add_mailbox(
        &self,
        email: &str,
        _name: &str,
        _password: &str,
        _quota_mb: u32,
    ) -> Result<(), AppError> {
        self.calls.lock().unwrap().push(format!("add_mailbox {email}"));
        Ok(())
    }

    async fn delete_domain(&self, domain: &str) -> Result<(), AppError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("delete_domain {domain}"));
        Ok(())
    }
}

// ─── App ─────────────────────────────────────────────────────

/// Router plus handles on every fake behind it.
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub identity: Arc<FakeIdentity>,
    pub payments: Arc<FakePayments>,
    pub functions: Arc<FakeFunctions>,
    pub dns: Arc<FakeDns>,
    pub mail: Arc<FakeMail>,
}

/// Create a test app with in-memory store and recording fakes.
pub fn create_test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let blobs = Arc::new(MemoryBlobStore::new());
    let identity = Arc::new(FakeIdentity::default());
    let payments = Arc::new(FakePayments::default());
    let functions = Arc::new(FakeFunctions::default());
    let dns = Arc::new(FakeDns::default());
    let mail = Arc::new(FakeMail::default());

    let state = Arc::new(
        AppState::new(
            Config::test_default(),
            Collaborators {
                store: store.clone(),
                identity: identity.clone(),
                blobs: blobs.clone(),
                payments: payments.clone(),
                functions: functions.clone(),
                dns: dns.clone(),
                mail: mail.clone(),
            },
        )
        .expect("app state"),
    );

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
        blobs,
        identity,
        payments,
        functions,
        dns,
        mail,
    }
}

// ─── Requests ────────────────────────────────────────────────

pub fn json_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: serde_json::Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

const BOUNDARY: &str = "taskilo-test-boundary";

/// Multipart request carrying one `file` field.
pub fn file_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    name: &str,
    content_type: &str,
    bytes: &[u8],
) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body)).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    to_bytes(response.into_body(), usize::MAX).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).unwrap()
}
