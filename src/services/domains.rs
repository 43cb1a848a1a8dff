// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Custom mail domains: ownership verification, activation on the mail
//! server and mailbox management.
//!
//! A domain moves `pending → verifying → verified → active`. Every
//! transition is triggered by its owner; nothing advances in the
//! background. A failed verification drops back to `pending`; a mail
//! server failure during activation marks the domain `failed`.

use crate::config::Config;
use crate::db::{collections, Document, DocumentStore, FieldPatch};
use crate::error::AppError;
use crate::models::domain::{
    validation_message, ActivateDomainRequest, AddDomainRequest, CreateMailboxRequest,
    CustomDomain, DkimKey, DnsRecord, DomainDetails, DomainMailbox, DomainStatus,
    DEFAULT_DOMAIN_QUOTA_MB, DEFAULT_MAILBOX_QUOTA_MB, DEFAULT_MAX_ALIASES,
    DEFAULT_MAX_MAILBOXES, DNS_RECORD_TTL, VERIFICATION_CODE_PREFIX, VERIFICATION_HOST,
};
use crate::time_utils::{now_millis, now_rfc3339};
use async_trait::async_trait;
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use validator::Validate;

/// Looks up TXT records for domain verification.
#[async_trait]
pub trait DnsVerifier: Send + Sync {
    /// TXT values published at `name`, unquoted.
    async fn txt_records(&self, name: &str) -> Result<Vec<String>, AppError>;
}

/// Admin operations on the mail server.
#[async_trait]
pub trait MailServer: Send + Sync {
    async fn add_domain(&self, domain: &CustomDomain) -> Result<(), AppError>;

    async fn generate_dkim(&self, domain: &str) -> Result<DkimKey, AppError>;

    async fn add_mailbox(
        &self,
        email: &str,
        name: &str,
        password: &str,
        quota_mb: u32,
    ) -> Result<(), AppError>;

    async fn delete_domain(&self, domain: &str) -> Result<(), AppError>;
}

/// Hosts and addresses that go into the published DNS records.
#[derive(Debug, Clone)]
pub struct DnsSettings {
    pub mail_host: String,
    pub spf_include: String,
    pub dmarc_report_address: String,
}

impl From<&Config> for DnsSettings {
    fn from(config: &Config) -> Self {
        Self {
            mail_host: config.mail_host.clone(),
            spf_include: config.spf_include.clone(),
            dmarc_report_address: config.dmarc_report_address.clone(),
        }
    }
}

/// Caller identity for ownership checks.
#[derive(Debug, Clone)]
pub struct DomainOwner {
    pub uid: String,
    pub email: String,
}

/// Result of a verification attempt that found the record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOutcome {
    pub verified: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationOutcome {
    pub domain: CustomDomain,
    pub dkim_record: Option<DnsRecord>,
    pub mailbox: Option<DomainMailbox>,
}

/// Records the owner has to publish, DKIM last when known.
pub fn dns_instructions(
    settings: &DnsSettings,
    verification_code: &str,
    dkim: Option<&DkimKey>,
) -> Vec<DnsRecord> {
    let record = |record_type: &str,
                  host: &str,
                  value: String,
                  priority: Option<u16>,
                  description: &str| DnsRecord {
        record_type: record_type.to_string(),
        host: host.to_string(),
        value,
        priority,
        ttl: DNS_RECORD_TTL,
        description: description.to_string(),
    };

    let mut records = vec![
        record(
            "TXT",
            VERIFICATION_HOST,
            verification_code.to_string(),
            None,
            "Verifizierungs-Record - Bestätigt Ihren Domain-Besitz",
        ),
        record(
            "MX",
            "@",
            settings.mail_host.clone(),
            Some(10),
            "Mail Exchange Record - Leitet E-Mails an Taskilo-Server",
        ),
        record(
            "TXT",
            "@",
            format!("v=spf1 include:{} ~all", settings.spf_include),
            None,
            "SPF Record - Verhindert E-Mail-Spoofing",
        ),
        record(
            "TXT",
            "_dmarc",
            format!(
                "v=DMARC1; p=quarantine; rua=mailto:{}",
                settings.dmarc_report_address
            ),
            None,
            "DMARC Record - E-Mail-Authentifizierung",
        ),
        record(
            "CNAME",
            "autodiscover",
            settings.mail_host.clone(),
            None,
            "Autodiscover - Automatische E-Mail-Client-Konfiguration (Outlook)",
        ),
        record(
            "CNAME",
            "autoconfig",
            settings.mail_host.clone(),
            None,
            "Autoconfig - Automatische E-Mail-Client-Konfiguration (Thunderbird)",
        ),
    ];
    if let Some(dkim) = dkim {
        records.push(dkim_record(dkim));
    }
    records
}

fn dkim_record(dkim: &DkimKey) -> DnsRecord {
    DnsRecord {
        record_type: "TXT".to_string(),
        host: format!("{}._domainkey", dkim.selector),
        value: dkim.public_key.clone(),
        priority: None,
        ttl: DNS_RECORD_TTL,
        description: "DKIM Record - Digitale Signatur für E-Mails".to_string(),
    }
}

#[derive(Clone)]
pub struct DomainService {
    store: Arc<dyn DocumentStore>,
    dns: Arc<dyn DnsVerifier>,
    mail: Arc<dyn MailServer>,
    settings: DnsSettings,
    rng: SystemRandom,
}

impl DomainService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        dns: Arc<dyn DnsVerifier>,
        mail: Arc<dyn MailServer>,
        settings: DnsSettings,
    ) -> Self {
        Self {
            store,
            dns,
            mail,
            settings,
            rng: SystemRandom::new(),
        }
    }

    fn random_hex(&self, len: usize) -> Result<String, AppError> {
        let mut bytes = vec![0u8; len];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| anyhow::anyhow!("system random source failed"))?;
        Ok(hex::encode(bytes))
    }

    fn new_id(&self, prefix: &str) -> Result<String, AppError> {
        Ok(format!("{prefix}_{}_{}", now_millis(), self.random_hex(6)?))
    }

    pub async fn list(&self, owner: &DomainOwner) -> Result<Vec<CustomDomain>, AppError> {
        let docs = self
            .store
            .find_by_field(collections::CUSTOM_DOMAINS, "ownerUid", &owner.uid)
            .await?;
        let mut domains: Vec<CustomDomain> = docs.into_iter().filter_map(parse_domain).collect();
        domains.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(domains)
    }

    pub async fn add(
        &self,
        owner: &DomainOwner,
        mut request: AddDomainRequest,
    ) -> Result<DomainDetails, AppError> {
        request.domain = request.domain.trim().to_lowercase();
        request
            .validate()
            .map_err(|e| AppError::Validation(validation_message(&e)))?;

        let existing = self
            .store
            .find_by_field(collections::CUSTOM_DOMAINS, "domain", &request.domain)
            .await?;
        if !existing.is_empty() {
            return Err(AppError::Conflict(format!(
                "Die Domain {} ist bereits in Verwendung.",
                request.domain
            )));
        }

        let now = now_rfc3339();
        let domain = CustomDomain {
            id: self.new_id("domain")?,
            domain: request.domain,
            owner_uid: owner.uid.clone(),
            owner_email: owner.email.clone(),
            company_id: request.company_id,
            status: DomainStatus::Pending,
            dns_provider: request.dns_provider,
            verification_code: format!("{VERIFICATION_CODE_PREFIX}{}", self.random_hex(16)?),
            dkim: None,
            mail_server_added: false,
            max_mailboxes: DEFAULT_MAX_MAILBOXES,
            max_aliases: DEFAULT_MAX_ALIASES,
            quota_mb: DEFAULT_DOMAIN_QUOTA_MB,
            mailbox_count: 0,
            error_message: None,
            created_at: now.clone(),
            updated_at: now,
            verified_at: None,
            activated_at: None,
        };
        self.save_domain(&domain).await?;
        tracing::info!(uid = %owner.uid, domain = %domain.domain, domain_id = %domain.id, "Custom domain added");
        Ok(self.details(domain))
    }

    pub async fn get(&self, owner: &DomainOwner, id: &str) -> Result<DomainDetails, AppError> {
        let domain = self.owned(owner, id).await?;
        Ok(self.details(domain))
    }

    pub async fn verify(&self, owner: &DomainOwner, id: &str) -> Result<VerifyOutcome, AppError> {
        let mut domain = self.owned(owner, id).await?;
        match domain.status {
            DomainStatus::Active => {
                return Ok(VerifyOutcome {
                    verified: true,
                    message: "Domain ist bereits aktiv".to_string(),
                })
            }
            DomainStatus::Verified => {
                return Ok(VerifyOutcome {
                    verified: true,
                    message: "Domain ist bereits verifiziert".to_string(),
                })
            }
            _ => {}
        }

        domain.status = DomainStatus::Verifying;
        domain.updated_at = now_rfc3339();
        self.save_domain(&domain).await?;

        let name = format!("{VERIFICATION_HOST}.{}", domain.domain);
        let found = match self.dns.txt_records(&name).await {
            Ok(values) => values
                .iter()
                .any(|v| v.replace('"', "").trim() == domain.verification_code),
            Err(e) => {
                tracing::warn!(domain = %domain.domain, error = %e, "TXT lookup failed");
                false
            }
        };

        let now = now_rfc3339();
        domain.updated_at = now.clone();
        if found {
            domain.status = DomainStatus::Verified;
            domain.verified_at = Some(now);
            domain.error_message = None;
            self.save_domain(&domain).await?;
            tracing::info!(domain = %domain.domain, "Custom domain verified");
            Ok(VerifyOutcome {
                verified: true,
                message: "Domain erfolgreich verifiziert. Sie können die Domain jetzt aktivieren."
                    .to_string(),
            })
        } else {
            domain.status = DomainStatus::Pending;
            domain.error_message = Some(
                "TXT-Record nicht gefunden. Bitte prüfen Sie Ihre DNS-Einstellungen.".to_string(),
            );
            self.save_domain(&domain).await?;
            Err(AppError::Conflict(format!(
                "TXT-Record {name} mit Wert \"{}\" nicht gefunden. DNS-Änderungen können bis zu 48 Stunden dauern.",
                domain.verification_code
            )))
        }
    }

    pub async fn activate(
        &self,
        owner: &DomainOwner,
        id: &str,
        request: ActivateDomainRequest,
    ) -> Result<ActivationOutcome, AppError> {
        let mut domain = self.owned(owner, id).await?;
        if domain.status != DomainStatus::Verified {
            return Err(AppError::Conflict(
                "Domain muss erst verifiziert werden".to_string(),
            ));
        }

        if let Err(e) = self.mail.add_domain(&domain).await {
            domain.status = DomainStatus::Failed;
            domain.error_message = Some(format!("Mailserver Fehler: {e}"));
            domain.updated_at = now_rfc3339();
            self.save_domain(&domain).await?;
            tracing::error!(domain = %domain.domain, error = %e, "Mail server rejected domain");
            return Err(e);
        }

        match self.mail.generate_dkim(&domain.domain).await {
            Ok(dkim) => domain.dkim = Some(dkim),
            Err(e) => tracing::warn!(domain = %domain.domain, error = %e, "DKIM generation failed"),
        }

        let now = now_rfc3339();
        domain.status = DomainStatus::Active;
        domain.mail_server_added = true;
        domain.activated_at = Some(now.clone());
        domain.updated_at = now;
        domain.error_message = None;
        self.save_domain(&domain).await?;
        tracing::info!(domain = %domain.domain, "Custom domain activated");

        let mailbox = match request.primary_mailbox {
            Some(primary) => match self.create_mailbox(owner, id, primary).await {
                Ok(mailbox) => Some(mailbox),
                Err(e) => {
                    tracing::warn!(domain = %domain.domain, error = %e, "Primary mailbox not created");
                    None
                }
            },
            None => None,
        };

        let domain = self.owned(owner, id).await?;
        Ok(ActivationOutcome {
            dkim_record: domain.dkim.as_ref().map(dkim_record),
            domain,
            mailbox,
        })
    }

    pub async fn list_mailboxes(
        &self,
        owner: &DomainOwner,
        id: &str,
    ) -> Result<Vec<DomainMailbox>, AppError> {
        self.owned(owner, id).await?;
        self.mailboxes(id).await
    }

    pub async fn create_mailbox(
        &self,
        owner: &DomainOwner,
        id: &str,
        request: CreateMailboxRequest,
    ) -> Result<DomainMailbox, AppError> {
        request
            .validate()
            .map_err(|e| AppError::Validation(validation_message(&e)))?;
        let mut domain = self.owned(owner, id).await?;
        if domain.status != DomainStatus::Active {
            return Err(AppError::Conflict(
                "Domain muss erst aktiviert werden".to_string(),
            ));
        }

        let local_part = request.local_part.to_lowercase();
        let email = format!("{local_part}@{}", domain.domain);
        let existing = self
            .store
            .find_by_field(collections::DOMAIN_MAILBOXES, "email", &email)
            .await?;
        if !existing.is_empty() {
            return Err(AppError::Conflict(format!("Mailbox {email} existiert bereits")));
        }

        let count = self.mailboxes(id).await?.len();
        if count >= domain.max_mailboxes as usize {
            return Err(AppError::Conflict(format!(
                "Maximale Anzahl Mailboxen ({}) erreicht",
                domain.max_mailboxes
            )));
        }

        let quota_mb = request.quota_mb.unwrap_or(DEFAULT_MAILBOX_QUOTA_MB);
        self.mail
            .add_mailbox(&email, &request.name, &request.password, quota_mb)
            .await?;

        let mailbox = DomainMailbox {
            id: self.new_id("mailbox")?,
            domain_id: id.to_string(),
            email,
            local_part,
            name: request.name,
            quota_mb,
            active: true,
            created_at: now_rfc3339(),
        };
        self.store
            .set_merge(
                collections::DOMAIN_MAILBOXES,
                &mailbox.id,
                &patch_of(&mailbox)?,
            )
            .await?;

        domain.mailbox_count = (count + 1) as u32;
        domain.updated_at = now_rfc3339();
        self.save_domain(&domain).await?;
        tracing::info!(domain = %domain.domain, mailbox = %mailbox.email, "Mailbox created");
        Ok(mailbox)
    }

    /// Remove a domain. Only its owner may, and only once it has no mailboxes.
    pub async fn delete(&self, owner: &DomainOwner, id: &str) -> Result<(), AppError> {
        let domain = self.owned(owner, id).await?;
        let count = self.mailboxes(id).await?.len();
        if count > 0 {
            return Err(AppError::Conflict(format!(
                "Domain hat noch {count} Mailbox(en). Bitte zuerst alle Mailboxen löschen."
            )));
        }

        if domain.mail_server_added {
            if let Err(e) = self.mail.delete_domain(&domain.domain).await {
                tracing::warn!(domain = %domain.domain, error = %e, "Mail server domain not removed");
            }
        }
        self.store.delete(collections::CUSTOM_DOMAINS, id).await?;
        tracing::info!(domain = %domain.domain, "Custom domain deleted");
        Ok(())
    }

    async fn owned(&self, owner: &DomainOwner, id: &str) -> Result<CustomDomain, AppError> {
        let domain = self
            .store
            .get(collections::CUSTOM_DOMAINS, id)
            .await?
            .and_then(parse_domain)
            .ok_or_else(|| AppError::NotFound("Domain nicht gefunden".to_string()))?;
        if domain.owner_uid != owner.uid {
            return Err(AppError::Forbidden("Keine Berechtigung".to_string()));
        }
        Ok(domain)
    }

    async fn mailboxes(&self, domain_id: &str) -> Result<Vec<DomainMailbox>, AppError> {
        let docs = self
            .store
            .find_by_field(collections::DOMAIN_MAILBOXES, "domainId", domain_id)
            .await?;
        Ok(docs
            .into_iter()
            .filter_map(|doc| serde_json::from_value(Value::Object(doc)).ok())
            .collect())
    }

    async fn save_domain(&self, domain: &CustomDomain) -> Result<(), AppError> {
        self.store
            .set_merge(collections::CUSTOM_DOMAINS, &domain.id, &patch_of(domain)?)
            .await
    }

    fn details(&self, domain: CustomDomain) -> DomainDetails {
        let dns_records =
            dns_instructions(&self.settings, &domain.verification_code, domain.dkim.as_ref());
        DomainDetails {
            domain,
            dns_records,
        }
    }
}

/// Whole-record patch: every top-level field, `null` for absent options.
fn patch_of<T: Serialize>(record: &T) -> Result<FieldPatch, AppError> {
    let Value::Object(doc) = serde_json::to_value(record).map_err(anyhow::Error::from)? else {
        return Err(anyhow::anyhow!("record did not serialize to an object").into());
    };
    let mut patch = FieldPatch::new();
    for (key, value) in doc {
        patch.set(key, value);
    }
    Ok(patch)
}

fn parse_domain(doc: Document) -> Option<CustomDomain> {
    match serde_json::from_value(Value::Object(doc)) {
        Ok(domain) => Some(domain),
        Err(e) => {
            tracing::warn!(error = %e, "Skipping unreadable custom domain record");
            None
        }
    }
}

// ─── DNS-over-HTTPS ──────────────────────────────────────────

/// Resolver speaking the JSON DNS-over-HTTPS dialect (`/resolve?name=&type=`).
#[derive(Clone)]
pub struct DohResolver {
    http: reqwest::Client,
    url: String,
}

#[derive(Debug, Default, Deserialize)]
struct DohResponse {
    #[serde(rename = "Answer", default)]
    answer: Vec<DohAnswer>,
}

#[derive(Debug, Deserialize)]
struct DohAnswer {
    #[serde(default)]
    data: String,
}

impl DohResolver {
    pub fn new(url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl DnsVerifier for DohResolver {
    async fn txt_records(&self, name: &str) -> Result<Vec<String>, AppError> {
        let response = self
            .http
            .get(&self.url)
            .query(&[("name", name), ("type", "TXT")])
            .header("Accept", "application/dns-json")
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("DNS lookup failed: {e}")))?;
        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "DNS resolver returned HTTP {}",
                response.status()
            )));
        }
        let body: DohResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("DNS response parse error: {e}")))?;
        Ok(body
            .answer
            .into_iter()
            .map(|a| a.data.replace('"', "").trim().to_string())
            .collect())
    }
}

// ─── Mail server admin API ───────────────────────────────────

/// REST client for the mail server's admin API (`X-API-Key` auth).
#[derive(Clone)]
pub struct MailAdminClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct DkimResponse {
    dkim_selector: String,
    dkim_txt: String,
}

impl MailAdminClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, AppError> {
        if self.api_key.is_empty() {
            return Err(AppError::Upstream(
                "Mailserver API Key nicht konfiguriert".to_string(),
            ));
        }
        let response = request
            .header("X-API-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Mailserver Verbindungsfehler: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "Mailserver API Fehler: {status}: {body}"
            )));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Mailserver JSON parse error: {e}")))?;
        check_admin_result(&body)?;
        Ok(body)
    }

    async fn post(&self, endpoint: &str, body: Value) -> Result<Value, AppError> {
        let url = format!("{}{}", self.base_url, endpoint);
        self.send(self.http.post(url).json(&body)).await
    }

    async fn get(&self, endpoint: &str) -> Result<Value, AppError> {
        let url = format!("{}{}", self.base_url, endpoint);
        self.send(self.http.get(url)).await
    }
}

/// The admin API answers 200 with `[{"type": "error", "msg": ...}]` on failure.
fn check_admin_result(body: &Value) -> Result<(), AppError> {
    let entries = match body {
        Value::Array(entries) => entries.as_slice(),
        other => std::slice::from_ref(other),
    };
    for entry in entries {
        if entry.get("type").and_then(Value::as_str) == Some("error") {
            let msg = entry.get("msg").map(Value::to_string).unwrap_or_default();
            return Err(AppError::Upstream(format!("Mailserver Fehler: {msg}")));
        }
    }
    Ok(())
}

#[async_trait]
impl MailServer for MailAdminClient {
    async fn add_domain(&self, domain: &CustomDomain) -> Result<(), AppError> {
        self.post(
            "/add/domain",
            serde_json::json!({
                "domain": domain.domain,
                "description": "Taskilo Custom Domain",
                "aliases": domain.max_aliases,
                "mailboxes": domain.max_mailboxes,
                "defquota": DEFAULT_MAILBOX_QUOTA_MB,
                "maxquota": domain.quota_mb,
                "quota": domain.quota_mb * 5,
                "active": 1,
                "restart_sogo": 1,
            }),
        )
        .await?;
        Ok(())
    }

    async fn generate_dkim(&self, domain: &str) -> Result<DkimKey, AppError> {
        self.post(
            "/add/dkim",
            serde_json::json!({"domains": domain, "dkim_selector": "dkim", "key_size": 2048}),
        )
        .await?;
        let body = self.get(&format!("/get/dkim/{}", urlencoding::encode(domain))).await?;
        let dkim: DkimResponse = serde_json::from_value(body)
            .map_err(|e| AppError::Upstream(format!("DKIM response parse error: {e}")))?;
        Ok(DkimKey {
            selector: dkim.dkim_selector,
            public_key: dkim.dkim_txt,
        })
    }

    async fn add_mailbox(
        &self,
        email: &str,
        name: &str,
        password: &str,
        quota_mb: u32,
    ) -> Result<(), AppError> {
        let (local_part, domain) = email
            .split_once('@')
            .ok_or_else(|| AppError::BadRequest(format!("invalid mailbox address {email}")))?;
        self.post(
            "/add/mailbox",
            serde_json::json!({
                "local_part": local_part,
                "domain": domain,
                "name": name,
                "password": password,
                "password2": password,
                "quota": quota_mb,
                "active": 1,
                "force_pw_update": 0,
                "tls_enforce_in": 1,
                "tls_enforce_out": 1,
            }),
        )
        .await?;
        Ok(())
    }

    async fn delete_domain(&self, domain: &str) -> Result<(), AppError> {
        self.post("/delete/domain", serde_json::json!({"domain": domain}))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::models::domain::DnsProvider;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeDns {
        records: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DnsVerifier for FakeDns {
        async fn txt_records(&self, _name: &str) -> Result<Vec<String>, AppError> {
            Ok(self.records.lock().unwrap().clone())
        }
    }

    #[derive(Default)]
    struct FakeMail {
        reject_domains: bool,
    }

    #[async_trait]
    impl MailServer for FakeMail {
        async fn add_domain(&self, _domain: &CustomDomain) -> Result<(), AppError> {
            if self.reject_domains {
                return Err(AppError::Upstream("quota exceeded".into()));
            }
            Ok(())
        }

        async fn generate_dkim(&self, _domain: &str) -> Result<DkimKey, AppError> {
            Ok(DkimKey {
                selector: "dkim".into(),
                public_key: "v=DKIM1; k=rsa; p=MIIB".into(),
            })
        }

        async fn add_mailbox(&self, _: &str, _: &str, _: &str, _: u32) -> Result<(), AppError> {
            Ok(())
        }

        async fn delete_domain(&self, _domain: &str) -> Result<(), AppError> {
            Ok(())
        }
    }

    fn owner() -> DomainOwner {
        DomainOwner {
            uid: "u1".into(),
            email: "max@example.com".into(),
        }
    }

    fn settings() -> DnsSettings {
        DnsSettings::from(&Config::test_default())
    }

    fn service(dns: Arc<FakeDns>, mail: FakeMail) -> DomainService {
        DomainService::new(Arc::new(MemoryStore::new()), dns, Arc::new(mail), settings())
    }

    fn add_request(domain: &str) -> AddDomainRequest {
        AddDomainRequest {
            domain: domain.into(),
            dns_provider: DnsProvider::External,
            company_id: None,
        }
    }

    fn mailbox_request(local_part: &str) -> CreateMailboxRequest {
        CreateMailboxRequest {
            local_part: local_part.into(),
            name: "Info".into(),
            password: "supersecret".into(),
            quota_mb: None,
        }
    }

    #[test]
    fn instructions_cover_mail_setup() {
        let records = dns_instructions(&settings(), "taskilo-verify-abc", None);
        let hosts: Vec<&str> = records.iter().map(|r| r.host.as_str()).collect();
        assert_eq!(
            hosts,
            ["_taskilo-verify", "@", "@", "_dmarc", "autodiscover", "autoconfig"]
        );
        assert!(records.iter().all(|r| r.ttl == 3600));
        assert_eq!(records[1].priority, Some(10));
        assert_eq!(records[2].value, "v=spf1 include:_spf.taskilo.de ~all");
    }

    #[test]
    fn admin_errors_are_detected() {
        let body = serde_json::json!([{"type": "error", "msg": ["domain_exists"]}]);
        assert!(check_admin_result(&body).is_err());
        let body = serde_json::json!([{"type": "success", "msg": "ok"}]);
        assert!(check_admin_result(&body).is_ok());
    }

    #[tokio::test]
    async fn add_normalizes_and_rejects_duplicates() {
        let service = service(Arc::new(FakeDns::default()), FakeMail::default());
        let details = service.add(&owner(), add_request(" Example.DE ")).await.unwrap();
        assert_eq!(details.domain.domain, "example.de");
        assert_eq!(details.domain.status, DomainStatus::Pending);
        assert_eq!(details.domain.verification_code.len(), "taskilo-verify-".len() + 32);

        let err = service.add(&owner(), add_request("example.de")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn full_lifecycle() {
        let dns = Arc::new(FakeDns::default());
        let service = service(dns.clone(), FakeMail::default());
        let id = service.add(&owner(), add_request("firma.de")).await.unwrap().domain.id;

        assert!(matches!(
            service.activate(&owner(), &id, ActivateDomainRequest::default()).await,
            Err(AppError::Conflict(_))
        ));

        let err = service.verify(&owner(), &id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        let pending = service.get(&owner(), &id).await.unwrap().domain;
        assert_eq!(pending.status, DomainStatus::Pending);
        assert!(pending.error_message.is_some());

        dns.records
            .lock()
            .unwrap()
            .push(format!("\"{}\"", pending.verification_code));
        assert!(service.verify(&owner(), &id).await.unwrap().verified);

        let activated = service
            .activate(
                &owner(),
                &id,
                ActivateDomainRequest {
                    primary_mailbox: Some(mailbox_request("info")),
                },
            )
            .await
            .unwrap();
        assert_eq!(activated.domain.status, DomainStatus::Active);
        assert_eq!(activated.domain.mailbox_count, 1);
        assert_eq!(activated.mailbox.unwrap().email, "info@firma.de");
        assert_eq!(activated.dkim_record.unwrap().host, "dkim._domainkey");

        assert!(matches!(
            service.create_mailbox(&owner(), &id, mailbox_request("info")).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            service.delete(&owner(), &id).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn mail_server_failure_marks_domain_failed() {
        let dns = Arc::new(FakeDns::default());
        let service = service(dns.clone(), FakeMail { reject_domains: true });
        let details = service.add(&owner(), add_request("firma.de")).await.unwrap();
        dns.records
            .lock()
            .unwrap()
            .push(details.domain.verification_code.clone());
        service.verify(&owner(), &details.domain.id).await.unwrap();

        assert!(service
            .activate(&owner(), &details.domain.id, ActivateDomainRequest::default())
            .await
            .is_err());
        let domain = service.get(&owner(), &details.domain.id).await.unwrap().domain;
        assert_eq!(domain.status, DomainStatus::Failed);
    }

    #[tokio::test]
    async fn only_the_owner_may_touch_a_domain() {
        let service = service(Arc::new(FakeDns::default()), FakeMail::default());
        let id = service.add(&owner(), add_request("firma.de")).await.unwrap().domain.id;
        let stranger = DomainOwner {
            uid: "u2".into(),
            email: "eve@example.com".into(),
        };
        assert!(matches!(
            service.delete(&stranger, &id).await,
            Err(AppError::Forbidden(_))
        ));
        service.delete(&owner(), &id).await.unwrap();
        assert!(service.list(&owner()).await.unwrap().is_empty());
    }
}
