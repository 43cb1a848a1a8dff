//! Custom mail domains and their mailboxes.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::{Validate, ValidationError, ValidationErrors};

pub const DEFAULT_MAX_MAILBOXES: u32 = 50;
pub const DEFAULT_MAX_ALIASES: u32 = 100;
pub const DEFAULT_DOMAIN_QUOTA_MB: u32 = 10240;
pub const DEFAULT_MAILBOX_QUOTA_MB: u32 = 5000;
pub const DNS_RECORD_TTL: u32 = 3600;
/// Host of the TXT record proving domain ownership.
pub const VERIFICATION_HOST: &str = "_taskilo-verify";
pub const VERIFICATION_CODE_PREFIX: &str = "taskilo-verify-";

/// Lifecycle of a custom domain. Transitions are always user-triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum DomainStatus {
    Pending,
    Verifying,
    Verified,
    Active,
    Failed,
    Suspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum DnsProvider {
    Hetzner,
    Inwx,
    External,
}

/// DKIM key published for an active domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct DkimKey {
    pub selector: String,
    pub public_key: String,
}

/// Stored at `custom_domains/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct CustomDomain {
    pub id: String,
    pub domain: String,
    pub owner_uid: String,
    pub owner_email: String,
    pub company_id: Option<String>,
    pub status: DomainStatus,
    pub dns_provider: DnsProvider,
    pub verification_code: String,
    pub dkim: Option<DkimKey>,
    pub mail_server_added: bool,
    pub max_mailboxes: u32,
    pub max_aliases: u32,
    pub quota_mb: u32,
    pub mailbox_count: u32,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub verified_at: Option<String>,
    pub activated_at: Option<String>,
}

/// Stored at `custom_domain_mailboxes/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct DomainMailbox {
    pub id: String,
    pub domain_id: String,
    pub email: String,
    pub local_part: String,
    pub name: String,
    pub quota_mb: u32,
    pub active: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct DnsRecord {
    #[serde(rename = "type")]
    pub record_type: String,
    pub host: String,
    pub value: String,
    pub priority: Option<u16>,
    pub ttl: u32,
    pub description: String,
}

/// Domain plus the records the owner has to publish.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct DomainDetails {
    #[serde(flatten)]
    pub domain: CustomDomain,
    pub dns_records: Vec<DnsRecord>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddDomainRequest {
    #[validate(
        length(min = 4, max = 253, message = "Domain must be 4-253 characters"),
        custom(function = "validate_domain_name")
    )]
    pub domain: String,
    pub dns_provider: DnsProvider,
    pub company_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActivateDomainRequest {
    /// Create a first mailbox right after activation.
    pub primary_mailbox: Option<CreateMailboxRequest>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMailboxRequest {
    #[validate(
        length(min = 1, max = 64, message = "Local part must be 1-64 characters"),
        custom(function = "validate_local_part")
    )]
    pub local_part: String,
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,
    #[validate(range(min = 100, max = 50000, message = "Quota must be 100-50000 MB"))]
    pub quota_mb: Option<u32>,
}

fn validate_domain_name(domain: &str) -> Result<(), ValidationError> {
    let domain = domain.to_ascii_lowercase();
    let labels: Vec<&str> = domain.split('.').collect();
    let valid = labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
        && labels
            .last()
            .is_some_and(|tld| tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()));

    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("domain").with_message(Cow::Borrowed("Invalid domain name")))
    }
}

fn validate_local_part(local_part: &str) -> Result<(), ValidationError> {
    if local_part
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'))
    {
        Ok(())
    } else {
        Err(ValidationError::new("local_part").with_message(Cow::Borrowed(
            "Local part may only contain a-z, 0-9, '.', '_' and '-'",
        )))
    }
}

/// Flatten validator output into one readable line.
pub fn validation_message(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(msg) => msg.to_string(),
                None => format!("Invalid {field}"),
            })
        })
        .collect();
    messages.sort();
    messages.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_names() {
        assert!(validate_domain_name("example.de").is_ok());
        assert!(validate_domain_name("mail.my-firm.co.uk").is_ok());
        assert!(validate_domain_name("nodot").is_err());
        assert!(validate_domain_name("-bad.de").is_err());
        assert!(validate_domain_name("bad_char.de").is_err());
        assert!(validate_domain_name("example.d3").is_err());
    }

    #[test]
    fn mailbox_request_limits() {
        let ok = CreateMailboxRequest {
            local_part: "info".into(),
            name: "Info".into(),
            password: "supersecret".into(),
            quota_mb: None,
        };
        assert!(ok.validate().is_ok());

        let bad = CreateMailboxRequest {
            local_part: "Info!".into(),
            name: String::new(),
            password: "short".into(),
            quota_mb: Some(50),
        };
        let errors = bad.validate().unwrap_err();
        let message = validation_message(&errors);
        assert!(message.contains("Local part may only contain"));
        assert!(message.contains("Name must be 1-100 characters"));
        assert!(message.contains("Password must be 8-128 characters"));
        assert!(message.contains("Quota must be 100-50000 MB"));
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(DomainStatus::Verifying).unwrap(),
            serde_json::json!("verifying")
        );
    }
}
