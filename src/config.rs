//! Application configuration loaded from environment variables.
//!
//! Collaborator endpoints default to the production Taskilo deployment so a
//! local `.env` only needs the Firebase project and API key.

use std::env;
use std::time::Duration;

/// One day.
const DEFAULT_DRAFT_TTL_SECS: u64 = 24 * 60 * 60;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL for CORS
    pub frontend_url: String,
    /// Public URL of the marketplace (used in provisioning payloads)
    pub app_url: String,
    /// GCP / Firebase project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Firebase Storage bucket name
    pub storage_bucket: String,
    /// Base URL of the callable functions (`https://{region}-{project}.cloudfunctions.net`)
    pub functions_base_url: String,
    /// Payments relay endpoint for compliance documents
    pub stripe_upload_url: String,
    /// Balance query endpoint
    pub stripe_balance_url: String,
    /// Payout request endpoint
    pub stripe_payout_url: String,
    /// Mail server admin API base URL
    pub mail_admin_url: String,
    /// Public mail host customers point their MX records at
    pub mail_host: String,
    /// SPF include domain
    pub spf_include: String,
    /// DMARC aggregate report address
    pub dmarc_report_address: String,
    /// DNS-over-HTTPS resolver used for domain verification
    pub dns_resolver_url: String,
    /// Idle time after which an unsubmitted registration draft is evicted
    pub registration_draft_ttl: Duration,

    // --- Secrets ---
    /// Firebase Web API key (identity REST API)
    pub firebase_api_key: String,
    /// Mail server admin API key
    pub mail_admin_api_key: String,
    /// Shared HS256 secret for ID tokens (development and tests only)
    pub id_token_shared_secret: Option<Vec<u8>>,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self::test_default()
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let gcp_project_id =
            env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "tilvo-f142f".to_string());
        let region = env::var("FUNCTIONS_REGION").unwrap_or_else(|_| "europe-west1".to_string());
        let functions_base_url = env::var("FUNCTIONS_BASE_URL")
            .unwrap_or_else(|_| format!("https://{}-{}.cloudfunctions.net", region, gcp_project_id));

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            app_url: env::var("APP_URL").unwrap_or_else(|_| "https://taskilo.de".to_string()),
            storage_bucket: env::var("FIREBASE_STORAGE_BUCKET")
                .unwrap_or_else(|_| format!("{}.appspot.com", gcp_project_id)),
            stripe_upload_url: env::var("STRIPE_UPLOAD_URL")
                .unwrap_or_else(|_| format!("{}/uploadStripeFile", functions_base_url)),
            stripe_balance_url: env::var("STRIPE_BALANCE_URL")
                .unwrap_or_else(|_| format!("{}/getStripeAccountBalance", functions_base_url)),
            stripe_payout_url: env::var("STRIPE_PAYOUT_URL")
                .unwrap_or_else(|_| format!("{}/requestPayout", functions_base_url)),
            mail_admin_url: env::var("MAIL_ADMIN_URL")
                .unwrap_or_else(|_| "https://mail.taskilo.de/api/v1".to_string()),
            mail_host: env::var("MAIL_HOST").unwrap_or_else(|_| "mail.taskilo.de".to_string()),
            spf_include: env::var("SPF_INCLUDE").unwrap_or_else(|_| "_spf.taskilo.de".to_string()),
            dmarc_report_address: env::var("DMARC_REPORT_ADDRESS")
                .unwrap_or_else(|_| "dmarc@taskilo.de".to_string()),
            dns_resolver_url: env::var("DNS_RESOLVER_URL")
                .unwrap_or_else(|_| "https://dns.google/resolve".to_string()),
            registration_draft_ttl: Duration::from_secs(
                env::var("REGISTRATION_DRAFT_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_DRAFT_TTL_SECS),
            ),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            functions_base_url,
            gcp_project_id,

            firebase_api_key: env::var("FIREBASE_API_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("FIREBASE_API_KEY"))?,
            mail_admin_api_key: env::var("MAIL_ADMIN_API_KEY")
                .map(|v| v.trim().to_string())
                .unwrap_or_default(),
            id_token_shared_secret: env::var("ID_TOKEN_SHARED_SECRET")
                .ok()
                .filter(|v| !v.is_empty())
                .map(String::into_bytes),
        })
    }

    /// Deterministic configuration for tests.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:3000".to_string(),
            app_url: "https://taskilo.test".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            storage_bucket: "test-project.appspot.com".to_string(),
            functions_base_url: "http://localhost:5001/test-project/europe-west1".to_string(),
            stripe_upload_url: "http://localhost:5001/uploadStripeFile".to_string(),
            stripe_balance_url: "http://localhost:5001/getStripeAccountBalance".to_string(),
            stripe_payout_url: "http://localhost:5001/requestPayout".to_string(),
            mail_admin_url: "http://localhost:8025/api/v1".to_string(),
            mail_host: "mail.taskilo.de".to_string(),
            spf_include: "_spf.taskilo.de".to_string(),
            dmarc_report_address: "dmarc@taskilo.de".to_string(),
            dns_resolver_url: "http://localhost:8053/resolve".to_string(),
            registration_draft_ttl: Duration::from_secs(DEFAULT_DRAFT_TTL_SECS),
            firebase_api_key: "test-api-key".to_string(),
            mail_admin_api_key: "test-mail-key".to_string(),
            id_token_shared_secret: Some(b"test_id_token_secret_32_bytes!!!".to_vec()),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        env::set_var("FIREBASE_API_KEY", "  key-123 ");
        env::set_var("GCP_PROJECT_ID", "demo-project");
        env::set_var("FUNCTIONS_REGION", "europe-west3");
        env::remove_var("FUNCTIONS_BASE_URL");
        env::remove_var("STRIPE_UPLOAD_URL");
        env::remove_var("REGISTRATION_DRAFT_TTL_SECS");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.firebase_api_key, "key-123");
        assert_eq!(
            config.functions_base_url,
            "https://europe-west3-demo-project.cloudfunctions.net"
        );
        assert_eq!(
            config.stripe_upload_url,
            "https://europe-west3-demo-project.cloudfunctions.net/uploadStripeFile"
        );
        assert_eq!(config.storage_bucket, "demo-project.appspot.com");
        assert_eq!(config.port, 8080);
        assert_eq!(config.registration_draft_ttl, Duration::from_secs(86_400));
    }
}
