//! Company registration wizard data and commit progress.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Everything the wizard collected across its screens.
///
/// Files are staged separately per draft and are not part of this struct.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationForm {
    pub email: String,
    /// Only needed when the caller has no session yet.
    pub password: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub date_of_birth: String,
    pub personal_street: String,
    pub personal_house_number: String,
    pub personal_postal_code: String,
    pub personal_city: String,
    pub personal_country: Option<String>,
    pub is_managing_director_owner: Option<bool>,
    pub ownership_percentage: Option<f64>,
    pub is_actual_director: Option<bool>,
    pub is_actual_owner: Option<bool>,
    pub actual_ownership_percentage: Option<f64>,
    pub is_actual_executive: Option<bool>,
    pub actual_representative_title: Option<String>,

    pub company_name: String,
    pub legal_form: Option<String>,
    pub company_street: String,
    pub company_house_number: String,
    pub company_postal_code: String,
    pub company_city: String,
    pub company_country: Option<String>,
    pub company_phone_number: String,
    pub company_website: String,
    pub company_register: String,
    pub tax_number: String,
    pub vat_id: String,

    pub selected_category: Option<String>,
    pub selected_subcategory: Option<String>,
    pub description: String,
    pub hourly_rate: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius_km: Option<f64>,

    pub iban: String,
    pub account_holder: String,
    pub bic: String,
    pub bank_name: String,
}

impl RegistrationForm {
    /// Parsed hourly rate; unparsable, non-finite or missing input counts
    /// as zero.
    pub fn hourly_rate_value(&self) -> f64 {
        self.hourly_rate
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .ok()
            .filter(|rate| rate.is_finite())
            .unwrap_or(0.0)
    }

    /// `"Hauptstr. 5"` built from street and house number.
    pub fn company_address_line(&self) -> String {
        format!("{} {}", self.company_street.trim(), self.company_house_number.trim())
            .trim()
            .to_string()
    }
}

/// Beneficial ownership answers. `None` means the question was not asked
/// and the stored field is cleared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OwnershipDetails {
    pub ownership_percentage: Option<f64>,
    pub is_actual_director: Option<bool>,
    pub is_actual_owner: Option<bool>,
    pub actual_ownership_percentage: Option<f64>,
    pub is_actual_executive: Option<bool>,
    pub actual_representative_title: Option<String>,
}

impl From<&RegistrationForm> for OwnershipDetails {
    fn from(form: &RegistrationForm) -> Self {
        Self {
            ownership_percentage: form.ownership_percentage,
            is_actual_director: form.is_actual_director,
            is_actual_owner: form.is_actual_owner,
            actual_ownership_percentage: form.actual_ownership_percentage,
            is_actual_executive: form.is_actual_executive,
            actual_representative_title: form
                .actual_representative_title
                .clone()
                .filter(|t| !t.trim().is_empty()),
        }
    }
}

/// Registration-only facts added to the split payloads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrationMeta {
    pub uid: String,
    pub client_ip: String,
    pub user_agent: String,
    /// Public base URL used for the company's profile link.
    pub app_url: String,
    pub ownership: OwnershipDetails,
}

/// Named states of the registration commit sequence, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStep {
    NotStarted,
    Validated,
    IdentityResolved,
    ClientIpResolved,
    DocumentsUploaded,
    UserRecordWritten,
    UserRecordConfirmed,
    CompanyRecordWritten,
    AccountProvisioned,
    Completed,
}

/// Observable progress of one draft's commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationProgress {
    /// Last step that completed successfully.
    pub last_completed: RegistrationStep,
    pub in_flight: bool,
    pub uid: Option<String>,
    pub error: Option<String>,
    pub updated_at: String,
}

impl Default for RegistrationProgress {
    fn default() -> Self {
        Self {
            last_completed: RegistrationStep::NotStarted,
            in_flight: false,
            uid: None,
            error: None,
            updated_at: crate::time_utils::now_rfc3339(),
        }
    }
}

/// Successful end of a registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOutcome {
    pub uid: String,
    pub stripe_account_id: String,
    pub details_submitted: bool,
    pub redirect_to: String,
}
