//! Normalized profile view-model.
//!
//! This is the only typed shape of a user/company profile. Remote
//! records are loosely shaped (legacy flat fields and `step1..step4`
//! namespaces may coexist); `services::normalizer` maps them into this
//! structure and back.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `user_type` value marking a company identity.
pub const USER_TYPE_COMPANY: &str = "firma";

/// Placeholder stored by the old category dropdown.
pub const CATEGORY_PLACEHOLDER: &str = "Bitte wählen";

/// Avatar shown when no profile picture was ever uploaded.
pub const DEFAULT_AVATAR_URL: &str = "/default-avatar.png";

/// Editable profile of a user or company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileForm {
    pub uid: String,
    pub email: String,
    #[serde(rename = "user_type")]
    pub user_type: String,
    pub step1: PersonalStep,
    pub step2: CompanyStep,
    pub step3: ComplianceStep,
    pub step4: BankStep,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius_km: f64,
    pub selected_category: Option<String>,
    pub selected_subcategory: Option<String>,
    pub profile_banner_image: Option<String>,
    /// Owned by account provisioning; never written by a profile save.
    pub stripe_account_id: Option<String>,
    pub public_profile: PublicProfile,
    /// Explicitly remove the stored profile picture on save.
    pub remove_profile_picture: bool,
}

impl Default for ProfileForm {
    fn default() -> Self {
        Self {
            uid: String::new(),
            email: String::new(),
            user_type: String::new(),
            step1: PersonalStep::default(),
            step2: CompanyStep::default(),
            step3: ComplianceStep::default(),
            step4: BankStep::default(),
            lat: None,
            lng: None,
            radius_km: 30.0,
            selected_category: None,
            selected_subcategory: None,
            profile_banner_image: None,
            stripe_account_id: None,
            public_profile: PublicProfile::default(),
            remove_profile_picture: false,
        }
    }
}

impl ProfileForm {
    pub fn is_company(&self) -> bool {
        self.user_type == USER_TYPE_COMPANY
    }
}

/// Personal data of the account holder (managing director for companies).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonalStep {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub date_of_birth: String,
    pub personal_street: String,
    pub personal_house_number: String,
    pub personal_postal_code: String,
    pub personal_city: String,
    pub personal_country: String,
    pub is_managing_director_owner: bool,
}

impl Default for PersonalStep {
    fn default() -> Self {
        Self {
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            phone_number: String::new(),
            date_of_birth: String::new(),
            personal_street: String::new(),
            personal_house_number: String::new(),
            personal_postal_code: String::new(),
            personal_city: String::new(),
            personal_country: "DE".to_string(),
            is_managing_director_owner: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompanyStep {
    pub company_name: String,
    pub company_suffix: String,
    pub company_phone_number: String,
    pub legal_form: Option<String>,
    /// Single-line street address (`"Hauptstr. 5"`).
    pub address: String,
    pub street: String,
    pub house_number: String,
    pub postal_code: String,
    pub city: String,
    pub country: String,
    pub website: String,
    pub fax: String,
    pub languages: String,
    pub description: String,
    pub employees: String,
    pub industry: String,
    pub industry_mcc: String,
}

impl Default for CompanyStep {
    fn default() -> Self {
        Self {
            company_name: String::new(),
            company_suffix: String::new(),
            company_phone_number: String::new(),
            legal_form: None,
            address: String::new(),
            street: String::new(),
            house_number: String::new(),
            postal_code: String::new(),
            city: String::new(),
            country: "DE".to_string(),
            website: String::new(),
            fax: String::new(),
            languages: String::new(),
            description: String::new(),
            employees: String::new(),
            industry: String::new(),
            industry_mcc: String::new(),
        }
    }
}

/// Tax, accounting and compliance document data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComplianceStep {
    /// Kept as text so the form round-trips whatever the user typed.
    pub hourly_rate: String,
    pub tax_number: String,
    pub vat_id: String,
    pub company_register: String,
    pub district_court: String,
    pub ust: String,
    pub profit_method: String,
    pub tax_method: String,
    pub default_tax_rate: String,
    pub accounting_system: String,
    pub price_input: String,
    pub last_invoice_number: Option<String>,
    #[serde(rename = "profilePictureURL")]
    pub profile_picture_url: String,
    #[serde(rename = "businessLicenseURL")]
    pub business_license_url: Option<String>,
    #[serde(rename = "masterCraftsmanCertificateURL")]
    pub master_craftsman_certificate_url: Option<String>,
    pub identity_front_url: Option<String>,
    pub identity_back_url: Option<String>,
}

impl Default for ComplianceStep {
    fn default() -> Self {
        Self {
            hourly_rate: "0".to_string(),
            tax_number: String::new(),
            vat_id: String::new(),
            company_register: String::new(),
            district_court: String::new(),
            ust: "standard".to_string(),
            profit_method: "euer".to_string(),
            tax_method: "soll".to_string(),
            default_tax_rate: "19".to_string(),
            accounting_system: "skr03".to_string(),
            price_input: "netto".to_string(),
            last_invoice_number: None,
            profile_picture_url: DEFAULT_AVATAR_URL.to_string(),
            business_license_url: None,
            master_craftsman_certificate_url: None,
            identity_front_url: None,
            identity_back_url: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BankStep {
    pub account_holder: String,
    pub iban: String,
    pub bic: String,
    pub bank_name: String,
    pub bank_country: Option<String>,
}

/// Public marketplace profile shown on the company page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PublicProfile {
    pub public_description: String,
    pub specialties: Vec<Value>,
    pub service_packages: Vec<Value>,
    pub working_hours: Vec<Value>,
    pub instant_booking: bool,
    /// Hours.
    pub response_time_guarantee: f64,
    pub faqs: Vec<Value>,
    pub business_license: String,
    pub certifications: Vec<Value>,
}

impl Default for PublicProfile {
    fn default() -> Self {
        Self {
            public_description: String::new(),
            specialties: Vec::new(),
            service_packages: Vec::new(),
            working_hours: Vec::new(),
            instant_booking: false,
            response_time_guarantee: 24.0,
            faqs: Vec::new(),
            business_license: String::new(),
            certifications: Vec::new(),
        }
    }
}
