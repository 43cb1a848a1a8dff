//! Payload and result of the payment-account provisioning function.

use serde::{Deserialize, Serialize};

/// Everything the provisioning function needs to create a connected account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningRequest {
    pub user_id: String,
    pub client_ip: String,

    // Representative
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<String>,
    pub personal_street: Option<String>,
    pub personal_house_number: Option<String>,
    pub personal_postal_code: Option<String>,
    pub personal_city: Option<String>,
    pub personal_country: Option<String>,
    pub is_managing_director_owner: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ownership_percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_actual_director: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_actual_owner: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_ownership_percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_actual_executive: Option<bool>,
    pub actual_representative_title: Option<String>,

    // Company
    pub company_name: String,
    pub legal_form: Option<String>,
    pub company_address_line1: String,
    pub company_city: String,
    pub company_postal_code: String,
    pub company_country: Option<String>,
    pub company_phone_number: Option<String>,
    pub company_website: Option<String>,
    pub company_register: Option<String>,
    pub tax_number: Option<String>,
    pub vat_id: Option<String>,
    pub mcc: String,

    // Bank
    pub iban: String,
    pub account_holder: String,
    pub bic: String,
    pub bank_name: String,

    // Uploaded document references
    pub profile_picture_file_id: String,
    pub business_license_file_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_craftsman_certificate_file_id: Option<String>,
    pub identity_front_file_id: String,
    pub identity_back_file_id: String,
    pub profile_picture_url: Option<String>,
    pub business_license_url: Option<String>,
    pub master_craftsman_certificate_url: Option<String>,
    pub identity_front_url: Option<String>,
    pub identity_back_url: Option<String>,
}

/// Logical result of the provisioning function.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvisioningResult {
    pub success: bool,
    pub account_id: Option<String>,
    pub person_id: Option<String>,
    pub details_submitted: Option<bool>,
    pub payouts_enabled: Option<bool>,
    pub missing_fields: Vec<String>,
    pub message: Option<String>,
}
