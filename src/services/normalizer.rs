// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile record normalization.
//!
//! Remote profile records carry the same data in up to three shapes:
//! `step1..step4` namespaces written by the current onboarding flow,
//! legacy flat fields from the older flow, and `*ForBackend` copies
//! used by the payments integration. [`FIELD_TABLE`] is the single list
//! of where each view-model field is read from (first present source
//! wins) and which keys it is written back to.
//!
//! The read side ([`normalize`]) never fails: every field falls back to
//! a safe default. The write side ([`split`]) produces one typed patch
//! per destination collection.

use crate::db::{set_path, Document, FieldPatch};
use crate::models::files::{FileSlot, UploadedDocuments};
use crate::models::patch::{CompanyRecordPatch, SplitPayloads, UserRecordPatch};
use crate::models::profile::{
    ProfileForm, CATEGORY_PLACEHOLDER, DEFAULT_AVATAR_URL, USER_TYPE_COMPANY,
};
use crate::models::provisioning::ProvisioningResult;
use crate::models::registration::RegistrationMeta;
use crate::services::taxonomy::{find_category_by_subcategory, mcc_for_industry};
use crate::services::validation::LegalForm;
use serde_json::{Map, Value};

/// Company storage quota granted on registration (500 MB).
pub const FREE_STORAGE_LIMIT_BYTES: i64 = 500 * 1024 * 1024;

/// How a field is coerced when read, and its default when absent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    Text(&'static str),
    OptText,
    Flag(bool),
    Number(f64),
    OptNumber,
    List,
}

impl FieldKind {
    fn default_value(self) -> Value {
        match self {
            FieldKind::Text(s) => Value::String(s.to_string()),
            FieldKind::Flag(b) => Value::Bool(b),
            FieldKind::Number(n) => number_value(n),
            FieldKind::OptText | FieldKind::OptNumber => Value::Null,
            FieldKind::List => Value::Array(Vec::new()),
        }
    }

    fn is_optional(self) -> bool {
        matches!(self, FieldKind::OptText | FieldKind::OptNumber)
    }
}

/// Which payload receives a field when the identity has no company record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Personal data; written to `users` for private customers.
    Personal,
    Company,
}

/// One row of the fallback table.
#[derive(Debug)]
pub struct FieldRule {
    /// Dotted path in the view-model.
    pub view: &'static str,
    /// Stored locations, most authoritative first.
    pub sources: &'static [&'static str],
    /// Keys written on split. Empty for fields written by dedicated logic.
    pub writes: &'static [&'static str],
    pub kind: FieldKind,
    pub scope: Scope,
}

const fn rule(
    view: &'static str,
    sources: &'static [&'static str],
    writes: &'static [&'static str],
    kind: FieldKind,
    scope: Scope,
) -> FieldRule {
    FieldRule {
        view,
        sources,
        writes,
        kind,
        scope,
    }
}

use FieldKind::{Flag, List, Number, OptNumber, OptText, Text};
use Scope::{Company, Personal};

pub static FIELD_TABLE: &[FieldRule] = &[
    // ─── step1: personal ─────────────────────────────────────────
    rule("step1.firstName", &["step1.firstName", "firstName"], &["step1.firstName", "firstName"], Text(""), Personal),
    rule("step1.lastName", &["step1.lastName", "lastName"], &["step1.lastName", "lastName"], Text(""), Personal),
    rule("step1.email", &["step1.email", "email"], &["step1.email", "email"], Text(""), Personal),
    rule("step1.phoneNumber", &["step1.phoneNumber", "phoneNumber"], &["step1.phoneNumber", "phoneNumber"], Text(""), Personal),
    rule("step1.dateOfBirth", &["step1.dateOfBirth", "dateOfBirth"], &["step1.dateOfBirth", "dateOfBirth"], Text(""), Personal),
    rule("step1.personalStreet", &["step1.personalStreet", "personalStreet"], &["step1.personalStreet", "personalStreet"], Text(""), Personal),
    rule("step1.personalHouseNumber", &["step1.personalHouseNumber", "personalHouseNumber"], &["step1.personalHouseNumber", "personalHouseNumber"], Text(""), Personal),
    rule("step1.personalPostalCode", &["step1.personalPostalCode", "personalPostalCode"], &["step1.personalPostalCode", "personalPostalCode"], Text(""), Personal),
    rule("step1.personalCity", &["step1.personalCity", "personalCity"], &["step1.personalCity", "personalCity"], Text(""), Personal),
    rule("step1.personalCountry", &["step1.personalCountry", "personalCountry"], &["step1.personalCountry", "personalCountry"], Text("DE"), Personal),
    rule("step1.isManagingDirectorOwner", &["step1.isManagingDirectorOwner", "isManagingDirectorOwner"], &["step1.isManagingDirectorOwner", "isManagingDirectorOwner"], Flag(true), Personal),
    // ─── step2: company ──────────────────────────────────────────
    rule("step2.companyName", &["step2.companyName", "companyName"], &["step2.companyName", "companyName"], Text(""), Company),
    rule("step2.companySuffix", &["step2.companySuffix", "companySuffix"], &["step2.companySuffix", "companySuffix"], Text(""), Company),
    rule("step2.companyPhoneNumber", &["step2.companyPhoneNumber", "companyPhoneNumber", "companyPhoneNumberForBackend", "phoneNumber"], &["step2.companyPhoneNumber", "companyPhoneNumber", "companyPhoneNumberForBackend"], Text(""), Company),
    rule("step2.legalForm", &["step2.legalForm", "legalForm"], &["step2.legalForm", "legalForm"], OptText, Company),
    rule("step2.address", &["step2.address", "companyAddressLine1ForBackend", "address"], &["step2.address", "companyAddressLine1ForBackend"], Text(""), Company),
    rule("step2.street", &["step2.street", "companyStreet", "street", "personalStreet"], &["step2.street", "companyStreet"], Text(""), Company),
    rule("step2.houseNumber", &["step2.houseNumber", "companyHouseNumber", "houseNumber", "personalHouseNumber"], &["step2.houseNumber", "companyHouseNumber"], Text(""), Company),
    rule("step2.postalCode", &["step2.postalCode", "companyPostalCode", "companyPostalCodeForBackend", "postalCode", "personalPostalCode"], &["step2.postalCode", "companyPostalCode", "companyPostalCodeForBackend"], Text(""), Company),
    rule("step2.city", &["step2.city", "companyCity", "companyCityForBackend", "city", "personalCity"], &["step2.city", "companyCity", "companyCityForBackend"], Text(""), Company),
    rule("step2.country", &["step2.country", "companyCountry", "companyCountryForBackend", "country", "personalCountry"], &["step2.country", "companyCountry", "companyCountryForBackend"], Text("DE"), Company),
    rule("step2.website", &["step2.website", "companyWebsite", "companyWebsiteForBackend", "website"], &["step2.website", "companyWebsite", "companyWebsiteForBackend"], Text(""), Company),
    rule("step2.fax", &["step2.fax", "fax"], &["step2.fax", "fax"], Text(""), Company),
    rule("step2.languages", &["step2.languages", "languages"], &["step2.languages", "languages"], Text(""), Company),
    rule("step2.description", &["step2.description", "description", "publicDescription"], &["step2.description", "description"], Text(""), Company),
    rule("step2.employees", &["step2.employees", "employees"], &["step2.employees", "employees"], Text(""), Company),
    rule("step2.industryMcc", &["step2.industryMcc", "industryMcc"], &[], Text(""), Company),
    // ─── step3: tax, accounting, documents ───────────────────────
    rule("step3.hourlyRate", &["step3.hourlyRate", "hourlyRate"], &["step3.hourlyRate"], Text("0"), Company),
    rule("step3.taxNumber", &["step3.taxNumber", "taxNumber", "taxNumberForBackend"], &["step3.taxNumber", "taxNumber", "taxNumberForBackend"], Text(""), Company),
    rule("step3.vatId", &["step3.vatId", "vatId", "vatIdForBackend"], &["step3.vatId", "vatId", "vatIdForBackend"], Text(""), Company),
    rule("step3.companyRegister", &["step3.companyRegister", "companyRegister", "companyRegisterForBackend"], &["step3.companyRegister", "companyRegister", "companyRegisterForBackend"], Text(""), Company),
    rule("step3.districtCourt", &["step3.districtCourt", "districtCourt"], &["step3.districtCourt", "districtCourt"], Text(""), Company),
    rule("step3.ust", &["step3.ust", "ust"], &["step3.ust", "ust"], Text("standard"), Company),
    rule("step3.profitMethod", &["step3.profitMethod", "profitMethod"], &["step3.profitMethod", "profitMethod"], Text("euer"), Company),
    rule("step3.taxMethod", &["step3.taxMethod", "taxMethod"], &["step3.taxMethod", "taxMethod"], Text("soll"), Company),
    rule("step3.defaultTaxRate", &["step3.defaultTaxRate", "defaultTaxRate"], &["step3.defaultTaxRate", "defaultTaxRate"], Text("19"), Company),
    rule("step3.accountingSystem", &["step3.accountingSystem", "accountingSystem"], &["step3.accountingSystem", "accountingSystem"], Text("skr03"), Company),
    rule("step3.priceInput", &["step3.priceInput", "priceInput"], &["step3.priceInput", "priceInput"], Text("netto"), Company),
    rule("step3.lastInvoiceNumber", &["step3.lastInvoiceNumber", "lastInvoiceNumber"], &["step3.lastInvoiceNumber", "lastInvoiceNumber"], OptText, Company),
    rule("step3.profilePictureURL", &["profilePictureFirebaseUrl", "step3.profilePictureURL", "profilePictureURL"], &[], Text(DEFAULT_AVATAR_URL), Company),
    rule("step3.businessLicenseURL", &["step3.businessLicenseURL", "businessLicenseURL", "businessLicenseFirebaseUrl"], &[], OptText, Company),
    rule("step3.masterCraftsmanCertificateURL", &["step3.masterCraftsmanCertificateURL", "masterCraftsmanCertificateURL", "masterCraftsmanCertificateFirebaseUrl"], &[], OptText, Company),
    rule("step3.identityFrontUrl", &["step3.identityFrontUrl", "identityFrontUrl", "identityFrontFirebaseUrl"], &[], OptText, Company),
    rule("step3.identityBackUrl", &["step3.identityBackUrl", "identityBackUrl", "identityBackFirebaseUrl"], &[], OptText, Company),
    // ─── step4: bank ─────────────────────────────────────────────
    rule("step4.accountHolder", &["step4.accountHolder", "accountHolder"], &["step4.accountHolder", "accountHolder"], Text(""), Company),
    rule("step4.iban", &["step4.iban", "iban"], &["step4.iban", "iban"], Text(""), Company),
    rule("step4.bic", &["step4.bic", "bic"], &["step4.bic", "bic"], Text(""), Company),
    rule("step4.bankName", &["step4.bankName", "bankName"], &["step4.bankName", "bankName"], Text(""), Company),
    rule("step4.bankCountry", &["step4.bankCountry", "bankCountry", "companyCountry"], &["step4.bankCountry", "bankCountry"], OptText, Company),
    // ─── top level ───────────────────────────────────────────────
    rule("lat", &["lat"], &["lat"], OptNumber, Company),
    rule("lng", &["lng"], &["lng"], OptNumber, Company),
    rule("radiusKm", &["radiusKm"], &["radiusKm"], Number(30.0), Company),
    rule("selectedCategory", &["selectedCategory", "step2.industry"], &[], OptText, Company),
    rule("selectedSubcategory", &["selectedSubcategory"], &["selectedSubcategory"], OptText, Company),
    rule("profileBannerImage", &["profileBannerImage"], &["profileBannerImage"], OptText, Company),
    rule("stripeAccountId", &["stripeAccountId"], &[], OptText, Company),
    // ─── public profile ──────────────────────────────────────────
    rule("publicProfile.publicDescription", &["publicDescription"], &["publicDescription"], Text(""), Company),
    rule("publicProfile.specialties", &["specialties"], &["specialties"], List, Company),
    rule("publicProfile.servicePackages", &["servicePackages"], &["servicePackages"], List, Company),
    rule("publicProfile.workingHours", &["workingHours"], &["workingHours"], List, Company),
    rule("publicProfile.instantBooking", &["instantBooking"], &["instantBooking"], Flag(false), Company),
    rule("publicProfile.responseTimeGuarantee", &["responseTimeGuarantee"], &["responseTimeGuarantee"], Number(24.0), Company),
    rule("publicProfile.faqs", &["faqs"], &["faqs"], List, Company),
    rule("publicProfile.businessLicense", &["businessLicense"], &["businessLicense"], Text(""), Company),
    rule("publicProfile.certifications", &["certifications"], &["certifications"], List, Company),
];

// ─── Read path ───────────────────────────────────────────────

/// Walk a dotted path. Missing segments, non-object intermediates and
/// `null` all count as absent.
pub fn resolve<'a>(raw: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = raw.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    (!current.is_null()).then_some(current)
}

/// First present value along `paths`, else `default`.
pub fn resolve_chain<'a>(raw: &'a Document, paths: &[&str], default: &'a Value) -> &'a Value {
    paths
        .iter()
        .find_map(|path| resolve(raw, path))
        .unwrap_or(default)
}

fn text_at(raw: &Document, path: &str) -> Option<String> {
    resolve(raw, path).and_then(|v| coerce(v, Text("")))
        .and_then(|v| v.as_str().map(str::to_string))
}

fn coerce(value: &Value, kind: FieldKind) -> Option<Value> {
    match kind {
        Text(_) | OptText => match value {
            Value::String(_) => Some(value.clone()),
            Value::Number(n) => Some(Value::String(n.to_string())),
            Value::Bool(b) => Some(Value::String(b.to_string())),
            _ => None,
        },
        Flag(_) => match value {
            Value::Bool(_) => Some(value.clone()),
            Value::String(s) if s == "true" => Some(Value::Bool(true)),
            Value::String(s) if s == "false" => Some(Value::Bool(false)),
            _ => None,
        },
        Number(_) | OptNumber => match value {
            Value::Number(_) => Some(value.clone()),
            Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok().map(number_value),
            _ => None,
        },
        List => value.is_array().then(|| value.clone()),
    }
}

/// JSON number for `n`, integral values as integers so they compare equal
/// to what was stored.
pub fn number_value(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

fn is_real_category(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && value != CATEGORY_PLACEHOLDER
}

/// Industry label: explicit value, else the category of the stored
/// subcategory, else the stored category, else the legacy flat field.
/// Never absent; `""` when nothing is known.
pub fn derive_industry(raw: &Document) -> String {
    if let Some(explicit) = text_at(raw, "step2.industry").filter(|v| is_real_category(v)) {
        return explicit.trim().to_string();
    }
    if let Some(category) = text_at(raw, "selectedSubcategory")
        .as_deref()
        .and_then(find_category_by_subcategory)
    {
        return category.to_string();
    }
    if let Some(category) = text_at(raw, "selectedCategory").filter(|v| is_real_category(v)) {
        return category.trim().to_string();
    }
    text_at(raw, "industry")
        .filter(|v| is_real_category(v))
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}

/// Deep-merge the company record over the user record.
pub fn merge_records(user: Option<&Document>, company: Option<&Document>) -> Document {
    let mut merged = user.cloned().unwrap_or_default();
    if let Some(company) = company {
        deep_merge(&mut merged, company);
    }
    merged
}

fn deep_merge(target: &mut Document, overlay: &Document) {
    for (key, value) in overlay {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                deep_merge(existing, incoming)
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Build the view-model from a raw (possibly merged) record.
pub fn normalize(raw: &Document) -> ProfileForm {
    let mut view = Document::new();
    for rule in FIELD_TABLE {
        let value = rule
            .sources
            .iter()
            .filter_map(|path| resolve(raw, path))
            .find_map(|v| coerce(v, rule.kind))
            .unwrap_or_else(|| rule.kind.default_value());
        set_path(&mut view, rule.view, value);
    }

    set_path(&mut view, "step2.industry", Value::String(derive_industry(raw)));
    for key in ["uid", "email", "user_type"] {
        view.insert(
            key.to_string(),
            Value::String(text_at(raw, key).unwrap_or_default()),
        );
    }

    let mut form: ProfileForm = match serde_json::from_value(Value::Object(view)) {
        Ok(form) => form,
        Err(e) => {
            tracing::warn!(error = %e, "Normalized view did not deserialize, using defaults");
            ProfileForm::default()
        }
    };

    if form.step2.address.trim().is_empty() {
        form.step2.address = format!("{} {}", form.step2.street.trim(), form.step2.house_number.trim())
            .trim()
            .to_string();
    }

    form
}

// ─── Write path ──────────────────────────────────────────────

/// Values produced by uploads and flows that the view-model does not hold.
#[derive(Debug, Clone, Default)]
pub struct SplitInputs {
    /// Timestamp written to `updatedAt`.
    pub now: String,
    /// Freshly uploaded profile picture.
    pub profile_picture_url: Option<String>,
    /// Freshly uploaded banner image.
    pub banner_url: Option<String>,
    /// Freshly uploaded compliance documents.
    pub documents: UploadedDocuments,
    /// Set when splitting as part of a registration.
    pub registration: Option<RegistrationMeta>,
    /// `users/{uid}` as stored before the edit.
    pub stored_user: Option<Document>,
    /// `companies/{uid}` as stored before the edit.
    pub stored_company: Option<Document>,
}

/// Stored key names for a relay-uploaded document: view key, file id key, blob URL key.
fn document_keys(slot: FileSlot) -> Option<(&'static str, &'static str, &'static str)> {
    match slot {
        FileSlot::BusinessLicense => Some((
            "step3.businessLicenseURL",
            "businessLicenseStripeId",
            "businessLicenseFirebaseUrl",
        )),
        FileSlot::MasterCraftsmanCertificate => Some((
            "step3.masterCraftsmanCertificateURL",
            "masterCraftsmanCertificateStripeId",
            "masterCraftsmanCertificateFirebaseUrl",
        )),
        FileSlot::IdentityFront => Some((
            "step3.identityFrontUrl",
            "identityFrontUrlStripeId",
            "identityFrontFirebaseUrl",
        )),
        FileSlot::IdentityBack => Some((
            "step3.identityBackUrl",
            "identityBackUrlStripeId",
            "identityBackFirebaseUrl",
        )),
        FileSlot::ProfilePicture | FileSlot::ProfileBanner | FileSlot::PortfolioImage => None,
    }
}

/// Canonicalize numbers so integral floats are written as integers.
fn canonical(value: &Value) -> Value {
    match value {
        Value::Number(n) if n.is_f64() => n.as_f64().map(number_value).unwrap_or(Value::Null),
        other => other.clone(),
    }
}

/// The stored value at `key` when it reads back as `value`, else `value`.
/// Legacy records mix strings and numbers; an unedited field keeps its
/// stored JSON type.
fn keep_stored_type(stored: Option<&Document>, key: &str, value: Value, kind: FieldKind) -> Value {
    match stored.and_then(|doc| resolve(doc, key)) {
        Some(old) if coerce(old, kind).map(|v| canonical(&v)) == Some(canonical(&value)) => {
            old.clone()
        }
        _ => value,
    }
}

/// Hourly rate as a number for the legacy flat field.
fn hourly_rate_number(text: &str) -> Value {
    let text = text.trim().replace(',', ".");
    if let Ok(n) = text.parse::<i64>() {
        return Value::from(n);
    }
    text.parse::<f64>().map(number_value).unwrap_or(Value::Null)
}

/// Split an edited view-model into per-collection patches.
///
/// Every table field is written to its namespaced key and its legacy
/// mirrors. Absent optional fields are skipped rather than nulled, so an
/// unedited record round-trips unchanged.
pub fn split(form: &ProfileForm, inputs: &SplitInputs) -> SplitPayloads {
    let mut view = match serde_json::to_value(form) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    if let Some(url) = &inputs.banner_url {
        view.insert("profileBannerImage".to_string(), Value::String(url.clone()));
    }

    let mut company = FieldPatch::new();
    let mut personal = FieldPatch::new();
    for rule in FIELD_TABLE {
        let Some(value) = resolve(&view, rule.view) else {
            continue;
        };
        if rule.kind.is_optional() && value.is_null() {
            continue;
        }
        let value = canonical(value);
        for key in rule.writes {
            let stored = inputs.stored_company.as_ref();
            company.set(*key, keep_stored_type(stored, key, value.clone(), rule.kind));
            if rule.scope == Scope::Personal {
                let stored = inputs.stored_user.as_ref();
                personal.set(*key, keep_stored_type(stored, key, value.clone(), rule.kind));
            }
        }
    }

    let industry = form.step2.industry.trim();
    if is_real_category(industry) {
        company
            .set("step2.industry", industry)
            .set("selectedCategory", industry);
        let mcc = mcc_for_industry(Some(industry));
        company.set("step2.industryMcc", mcc).set("industryMcc", mcc);
    } else if !form.step2.industry_mcc.is_empty() {
        let mcc = form.step2.industry_mcc.as_str();
        company.set("step2.industryMcc", mcc).set("industryMcc", mcc);
    }
    company.set(
        "hourlyRate",
        keep_stored_type(
            inputs.stored_company.as_ref(),
            "hourlyRate",
            hourly_rate_number(&form.step3.hourly_rate),
            Number(0.0),
        ),
    );
    company.set("updatedAt", inputs.now.as_str());

    let mut user = FieldPatch::new();
    if form.is_company() || inputs.registration.is_some() {
        let stored = inputs.stored_user.as_ref();
        for (key, value) in [
            ("firstName", &form.step1.first_name),
            ("lastName", &form.step1.last_name),
            ("phoneNumber", &form.step1.phone_number),
        ] {
            user.set(key, keep_stored_type(stored, key, Value::from(value.as_str()), Text("")));
        }
        if !form.step1.email.is_empty() {
            user.set(
                "email",
                keep_stored_type(stored, "email", Value::from(form.step1.email.as_str()), Text("")),
            );
        }
    } else {
        user.extend(personal);
    }
    user.set("updatedAt", inputs.now.as_str());

    if let Some(url) = &inputs.profile_picture_url {
        for key in ["step3.profilePictureURL", "profilePictureURL", "profilePictureFirebaseUrl"] {
            company.set(key, url.as_str());
        }
        user.set("profilePictureURL", url.as_str());
    } else if form.remove_profile_picture {
        for key in ["step3.profilePictureURL", "profilePictureURL", "profilePictureFirebaseUrl"] {
            company.delete(key);
        }
        user.delete("profilePictureURL");
    }

    for (slot, doc) in &inputs.documents {
        if let Some((view_key, id_key, url_key)) = document_keys(*slot) {
            let shown = doc
                .firebase_storage_url
                .clone()
                .unwrap_or_else(|| doc.stripe_file_id.clone());
            company
                .set(view_key, shown)
                .set(id_key, doc.stripe_file_id.as_str());
            company.set_opt(url_key, doc.firebase_storage_url.clone());
        }
    }

    if let Some(meta) = &inputs.registration {
        add_registration_fields(form, inputs, meta, &mut user, &mut company);
    }

    let company = if form.is_company() || inputs.registration.is_some() {
        Some(CompanyRecordPatch::from_patch(company))
    } else {
        None
    };

    SplitPayloads {
        user: UserRecordPatch::from_patch(user),
        company,
    }
}

fn set_or_delete<V: Into<Value>>(patch: &mut FieldPatch, key: &str, value: Option<V>) {
    match value {
        Some(v) => patch.set(key, v),
        None => patch.delete(key),
    };
}

fn add_registration_fields(
    form: &ProfileForm,
    inputs: &SplitInputs,
    meta: &RegistrationMeta,
    user: &mut FieldPatch,
    company: &mut FieldPatch,
) {
    let uid = meta.uid.as_str();
    let now = inputs.now.as_str();

    user.set("uid", uid)
        .set("user_type", USER_TYPE_COMPANY)
        .set("createdAt", now)
        .set("stripeProvisioningStatus", "pending");

    company
        .set("uid", uid)
        .set("owner_uid", uid)
        .set("email", form.email.as_str())
        .set("ownerEmail", form.email.as_str())
        .set("ownerFirstName", form.step1.first_name.trim())
        .set("ownerLastName", form.step1.last_name.trim())
        .set("user_type", USER_TYPE_COMPANY)
        .set("accountType", "business")
        .set(
            "taskiloProfileUrl",
            format!("{}/profile/{}", meta.app_url.trim_end_matches('/'), uid),
        )
        .set("common.tosAcceptanceIp", meta.client_ip.as_str())
        .set("common.tosAcceptanceUserAgent", meta.user_agent.as_str())
        .set("common.registrationCompletedAt", now)
        .set("status", "pending_verification")
        .set("profileComplete", false)
        .set("storageLimit", FREE_STORAGE_LIMIT_BYTES)
        .set("storagePlanId", "free")
        .set("createdAt", now)
        .set("profileLastUpdatedAt", now)
        .set(
            "location",
            match (form.step2.city.trim(), form.step2.postal_code.trim()) {
                (city, "") => city.to_string(),
                (city, postal) => format!("{city}, {postal}"),
            },
        );

    let ownership = &meta.ownership;
    set_or_delete(company, "ownershipPercentage", ownership.ownership_percentage);
    set_or_delete(company, "isActualDirector", ownership.is_actual_director);
    set_or_delete(company, "isActualOwner", ownership.is_actual_owner);
    set_or_delete(
        company,
        "actualOwnershipPercentage",
        ownership.actual_ownership_percentage,
    );
    set_or_delete(company, "isActualExecutive", ownership.is_actual_executive);
    company.set(
        "actualRepresentativeTitle",
        ownership
            .actual_representative_title
            .clone()
            .map(Value::String)
            .unwrap_or(Value::Null),
    );

    let legal_form = LegalForm::classify(form.step2.legal_form.as_deref());
    let register = form.step3.company_register.trim();
    if (legal_form.is_capital_company() || legal_form.is_registered_merchant()) && !register.is_empty() {
        company.set("companyRegisterPublic", register);
    }

    if let Some(picture) = inputs.documents.get(&FileSlot::ProfilePicture) {
        company.set("profilePictureStripeFileId", picture.stripe_file_id.as_str());
    }
    if !inputs.documents.contains_key(&FileSlot::MasterCraftsmanCertificate) {
        company.delete("masterCraftsmanCertificateStripeId");
    }
}

/// Patch recording a successful account provisioning on `users/{uid}`.
pub fn provisioning_patch(result: &ProvisioningResult, now: &str) -> UserRecordPatch {
    let mut patch = FieldPatch::new();
    let details_submitted = result.details_submitted.unwrap_or(false);
    patch
        .set("stripeAccountDetailsSubmitted", details_submitted)
        .set(
            "stripeAccountPayoutsEnabled",
            result.payouts_enabled.unwrap_or(false),
        )
        .set("stripeProvisioningStatus", "provisioned")
        .set("common.createdByCallable", true)
        .set(
            "common.stripeVerificationStatus",
            if details_submitted {
                "details_submitted"
            } else {
                "pending"
            },
        )
        .set("updatedAt", now);
    patch.set_opt("stripeAccountId", result.account_id.clone());
    set_or_delete(&mut patch, "stripeRepresentativePersonId", result.person_id.clone());
    UserRecordPatch::from_patch(patch)
}

/// Patch recording that provisioning failed after the records were written.
pub fn provisioning_pending_patch(message: &str, missing_fields: &[String], now: &str) -> UserRecordPatch {
    let mut patch = FieldPatch::new();
    patch
        .set("stripeProvisioningStatus", "pending")
        .set("stripeProvisioningError", message)
        .set("stripeProvisioningMissingFields", missing_fields.to_vec())
        .set("updatedAt", now);
    UserRecordPatch::from_patch(patch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: Value) -> Document {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    fn view_of(form: &ProfileForm) -> Document {
        doc(serde_json::to_value(form).unwrap())
    }

    fn sample(kind: FieldKind, i: usize) -> Value {
        match kind {
            Text(_) | OptText => json!(format!("value-{i}")),
            Flag(d) => json!(if i == 0 { !d } else { d }),
            Number(_) | OptNumber => json!(i as f64 + 0.5),
            List => json!([format!("item-{i}")]),
        }
    }

    #[test]
    fn resolve_treats_null_and_non_objects_as_absent() {
        let raw = doc(json!({"a": {"b": null, "c": 1}, "s": "text"}));
        assert_eq!(resolve(&raw, "a.c"), Some(&json!(1)));
        assert_eq!(resolve(&raw, "a.b"), None);
        assert_eq!(resolve(&raw, "s.x"), None);
        assert_eq!(resolve(&raw, "missing"), None);
        let fallback = json!("");
        assert_eq!(resolve_chain(&raw, &["a.b", "s"], &fallback), &json!("text"));
        assert_eq!(resolve_chain(&raw, &["a.b"], &fallback), &json!(""));
    }

    #[test]
    fn every_source_is_reachable() {
        for rule in FIELD_TABLE {
            for (i, source) in rule.sources.iter().enumerate() {
                let mut raw = Document::new();
                set_path(&mut raw, source, sample(rule.kind, i));
                let view = view_of(&normalize(&raw));
                assert_eq!(
                    resolve(&view, rule.view),
                    Some(&sample(rule.kind, i)),
                    "{} from {}",
                    rule.view,
                    source
                );
            }
        }
    }

    #[test]
    fn first_source_wins() {
        for rule in FIELD_TABLE.iter().filter(|r| r.sources.len() > 1) {
            let mut raw = Document::new();
            for (i, source) in rule.sources.iter().enumerate().rev() {
                set_path(&mut raw, source, sample(rule.kind, i));
            }
            let view = view_of(&normalize(&raw));
            assert_eq!(
                resolve(&view, rule.view),
                Some(&sample(rule.kind, 0)),
                "{}",
                rule.view
            );
        }
    }

    #[test]
    fn empty_record_normalizes_to_defaults() {
        assert_eq!(normalize(&Document::new()), ProfileForm::default());
    }

    #[test]
    fn coercion_of_legacy_types() {
        let raw = doc(json!({
            "hourlyRate": 45,
            "radiusKm": "12,5",
            "step1": {"isManagingDirectorOwner": "false"},
            "specialties": "not a list"
        }));
        let form = normalize(&raw);
        assert_eq!(form.step3.hourly_rate, "45");
        assert_eq!(form.radius_km, 12.5);
        assert!(!form.step1.is_managing_director_owner);
        assert!(form.public_profile.specialties.is_empty());
    }

    #[test]
    fn address_line_is_composed_when_missing() {
        let raw = doc(json!({"companyStreet": "Hauptstr.", "companyHouseNumber": "5"}));
        assert_eq!(normalize(&raw).step2.address, "Hauptstr. 5");
    }

    #[test]
    fn industry_placeholder_is_skipped() {
        let raw = doc(json!({
            "step2": {"industry": "Bitte wählen"},
            "selectedCategory": "IT & Technik"
        }));
        assert_eq!(derive_industry(&raw), "IT & Technik");
    }

    #[test]
    fn explicit_industry_beats_subcategory() {
        let raw = doc(json!({
            "step2": {"industry": "Kunst & Kultur"},
            "selectedSubcategory": "Elektriker"
        }));
        assert_eq!(derive_industry(&raw), "Kunst & Kultur");
    }

    #[test]
    fn merge_prefers_company_record() {
        let user = doc(json!({"firstName": "Max", "step1": {"city": "Berlin", "zip": "1"}}));
        let company = doc(json!({"companyName": "Acme", "step1": {"city": "Hamburg"}}));
        let merged = merge_records(Some(&user), Some(&company));
        assert_eq!(
            Value::Object(merged),
            json!({
                "firstName": "Max",
                "companyName": "Acme",
                "step1": {"city": "Hamburg", "zip": "1"}
            })
        );
    }

    #[test]
    fn split_mirrors_namespaced_fields() {
        let mut form = ProfileForm {
            user_type: USER_TYPE_COMPANY.to_string(),
            ..Default::default()
        };
        form.step2.company_name = "Acme".into();
        form.step3.hourly_rate = "55".into();
        form.step2.industry = "Handwerk".into();

        let payloads = split(&form, &SplitInputs::default());
        let company = payloads.company.expect("company patch");
        let fields = company.fields();
        assert_eq!(fields.value("step2.companyName"), Some(&json!("Acme")));
        assert_eq!(fields.value("companyName"), Some(&json!("Acme")));
        assert_eq!(fields.value("hourlyRate"), Some(&json!(55)));
        assert_eq!(fields.value("step3.hourlyRate"), Some(&json!("55")));
        assert_eq!(fields.value("industryMcc"), Some(&json!("1731")));
        assert_eq!(fields.value("selectedCategory"), Some(&json!("Handwerk")));
        assert!(fields.value("legalForm").is_none());

        let user = payloads.user.fields();
        assert!(user.value("firstName").is_some());
        assert!(user.value("companyName").is_none());
    }

    #[test]
    fn split_for_private_customer_has_no_company_patch() {
        let mut form = ProfileForm::default();
        form.step1.personal_city = "Köln".into();
        let payloads = split(&form, &SplitInputs::default());
        assert!(payloads.company.is_none());
        assert_eq!(
            payloads.user.fields().value("step1.personalCity"),
            Some(&json!("Köln"))
        );
        assert_eq!(payloads.user.fields().value("personalCity"), Some(&json!("Köln")));
    }

    #[test]
    fn removing_profile_picture_deletes_fields() {
        let form = ProfileForm {
            user_type: USER_TYPE_COMPANY.to_string(),
            remove_profile_picture: true,
            ..Default::default()
        };
        let payloads = split(&form, &SplitInputs::default());
        assert_eq!(
            payloads.user.fields().get("profilePictureURL"),
            Some(&crate::db::PatchValue::Delete)
        );
        let company = payloads.company.unwrap();
        assert_eq!(
            company.fields().get("profilePictureFirebaseUrl"),
            Some(&crate::db::PatchValue::Delete)
        );
    }

    #[test]
    fn empty_industry_keeps_stored_mcc() {
        let mut form = ProfileForm {
            user_type: USER_TYPE_COMPANY.to_string(),
            ..Default::default()
        };
        form.step2.industry_mcc = "7372".into();
        let company = split(&form, &SplitInputs::default()).company.unwrap();
        assert_eq!(company.fields().value("industryMcc"), Some(&json!("7372")));
        assert!(company.fields().value("step2.industry").is_none());
    }

    #[test]
    fn provisioning_patch_deletes_missing_person() {
        let result = ProvisioningResult {
            success: true,
            account_id: Some("acct_1".into()),
            details_submitted: Some(true),
            ..Default::default()
        };
        let patch = provisioning_patch(&result, "now");
        let fields = patch.fields();
        assert_eq!(fields.value("stripeAccountId"), Some(&json!("acct_1")));
        assert_eq!(
            fields.get("stripeRepresentativePersonId"),
            Some(&crate::db::PatchValue::Delete)
        );
        assert_eq!(
            fields.value("common.stripeVerificationStatus"),
            Some(&json!("details_submitted"))
        );
    }

    #[test]
    fn unedited_legacy_record_keeps_stored_values() {
        let stored = doc(json!({
            "user_type": "firma",
            "companyName": "Muster Elektro",
            "companyPostalCode": "10115",
            "postalCode": "20095",
            "hourlyRate": "45",
            "defaultTaxRate": 19,
            "lat": "52.5",
            "lng": 13.4,
            "radiusKm": "25",
            "instantBooking": "true"
        }));
        let form = normalize(&stored);
        assert_eq!(form.step2.postal_code, "10115");

        let inputs = SplitInputs {
            stored_company: Some(stored.clone()),
            ..Default::default()
        };
        let company = split(&form, &inputs).company.expect("company patch");
        let fields = company.fields();
        assert!(fields.get("postalCode").is_none());
        for (key, value) in &stored {
            if let Some(written) = fields.value(key) {
                assert_eq!(written, value, "{key}");
            }
        }
        assert_eq!(fields.value("hourlyRate"), Some(&json!("45")));
        assert_eq!(fields.value("defaultTaxRate"), Some(&json!(19)));
        assert_eq!(fields.value("lat"), Some(&json!("52.5")));
        assert_eq!(fields.value("step3.hourlyRate"), Some(&json!("45")));
    }

    #[test]
    fn edited_value_replaces_stored_type() {
        let stored = doc(json!({"user_type": "firma", "hourlyRate": "45", "defaultTaxRate": 19}));
        let mut form = normalize(&stored);
        form.step3.hourly_rate = "50".into();
        form.step3.default_tax_rate = "7".into();

        let inputs = SplitInputs {
            stored_company: Some(stored),
            ..Default::default()
        };
        let company = split(&form, &inputs).company.expect("company patch");
        assert_eq!(company.fields().value("hourlyRate"), Some(&json!(50)));
        assert_eq!(company.fields().value("defaultTaxRate"), Some(&json!("7")));
    }

    #[test]
    fn number_values_are_canonical() {
        assert_eq!(number_value(30.0), json!(30));
        assert_eq!(number_value(12.5), json!(12.5));
        assert_eq!(number_value(f64::NAN), Value::Null);
    }
}
