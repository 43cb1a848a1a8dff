// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Registration form validation.
//!
//! All rules run before any network call. Every missing field is
//! collected into one German message so the wizard can show a single
//! banner.

use crate::error::AppError;
use crate::models::files::{FileSlot, PendingFile};
use crate::models::registration::RegistrationForm;
use std::collections::HashMap;

/// Prefix of the aggregated validation message.
pub const MISSING_FIELDS_PREFIX: &str = "Bitte alle erforderlichen Felder ausfüllen: ";

/// Minimum password length accepted by the identity provider.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Legal form as typed by the user, classified by substring the way the
/// payments onboarding does.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegalForm {
    lower: String,
}

impl LegalForm {
    pub fn classify(raw: Option<&str>) -> Self {
        Self {
            lower: raw.unwrap_or_default().trim().to_lowercase(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    /// GmbH, UG, AG and their variants.
    pub fn is_capital_company(&self) -> bool {
        ["gmbh", "ug", "ag"].iter().any(|k| self.lower.contains(k))
    }

    /// Einzelunternehmen or Freiberufler.
    pub fn is_individual(&self) -> bool {
        ["einzelunternehmen", "freiberufler"]
            .iter()
            .any(|k| self.lower.contains(k))
    }

    /// Eingetragener Kaufmann.
    pub fn is_registered_merchant(&self) -> bool {
        self.lower.contains("e.k.")
    }

    pub fn is_partnership(&self) -> bool {
        ["gbr", "ohg", "kg"].iter().any(|k| self.lower.contains(k))
    }
}

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn blank_opt(value: Option<&str>) -> bool {
    value.map(blank).unwrap_or(true)
}

/// Collects labels in order, dropping duplicates.
#[derive(Debug, Default)]
struct Missing(Vec<&'static str>);

impl Missing {
    fn require(&mut self, ok: bool, label: &'static str) {
        if !ok && !self.0.contains(&label) {
            self.0.push(label);
        }
    }
}

/// Check a registration before anything is sent anywhere.
///
/// `files` are the staged uploads of the draft. Email and password are
/// only required when the caller has no session yet.
pub fn validate(
    form: &RegistrationForm,
    files: &HashMap<FileSlot, PendingFile>,
    has_session: bool,
) -> Result<(), AppError> {
    let mut missing = Missing::default();
    let staged = |slot: FileSlot| files.get(&slot).is_some_and(|f| !f.is_empty());

    missing.require(!blank(&form.iban), "IBAN");
    missing.require(!blank(&form.account_holder), "Kontoinhaber");
    missing.require(!blank(&form.bic), "BIC");
    missing.require(!blank(&form.bank_name), "Bank Name");
    missing.require(staged(FileSlot::IdentityFront), FileSlot::IdentityFront.label());
    missing.require(staged(FileSlot::IdentityBack), FileSlot::IdentityBack.label());
    missing.require(staged(FileSlot::ProfilePicture), FileSlot::ProfilePicture.label());
    missing.require(form.hourly_rate_value() > 0.0, "Stundenpreis (muss > 0 sein)");
    missing.require(staged(FileSlot::BusinessLicense), FileSlot::BusinessLicense.label());
    missing.require(!blank_opt(form.legal_form.as_deref()), "Rechtsform");

    if !has_session {
        missing.require(form.email.contains('@') && !blank(&form.email), "E-Mail");
        missing.require(
            form.password
                .as_deref()
                .is_some_and(|p| p.chars().count() >= MIN_PASSWORD_LEN),
            "Passwort (mind. 6 Zeichen)",
        );
    }

    for slot in [FileSlot::IdentityFront, FileSlot::IdentityBack] {
        if let Some(file) = files.get(&slot) {
            missing.require(
                file.len() <= slot.max_bytes(),
                match slot {
                    FileSlot::IdentityFront => "Ausweis Vorderseite (max. 8 MB)",
                    _ => "Ausweis Rückseite (max. 8 MB)",
                },
            );
        }
    }

    check_legal_form_rules(form, &mut missing);

    if missing.0.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "{MISSING_FIELDS_PREFIX}{}.",
            missing.0.join(", ")
        )))
    }
}

fn check_legal_form_rules(form: &RegistrationForm, missing: &mut Missing) {
    let legal_form = LegalForm::classify(form.legal_form.as_deref());
    let personal_country = form.personal_country.as_deref().unwrap_or_default().trim();

    if legal_form.is_capital_company() {
        missing.require(!blank(&form.personal_street), "Straße (Geschäftsführer)");
        missing.require(
            !blank(&form.personal_house_number),
            "Hausnummer (Geschäftsführer)",
        );
        missing.require(!blank(&form.personal_postal_code), "PLZ (Geschäftsführer)");
        missing.require(!blank(&form.personal_city), "Ort (Geschäftsführer)");
        missing.require(!personal_country.is_empty(), "Land (Geschäftsführer)");
    } else if legal_form.is_individual() {
        let personal = !blank(&form.personal_street)
            && !blank(&form.personal_postal_code)
            && !blank(&form.personal_city)
            && !personal_country.is_empty();
        let company = !blank(&form.company_street)
            && !blank(&form.company_postal_code)
            && !blank(&form.company_city)
            && !blank_opt(form.company_country.as_deref());
        missing.require(personal || company, "Adresse (privat oder Firma)");
    }

    if !personal_country.is_empty() {
        missing.require(
            personal_country.chars().count() == 2,
            "Land (2-stelliger Ländercode)",
        );
    }

    if legal_form.is_empty() {
        return;
    }

    let register = !blank(&form.company_register);
    let tax = !blank(&form.tax_number) || !blank(&form.vat_id);
    let ok = if (legal_form.is_capital_company() || legal_form.is_registered_merchant()) && register {
        true
    } else if legal_form.is_capital_company() || legal_form.is_partnership() {
        tax
    } else if legal_form.is_individual() && !legal_form.is_registered_merchant() {
        tax
    } else if legal_form.is_registered_merchant() {
        false
    } else {
        register || tax
    };
    missing.require(ok, "Steuernummer, USt-IdNr. oder Handelsregisternummer");
}

/// Normalize a phone number to E.164 for the payments processor.
///
/// Numbers already starting with `+` are kept; otherwise the dial code is
/// taken from the ISO country (DE, AT, CH; anything else is treated as
/// DE) and a leading trunk zero is dropped.
pub fn normalize_phone_number(number: &str, country: Option<&str>) -> String {
    let number = number.trim();
    if number.is_empty() {
        return String::new();
    }
    let digits: String = number.chars().filter(char::is_ascii_digit).collect();
    if number.starts_with('+') {
        return format!("+{digits}");
    }
    let dial_code = match country.unwrap_or("DE").trim().to_uppercase().as_str() {
        "AT" => "+43",
        "CH" => "+41",
        _ => "+49",
    };
    format!("{dial_code}{}", digits.strip_prefix('0').unwrap_or(&digits))
}
