// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod domain;
pub mod files;
pub mod patch;
pub mod portfolio;
pub mod profile;
pub mod provisioning;
pub mod registration;
pub mod webmail;

pub use domain::{CustomDomain, DnsProvider, DnsRecord, DomainMailbox, DomainStatus};
pub use files::{FileSlot, PendingFile, StoredObject, UploadPurpose, UploadedDocument};
pub use patch::{CompanyRecordPatch, SplitPayloads, UserRecordPatch};
pub use portfolio::{AccountBalance, PayoutReceipt, PortfolioItem};
pub use profile::ProfileForm;
pub use provisioning::{ProvisioningRequest, ProvisioningResult};
pub use registration::{RegistrationForm, RegistrationOutcome, RegistrationProgress, RegistrationStep};
pub use webmail::WebmailSettings;
