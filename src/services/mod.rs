// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod domains;
pub mod functions;
pub mod id_token;
pub mod identity;
pub mod normalizer;
pub mod payments;
pub mod portfolio;
pub mod registration;
pub mod settings;
pub mod state;
pub mod storage;
pub mod taxonomy;
pub mod uploads;
pub mod validation;
pub mod webmail;

pub use domains::{DnsVerifier, DohResolver, DomainService, MailAdminClient, MailServer};
pub use functions::{CallableFunctionsClient, RemoteFunctions};
pub use id_token::{IdTokenError, IdTokenVerifier, VerifiedIdentity};
pub use identity::{FirebaseAuthClient, IdentityProvider, Session};
pub use payments::{PaymentsGateway, StripeRelayClient};
pub use portfolio::PortfolioService;
pub use registration::{RegistrationDrafts, RegistrationService};
pub use settings::SettingsService;
pub use storage::{BlobStore, FirebaseStorageClient, MemoryBlobStore};
pub use uploads::{PreviewRegistry, UploadStaging};
pub use webmail::WebmailSettingsService;
