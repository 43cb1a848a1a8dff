// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Taskilo API: company onboarding, dashboard settings, payouts and
//! webmail domains for the Taskilo marketplace.
//!
//! Remote records are merged into one normalized form, edited, then split
//! back into the user and company documents. Every external service sits
//! behind a trait so the in-memory stand-ins can replace it in tests.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::DocumentStore;
use services::domains::DnsSettings;
use services::{
    BlobStore, DnsVerifier, DomainService, IdTokenVerifier, IdentityProvider, MailServer,
    PaymentsGateway, PortfolioService, PreviewRegistry, RegistrationDrafts, RegistrationService,
    RemoteFunctions, SettingsService, UploadStaging, WebmailSettingsService,
};
use std::sync::Arc;

/// External services the application talks to.
pub struct Collaborators {
    pub store: Arc<dyn DocumentStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub blobs: Arc<dyn BlobStore>,
    pub payments: Arc<dyn PaymentsGateway>,
    pub functions: Arc<dyn RemoteFunctions>,
    pub dns: Arc<dyn DnsVerifier>,
    pub mail: Arc<dyn MailServer>,
}

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn DocumentStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub payments: Arc<dyn PaymentsGateway>,
    pub previews: Arc<PreviewRegistry>,
    pub staging: Arc<UploadStaging>,
    pub id_tokens: IdTokenVerifier,
    pub settings: SettingsService,
    pub portfolio: PortfolioService,
    pub registration: RegistrationService,
    pub webmail: WebmailSettingsService,
    pub domains: DomainService,
}

impl AppState {
    /// Wire the services on top of `collaborators`.
    pub fn new(config: Config, collaborators: Collaborators) -> anyhow::Result<Self> {
        let Collaborators {
            store,
            identity,
            blobs,
            payments,
            functions,
            dns,
            mail,
        } = collaborators;

        let id_tokens = IdTokenVerifier::new(&config)?;
        let previews = Arc::new(PreviewRegistry::new());
        let staging = Arc::new(UploadStaging::new(previews.clone()));
        let drafts = Arc::new(RegistrationDrafts::new(
            staging.clone(),
            config.registration_draft_ttl,
        ));

        let settings = SettingsService::new(
            store.clone(),
            blobs.clone(),
            payments.clone(),
            staging.clone(),
        );
        let portfolio = PortfolioService::new(store.clone(), blobs, staging.clone());
        let registration = RegistrationService::new(
            store.clone(),
            identity.clone(),
            functions,
            payments.clone(),
            drafts,
            staging.clone(),
            config.app_url.clone(),
        );
        let webmail = WebmailSettingsService::new(store.clone());
        let domains = DomainService::new(store.clone(), dns, mail, DnsSettings::from(&config));

        Ok(Self {
            config,
            store,
            identity,
            payments,
            previews,
            staging,
            id_tokens,
            settings,
            portfolio,
            registration,
            webmail,
            domains,
        })
    }
}
