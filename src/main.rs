// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Taskilo API Server
//!
//! Backend for company onboarding, dashboard settings, payouts and webmail
//! custom domains.

use std::sync::Arc;
use std::time::Duration;
use taskilo_api::{
    config::Config,
    db::FirestoreDb,
    services::{
        CallableFunctionsClient, DohResolver, FirebaseAuthClient, FirebaseStorageClient,
        MailAdminClient, StripeRelayClient,
    },
    AppState, Collaborators,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Taskilo API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id).await?;

    if config.id_token_shared_secret.is_some() {
        tracing::warn!("ID tokens are verified with a shared secret; development only");
    }
    if config.mail_admin_api_key.is_empty() {
        tracing::warn!("MAIL_ADMIN_API_KEY not set, domain activation will fail");
    }

    let collaborators = Collaborators {
        store: Arc::new(db),
        identity: Arc::new(FirebaseAuthClient::new(config.firebase_api_key.clone())),
        blobs: Arc::new(FirebaseStorageClient::new(config.storage_bucket.clone())),
        payments: Arc::new(StripeRelayClient::new(
            config.stripe_upload_url.clone(),
            config.stripe_balance_url.clone(),
            config.stripe_payout_url.clone(),
        )),
        functions: Arc::new(CallableFunctionsClient::new(
            config.functions_base_url.clone(),
        )),
        dns: Arc::new(DohResolver::new(config.dns_resolver_url.clone())),
        mail: Arc::new(MailAdminClient::new(
            config.mail_admin_url.clone(),
            config.mail_admin_api_key.clone(),
        )),
    };
    tracing::info!(
        project = %config.gcp_project_id,
        bucket = %config.storage_bucket,
        "Collaborators initialized"
    );

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), collaborators)?);

    // Evict abandoned registration drafts and their staged files
    let sweep_every = (config.registration_draft_ttl / 4).max(Duration::from_secs(60));
    let sweep_state = state.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_every);
        loop {
            ticker.tick().await;
            sweep_state.registration.drafts().evict_stale();
        }
    });

    // Build router
    let app = taskilo_api::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> anyhow::Result<()> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("taskilo_api=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
