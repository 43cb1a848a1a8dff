// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users: dashboard settings, staged files,
//! payouts and password change.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::files::FileSlot;
use crate::models::portfolio::{AccountBalance, PayoutReceipt};
use crate::models::profile::ProfileForm;
use crate::routes::auth::{session_cookie, SessionResponse};
use crate::routes::{parse_slot, read_file_field, UPLOAD_BODY_LIMIT};
use crate::services::identity::change_password;
use crate::services::payments::{quote, request_payout, PayoutQuote};
use crate::services::uploads::StagingOwner;
use crate::AppState;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require authentication via ID token).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/profile", get(get_profile).put(save_profile))
        .route("/api/profile/files", get(list_staged_files))
        .route(
            "/api/profile/files/{slot}",
            put(stage_file)
                .delete(clear_file)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/payouts/balance", get(get_balance))
        .route("/api/payouts/quote", get(get_quote))
        .route("/api/payouts", post(create_payout))
        .route("/api/auth/password", post(update_password))
}

// ─── Profile ─────────────────────────────────────────────────

/// Dashboard settings form of the current user.
async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ProfileForm>> {
    Ok(Json(state.settings.load(&user.uid).await?))
}

/// Save the settings form together with any staged files.
async fn save_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(form): Json<ProfileForm>,
) -> Result<Json<ProfileForm>> {
    let saved = state.settings.save(&user.session(), form).await?;
    Ok(Json(saved))
}

// ─── Staged Files ────────────────────────────────────────────

/// Preview URL of a freshly staged file.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct StagedFileResponse {
    pub slot: FileSlot,
    pub preview_url: String,
}

async fn list_staged_files(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Json<HashMap<FileSlot, String>> {
    Json(state.staging.previews(&StagingOwner::User(user.uid)))
}

async fn stage_file(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(slot): Path<String>,
    multipart: Multipart,
) -> Result<Json<StagedFileResponse>> {
    let slot = parse_slot(&slot)?;
    let file = read_file_field(multipart).await?;
    let preview_url = state
        .staging
        .stage(&StagingOwner::User(user.uid), slot, file)?;
    Ok(Json(StagedFileResponse { slot, preview_url }))
}

async fn clear_file(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(slot): Path<String>,
) -> Result<StatusCode> {
    let slot = parse_slot(&slot)?;
    state.staging.clear(&StagingOwner::User(user.uid), slot);
    Ok(StatusCode::NO_CONTENT)
}

// ─── Payouts ─────────────────────────────────────────────────

async fn get_balance(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<AccountBalance>> {
    let balance = state.payments.balance(&user.uid, &user.id_token).await?;
    Ok(Json(balance))
}

/// Fee breakdown for paying out the full available balance.
async fn get_quote(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<PayoutQuote>> {
    let balance = state.payments.balance(&user.uid, &user.id_token).await?;
    Ok(Json(quote(&balance)))
}

#[derive(Deserialize)]
pub struct PayoutRequest {
    /// Minor units.
    pub amount: i64,
}

async fn create_payout(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<PayoutRequest>,
) -> Result<Json<PayoutReceipt>> {
    let receipt = request_payout(
        state.payments.as_ref(),
        &user.uid,
        request.amount,
        &user.id_token,
    )
    .await?;
    Ok(Json(receipt))
}

// ─── Password ────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChangeRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Re-authenticate and set a new password. The session cookie is
/// refreshed with the new ID token.
async fn update_password(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    jar: CookieJar,
    Json(request): Json<PasswordChangeRequest>,
) -> Result<(CookieJar, Json<SessionResponse>)> {
    let session = change_password(
        state.identity.as_ref(),
        &user.email,
        &request.current_password,
        &request.new_password,
    )
    .await?;
    tracing::info!(uid = %user.uid, "Password changed");

    let jar = jar.add(session_cookie(session.id_token.clone()));
    Ok((jar, Json(session.into())))
}
