// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Company registration wizard.
//!
//! Drafts are addressed by their unguessable id and work without a
//! session. Submitting with a session reuses that identity instead of
//! creating a new account.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::registration::{RegistrationForm, RegistrationOutcome, RegistrationProgress};
use crate::routes::{parse_slot, read_file_field, UPLOAD_BODY_LIMIT};
use crate::services::registration::DraftSnapshot;
use crate::AppState;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, Request, State},
    http::{header, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Longest a progress request waits for a change.
const PROGRESS_WAIT_LIMIT: Duration = Duration::from_secs(25);

/// Registration routes. `optional_auth` is applied in routes/mod.rs.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register/drafts", post(create_draft))
        .route(
            "/register/drafts/{draft_id}",
            get(get_draft).patch(update_draft).delete(delete_draft),
        )
        .route(
            "/register/drafts/{draft_id}/files/{slot}",
            put(stage_file)
                .delete(clear_file)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/register/drafts/{draft_id}/submit", post(submit))
        .route("/register/drafts/{draft_id}/progress", get(get_progress))
}

// ─── Drafts ──────────────────────────────────────────────────

async fn create_draft(
    State(state): State<Arc<AppState>>,
    Json(initial): Json<RegistrationForm>,
) -> Result<(StatusCode, Json<DraftSnapshot>)> {
    let snapshot = state.registration.drafts().create(initial)?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

async fn get_draft(
    State(state): State<Arc<AppState>>,
    Path(draft_id): Path<String>,
) -> Result<Json<DraftSnapshot>> {
    Ok(Json(state.registration.drafts().snapshot(&draft_id)?))
}

/// Merge the fields of one wizard screen into the draft.
async fn update_draft(
    State(state): State<Arc<AppState>>,
    Path(draft_id): Path<String>,
    Json(partial): Json<Value>,
) -> Result<Json<DraftSnapshot>> {
    Ok(Json(state.registration.drafts().update(&draft_id, partial)?))
}

async fn delete_draft(
    State(state): State<Arc<AppState>>,
    Path(draft_id): Path<String>,
) -> Result<StatusCode> {
    if !state.registration.drafts().remove(&draft_id) {
        return Err(AppError::NotFound(format!("registration draft {draft_id}")));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn stage_file(
    State(state): State<Arc<AppState>>,
    Path((draft_id, slot)): Path<(String, String)>,
    multipart: Multipart,
) -> Result<Json<DraftSnapshot>> {
    let slot = parse_slot(&slot)?;
    let file = read_file_field(multipart).await?;
    Ok(Json(
        state.registration.drafts().stage_file(&draft_id, slot, file)?,
    ))
}

async fn clear_file(
    State(state): State<Arc<AppState>>,
    Path((draft_id, slot)): Path<(String, String)>,
) -> Result<Json<DraftSnapshot>> {
    let slot = parse_slot(&slot)?;
    Ok(Json(state.registration.drafts().clear_file(&draft_id, slot)?))
}

// ─── Submit ──────────────────────────────────────────────────

/// Validate and commit the draft.
///
/// The commit runs in its own task so a client disconnect does not stop
/// it halfway.
async fn submit(
    State(state): State<Arc<AppState>>,
    Path(draft_id): Path<String>,
    request: Request,
) -> Result<Json<RegistrationOutcome>> {
    let session = request.extensions().get::<AuthUser>().map(AuthUser::session);
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let service = state.registration.clone();
    let outcome = tokio::spawn(async move {
        service.submit(&draft_id, session, &user_agent).await
    })
    .await
    .map_err(|e| anyhow::anyhow!("registration task failed: {e}"))??;

    Ok(Json(outcome))
}

#[derive(Deserialize)]
pub struct ProgressParams {
    /// Wait up to this many milliseconds for the next change.
    pub wait_ms: Option<u64>,
}

/// Current commit progress, optionally waiting for the next change.
async fn get_progress(
    State(state): State<Arc<AppState>>,
    Path(draft_id): Path<String>,
    Query(params): Query<ProgressParams>,
) -> Result<Json<RegistrationProgress>> {
    let mut watch = state.registration.drafts().subscribe(&draft_id)?;
    let current = watch.snapshot().progress;

    let Some(wait_ms) = params.wait_ms.filter(|ms| *ms > 0) else {
        return Ok(Json(current));
    };
    let wait = Duration::from_millis(wait_ms).min(PROGRESS_WAIT_LIMIT);
    let progress = match tokio::time::timeout(wait, watch.changed()).await {
        Ok(Some(snapshot)) => snapshot.progress,
        Ok(None) | Err(_) => current,
    };
    Ok(Json(progress))
}
