// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webmail settings and custom mail domains.
//!
//! Domain endpoints answer with `{success, data}` or `{success, error}`
//! on every outcome, errors keeping their HTTP status.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::domain::{
    ActivateDomainRequest, AddDomainRequest, CreateMailboxRequest, CustomDomain, DomainDetails,
    DomainMailbox,
};
use crate::models::webmail::WebmailSettings;
use crate::services::domains::{ActivationOutcome, DomainOwner, VerifyOutcome};
use crate::AppState;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/webmail/settings",
            get(get_settings).patch(update_settings),
        )
        .route("/api/webmail/domains", get(list_domains).post(add_domain))
        .route(
            "/api/webmail/domains/{domain_id}",
            get(get_domain).delete(delete_domain),
        )
        .route("/api/webmail/domains/{domain_id}/verify", post(verify_domain))
        .route(
            "/api/webmail/domains/{domain_id}/activate",
            post(activate_domain),
        )
        .route(
            "/api/webmail/domains/{domain_id}/mailboxes",
            get(list_mailboxes).post(create_mailbox),
        )
}

// ─── Settings ────────────────────────────────────────────────

async fn get_settings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<WebmailSettings>> {
    Ok(Json(state.webmail.get(&user.uid).await?))
}

/// Shallow-merge a partial settings object.
async fn update_settings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(partial): Json<Value>,
) -> Result<Json<WebmailSettings>> {
    Ok(Json(state.webmail.apply(&user.uid, partial).await?))
}

// ─── Envelope ────────────────────────────────────────────────

#[derive(Serialize)]
struct EnvelopeBody<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

/// Wraps a handler result in the `{success, ...}` envelope.
pub struct Envelope<T>(pub Result<T>);

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        match self.0 {
            Ok(data) => Json(EnvelopeBody {
                success: true,
                data: Some(data),
                error: None,
                code: None,
            })
            .into_response(),
            Err(err) => {
                let (status, code) = err.status_and_code();
                let message = err.public_details().unwrap_or_else(|| code.to_string());
                let body: EnvelopeBody<()> = EnvelopeBody {
                    success: false,
                    data: None,
                    error: Some(message),
                    code: Some(code),
                };
                (status, Json(body)).into_response()
            }
        }
    }
}

impl<T> From<Result<T>> for Envelope<T> {
    fn from(result: Result<T>) -> Self {
        Self(result)
    }
}

fn owner(user: &AuthUser) -> DomainOwner {
    DomainOwner {
        uid: user.uid.clone(),
        email: user.email.clone(),
    }
}

// ─── Domains ─────────────────────────────────────────────────

async fn list_domains(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Envelope<Vec<CustomDomain>> {
    state.domains.list(&owner(&user)).await.into()
}

async fn add_domain(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<AddDomainRequest>,
) -> Envelope<DomainDetails> {
    state.domains.add(&owner(&user), request).await.into()
}

/// Domain with the DNS records its owner has to publish.
async fn get_domain(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(domain_id): Path<String>,
) -> Envelope<DomainDetails> {
    state.domains.get(&owner(&user), &domain_id).await.into()
}

async fn delete_domain(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(domain_id): Path<String>,
) -> Envelope<Value> {
    state
        .domains
        .delete(&owner(&user), &domain_id)
        .await
        .map(|()| serde_json::json!({ "deleted": domain_id }))
        .into()
}

async fn verify_domain(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(domain_id): Path<String>,
) -> Envelope<VerifyOutcome> {
    state.domains.verify(&owner(&user), &domain_id).await.into()
}

async fn activate_domain(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(domain_id): Path<String>,
    Json(request): Json<ActivateDomainRequest>,
) -> Envelope<ActivationOutcome> {
    state
        .domains
        .activate(&owner(&user), &domain_id, request)
        .await
        .into()
}

async fn list_mailboxes(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(domain_id): Path<String>,
) -> Envelope<Vec<DomainMailbox>> {
    state
        .domains
        .list_mailboxes(&owner(&user), &domain_id)
        .await
        .into()
}

async fn create_mailbox(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(domain_id): Path<String>,
    Json(request): Json<CreateMailboxRequest>,
) -> Envelope<DomainMailbox> {
    state
        .domains
        .create_mailbox(&owner(&user), &domain_id, request)
        .await
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use axum::body::to_bytes;
    use axum::http::StatusCode;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn envelope_wraps_success() {
        let response = Envelope(Ok(vec![1, 2])).into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"success": true, "data": [1, 2]})
        );
    }

    #[tokio::test]
    async fn envelope_keeps_error_status() {
        let response =
            Envelope::<()>(Err(AppError::Forbidden("Keine Berechtigung".into()))).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"success": false, "error": "Keine Berechtigung", "code": "forbidden"})
        );
    }
}
