// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! ID token authentication middleware.

use crate::services::id_token::{extract_bearer_token, IdTokenError};
use crate::services::identity::Session;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

/// Cookie carrying the ID token for browser sessions.
pub const SESSION_COOKIE: &str = "__session";

/// Authenticated caller, inserted into request extensions.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub uid: String,
    pub email: String,
    /// Forwarded to collaborators that enforce their own rules.
    pub id_token: String,
}

impl AuthUser {
    pub fn session(&self) -> Session {
        Session {
            uid: self.uid.clone(),
            email: self.email.clone(),
            id_token: self.id_token.clone(),
        }
    }
}

/// Token from the session cookie, else from the `Authorization` header.
fn request_token(jar: &CookieJar, request: &Request) -> Option<String> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());
    extract_bearer_token(auth_header).map(str::to_string)
}

async fn authenticate(state: &AppState, token: String) -> Result<AuthUser, StatusCode> {
    match state.id_tokens.verify(&token).await {
        Ok(identity) => Ok(AuthUser {
            uid: identity.uid,
            email: identity.email.unwrap_or_default(),
            id_token: token,
        }),
        Err(IdTokenError::Rejected(reason)) => {
            tracing::debug!(reason = %reason, "ID token rejected");
            Err(StatusCode::UNAUTHORIZED)
        }
        Err(IdTokenError::Transient(reason)) => {
            tracing::warn!(reason = %reason, "ID token verification unavailable");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

/// Middleware that requires a valid ID token.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = request_token(&jar, &request).ok_or(StatusCode::UNAUTHORIZED)?;
    let user = authenticate(&state, token).await?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Like [`require_auth`], but lets anonymous requests through.
///
/// Registration uses this: a signed-in caller reuses their identity, an
/// anonymous one gets a new account.
pub async fn optional_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if let Some(token) = request_token(&jar, &request) {
        let user = authenticate(&state, token).await?;
        request.extensions_mut().insert(user);
    }
    Ok(next.run(request).await)
}
