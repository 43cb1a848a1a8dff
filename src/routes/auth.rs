// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Email/password sign-in and sign-out.
//!
//! The session cookie holds the identity provider's ID token. Bearer
//! clients use the `idToken` from the response body instead.

use crate::error::Result;
use crate::middleware::auth::SESSION_COOKIE;
use crate::services::identity::Session;
use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Auth routes (public).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Signed-in identity returned to the client.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub uid: String,
    pub email: String,
    pub id_token: String,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            uid: session.uid,
            email: session.email,
            id_token: session.id_token,
        }
    }
}

/// Session cookie carrying `id_token`.
pub(crate) fn session_cookie(id_token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, id_token))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .build()
}

async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<(CookieJar, Json<SessionResponse>)> {
    let session = state
        .identity
        .sign_in(request.email.trim(), &request.password)
        .await?;
    tracing::info!(uid = %session.uid, "User signed in");

    let jar = jar.add(session_cookie(session.id_token.clone()));
    Ok((jar, Json(session.into())))
}

/// Clear the session cookie. ID tokens expire on their own.
async fn logout(jar: CookieJar) -> (CookieJar, StatusCode) {
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, StatusCode::NO_CONTENT)
}
