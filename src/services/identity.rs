// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Email/password identity provider (Firebase Auth REST API).

use crate::error::AppError;
use async_trait::async_trait;
use serde::Deserialize;

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// A signed-in identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub uid: String,
    pub email: String,
    /// Short-lived ID token; never logged.
    pub id_token: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, AppError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AppError>;

    /// Set a new password for the identity behind `id_token`.
    async fn update_password(&self, id_token: &str, new_password: &str)
        -> Result<Session, AppError>;
}

/// Re-authenticate with the current password, then change it.
pub async fn change_password(
    provider: &dyn IdentityProvider,
    email: &str,
    current_password: &str,
    new_password: &str,
) -> Result<Session, AppError> {
    if new_password.chars().count() < crate::services::validation::MIN_PASSWORD_LEN {
        return Err(AppError::Validation(
            "Das neue Passwort muss mindestens 6 Zeichen lang sein.".to_string(),
        ));
    }
    let session = provider.sign_in(email, current_password).await?;
    provider.update_password(&session.id_token, new_password).await
}

/// Firebase Auth REST client.
#[derive(Clone)]
pub struct FirebaseAuthClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    id_token: String,
    #[serde(default)]
    email: String,
    local_id: String,
}

#[derive(Debug, Deserialize)]
struct AuthErrorBody {
    error: AuthErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AuthErrorDetail {
    message: String,
}

impl FirebaseAuthClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: IDENTITY_TOOLKIT_URL.to_string(),
            api_key,
        }
    }

    async fn call(&self, method: &str, body: serde_json::Value) -> Result<Session, AppError> {
        let url = format!("{}/accounts:{}", self.base_url, method);
        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Identity(format!("Identity request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let code = response
                .json::<AuthErrorBody>()
                .await
                .map(|b| b.error.message)
                .unwrap_or_else(|_| format!("HTTP {status}"));
            tracing::warn!(method, code = %code, "Identity provider rejected request");
            return Err(AppError::Identity(describe_auth_error(&code)));
        }

        let auth: AuthResponse = response
            .json()
            .await
            .map_err(|e| AppError::Identity(format!("Invalid identity response: {e}")))?;

        Ok(Session {
            uid: auth.local_id,
            email: auth.email,
            id_token: auth.id_token,
        })
    }
}

#[async_trait]
impl IdentityProvider for FirebaseAuthClient {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let session = self
            .call(
                "signUp",
                serde_json::json!({"email": email, "password": password, "returnSecureToken": true}),
            )
            .await?;
        tracing::info!(uid = %session.uid, "Identity created");
        Ok(session)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AppError> {
        self.call(
            "signInWithPassword",
            serde_json::json!({"email": email, "password": password, "returnSecureToken": true}),
        )
        .await
    }

    async fn update_password(
        &self,
        id_token: &str,
        new_password: &str,
    ) -> Result<Session, AppError> {
        self.call(
            "update",
            serde_json::json!({"idToken": id_token, "password": new_password, "returnSecureToken": true}),
        )
        .await
    }
}

/// German message for an identity provider error code.
fn describe_auth_error(code: &str) -> String {
    // Codes may carry a suffix: "WEAK_PASSWORD : Password should be ..."
    let code = code.split(':').next().unwrap_or(code).trim();
    match code {
        "EMAIL_EXISTS" => "Diese E-Mail-Adresse wird bereits verwendet.".to_string(),
        "INVALID_EMAIL" => "Die E-Mail-Adresse ist ungültig.".to_string(),
        "WEAK_PASSWORD" => "Das Passwort ist zu schwach.".to_string(),
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
            "E-Mail oder Passwort ist falsch.".to_string()
        }
        "USER_DISABLED" => "Dieses Konto wurde deaktiviert.".to_string(),
        "TOO_MANY_ATTEMPTS_TRY_LATER" => {
            "Zu viele Versuche. Bitte später erneut versuchen.".to_string()
        }
        other => format!("Anmeldung fehlgeschlagen ({other})."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_are_translated() {
        assert_eq!(
            describe_auth_error("EMAIL_EXISTS"),
            "Diese E-Mail-Adresse wird bereits verwendet."
        );
        assert_eq!(
            describe_auth_error("WEAK_PASSWORD : Password should be at least 6 characters"),
            "Das Passwort ist zu schwach."
        );
        assert!(describe_auth_error("SOMETHING_NEW").contains("SOMETHING_NEW"));
    }
}
