// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Payments relay: compliance document uploads, balance and payouts.

use crate::error::AppError;
use crate::models::files::{FileSlot, PendingFile, UploadPurpose, UploadedDocument, UploadedDocuments};
use crate::models::portfolio::{AccountBalance, PayoutReceipt};
use async_trait::async_trait;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};

/// Platform fee withheld from payouts, shown to the user before confirming.
pub const PAYOUT_FEE_RATE: f64 = 0.045;

#[async_trait]
pub trait PaymentsGateway: Send + Sync {
    /// Upload one file to the payments processor (mirrored to blob storage).
    async fn upload_file(
        &self,
        file: &PendingFile,
        purpose: UploadPurpose,
        user_id: &str,
        id_token: &str,
    ) -> Result<UploadedDocument, AppError>;

    async fn balance(&self, user_id: &str, id_token: &str) -> Result<AccountBalance, AppError>;

    /// Request a payout of `amount` minor units.
    async fn payout(
        &self,
        user_id: &str,
        amount: i64,
        id_token: &str,
    ) -> Result<PayoutReceipt, AppError>;
}

/// Upload every file concurrently and join before returning.
///
/// Each result is reported per slot; the caller decides which failures
/// are fatal.
pub async fn upload_all(
    gateway: &dyn PaymentsGateway,
    files: Vec<(FileSlot, &PendingFile, UploadPurpose)>,
    user_id: &str,
    id_token: &str,
) -> Vec<(FileSlot, Result<UploadedDocument, AppError>)> {
    join_all(files.into_iter().map(|(slot, file, purpose)| async move {
        let result = gateway.upload_file(file, purpose, user_id, id_token).await;
        if let Err(e) = &result {
            tracing::warn!(slot = %slot, error = %e, "Relay upload failed");
        }
        (slot, result)
    }))
    .await
}

/// Split joined upload results into successes and the labels of failed slots.
pub fn partition_uploads(
    results: Vec<(FileSlot, Result<UploadedDocument, AppError>)>,
) -> (UploadedDocuments, Vec<FileSlot>) {
    let mut uploaded = UploadedDocuments::new();
    let mut failed = Vec::new();
    for (slot, result) in results {
        match result {
            Ok(doc) => {
                uploaded.insert(slot, doc);
            }
            Err(_) => failed.push(slot),
        }
    }
    (uploaded, failed)
}

/// Breakdown shown before a payout is confirmed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutQuote {
    pub amount: i64,
    pub fee: i64,
    pub net_amount: i64,
    pub currency: String,
}

pub fn quote(balance: &AccountBalance) -> PayoutQuote {
    let fee = (balance.available as f64 * PAYOUT_FEE_RATE).round() as i64;
    PayoutQuote {
        amount: balance.available,
        fee,
        net_amount: balance.available - fee,
        currency: balance.currency.clone(),
    }
}

/// Check the amount against the current balance, then request the payout.
pub async fn request_payout(
    gateway: &dyn PaymentsGateway,
    user_id: &str,
    amount: i64,
    id_token: &str,
) -> Result<PayoutReceipt, AppError> {
    if amount <= 0 {
        return Err(AppError::BadRequest(
            "Der Auszahlungsbetrag muss größer als 0 sein.".to_string(),
        ));
    }
    let balance = gateway.balance(user_id, id_token).await?;
    if amount > balance.available {
        return Err(AppError::Conflict(format!(
            "Der Auszahlungsbetrag übersteigt das verfügbare Guthaben ({} {}).",
            balance.available, balance.currency
        )));
    }
    let receipt = gateway.payout(user_id, amount, id_token).await?;
    tracing::info!(uid = %user_id, amount, payout_id = %receipt.payout_id, "Payout requested");
    Ok(receipt)
}

/// REST client for the payments relay functions.
#[derive(Clone)]
pub struct StripeRelayClient {
    http: reqwest::Client,
    upload_url: String,
    balance_url: String,
    payout_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelayUploadResponse {
    #[serde(default)]
    success: bool,
    stripe_file_id: Option<String>,
    firebase_storage_url: Option<String>,
    firebase_storage_path: Option<String>,
    error: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    #[serde(default)]
    available: i64,
    #[serde(default)]
    pending: i64,
    #[serde(default = "default_currency")]
    currency: String,
    #[serde(default)]
    source: String,
    error: Option<String>,
}

fn default_currency() -> String {
    "eur".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayoutResponse {
    payout_id: Option<String>,
    #[serde(default)]
    amount: i64,
    #[serde(default = "default_currency")]
    currency: String,
    status: Option<String>,
    arrival_date: Option<i64>,
    error: Option<String>,
}

impl StripeRelayClient {
    pub fn new(upload_url: String, balance_url: String, payout_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            upload_url,
            balance_url,
            payout_url,
        }
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Upstream(format!("Relay read failed: {e}")))?;
        if status.is_server_error() {
            return Err(AppError::Upstream(format!("HTTP {status}: {body}")));
        }
        // Client errors still carry a JSON body with an `error` field.
        serde_json::from_str(&body)
            .map_err(|e| AppError::Upstream(format!("HTTP {status}: invalid JSON ({e})")))
    }
}

#[async_trait]
impl PaymentsGateway for StripeRelayClient {
    async fn upload_file(
        &self,
        file: &PendingFile,
        purpose: UploadPurpose,
        user_id: &str,
        id_token: &str,
    ) -> Result<UploadedDocument, AppError> {
        let part = reqwest::multipart::Part::bytes(file.bytes.to_vec())
            .file_name(file.safe_name())
            .mime_str(&file.content_type)
            .map_err(|e| AppError::Upload(format!("Invalid content type: {e}")))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("purpose", purpose.as_str())
            .text("userId", user_id.to_string());

        let response = self
            .http
            .post(&self.upload_url)
            .bearer_auth(id_token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::Upload(format!("Relay upload failed: {e}")))?;

        let body: RelayUploadResponse = Self::read_json(response)
            .await
            .map_err(|e| AppError::Upload(e.to_string()))?;

        match (body.success, body.stripe_file_id) {
            (true, Some(stripe_file_id)) => Ok(UploadedDocument {
                stripe_file_id,
                firebase_storage_url: body.firebase_storage_url,
                firebase_storage_path: body.firebase_storage_path,
            }),
            _ => Err(AppError::Upload(
                body.error
                    .or(body.message)
                    .unwrap_or_else(|| format!("{} upload rejected", file.name)),
            )),
        }
    }

    async fn balance(&self, user_id: &str, id_token: &str) -> Result<AccountBalance, AppError> {
        let response = self
            .http
            .get(&self.balance_url)
            .bearer_auth(id_token)
            .query(&[("firebaseUserId", user_id)])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Balance request failed: {e}")))?;

        let body: BalanceResponse = Self::read_json(response).await?;
        if let Some(error) = body.error {
            return Err(AppError::Upstream(error));
        }
        Ok(AccountBalance {
            available: body.available,
            pending: body.pending,
            currency: body.currency,
            source: body.source,
        })
    }

    async fn payout(
        &self,
        user_id: &str,
        amount: i64,
        id_token: &str,
    ) -> Result<PayoutReceipt, AppError> {
        let response = self
            .http
            .post(&self.payout_url)
            .bearer_auth(id_token)
            .json(&serde_json::json!({"firebaseUserId": user_id, "amount": amount}))
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Payout request failed: {e}")))?;

        let body: PayoutResponse = Self::read_json(response).await?;
        match (body.payout_id, body.error) {
            (Some(payout_id), None) => Ok(PayoutReceipt {
                payout_id,
                amount: if body.amount > 0 { body.amount } else { amount },
                currency: body.currency,
                status: body.status,
                arrival_date: body.arrival_date,
            }),
            (_, error) => Err(AppError::Upstream(
                error.unwrap_or_else(|| "Auszahlung fehlgeschlagen".to_string()),
            )),
        }
    }
}
