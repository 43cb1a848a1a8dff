// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Callable remote functions (client IP lookup, account provisioning).

use crate::error::AppError;
use crate::models::provisioning::{ProvisioningRequest, ProvisioningResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Stored in place of an IP address that could not be determined.
pub const IP_NOT_DETERMINED: &str = "IP_NOT_DETERMINED";

#[async_trait]
pub trait RemoteFunctions: Send + Sync {
    /// Public IP of the caller as seen by the function.
    async fn client_ip(&self, id_token: &str) -> Result<String, AppError>;

    /// Create the connected payments account for a registered company.
    async fn create_account(
        &self,
        request: &ProvisioningRequest,
        id_token: &str,
    ) -> Result<ProvisioningResult, AppError>;
}

/// Whether a looked-up IP is usable for the terms-acceptance record.
pub fn is_usable_ip(ip: &str) -> bool {
    ip != IP_NOT_DETERMINED && ip.len() >= 7
}

/// HTTP client speaking the callable protocol: `{data}` in, `{result}` out.
#[derive(Clone)]
pub struct CallableFunctionsClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct CallableResponse<T> {
    result: Option<T>,
    error: Option<CallableError>,
}

#[derive(Debug, Deserialize)]
struct CallableError {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ClientIpResult {
    ip: Option<String>,
}

impl CallableFunctionsClient {
    pub fn new(base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn call<Req: Serialize + Sync, Res: DeserializeOwned>(
        &self,
        name: &str,
        data: &Req,
        id_token: &str,
    ) -> Result<Res, AppError> {
        let url = format!("{}/{}", self.base_url, name);
        let response = self
            .http
            .post(&url)
            .bearer_auth(id_token)
            .json(&serde_json::json!({ "data": data }))
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("{name} request failed: {e}")))?;

        let status = response.status();
        let body: CallableResponse<Res> = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("{name} returned HTTP {status}: {e}")))?;

        match (body.result, body.error) {
            (Some(result), None) => Ok(result),
            (_, Some(error)) => Err(AppError::Upstream(format!(
                "{name} failed ({}): {}",
                error.status, error.message
            ))),
            (None, None) => Err(AppError::Upstream(format!("{name} returned no result"))),
        }
    }
}

#[async_trait]
impl RemoteFunctions for CallableFunctionsClient {
    async fn client_ip(&self, id_token: &str) -> Result<String, AppError> {
        let result: ClientIpResult = self
            .call("getClientIp", &serde_json::json!({}), id_token)
            .await?;
        Ok(result.ip.unwrap_or_else(|| IP_NOT_DETERMINED.to_string()))
    }

    async fn create_account(
        &self,
        request: &ProvisioningRequest,
        id_token: &str,
    ) -> Result<ProvisioningResult, AppError> {
        self.call("createStripeAccountIfComplete", request, id_token)
            .await
    }
}
