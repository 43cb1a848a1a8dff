// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-user webmail settings at `webmail_settings/{uid}`.

use crate::db::{collections, Document, DocumentStore, FieldPatch};
use crate::error::AppError;
use crate::models::webmail::WebmailSettings;
use crate::time_utils::now_rfc3339;
use serde_json::Value;
use std::sync::Arc;

const PAGE_SIZES: [u32; 4] = [25, 50, 75, 100];
const DENSITIES: [&str; 3] = ["default", "comfortable", "compact"];

#[derive(Clone)]
pub struct WebmailSettingsService {
    store: Arc<dyn DocumentStore>,
}

impl WebmailSettingsService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Stored settings, or the defaults when none were saved yet.
    pub async fn get(&self, uid: &str) -> Result<WebmailSettings, AppError> {
        let Some(doc) = self.store.get(collections::WEBMAIL_SETTINGS, uid).await? else {
            return Ok(WebmailSettings::default());
        };
        match serde_json::from_value(Value::Object(doc)) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                tracing::warn!(uid = %uid, error = %e, "Stored webmail settings unreadable, using defaults");
                Ok(WebmailSettings::default())
            }
        }
    }

    /// Merge `partial` over the current settings at the top level and persist.
    ///
    /// Nested objects (`forwarding`, `vacation`) and lists are replaced
    /// whole, not merged.
    pub async fn apply(&self, uid: &str, partial: Value) -> Result<WebmailSettings, AppError> {
        let Value::Object(partial) = partial else {
            return Err(AppError::BadRequest("expected a JSON object".to_string()));
        };

        let current = self.get(uid).await?;
        let mut merged = match serde_json::to_value(&current) {
            Ok(Value::Object(map)) => map,
            _ => Document::new(),
        };
        merged.extend(partial);

        let settings: WebmailSettings = serde_json::from_value(Value::Object(merged))
            .map_err(|e| AppError::Validation(format!("Ungültige Einstellungen: {e}")))?;
        check(&settings)?;

        let doc = match serde_json::to_value(&settings) {
            Ok(Value::Object(map)) => map,
            _ => Document::new(),
        };
        let mut patch = FieldPatch::new();
        for (key, value) in doc {
            patch.set(key, value);
        }
        patch.set("updatedAt", now_rfc3339());
        self.store
            .set_merge(collections::WEBMAIL_SETTINGS, uid, &patch)
            .await?;

        tracing::debug!(uid = %uid, "Webmail settings saved");
        Ok(settings)
    }
}

fn check(settings: &WebmailSettings) -> Result<(), AppError> {
    if !PAGE_SIZES.contains(&settings.page_size) {
        return Err(AppError::Validation(format!(
            "Ungültige Seitengröße: {}",
            settings.page_size
        )));
    }
    if !DENSITIES.contains(&settings.display_density.as_str()) {
        return Err(AppError::Validation(format!(
            "Ungültige Anzeigedichte: {}",
            settings.display_density
        )));
    }
    if let Some(id) = &settings.default_signature_id {
        if !settings.signatures.iter().any(|s| &s.id == id) {
            return Err(AppError::Validation(
                "Standard-Signatur existiert nicht.".to_string(),
            ));
        }
    }
    if settings.forwarding.enabled
        && settings
            .forwarding
            .address
            .as_deref()
            .map_or(true, |a| !a.contains('@'))
    {
        return Err(AppError::Validation(
            "Weiterleitung benötigt eine gültige E-Mail-Adresse.".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn defaults_when_absent() {
        let service = WebmailSettingsService::new(Arc::new(MemoryStore::new()));
        assert_eq!(service.get("u1").await.unwrap(), WebmailSettings::default());
    }

    #[tokio::test]
    async fn apply_merges_top_level_only() {
        let store = Arc::new(MemoryStore::new());
        let service = WebmailSettingsService::new(store.clone());
        service
            .apply("u1", json!({"theme": "dark", "vacation": {"enabled": true, "subject": "Urlaub"}}))
            .await
            .unwrap();
        let settings = service
            .apply("u1", json!({"pageSize": 25, "vacation": {"message": "Bin weg"}}))
            .await
            .unwrap();

        assert_eq!(settings.theme, "dark");
        assert_eq!(settings.page_size, 25);
        assert!(!settings.vacation.enabled);
        assert_eq!(settings.vacation.message, "Bin weg");
        assert_eq!(service.get("u1").await.unwrap(), settings);
    }

    #[tokio::test]
    async fn invalid_values_are_not_persisted() {
        let store = Arc::new(MemoryStore::new());
        let service = WebmailSettingsService::new(store.clone());
        for partial in [
            json!({"pageSize": 7}),
            json!({"conversationView": "yes"}),
            json!({"defaultSignatureId": "missing"}),
            json!({"forwarding": {"enabled": true}}),
        ] {
            assert!(matches!(
                service.apply("u1", partial).await,
                Err(AppError::Validation(_))
            ));
        }
        assert!(store.writes().is_empty());
    }
}
