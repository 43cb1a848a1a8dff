//! Webmail settings, stored per user at `webmail_settings/{uid}`.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase", default)]
pub struct WebmailSettings {
    pub language: String,
    pub display_density: String,
    pub conversation_view: bool,
    pub page_size: u32,
    pub theme: String,
    pub signatures: Vec<EmailSignature>,
    pub default_signature_id: Option<String>,
    pub labels: Vec<MailLabel>,
    pub filters: Vec<MailFilter>,
    pub forwarding: Forwarding,
    pub vacation: VacationResponder,
}

impl Default for WebmailSettings {
    fn default() -> Self {
        Self {
            language: "de".to_string(),
            display_density: "default".to_string(),
            conversation_view: true,
            page_size: 50,
            theme: "light".to_string(),
            signatures: Vec::new(),
            default_signature_id: None,
            labels: Vec::new(),
            filters: Vec::new(),
            forwarding: Forwarding::default(),
            vacation: VacationResponder::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase", default)]
pub struct EmailSignature {
    pub id: String,
    pub name: String,
    pub html: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase", default)]
pub struct MailLabel {
    pub id: String,
    pub name: String,
    pub color: Option<String>,
    pub show_in_list: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase", default)]
pub struct MailFilter {
    pub id: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub subject: Option<String>,
    pub has_words: Option<String>,
    pub apply_label: Option<String>,
    pub mark_as_read: bool,
    pub archive: bool,
    pub delete: bool,
    pub forward_to: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase", default)]
pub struct Forwarding {
    pub enabled: bool,
    pub address: Option<String>,
    pub keep_copy: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase", default)]
pub struct VacationResponder {
    pub enabled: bool,
    pub subject: String,
    pub message: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub contacts_only: bool,
}
