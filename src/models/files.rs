//! File slots, pending uploads and upload results.

use axum::body::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Identity documents larger than this are rejected by the payments relay.
pub const MAX_IDENTITY_DOCUMENT_BYTES: usize = 8 * 1024 * 1024;

/// Upper bound for any other staged file.
pub const MAX_STAGED_FILE_BYTES: usize = 15 * 1024 * 1024;

/// Named place a user can attach a file to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileSlot {
    ProfilePicture,
    ProfileBanner,
    BusinessLicense,
    MasterCraftsmanCertificate,
    IdentityFront,
    IdentityBack,
    PortfolioImage,
}

impl FileSlot {
    pub const ALL: [FileSlot; 7] = [
        FileSlot::ProfilePicture,
        FileSlot::ProfileBanner,
        FileSlot::BusinessLicense,
        FileSlot::MasterCraftsmanCertificate,
        FileSlot::IdentityFront,
        FileSlot::IdentityBack,
        FileSlot::PortfolioImage,
    ];

    /// Compliance documents go to the payments relay, everything else to blob storage.
    pub const DOCUMENTS: [FileSlot; 4] = [
        FileSlot::BusinessLicense,
        FileSlot::MasterCraftsmanCertificate,
        FileSlot::IdentityFront,
        FileSlot::IdentityBack,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FileSlot::ProfilePicture => "profilePicture",
            FileSlot::ProfileBanner => "profileBanner",
            FileSlot::BusinessLicense => "businessLicense",
            FileSlot::MasterCraftsmanCertificate => "masterCraftsmanCertificate",
            FileSlot::IdentityFront => "identityFront",
            FileSlot::IdentityBack => "identityBack",
            FileSlot::PortfolioImage => "portfolioImage",
        }
    }

    /// Label used in German validation messages.
    pub fn label(self) -> &'static str {
        match self {
            FileSlot::ProfilePicture => "Profilbild",
            FileSlot::ProfileBanner => "Bannerbild",
            FileSlot::BusinessLicense => "Gewerbeschein",
            FileSlot::MasterCraftsmanCertificate => "Meisterbrief",
            FileSlot::IdentityFront => "Ausweis Vorderseite",
            FileSlot::IdentityBack => "Ausweis Rückseite",
            FileSlot::PortfolioImage => "Portfoliobild",
        }
    }

    /// Relay purpose during registration. `None` for slots not sent to the relay.
    pub fn registration_purpose(self) -> Option<UploadPurpose> {
        match self {
            FileSlot::ProfilePicture => Some(UploadPurpose::BusinessIcon),
            FileSlot::BusinessLicense | FileSlot::MasterCraftsmanCertificate => {
                Some(UploadPurpose::AdditionalVerification)
            }
            FileSlot::IdentityFront | FileSlot::IdentityBack => {
                Some(UploadPurpose::IdentityDocument)
            }
            FileSlot::ProfileBanner | FileSlot::PortfolioImage => None,
        }
    }

    pub fn max_bytes(self) -> usize {
        match self {
            FileSlot::IdentityFront | FileSlot::IdentityBack => MAX_IDENTITY_DOCUMENT_BYTES,
            _ => MAX_STAGED_FILE_BYTES,
        }
    }
}

impl fmt::Display for FileSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileSlot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FileSlot::ALL
            .into_iter()
            .find(|slot| slot.as_str() == s)
            .ok_or_else(|| format!("unknown file slot: {s}"))
    }
}

/// Purpose tag the payments processor requires for each uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadPurpose {
    BusinessIcon,
    AdditionalVerification,
    IdentityDocument,
}

impl UploadPurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            UploadPurpose::BusinessIcon => "business_icon",
            UploadPurpose::AdditionalVerification => "additional_verification",
            UploadPurpose::IdentityDocument => "identity_document",
        }
    }
}

/// A file received from the client and not yet uploaded anywhere.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl PendingFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File name reduced to characters safe in a storage path.
    pub fn safe_name(&self) -> String {
        let cleaned: String = self
            .name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if cleaned.is_empty() {
            "file".to_string()
        } else {
            cleaned
        }
    }
}

/// Result of a payments-relay upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedDocument {
    pub stripe_file_id: String,
    pub firebase_storage_url: Option<String>,
    pub firebase_storage_path: Option<String>,
}

/// Relay uploads of one save or registration, by slot.
pub type UploadedDocuments = HashMap<FileSlot, UploadedDocument>;

/// Object stored in the blob store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredObject {
    pub path: String,
    pub download_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_names_round_trip() {
        for slot in FileSlot::ALL {
            assert_eq!(slot.as_str().parse::<FileSlot>().unwrap(), slot);
        }
        assert!("passport".parse::<FileSlot>().is_err());
    }

    #[test]
    fn registration_purposes() {
        assert_eq!(
            FileSlot::ProfilePicture.registration_purpose(),
            Some(UploadPurpose::BusinessIcon)
        );
        assert_eq!(
            FileSlot::IdentityBack.registration_purpose().map(UploadPurpose::as_str),
            Some("identity_document")
        );
        assert_eq!(FileSlot::ProfileBanner.registration_purpose(), None);
    }

    #[test]
    fn safe_name_strips_path_characters() {
        let file = PendingFile::new("../my photo (1).png", "image/png", Bytes::from_static(b"x"));
        assert_eq!(file.safe_name(), ".._my_photo__1_.png");
    }
}
