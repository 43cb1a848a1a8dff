//! Destination-specific write payloads.
//!
//! Both types wrap a [`FieldPatch`] and can only be built inside the
//! crate (by the normalizer), so call sites cannot assemble ad hoc
//! payloads for the `users` or `companies` collections.

use crate::db::FieldPatch;

/// Partial write for `users/{uid}` (private data).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserRecordPatch(FieldPatch);

/// Partial write for `companies/{uid}` (public data plus legacy mirrors).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompanyRecordPatch(FieldPatch);

impl UserRecordPatch {
    pub(crate) fn from_patch(patch: FieldPatch) -> Self {
        Self(patch)
    }

    pub fn fields(&self) -> &FieldPatch {
        &self.0
    }
}

impl CompanyRecordPatch {
    pub(crate) fn from_patch(patch: FieldPatch) -> Self {
        Self(patch)
    }

    pub fn fields(&self) -> &FieldPatch {
        &self.0
    }
}

/// Output of splitting one edited profile.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitPayloads {
    pub user: UserRecordPatch,
    /// `None` for identities without a company record.
    pub company: Option<CompanyRecordPatch>,
}
