//! Documents and signing events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::request::{Placement, QrConfig};

/// Document lifecycle state.
///
/// Transitions are monotonic: `Draft -> Signed -> Canceled`, plus
/// `Draft -> Canceled` and `Draft -> Expired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Uploaded, not yet signed
    Draft,
    /// Signed and immutable
    Signed,
    /// Withdrawn by its owner
    Canceled,
    /// Unsigned draft past its expiry
    Expired,
}

impl DocumentStatus {
    /// Whether moving to `next` is allowed.
    pub fn can_transition_to(&self, next: DocumentStatus) -> bool {
        use DocumentStatus::*;
        matches!(
            (self, next),
            (Draft, Signed) | (Draft, Canceled) | (Draft, Expired) | (Signed, Canceled)
        )
    }
}

/// Access-code gate for the public validation page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGate {
    /// Whether a code is required
    #[serde(default)]
    pub requires_access_code: bool,
    /// The code, compared case-insensitively
    #[serde(default)]
    pub access_code: Option<String>,
}

impl AccessGate {
    /// Gate requiring `code`.
    pub fn with_code(code: impl Into<String>) -> Self {
        Self {
            requires_access_code: true,
            access_code: Some(code.into()),
        }
    }

    /// Whether `candidate` opens the gate.
    pub fn accepts(&self, candidate: Option<&str>) -> bool {
        if !self.requires_access_code {
            return true;
        }
        match (self.access_code.as_deref(), candidate) {
            (Some(expected), Some(given)) => {
                let given = given.trim();
                !given.is_empty() && expected.trim().eq_ignore_ascii_case(given)
            },
            _ => false,
        }
    }
}

/// Document metadata recorded at signing time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Visual signature placements
    #[serde(default)]
    pub placements: Vec<Placement>,
    /// QR mark configuration
    #[serde(default)]
    pub qr: QrConfig,
    /// Validation page gate
    #[serde(default)]
    pub access: AccessGate,
}

/// A document and its signing state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document id
    pub id: Uuid,
    /// Owner; `None` for the anonymous flow
    pub owner_id: Option<Uuid>,
    /// Display title
    pub title: String,
    /// Storage path of the uploaded PDF
    pub original_path: String,
    /// Storage path of the signed PDF
    pub signed_path: Option<String>,
    /// Public URL of the signed PDF
    pub signed_pdf_url: Option<String>,
    /// Lifecycle state
    pub status: DocumentStatus,
    /// Canonical SHA-256 (hex) of the visually sealed bytes, before PKI embedding
    pub content_hash: Option<String>,
    /// SHA-256 (hex) of the stored signed file
    pub signed_file_hash: Option<String>,
    /// Whether the stored file carries a PKI signature
    pub has_pki_signature: bool,
    /// Placements, QR config and access gate
    pub metadata: DocumentMetadata,
    /// Upload time
    pub created_at: DateTime<Utc>,
    /// Signing time
    pub signed_at: Option<DateTime<Utc>>,
    /// Draft expiry
    pub expires_at: Option<DateTime<Utc>>,
    /// Cancellation time
    pub canceled_at: Option<DateTime<Utc>>,
}

impl Document {
    /// New draft expiring after `ttl`.
    pub fn new_draft(
        owner_id: Option<Uuid>,
        title: impl Into<String>,
        original_path: impl Into<String>,
        now: DateTime<Utc>,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            title: title.into(),
            original_path: original_path.into(),
            signed_path: None,
            signed_pdf_url: None,
            status: DocumentStatus::Draft,
            content_hash: None,
            signed_file_hash: None,
            has_pki_signature: false,
            metadata: DocumentMetadata::default(),
            created_at: now,
            signed_at: None,
            expires_at: Some(now + ttl),
            canceled_at: None,
        }
    }

    /// Whether `caller` may act on this document.
    ///
    /// Anonymous documents are open to anyone holding the id.
    pub fn is_accessible_by(&self, caller: Option<Uuid>) -> bool {
        match self.owner_id {
            Some(owner) => caller == Some(owner),
            None => true,
        }
    }

    /// Draft whose expiry has passed.
    pub fn is_stale_draft(&self, now: DateTime<Utc>) -> bool {
        self.status == DocumentStatus::Draft && self.expires_at.map_or(false, |at| now >= at)
    }

    /// Copy without the access code or storage paths.
    pub fn to_public(&self) -> PublicDocument {
        PublicDocument {
            id: self.id,
            title: self.title.clone(),
            status: self.status,
            content_hash: self.content_hash.clone(),
            signed_pdf_url: self.signed_pdf_url.clone(),
            has_pki_signature: self.has_pki_signature,
            requires_access_code: self.metadata.access.requires_access_code,
            created_at: self.created_at,
            signed_at: self.signed_at,
            canceled_at: self.canceled_at,
        }
    }
}

/// Document view exposed by the validation gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicDocument {
    /// Document id
    pub id: Uuid,
    /// Display title
    pub title: String,
    /// Lifecycle state
    pub status: DocumentStatus,
    /// Canonical hash
    pub content_hash: Option<String>,
    /// Signed PDF URL
    pub signed_pdf_url: Option<String>,
    /// PKI flag
    pub has_pki_signature: bool,
    /// Whether the page is code-gated
    pub requires_access_code: bool,
    /// Upload time
    pub created_at: DateTime<Utc>,
    /// Signing time
    pub signed_at: Option<DateTime<Utc>>,
    /// Cancellation time
    pub canceled_at: Option<DateTime<Utc>>,
}

/// Fields written when a draft becomes signed.
#[derive(Debug, Clone)]
pub struct SignedUpdate {
    /// Storage path of the signed file
    pub signed_path: String,
    /// Public URL of the signed file
    pub signed_pdf_url: String,
    /// Canonical hash
    pub content_hash: String,
    /// Hash of the stored file
    pub signed_file_hash: String,
    /// PKI flag
    pub has_pki_signature: bool,
    /// Placements and QR config used
    pub metadata: DocumentMetadata,
    /// Signing time
    pub signed_at: DateTime<Utc>,
}

/// One signing action. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningEvent {
    /// Event id
    pub id: Uuid,
    /// Signed document
    pub document_id: Uuid,
    /// Signer display name
    pub signer_name: String,
    /// Signer registration (tax id or similar)
    pub signer_registration: Option<String>,
    /// Signer email
    pub signer_email: Option<String>,
    /// Certificate type snapshot
    pub certificate_type: Option<String>,
    /// Certificate issuer snapshot
    pub certificate_issuer: Option<String>,
    /// Certificate serial snapshot
    pub certificate_serial: Option<String>,
    /// Whether a PKI signature was embedded
    pub has_pki_signature: bool,
    /// Signing time
    pub signed_at: DateTime<Utc>,
}
