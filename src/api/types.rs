//! Request and response bodies of the HTTP surface.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::certificates::IssueRequest;
use crate::error::{Error, Result};
use crate::model::{
    CertificateSelection, CertificateType, Document, DocumentStatus, Placement, QrConfig,
    SignerInfo, SigningRequest, SubjectAttributes,
};
use crate::signing::BatchSignerInput;

/// `POST /certificates`
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCertificateBody {
    /// Holder kind
    #[serde(rename = "type", default)]
    pub cert_type: CertificateType,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// RSA modulus size
    pub key_strength: u32,
    /// Validity in years
    pub validity_years: u32,
    /// Subject attributes
    pub subject_attributes: SubjectAttributes,
    /// Container passphrase
    pub passphrase: String,
}

impl CreateCertificateBody {
    /// Issuance request for `owner_id`.
    pub fn into_request(self, owner_id: Uuid) -> IssueRequest {
        IssueRequest {
            owner_id,
            cert_type: self.cert_type,
            name: self.name,
            subject: self.subject_attributes,
            key_strength: self.key_strength,
            validity_years: self.validity_years,
            passphrase: self.passphrase,
        }
    }
}

/// `POST /certificates/:id/revoke`
#[derive(Debug, Default, Deserialize)]
pub struct RevokeBody {
    /// Free-text reason
    #[serde(default)]
    pub reason: Option<String>,
}

/// `POST /certificates/:id/validate-passphrase`
#[derive(Deserialize)]
pub struct PassphraseBody {
    /// Candidate passphrase
    pub passphrase: String,
}

/// Opaque passphrase check result.
#[derive(Debug, Serialize, Deserialize)]
pub struct PassphraseCheck {
    /// Whether the passphrase opens the container
    pub valid: bool,
}

/// Signer identity as sent over HTTP.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerBody {
    /// Display name
    pub name: String,
    /// Registration number
    #[serde(default)]
    pub registration: Option<String>,
    /// Email
    #[serde(default)]
    pub email: Option<String>,
    /// Signature reason
    #[serde(default)]
    pub reason: Option<String>,
    /// Signing location
    #[serde(default)]
    pub location: Option<String>,
    /// PNG or JPEG, base64 or a `data:` URL
    #[serde(default)]
    pub signature_image: Option<String>,
}

impl SignerBody {
    /// Decode into a [`SignerInfo`].
    pub fn into_signer(self) -> Result<SignerInfo> {
        let signature_image = match self.signature_image.as_deref().map(str::trim) {
            Some(encoded) if !encoded.is_empty() => Some(decode_image(encoded)?),
            _ => None,
        };
        Ok(SignerInfo {
            name: self.name,
            registration: self.registration,
            email: self.email,
            reason: self.reason,
            location: self.location,
            signature_image,
        })
    }
}

fn decode_image(encoded: &str) -> Result<Vec<u8>> {
    let payload = match encoded.strip_prefix("data:") {
        Some(data_url) => data_url
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| Error::Validation("malformed data URL".to_string()))?,
        None => encoded,
    };
    STANDARD
        .decode(payload)
        .map_err(|_| Error::Validation("signatureImage is not valid base64".to_string()))
}

fn certificate_selection(
    certificate_id: Option<Uuid>,
    passphrase: Option<String>,
) -> Result<Option<CertificateSelection>> {
    match (certificate_id, passphrase) {
        (certificate_id, Some(passphrase)) => Ok(Some(CertificateSelection {
            certificate_id,
            passphrase,
        })),
        (Some(_), None) => Err(Error::Validation(
            "passphrase is required when certificateId is given".to_string(),
        )),
        (None, None) => Ok(None),
    }
}

/// `POST /sign`
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignBody {
    /// Target document
    pub document_id: Uuid,
    /// Visual placements
    #[serde(default)]
    pub placements: Vec<Placement>,
    /// QR settings
    #[serde(default)]
    pub qr_config: QrConfig,
    /// Signer identity
    pub signer: SignerBody,
    /// Certificate; the active one when omitted
    #[serde(default)]
    pub certificate_id: Option<Uuid>,
    /// Container passphrase; enables PKI embedding
    #[serde(default)]
    pub passphrase: Option<String>,
}

impl SignBody {
    /// Signing request on behalf of `caller`.
    pub fn into_request(self, caller: Option<Uuid>) -> Result<SigningRequest> {
        Ok(SigningRequest {
            document_id: self.document_id,
            caller,
            placements: self.placements,
            signer: self.signer.into_signer()?,
            qr: self.qr_config,
            certificate: certificate_selection(self.certificate_id, self.passphrase)?,
        })
    }
}

/// Inputs shared by every document of a batch.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerInputsBody {
    /// Signer identity
    pub signer: SignerBody,
    /// Visual placements
    #[serde(default)]
    pub placements: Vec<Placement>,
    /// QR settings
    #[serde(default)]
    pub qr_config: QrConfig,
    /// Certificate
    #[serde(default)]
    pub certificate_id: Option<Uuid>,
    /// Container passphrase
    #[serde(default)]
    pub passphrase: Option<String>,
}

/// `POST /sign/batch`
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSignBody {
    /// Documents to sign
    pub document_ids: Vec<Uuid>,
    /// Shared signer inputs
    pub signer_inputs: SignerInputsBody,
}

impl SignerInputsBody {
    /// Decode into coordinator input.
    pub fn into_input(self) -> Result<BatchSignerInput> {
        Ok(BatchSignerInput {
            signer: self.signer.into_signer()?,
            placements: self.placements,
            qr: self.qr_config,
            certificate: certificate_selection(self.certificate_id, self.passphrase)?,
        })
    }
}

/// Access code supplied on `/validate` and `/verify-signature`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessCodeParams {
    /// The code
    #[serde(default, alias = "accessCode")]
    pub code: Option<String>,
}

/// `POST /documents` query string.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadParams {
    /// Display title
    pub title: String,
    /// Optional validation-page access code
    #[serde(default)]
    pub access_code: Option<String>,
}

/// Created or updated document.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    /// Document id
    pub document_id: Uuid,
    /// Display title
    pub title: String,
    /// Lifecycle state
    pub status: DocumentStatus,
    /// Draft expiry
    pub expires_at: Option<DateTime<Utc>>,
    /// Cancellation time
    pub canceled_at: Option<DateTime<Utc>>,
}

impl From<&Document> for DocumentResponse {
    fn from(document: &Document) -> Self {
        Self {
            document_id: document.id,
            title: document.title.clone(),
            status: document.status,
            expires_at: document.expires_at,
            canceled_at: document.canceled_at,
        }
    }
}

/// `GET /health`
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `ok`
    pub status: String,
    /// Service name
    pub service: String,
    /// Crate version
    pub version: String,
    /// Time of the check
    pub timestamp: DateTime<Utc>,
}
