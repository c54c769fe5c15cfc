//! Signing inputs and outputs.
//!
//! Placement and QR settings arrive as JSON from the HTTP layer and are
//! validated here before any PDF work starts.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

fn default_scale() -> f32 {
    1.0
}

/// One visual signature placement.
///
/// `x` and `y` are the normalized top-left corner of the box, measured from
/// the top-left of the page. `width` and `height` are in points before scaling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// 1-based page number; values past the end clamp to the last page
    pub page: u32,
    /// Horizontal position in [0, 1]
    pub x: f32,
    /// Vertical position in [0, 1]
    pub y: f32,
    /// Box width in points
    pub width: f32,
    /// Box height in points
    pub height: f32,
    /// Size multiplier
    #[serde(default = "default_scale")]
    pub scale: f32,
    /// Clockwise rotation in degrees
    #[serde(default)]
    pub rotation: f32,
}

impl Placement {
    /// Placement with scale 1 and no rotation.
    pub fn new(page: u32, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            page,
            x,
            y,
            width,
            height,
            scale: 1.0,
            rotation: 0.0,
        }
    }

    /// Set the rotation in degrees.
    pub fn with_rotation(mut self, degrees: f32) -> Self {
        self.rotation = degrees;
        self
    }

    /// Set the scale multiplier.
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    /// Boundary checks.
    pub fn validate(&self) -> Result<()> {
        if self.page == 0 {
            return Err(Error::Validation("placement page starts at 1".to_string()));
        }
        for (name, v) in [("x", self.x), ("y", self.y)] {
            if !v.is_finite() || !(0.0..=1.0).contains(&v) {
                return Err(Error::Validation(format!("placement {} must be within [0, 1]", name)));
            }
        }
        let positive = |v: f32| v.is_finite() && v > 0.0;
        if !(positive(self.width) && positive(self.height)) {
            return Err(Error::Validation("placement size must be positive".to_string()));
        }
        if !self.scale.is_finite() || self.scale <= 0.0 || self.scale > 10.0 {
            return Err(Error::Validation("placement scale must be within (0, 10]".to_string()));
        }
        if !self.rotation.is_finite() {
            return Err(Error::Validation("placement rotation must be finite".to_string()));
        }
        Ok(())
    }

    /// Rotation folded into [0, 360).
    pub fn normalized_rotation(&self) -> f32 {
        self.rotation.rem_euclid(360.0)
    }
}

/// Pages that receive the QR mark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QrPages {
    /// Last page only
    #[default]
    Last,
    /// First page only
    First,
    /// Every page
    All,
    /// Explicit 1-based page numbers
    List(Vec<u32>),
}

impl QrPages {
    /// Resolve to distinct 0-based page indices for a document of `page_count` pages.
    pub fn resolve(&self, page_count: usize) -> Vec<usize> {
        if page_count == 0 {
            return Vec::new();
        }
        let last = page_count - 1;
        match self {
            QrPages::Last => vec![last],
            QrPages::First => vec![0],
            QrPages::All => (0..page_count).collect(),
            QrPages::List(pages) => {
                let mut out: Vec<usize> = pages
                    .iter()
                    .filter(|p| **p >= 1)
                    .map(|p| (*p as usize - 1).min(last))
                    .collect();
                out.sort_unstable();
                out.dedup();
                if out.is_empty() {
                    out.push(last);
                }
                out
            },
        }
    }
}

/// Page corner for the QR mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QrPosition {
    /// Bottom-right corner
    #[default]
    BottomRight,
    /// Bottom-left corner
    BottomLeft,
    /// Top-right corner
    TopRight,
    /// Top-left corner
    TopLeft,
}

fn default_true() -> bool {
    true
}

fn default_qr_size() -> f32 {
    72.0
}

/// QR validation mark settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QrConfig {
    /// Draw the mark at all
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Target pages
    #[serde(default)]
    pub pages: QrPages,
    /// Corner
    #[serde(default)]
    pub position: QrPosition,
    /// Side length in points
    #[serde(default = "default_qr_size")]
    pub size: f32,
    /// Text drawn under the mark; defaults to the validation URL line
    #[serde(default)]
    pub caption: Option<String>,
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pages: QrPages::Last,
            position: QrPosition::BottomRight,
            size: default_qr_size(),
            caption: None,
        }
    }
}

impl QrConfig {
    /// Boundary checks.
    pub fn validate(&self) -> Result<()> {
        if !self.size.is_finite() || !(24.0..=400.0).contains(&self.size) {
            return Err(Error::Validation("QR size must be within [24, 400] points".to_string()));
        }
        if let QrPages::List(pages) = &self.pages {
            if pages.is_empty() || pages.contains(&0) {
                return Err(Error::Validation("QR page list must hold pages >= 1".to_string()));
            }
        }
        Ok(())
    }
}

/// Who is signing.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignerInfo {
    /// Display name
    pub name: String,
    /// Registration number (tax id or similar)
    #[serde(default)]
    pub registration: Option<String>,
    /// Contact email
    #[serde(default)]
    pub email: Option<String>,
    /// Signing reason
    #[serde(default)]
    pub reason: Option<String>,
    /// Signing location
    #[serde(default)]
    pub location: Option<String>,
    /// Handwritten signature image (PNG or JPEG)
    #[serde(default, skip_serializing)]
    pub signature_image: Option<Vec<u8>>,
}

impl SignerInfo {
    /// Signer with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Boundary checks.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("signer name is required".to_string()));
        }
        if self.name.chars().count() > 200 {
            return Err(Error::Validation("signer name is too long".to_string()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for SignerInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerInfo")
            .field("name", &self.name)
            .field("registration", &self.registration)
            .field("email", &self.email)
            .field("reason", &self.reason)
            .field("location", &self.location)
            .field("signature_image", &self.signature_image.as_ref().map(|b| b.len()))
            .finish()
    }
}

/// Certificate chosen for PKI embedding.
#[derive(Clone, PartialEq, Eq)]
pub struct CertificateSelection {
    /// Certificate id; `None` means the owner's active certificate
    pub certificate_id: Option<Uuid>,
    /// Container passphrase
    pub passphrase: String,
}

impl std::fmt::Debug for CertificateSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateSelection")
            .field("certificate_id", &self.certificate_id)
            .field("passphrase", &"[REDACTED]")
            .finish()
    }
}

/// Everything needed to sign one document.
#[derive(Debug, Clone)]
pub struct SigningRequest {
    /// Target document
    pub document_id: Uuid,
    /// Caller; `None` for anonymous documents
    pub caller: Option<Uuid>,
    /// Visual placements
    pub placements: Vec<Placement>,
    /// Signer identity
    pub signer: SignerInfo,
    /// QR settings
    pub qr: QrConfig,
    /// Optional PKI certificate
    pub certificate: Option<CertificateSelection>,
}

impl SigningRequest {
    /// Request with default QR settings and no certificate.
    pub fn new(document_id: Uuid, caller: Option<Uuid>, signer: SignerInfo) -> Self {
        Self {
            document_id,
            caller,
            placements: Vec::new(),
            signer,
            qr: QrConfig::default(),
            certificate: None,
        }
    }

    /// Add a placement.
    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placements.push(placement);
        self
    }

    /// Replace the QR settings.
    pub fn with_qr(mut self, qr: QrConfig) -> Self {
        self.qr = qr;
        self
    }

    /// Sign with a certificate.
    pub fn with_certificate(
        mut self,
        certificate_id: Option<Uuid>,
        passphrase: impl Into<String>,
    ) -> Self {
        self.certificate = Some(CertificateSelection {
            certificate_id,
            passphrase: passphrase.into(),
        });
        self
    }

    /// Validate every boundary field.
    pub fn validate(&self) -> Result<()> {
        self.signer.validate()?;
        if self.placements.len() > 50 {
            return Err(Error::Validation("too many placements".to_string()));
        }
        for placement in &self.placements {
            placement.validate()?;
        }
        self.qr.validate()
    }
}

/// Outcome of one successful signing call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedPdfResult {
    /// Signed document
    pub document_id: Uuid,
    /// Canonical content hash (SHA-256 hex)
    pub hash: String,
    /// Public URL of the signed PDF
    pub signed_url: String,
    /// Public validation page URL
    pub validation_url: String,
    /// Whether a PKI signature was embedded
    pub has_pki_signature: bool,
    /// Non-fatal problems, such as a skipped PKI embedding
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placement_validation() {
        assert!(Placement::new(1, 0.5, 0.9, 180.0, 60.0).validate().is_ok());
        assert!(Placement::new(0, 0.5, 0.5, 10.0, 10.0).validate().is_err());
        assert!(Placement::new(1, 1.5, 0.5, 10.0, 10.0).validate().is_err());
        assert!(Placement::new(1, 0.5, -0.1, 10.0, 10.0).validate().is_err());
        assert!(Placement::new(1, 0.5, 0.5, 0.0, 10.0).validate().is_err());
        assert!(Placement::new(1, 0.5, 0.5, 10.0, 10.0).with_scale(0.0).validate().is_err());
        assert!(Placement::new(1, f32::NAN, 0.5, 10.0, 10.0).validate().is_err());
    }

    #[test]
    fn test_rotation_normalized() {
        let p = Placement::new(1, 0.0, 0.0, 1.0, 1.0).with_rotation(-90.0);
        assert_eq!(p.normalized_rotation(), 270.0);
        let p = p.with_rotation(450.0);
        assert_eq!(p.normalized_rotation(), 90.0);
    }

    #[test]
    fn test_placement_json_defaults() {
        let p: Placement =
            serde_json::from_str(r#"{"page":1,"x":0.5,"y":0.9,"width":180,"height":60}"#).unwrap();
        assert_eq!(p.scale, 1.0);
        assert_eq!(p.rotation, 0.0);
    }

    #[test]
    fn test_qr_pages_resolve() {
        assert_eq!(QrPages::Last.resolve(3), vec![2]);
        assert_eq!(QrPages::First.resolve(3), vec![0]);
        assert_eq!(QrPages::All.resolve(3), vec![0, 1, 2]);
        assert_eq!(QrPages::List(vec![2, 9, 2]).resolve(3), vec![1, 2]);
        assert!(QrPages::Last.resolve(0).is_empty());
    }

    #[test]
    fn test_qr_config_defaults() {
        let qr: QrConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(qr, QrConfig::default());
        assert!(qr.enabled);
        assert!(qr.validate().is_ok());
        let bad = QrConfig {
            size: 5.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_selection_debug_redacts_passphrase() {
        let request = SigningRequest::new(Uuid::new_v4(), None, SignerInfo::new("Ana"))
            .with_certificate(None, "hunter2");
        assert!(!format!("{:?}", request).contains("hunter2"));
    }

    #[test]
    fn test_signer_validation() {
        assert!(SignerInfo::new("  ").validate().is_err());
        assert!(SignerInfo::new("Ana").validate().is_ok());
    }
}
