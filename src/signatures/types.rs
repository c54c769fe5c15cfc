//! Digital signature types and data structures.
//!
//! This module defines the core types used for PDF digital signatures.

use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::x509::X509;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Signature sub-filter type (signature format).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SignatureSubFilter {
    /// adbe.pkcs7.detached - PKCS#7 detached signature
    #[default]
    #[serde(rename = "adbe.pkcs7.detached")]
    Pkcs7Detached,
    /// adbe.pkcs7.sha1 - PKCS#7 with SHA-1 digest
    #[serde(rename = "adbe.pkcs7.sha1")]
    Pkcs7Sha1,
    /// adbe.x509.rsa_sha1 - raw RSA signature
    #[serde(rename = "adbe.x509.rsa_sha1")]
    X509RsaSha1,
    /// ETSI.CAdES.detached - PAdES CAdES signature
    #[serde(rename = "ETSI.CAdES.detached")]
    CadesDetached,
    /// ETSI.RFC3161 - Timestamp token
    #[serde(rename = "ETSI.RFC3161")]
    Rfc3161,
}

impl SignatureSubFilter {
    /// Get the PDF name for this sub-filter.
    pub fn as_pdf_name(&self) -> &'static str {
        match self {
            SignatureSubFilter::Pkcs7Detached => "adbe.pkcs7.detached",
            SignatureSubFilter::Pkcs7Sha1 => "adbe.pkcs7.sha1",
            SignatureSubFilter::X509RsaSha1 => "adbe.x509.rsa_sha1",
            SignatureSubFilter::CadesDetached => "ETSI.CAdES.detached",
            SignatureSubFilter::Rfc3161 => "ETSI.RFC3161",
        }
    }

    /// Parse a PDF name into a sub-filter type.
    pub fn from_pdf_name(name: &str) -> Option<Self> {
        match name {
            "adbe.pkcs7.detached" => Some(SignatureSubFilter::Pkcs7Detached),
            "adbe.pkcs7.sha1" => Some(SignatureSubFilter::Pkcs7Sha1),
            "adbe.x509.rsa_sha1" => Some(SignatureSubFilter::X509RsaSha1),
            "ETSI.CAdES.detached" => Some(SignatureSubFilter::CadesDetached),
            "ETSI.RFC3161" => Some(SignatureSubFilter::Rfc3161),
            _ => None,
        }
    }
}

/// Signing credentials containing certificate and private key.
#[derive(Clone)]
pub struct SigningCredentials {
    /// DER-encoded X.509 certificate
    pub certificate: Vec<u8>,
    /// DER-encoded private key
    pub private_key: Vec<u8>,
    /// Extra certificates from the container (DER-encoded)
    pub chain: Vec<Vec<u8>>,
}

impl SigningCredentials {
    /// Create new signing credentials from raw components.
    pub fn new(certificate: Vec<u8>, private_key: Vec<u8>) -> Self {
        Self {
            certificate,
            private_key,
            chain: Vec::new(),
        }
    }

    /// Create credentials with a certificate chain.
    pub fn with_chain(mut self, chain: Vec<Vec<u8>>) -> Self {
        self.chain = chain;
        self
    }

    /// Open a PKCS#12 container with its passphrase.
    ///
    /// A wrong passphrase, a corrupt container and a container without a key
    /// all yield [`Error::Decryption`]; the OpenSSL detail is only logged.
    pub fn from_pkcs12(data: &[u8], password: &str) -> Result<Self> {
        let parsed = Pkcs12::from_der(data)
            .and_then(|p12| p12.parse2(password))
            .map_err(|e| {
                log::debug!("PKCS#12 open failed: {}", e);
                Error::Decryption
            })?;

        let (Some(pkey), Some(cert)) = (parsed.pkey, parsed.cert) else {
            log::debug!("PKCS#12 container lacks a key or certificate");
            return Err(Error::Decryption);
        };

        let mut chain = Vec::new();
        if let Some(ca) = parsed.ca {
            for extra in ca.iter() {
                chain.push(extra.to_der()?);
            }
        }

        Ok(Self::new(cert.to_der()?, pkey.private_key_to_der()?).with_chain(chain))
    }

    /// Parsed certificate.
    pub fn x509(&self) -> Result<X509> {
        Ok(X509::from_der(&self.certificate)?)
    }

    /// Parsed private key.
    pub fn pkey(&self) -> Result<PKey<Private>> {
        Ok(PKey::private_key_from_der(&self.private_key)?)
    }

    /// Parsed extra certificates.
    pub fn chain_x509(&self) -> Result<Vec<X509>> {
        self.chain
            .iter()
            .map(|der| X509::from_der(der).map_err(Error::from))
            .collect()
    }
}

impl std::fmt::Debug for SigningCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningCredentials")
            .field("certificate", &format!("{} bytes", self.certificate.len()))
            .field("private_key", &"[REDACTED]")
            .field("chain", &format!("{} certificates", self.chain.len()))
            .finish()
    }
}

/// Options for signing a PDF.
#[derive(Debug, Clone)]
pub struct SignOptions {
    /// Signature sub-filter (format)
    pub sub_filter: SignatureSubFilter,
    /// Reason for signing
    pub reason: Option<String>,
    /// Location where the document was signed
    pub location: Option<String>,
    /// Contact information
    pub contact_info: Option<String>,
    /// Name of the signer (if different from certificate CN)
    pub name: Option<String>,
    /// Estimated signature size in bytes (for ByteRange calculation)
    pub estimated_size: usize,
}

impl Default for SignOptions {
    fn default() -> Self {
        Self {
            sub_filter: SignatureSubFilter::Pkcs7Detached,
            reason: None,
            location: None,
            contact_info: None,
            name: None,
            estimated_size: 8192, // Conservative default for signature size
        }
    }
}

impl SignOptions {
    /// Set the signer name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the reason for signing.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Set the signing location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the contact information.
    pub fn with_contact_info(mut self, contact: impl Into<String>) -> Self {
        self.contact_info = Some(contact.into());
        self
    }
}

/// Information about an existing signature in a PDF.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignatureInfo {
    /// Name of the signer
    pub signer_name: Option<String>,
    /// Signing time (PDF date string)
    pub signing_time: Option<String>,
    /// Reason for signing
    pub reason: Option<String>,
    /// Signing location
    pub location: Option<String>,
    /// Contact information
    pub contact_info: Option<String>,
    /// Signature sub-filter type
    pub sub_filter: Option<SignatureSubFilter>,
    /// Whether the ByteRange spans the whole file except `/Contents`
    pub covers_whole_document: bool,
    /// Byte range of the signed data
    pub byte_range: Vec<i64>,
    /// PKCS#7 check over the ByteRange bytes; `None` when not checkable
    pub integrity_valid: Option<bool>,
    /// Certificate subject common name
    pub certificate_cn: Option<String>,
    /// Certificate issuer
    pub certificate_issuer: Option<String>,
    /// Certificate validity start (RFC 3339)
    pub valid_from: Option<String>,
    /// Certificate validity end (RFC 3339)
    pub valid_to: Option<String>,
}

/// What kind of signing a file carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureClassification {
    /// Neither markers nor a visual seal
    None,
    /// Visual seal and validation watermark only
    VisualOnly,
    /// PKI signature without the visual seal
    DigitalPki,
    /// Visual seal plus PKI signature
    Both,
}

impl SignatureClassification {
    /// Combine the two detections.
    pub fn from_flags(has_visual: bool, has_pki: bool) -> Self {
        match (has_visual, has_pki) {
            (false, false) => SignatureClassification::None,
            (true, false) => SignatureClassification::VisualOnly,
            (false, true) => SignatureClassification::DigitalPki,
            (true, true) => SignatureClassification::Both,
        }
    }
}

/// Result of signature verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    /// PKI marker threshold reached
    #[serde(rename = "hasPKISignature")]
    pub has_pki_signature: bool,
    /// Number of signature dictionaries found
    pub signature_count: usize,
    /// Overall classification
    pub classification: SignatureClassification,
    /// Per-signature metadata
    pub signatures: Vec<SignatureInfo>,
    /// Visual seal marker present
    pub has_visual_seal: bool,
    /// SHA-256 of the inspected bytes, hex
    pub computed_hash: String,
    /// Hash the caller compared against
    pub expected_hash: Option<String>,
    /// `None` when no expected hash was supplied
    pub hash_match: Option<bool>,
    /// Verification messages (warnings)
    pub messages: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_filter_names() {
        assert_eq!(SignatureSubFilter::Pkcs7Detached.as_pdf_name(), "adbe.pkcs7.detached");
        assert_eq!(
            SignatureSubFilter::from_pdf_name("adbe.pkcs7.detached"),
            Some(SignatureSubFilter::Pkcs7Detached)
        );
        assert_eq!(SignatureSubFilter::from_pdf_name("adbe.unknown"), None);
    }

    #[test]
    fn test_sign_options_builder() {
        let opts = SignOptions::default()
            .with_reason("Test signing")
            .with_location("Test City");
        assert_eq!(opts.reason, Some("Test signing".to_string()));
        assert_eq!(opts.location, Some("Test City".to_string()));
        assert_eq!(opts.sub_filter, SignatureSubFilter::Pkcs7Detached);
    }

    #[test]
    fn test_classification_flags() {
        use SignatureClassification::*;
        assert_eq!(SignatureClassification::from_flags(false, false), None);
        assert_eq!(SignatureClassification::from_flags(true, false), VisualOnly);
        assert_eq!(SignatureClassification::from_flags(false, true), DigitalPki);
        assert_eq!(SignatureClassification::from_flags(true, true), Both);
    }

    #[test]
    fn test_classification_serde() {
        let json = serde_json::to_string(&SignatureClassification::VisualOnly).unwrap();
        assert_eq!(json, "\"visual_only\"");
    }

    #[test]
    fn test_signing_credentials_debug() {
        let creds = SigningCredentials::new(vec![1, 2, 3], vec![4, 5, 6]);
        let debug = format!("{:?}", creds);
        assert!(debug.contains("[REDACTED]"));
        assert!(debug.contains("3 bytes"));
    }

    #[test]
    fn test_from_pkcs12_garbage_is_decryption_error() {
        let err = SigningCredentials::from_pkcs12(b"not a container", "pw").unwrap_err();
        assert!(matches!(err, Error::Decryption));
    }
}
