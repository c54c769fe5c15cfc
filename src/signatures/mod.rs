//! PDF Digital Signatures module.
//!
//! Creates and inspects PKCS#7 signatures embedded in PDF signature
//! dictionaries.
//!
//! ## Features
//!
//! - **Signature Creation**: PKCS#7 detached signatures over the ByteRange
//! - **Signature Verification**: marker scan, metadata extraction, hash and
//!   PKCS#7 integrity checks
//! - **ByteRange Calculation**: placeholder reservation and in-place patching
//!
//! ## Signature Types Recognized
//!
//! - PKCS#7 detached signatures (adbe.pkcs7.detached), produced by [`PdfSigner`]
//! - PKCS#7 SHA-1 signatures (adbe.pkcs7.sha1)
//! - PAdES signatures (ETSI.CAdES.detached)
//!
//! ## Example
//!
//! ```ignore
//! use pdf_seal::signatures::{PdfSigner, SignOptions, SigningCredentials};
//!
//! let credentials = SigningCredentials::from_pkcs12(&p12_der, "passphrase")?;
//! let signer = PdfSigner::new(credentials, SignOptions::default().with_reason("Approval"));
//! let signed = signer.sign_pdf(&pdf_bytes)?;
//! ```
//!
//! ## PDF Specification Reference
//!
//! - ISO 32000-1:2008 Section 12.8 - Digital Signatures
//! - ETSI TS 102 778 - PAdES

mod byterange;
mod service;
mod signer;
mod types;
mod verifier;

pub use byterange::{ByteRangeCalculator, BYTE_RANGE_PLACEHOLDER};
pub use service::VerificationService;
pub use signer::PdfSigner;
pub use types::{
    SignOptions, SignatureClassification, SignatureInfo, SignatureSubFilter, SigningCredentials,
    VerificationResult,
};
pub use verifier::{SignatureVerifier, PKI_MARKER_THRESHOLD};
