//! Self-signed signing certificates.
//!
//! - [`CertificateIssuer`] generates an RSA key pair and a self-signed X.509
//!   certificate, packages both as PKCS#12 and stores the container encrypted.
//! - [`CertificateVault`] opens stored containers for signing and handles
//!   rotation (activate) and revocation.
//!
//! Certificates are leaf-only and never chained to a trusted root.

mod issuer;
mod vault;
pub mod x509;

pub use issuer::{CertificateIssuer, IssueRequest, MAX_VALIDITY_YEARS, MIN_PASSPHRASE_LEN};
pub use vault::CertificateVault;
pub use x509::{generate_self_signed, package_pkcs12, GeneratedCertificate};
