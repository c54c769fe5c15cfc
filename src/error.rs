//! Error types for the signing engine.
//!
//! This module defines all error types that can occur while issuing certificates,
//! sealing PDFs, verifying signatures and serving validation lookups.

use uuid::Uuid;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A document rejected during batch pre-flight.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BatchOffender {
    /// Offending document id
    pub document_id: Uuid,
    /// Why the document cannot be part of the batch
    pub reason: OffenseReason,
}

/// Pre-flight rejection reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffenseReason {
    /// Unknown id, or owned by someone else
    NotFound,
    /// Document was already signed
    AlreadySigned,
    /// Document is canceled or expired
    NotSignable,
    /// Id appears more than once
    Duplicate,
}

/// Error types that can occur in the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or out-of-range input
    #[error("Validation failed: {0}")]
    Validation(String),

    /// No caller identity
    #[error("Authentication required")]
    Unauthorized,

    /// Caller identified but not allowed
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Unknown resource. Never says whether it exists for someone else.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Document is already signed
    #[error("Document {0} is already signed")]
    AlreadySigned(Uuid),

    /// State conflict other than re-signing
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Whole batch rejected during pre-flight; nothing was written
    #[error("Batch rejected: {reason}")]
    BatchRejected {
        /// Summary of the rejection
        reason: String,
        /// Documents that caused it
        offenders: Vec<BatchOffender>,
    },

    /// Fixed-window limit exceeded
    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds until the window resets
        retry_after_secs: u64,
    },

    /// Object storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Outbound call exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Relational store failure
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// AEAD tag or key mismatch
    #[error("Decryption failed")]
    Decryption,

    /// Key generation, certificate building, PKCS#12 or PKCS#7 failure
    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),

    /// Master key not configured
    #[error("Master encryption key is not configured")]
    MissingEncryptionKey,

    /// RSA modulus size outside the supported set
    #[error("Invalid key strength: {0} bits (expected 2048 or 4096)")]
    InvalidKeyStrength(u32),

    /// Invalid PDF structure
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Image error
    #[error("Image error: {0}")]
    Image(String),

    /// QR code rendering error
    #[error("Barcode error: {0}")]
    Barcode(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Unauthorized => "UNAUTHORIZED",
            Error::Forbidden(_) => "FORBIDDEN",
            Error::NotFound(_) => "NOT_FOUND",
            Error::AlreadySigned(_) => "ALREADY_SIGNED",
            Error::Conflict(_) => "CONFLICT",
            Error::BatchRejected { .. } => "BATCH_REJECTED",
            Error::RateLimited { .. } => "RATE_LIMITED",
            Error::Storage(_) | Error::Timeout(_) | Error::Persistence(_) | Error::Io(_) => {
                "DEPENDENCY_FAILURE"
            },
            Error::Decryption | Error::Crypto(_) => "CRYPTO_FAILURE",
            Error::MissingEncryptionKey => "MISSING_ENCRYPTION_KEY",
            Error::InvalidKeyStrength(_) => "INVALID_KEY_STRENGTH",
            Error::InvalidPdf(_) | Error::Image(_) => "INVALID_DOCUMENT",
            Error::Barcode(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the message is safe to show to the caller as-is.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::Unauthorized
                | Error::Forbidden(_)
                | Error::NotFound(_)
                | Error::AlreadySigned(_)
                | Error::Conflict(_)
                | Error::BatchRejected { .. }
                | Error::RateLimited { .. }
                | Error::InvalidKeyStrength(_)
                | Error::InvalidPdf(_)
                | Error::Image(_)
        )
    }

    /// Whether the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Storage(_)
                | Error::Timeout(_)
                | Error::Persistence(_)
                | Error::RateLimited { .. }
        )
    }
}

impl From<openssl::error::ErrorStack> for Error {
    fn from(err: openssl::error::ErrorStack) -> Self {
        Error::Crypto(err.to_string())
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        Error::InvalidPdf(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_is_generic() {
        let err = Error::NotFound("Document");
        assert_eq!(err.to_string(), "Document not found");
    }

    #[test]
    fn test_already_signed_error() {
        let id = Uuid::new_v4();
        let msg = Error::AlreadySigned(id).to_string();
        assert!(msg.contains(&id.to_string()));
        assert!(msg.contains("already signed"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(Error::Storage("down".into()).is_retryable());
        assert!(Error::Timeout("download".into()).is_retryable());
        assert!(!Error::Decryption.is_retryable());
        assert!(!Error::Validation("bad".into()).is_retryable());
    }

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(Error::AlreadySigned(Uuid::nil()).code(), "ALREADY_SIGNED");
        assert_eq!(Error::Timeout("download".into()).code(), "DEPENDENCY_FAILURE");
        assert_eq!(Error::Decryption.code(), "CRYPTO_FAILURE");
        assert!(!Error::Crypto("bad mac".into()).is_client_error());
        assert!(Error::NotFound("Document").is_client_error());
    }

    #[test]
    fn test_invalid_key_strength_error() {
        let msg = Error::InvalidKeyStrength(1024).to_string();
        assert!(msg.contains("1024"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
