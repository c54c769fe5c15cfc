//! Structured API error responses with error codes
//!
//! Every failure leaves the HTTP surface as an [`ApiError`]: a stable
//! machine-readable code, a numeric code, and a message in the caller's
//! language. Internal detail (storage hosts, OpenSSL stacks, file paths) is
//! logged and never serialized.

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::{error, warn};
use serde::{Deserialize, Serialize};

use crate::error::Error;

// ============================================================================
// Error Codes
// ============================================================================

/// Error codes for API responses
///
/// These codes are stable and can be used by clients for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Authentication errors (1xxx)
    /// No caller identity
    Unauthorized,
    /// Caller may not access the resource
    Forbidden,

    // Rate limiting errors (2xxx)
    /// Too many requests in the current window
    RateLimited,

    // Validation errors (3xxx)
    /// Malformed or out-of-range input
    ValidationError,
    /// Unsupported RSA key size
    InvalidKeyStrength,
    /// Uploaded file is not a usable PDF or image
    InvalidDocument,
    /// Upload exceeds the size limit
    PayloadTooLarge,

    // Resource errors (4xxx)
    /// Unknown resource
    NotFound,

    // Conflict errors (5xxx)
    /// Document already signed
    AlreadySigned,
    /// State conflict
    Conflict,
    /// Batch rejected during pre-flight
    BatchRejected,

    // Crypto errors (6xxx)
    /// Key, certificate or container operation failed
    CryptoFailure,
    /// Master key not configured
    MissingEncryptionKey,

    // Infrastructure errors (8xxx)
    /// Storage or database unavailable
    DependencyFailure,
    /// Internal server error
    InternalError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn numeric_code(&self) -> u32 {
        match self {
            ErrorCode::Unauthorized => 1001,
            ErrorCode::Forbidden => 1002,

            ErrorCode::RateLimited => 2001,

            ErrorCode::ValidationError => 3001,
            ErrorCode::InvalidKeyStrength => 3002,
            ErrorCode::InvalidDocument => 3003,
            ErrorCode::PayloadTooLarge => 3004,

            ErrorCode::NotFound => 4001,

            ErrorCode::AlreadySigned => 5001,
            ErrorCode::Conflict => 5002,
            ErrorCode::BatchRejected => 5003,

            ErrorCode::CryptoFailure => 6001,
            ErrorCode::MissingEncryptionKey => 6002,

            ErrorCode::DependencyFailure => 8001,
            ErrorCode::InternalError => 8999,
        }
    }

    /// Get the HTTP status code for this error
    pub fn http_status(&self) -> StatusCode {
        match self {
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::InvalidKeyStrength => StatusCode::BAD_REQUEST,
            ErrorCode::InvalidDocument => StatusCode::BAD_REQUEST,
            ErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::AlreadySigned => StatusCode::CONFLICT,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::BatchRejected => StatusCode::CONFLICT,
            ErrorCode::CryptoFailure => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::MissingEncryptionKey => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::DependencyFailure => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the caller.
    pub fn message(&self, locale: Locale) -> &'static str {
        match (self, locale) {
            (ErrorCode::Unauthorized, Locale::En) => "Authentication required",
            (ErrorCode::Unauthorized, Locale::PtBr) => "Autenticação necessária",
            (ErrorCode::Forbidden, Locale::En) => "Access denied",
            (ErrorCode::Forbidden, Locale::PtBr) => "Acesso negado",
            (ErrorCode::RateLimited, Locale::En) => "Too many requests, please try again later",
            (ErrorCode::RateLimited, Locale::PtBr) => {
                "Muitas requisições, tente novamente mais tarde"
            },
            (ErrorCode::ValidationError, Locale::En) => "The request is invalid",
            (ErrorCode::ValidationError, Locale::PtBr) => "A requisição é inválida",
            (ErrorCode::InvalidKeyStrength, Locale::En) => "Key strength must be 2048 or 4096 bits",
            (ErrorCode::InvalidKeyStrength, Locale::PtBr) => {
                "O tamanho da chave deve ser 2048 ou 4096 bits"
            },
            (ErrorCode::InvalidDocument, Locale::En) => "The file is not a valid PDF or image",
            (ErrorCode::InvalidDocument, Locale::PtBr) => {
                "O arquivo não é um PDF ou imagem válido"
            },
            (ErrorCode::PayloadTooLarge, Locale::En) => "The upload is too large",
            (ErrorCode::PayloadTooLarge, Locale::PtBr) => "O arquivo enviado é muito grande",
            (ErrorCode::NotFound, Locale::En) => "Not found",
            (ErrorCode::NotFound, Locale::PtBr) => "Não encontrado",
            (ErrorCode::AlreadySigned, Locale::En) => "The document is already signed",
            (ErrorCode::AlreadySigned, Locale::PtBr) => "O documento já está assinado",
            (ErrorCode::Conflict, Locale::En) => {
                "The resource is not in a state that allows this operation"
            },
            (ErrorCode::Conflict, Locale::PtBr) => {
                "O recurso não está em um estado que permita esta operação"
            },
            (ErrorCode::BatchRejected, Locale::En) => {
                "The batch was rejected and nothing was signed"
            },
            (ErrorCode::BatchRejected, Locale::PtBr) => "O lote foi rejeitado e nada foi assinado",
            (ErrorCode::CryptoFailure, Locale::En) => "A cryptographic operation failed",
            (ErrorCode::CryptoFailure, Locale::PtBr) => "Uma operação criptográfica falhou",
            (ErrorCode::MissingEncryptionKey, Locale::En) => {
                "The signing service is not configured"
            },
            (ErrorCode::MissingEncryptionKey, Locale::PtBr) => {
                "O serviço de assinatura não está configurado"
            },
            (ErrorCode::DependencyFailure, Locale::En) => {
                "A dependent service is unavailable, please retry"
            },
            (ErrorCode::DependencyFailure, Locale::PtBr) => {
                "Um serviço dependente está indisponível, tente novamente"
            },
            (ErrorCode::InternalError, Locale::En) => "Internal server error",
            (ErrorCode::InternalError, Locale::PtBr) => "Erro interno do servidor",
        }
    }

    fn from_error(err: &Error) -> Self {
        match err {
            Error::Validation(_) => ErrorCode::ValidationError,
            Error::Unauthorized => ErrorCode::Unauthorized,
            Error::Forbidden(_) => ErrorCode::Forbidden,
            Error::NotFound(_) => ErrorCode::NotFound,
            Error::AlreadySigned(_) => ErrorCode::AlreadySigned,
            Error::Conflict(_) => ErrorCode::Conflict,
            Error::BatchRejected { .. } => ErrorCode::BatchRejected,
            Error::RateLimited { .. } => ErrorCode::RateLimited,
            Error::Storage(_) | Error::Timeout(_) | Error::Persistence(_) | Error::Io(_) => {
                ErrorCode::DependencyFailure
            },
            Error::Decryption | Error::Crypto(_) => ErrorCode::CryptoFailure,
            Error::MissingEncryptionKey => ErrorCode::MissingEncryptionKey,
            Error::InvalidKeyStrength(_) => ErrorCode::InvalidKeyStrength,
            Error::InvalidPdf(_) | Error::Image(_) => ErrorCode::InvalidDocument,
            Error::Barcode(_) => ErrorCode::InternalError,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code_str = match self {
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::InvalidKeyStrength => "INVALID_KEY_STRENGTH",
            ErrorCode::InvalidDocument => "INVALID_DOCUMENT",
            ErrorCode::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::AlreadySigned => "ALREADY_SIGNED",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::BatchRejected => "BATCH_REJECTED",
            ErrorCode::CryptoFailure => "CRYPTO_FAILURE",
            ErrorCode::MissingEncryptionKey => "MISSING_ENCRYPTION_KEY",
            ErrorCode::DependencyFailure => "DEPENDENCY_FAILURE",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        write!(f, "{}", code_str)
    }
}

// ============================================================================
// Locale
// ============================================================================

/// Response language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    /// English
    #[default]
    En,
    /// Brazilian Portuguese
    PtBr,
}

impl Locale {
    /// Pick a locale from an `Accept-Language` value.
    ///
    /// Entries are taken in order of their `q` weight; the first supported
    /// language wins. Any Portuguese tag maps to `PtBr`.
    pub fn from_accept_language(value: &str) -> Self {
        let mut ranked: Vec<(f32, &str)> = value
            .split(',')
            .filter_map(|entry| {
                let mut parts = entry.trim().split(';');
                let tag = parts.next()?.trim();
                if tag.is_empty() {
                    return None;
                }
                let weight = parts
                    .find_map(|p| p.trim().strip_prefix("q="))
                    .and_then(|q| q.parse::<f32>().ok())
                    .unwrap_or(1.0);
                Some((weight, tag))
            })
            .collect();
        ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        for (_, tag) in ranked {
            let primary = tag.split('-').next().unwrap_or(tag).to_ascii_lowercase();
            match primary.as_str() {
                "pt" => return Locale::PtBr,
                "en" => return Locale::En,
                _ => {},
            }
        }
        Locale::En
    }

    /// Locale requested by `headers`.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|v| v.to_str().ok())
            .map(Self::from_accept_language)
            .unwrap_or_default()
    }
}

// ============================================================================
// Structured Error Response
// ============================================================================

/// Structured error response for API endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error details
    pub error: ErrorDetails,
}

/// Detailed error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Numeric error code for easy categorization
    pub numeric_code: u32,

    /// Human-readable error message
    pub message: String,

    /// Additional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// Retry information for rate limiting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,

    /// Related resource ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}

impl ApiError {
    /// Create a new API error with the default-language message
    pub fn new(code: ErrorCode) -> Self {
        Self::localized(code, Locale::En)
    }

    /// Create a new API error in `locale`
    pub fn localized(code: ErrorCode, locale: Locale) -> Self {
        Self {
            error: ErrorDetails {
                code,
                numeric_code: code.numeric_code(),
                message: code.message(locale).to_string(),
                details: None,
                retry_after: None,
                resource_id: None,
            },
        }
    }

    /// Convert an engine error, keeping caller-safe detail only.
    pub fn from_error(err: Error, locale: Locale) -> Self {
        let code = ErrorCode::from_error(&err);
        let mut api = Self::localized(code, locale);

        match &err {
            Error::BatchRejected { reason, offenders } => {
                api = api.with_details(serde_json::json!({
                    "reason": reason,
                    "offenders": offenders,
                }));
            },
            Error::RateLimited { retry_after_secs } => {
                api = api.with_retry_after(*retry_after_secs);
            },
            Error::AlreadySigned(id) => {
                api = api.with_resource_id(id.to_string());
            },
            _ if err.is_client_error() => {
                api = api.with_details(serde_json::json!({ "reason": err.to_string() }));
            },
            _ => {},
        }

        if code.http_status().is_server_error() {
            error!("request failed with {}: {}", code, err);
        } else {
            warn!("request rejected with {}: {}", code, err);
        }
        api
    }

    /// Set additional details
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.error.details = Some(details);
        self
    }

    /// Set retry-after seconds (for rate limiting)
    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.error.retry_after = Some(seconds);
        self
    }

    /// Set related resource ID
    pub fn with_resource_id(mut self, id: impl Into<String>) -> Self {
        self.error.resource_id = Some(id.into());
        self
    }

    /// Get the HTTP status code
    pub fn status(&self) -> StatusCode {
        self.error.code.http_status()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::from_error(err, Locale::En)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code_str = self.error.code.to_string();
        let retry_after = self.error.retry_after;
        let mut response = (status, Json(self)).into_response();

        // Add error code header for easier debugging
        if let Ok(code_value) = HeaderValue::from_str(&code_str) {
            response.headers_mut().insert(
                axum::http::header::HeaderName::from_static("x-error-code"),
                code_value,
            );
        }
        if let Some(seconds) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
        }

        response
    }
}
