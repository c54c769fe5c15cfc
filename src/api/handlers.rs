//! Route handlers.

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use log::info;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::error::{ApiError, ErrorCode, Locale};
use super::extract::{Caller, ClientIp, MaybeCaller};
use super::types::*;
use super::AppState;
use crate::error::Error;
use crate::model::{AccessGate, CertificateSummary, PublicDocument, SignedPdfResult};
use crate::signatures::VerificationResult;
use crate::signing::{BatchResult, MAX_UPLOAD_BYTES};
use crate::store::{PDF_CONTENT_TYPE, PNG_CONTENT_TYPE};
use crate::validation::{CodeSubmission, ValidationOutcome};

/// Storage prefixes served by `GET /files/*path`.
const PUBLIC_PREFIXES: [&str; 2] = ["signed/", "qr/"];

type ApiResult<T> = std::result::Result<T, ApiError>;

fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>, locale: Locale) -> ApiResult<T> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        ApiError::localized(ErrorCode::ValidationError, locale)
            .with_details(serde_json::json!({ "reason": rejection.body_text() }))
    })
}

fn optional_body<T: DeserializeOwned + Default>(bytes: &Bytes, locale: Locale) -> ApiResult<T> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(bytes).map_err(|e| {
        ApiError::localized(ErrorCode::ValidationError, locale)
            .with_details(serde_json::json!({ "reason": e.to_string() }))
    })
}

/// `GET /health`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}

/// `POST /certificates`
pub async fn issue_certificate(
    State(state): State<AppState>,
    Caller(owner): Caller,
    locale: Locale,
    payload: std::result::Result<Json<CreateCertificateBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CertificateSummary>)> {
    let request = body(payload, locale)?.into_request(owner);
    let record = state
        .issuer
        .issue(request)
        .await
        .map_err(|e| ApiError::from_error(e, locale))?;
    Ok((StatusCode::CREATED, Json(CertificateSummary::from(&record))))
}

/// `GET /certificates`
pub async fn list_certificates(
    State(state): State<AppState>,
    Caller(owner): Caller,
    locale: Locale,
) -> ApiResult<Json<Vec<CertificateSummary>>> {
    let records = state
        .vault
        .list(owner)
        .await
        .map_err(|e| ApiError::from_error(e, locale))?;
    Ok(Json(records.iter().map(CertificateSummary::from).collect()))
}

/// `POST /certificates/:id/activate`
pub async fn activate_certificate(
    State(state): State<AppState>,
    Caller(owner): Caller,
    locale: Locale,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CertificateSummary>> {
    let record = state
        .vault
        .activate(owner, id)
        .await
        .map_err(|e| ApiError::from_error(e, locale))?;
    Ok(Json(CertificateSummary::from(&record)))
}

/// `POST /certificates/:id/revoke`
pub async fn revoke_certificate(
    State(state): State<AppState>,
    Caller(owner): Caller,
    locale: Locale,
    Path(id): Path<Uuid>,
    raw: Bytes,
) -> ApiResult<Json<CertificateSummary>> {
    let request: RevokeBody = optional_body(&raw, locale)?;
    let record = state
        .vault
        .revoke(owner, id, request.reason)
        .await
        .map_err(|e| ApiError::from_error(e, locale))?;
    Ok(Json(CertificateSummary::from(&record)))
}

/// `POST /certificates/:id/validate-passphrase`
pub async fn validate_passphrase(
    State(state): State<AppState>,
    Caller(owner): Caller,
    locale: Locale,
    Path(id): Path<Uuid>,
    payload: std::result::Result<Json<PassphraseBody>, JsonRejection>,
) -> ApiResult<Json<PassphraseCheck>> {
    let request = body(payload, locale)?;
    let valid = state
        .vault
        .validate_passphrase(owner, id, &request.passphrase)
        .await
        .map_err(|e| ApiError::from_error(e, locale))?;
    Ok(Json(PassphraseCheck { valid }))
}

/// `POST /documents?title=..&accessCode=..` with the raw PDF as body.
pub async fn upload_document(
    State(state): State<AppState>,
    MaybeCaller(owner): MaybeCaller,
    locale: Locale,
    Query(params): Query<UploadParams>,
    pdf: Bytes,
) -> ApiResult<(StatusCode, Json<DocumentResponse>)> {
    if pdf.len() > MAX_UPLOAD_BYTES {
        return Err(ApiError::localized(ErrorCode::PayloadTooLarge, locale));
    }
    let access = match params.access_code.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => AccessGate::with_code(code),
        _ => AccessGate::default(),
    };
    let document = state
        .lifecycle
        .create_draft(owner, &params.title, pdf.to_vec(), access)
        .await
        .map_err(|e| ApiError::from_error(e, locale))?;
    Ok((StatusCode::CREATED, Json(DocumentResponse::from(&document))))
}

/// `POST /documents/:id/cancel`
pub async fn cancel_document(
    State(state): State<AppState>,
    Caller(owner): Caller,
    locale: Locale,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DocumentResponse>> {
    let document = state
        .lifecycle
        .cancel(owner, id)
        .await
        .map_err(|e| ApiError::from_error(e, locale))?;
    Ok(Json(DocumentResponse::from(&document)))
}

/// `POST /sign`
pub async fn sign_document(
    State(state): State<AppState>,
    MaybeCaller(caller): MaybeCaller,
    locale: Locale,
    payload: std::result::Result<Json<SignBody>, JsonRejection>,
) -> ApiResult<Json<SignedPdfResult>> {
    let request = body(payload, locale)?
        .into_request(caller)
        .map_err(|e| ApiError::from_error(e, locale))?;
    let result = state
        .pipeline
        .sign(request)
        .await
        .map_err(|e| ApiError::from_error(e, locale))?;
    Ok(Json(result))
}

/// `POST /sign/batch`
pub async fn sign_batch(
    State(state): State<AppState>,
    Caller(caller): Caller,
    locale: Locale,
    payload: std::result::Result<Json<BatchSignBody>, JsonRejection>,
) -> ApiResult<Json<BatchResult>> {
    let request = body(payload, locale)?;
    let input = request
        .signer_inputs
        .into_input()
        .map_err(|e| ApiError::from_error(e, locale))?;
    let result = state
        .batch
        .sign_batch(caller, &request.document_ids, input)
        .await
        .map_err(|e| ApiError::from_error(e, locale))?;
    Ok(Json(result))
}

/// `GET /validate/:id?code=..`
pub async fn validate_get(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    locale: Locale,
    Path(id): Path<Uuid>,
    Query(params): Query<AccessCodeParams>,
) -> ApiResult<Json<ValidationOutcome>> {
    let outcome = state
        .gateway
        .resolve(id, params.code.as_deref(), CodeSubmission::Query, &ip)
        .await
        .map_err(|e| ApiError::from_error(e, locale))?;
    Ok(Json(outcome))
}

/// `POST /validate/:id` with `{"code": ".."}` or `?code=..`
pub async fn validate_post(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    locale: Locale,
    Path(id): Path<Uuid>,
    Query(params): Query<AccessCodeParams>,
    raw: Bytes,
) -> ApiResult<Json<ValidationOutcome>> {
    let submitted: AccessCodeParams = optional_body(&raw, locale)?;
    let code = submitted.code.or(params.code);
    let outcome = state
        .gateway
        .resolve(id, code.as_deref(), CodeSubmission::Form, &ip)
        .await
        .map_err(|e| ApiError::from_error(e, locale))?;
    Ok(Json(outcome))
}

/// `GET /verify-signature/:id?code=..`
pub async fn verify_signature(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    locale: Locale,
    Path(id): Path<Uuid>,
    Query(params): Query<AccessCodeParams>,
) -> ApiResult<Json<VerificationResult>> {
    state
        .gateway
        .request_limiter()
        .check(&ip)
        .map_err(|e| ApiError::from_error(e, locale))?;
    let result = state
        .verification
        .verify_document(id, params.code.as_deref())
        .await
        .map_err(|e| ApiError::from_error(e, locale))?;
    Ok(Json(result))
}

/// `GET /files/*path` for signed PDFs and QR images.
pub async fn serve_file(
    State(state): State<AppState>,
    locale: Locale,
    Path(path): Path<String>,
) -> ApiResult<Response> {
    if !PUBLIC_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) {
        return Err(ApiError::localized(ErrorCode::NotFound, locale));
    }
    let bytes = state
        .storage
        .download(&path)
        .await
        .map_err(|e| ApiError::from_error(e, locale))?;
    let content_type = if path.ends_with(".png") {
        PNG_CONTENT_TYPE
    } else {
        PDF_CONTENT_TYPE
    };
    info!("serving {} ({} bytes)", path, bytes.len());
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

/// Sanitized document for owners.
pub async fn get_document(
    State(state): State<AppState>,
    Caller(owner): Caller,
    locale: Locale,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PublicDocument>> {
    let document = state
        .documents
        .get(id)
        .await
        .map_err(|e| ApiError::from_error(e, locale))?
        .filter(|d| d.owner_id == Some(owner))
        .ok_or_else(|| ApiError::from_error(Error::NotFound("Document"), locale))?;
    Ok(Json(document.to_public()))
}
