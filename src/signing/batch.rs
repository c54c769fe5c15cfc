//! Batch signing with settle-all semantics.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::pipeline::PdfSigningPipeline;
use crate::error::{BatchOffender, Error, OffenseReason, Result};
use crate::model::{
    CertificateSelection, DocumentStatus, Placement, QrConfig, SignedPdfResult, SignerInfo,
    SigningRequest,
};
use crate::store::DocumentRepository;

/// Most documents signed by one batch.
pub const MAX_BATCH_SIZE: usize = 20;

/// Most ids inspected during pre-flight. Larger requests are rejected unread.
pub const MAX_PREFLIGHT_IDS: usize = 100;

/// Signer inputs shared by every document of a batch.
#[derive(Debug, Clone, Default)]
pub struct BatchSignerInput {
    /// Signer identity
    pub signer: SignerInfo,
    /// Placements applied to every document
    pub placements: Vec<Placement>,
    /// QR settings
    pub qr: QrConfig,
    /// Optional PKI certificate
    pub certificate: Option<CertificateSelection>,
}

/// Why one document of a batch failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemError {
    /// Stable error code
    pub code: String,
    /// Caller-safe message
    pub message: String,
    /// Whether retrying this document may succeed
    pub retryable: bool,
}

impl From<&Error> for BatchItemError {
    fn from(err: &Error) -> Self {
        let message = if err.is_client_error() {
            err.to_string()
        } else {
            "document could not be signed".to_string()
        };
        Self {
            code: err.code().to_string(),
            message,
            retryable: err.is_retryable(),
        }
    }
}

/// Outcome for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemResult {
    /// Document id
    pub document_id: Uuid,
    /// Whether signing succeeded
    pub success: bool,
    /// Signing output on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<SignedPdfResult>,
    /// Failure detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<BatchItemError>,
}

/// Aggregate batch outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    /// Documents attempted
    pub total: usize,
    /// Documents signed
    pub successful: usize,
    /// Documents that failed
    pub failed: usize,
    /// Per-document outcomes, in request order
    pub results: Vec<BatchItemResult>,
}

impl BatchResult {
    /// Ids of failed documents.
    pub fn failed_ids(&self) -> Vec<Uuid> {
        self.results
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.document_id)
            .collect()
    }
}

/// Runs the signing pipeline over many documents at once.
pub struct BatchSigningCoordinator {
    pipeline: Arc<PdfSigningPipeline>,
    documents: Arc<dyn DocumentRepository>,
}

impl BatchSigningCoordinator {
    /// Create a coordinator.
    pub fn new(pipeline: Arc<PdfSigningPipeline>, documents: Arc<dyn DocumentRepository>) -> Self {
        Self { pipeline, documents }
    }

    /// Check every id before any work starts.
    ///
    /// Any offender rejects the whole batch; nothing has been written yet.
    pub async fn preflight(&self, caller: Uuid, document_ids: &[Uuid]) -> Result<()> {
        if document_ids.is_empty() {
            return Err(Error::Validation("batch holds no documents".to_string()));
        }
        if document_ids.len() > MAX_PREFLIGHT_IDS {
            return Err(Error::Validation(format!(
                "batch holds {} documents, at most {} are inspected",
                document_ids.len(),
                MAX_PREFLIGHT_IDS
            )));
        }

        let mut seen = HashSet::new();
        let mut offenders = Vec::new();
        for id in document_ids {
            if !seen.insert(*id) {
                offenders.push(BatchOffender {
                    document_id: *id,
                    reason: OffenseReason::Duplicate,
                });
                continue;
            }
            let reason = match self.documents.get(*id).await? {
                Some(doc) if doc.owner_id != Some(caller) => Some(OffenseReason::NotFound),
                None => Some(OffenseReason::NotFound),
                Some(doc) => match doc.status {
                    DocumentStatus::Signed => Some(OffenseReason::AlreadySigned),
                    DocumentStatus::Canceled | DocumentStatus::Expired => {
                        Some(OffenseReason::NotSignable)
                    },
                    DocumentStatus::Draft if doc.is_stale_draft(chrono::Utc::now()) => {
                        Some(OffenseReason::NotSignable)
                    },
                    DocumentStatus::Draft => None,
                },
            };
            if let Some(reason) = reason {
                offenders.push(BatchOffender {
                    document_id: *id,
                    reason,
                });
            }
        }

        if !offenders.is_empty() {
            return Err(Error::BatchRejected {
                reason: format!("{} document(s) cannot be signed", offenders.len()),
                offenders,
            });
        }
        if document_ids.len() > MAX_BATCH_SIZE {
            return Err(Error::BatchRejected {
                reason: format!(
                    "batch holds {} documents, the limit is {}",
                    document_ids.len(),
                    MAX_BATCH_SIZE
                ),
                offenders: Vec::new(),
            });
        }
        Ok(())
    }

    /// Sign every document concurrently. One failure never cancels the others.
    pub async fn sign_batch(
        &self,
        caller: Uuid,
        document_ids: &[Uuid],
        input: BatchSignerInput,
    ) -> Result<BatchResult> {
        self.preflight(caller, document_ids).await?;

        let tasks = document_ids.iter().map(|id| {
            let pipeline = Arc::clone(&self.pipeline);
            let request = SigningRequest {
                document_id: *id,
                caller: Some(caller),
                placements: input.placements.clone(),
                signer: input.signer.clone(),
                qr: input.qr.clone(),
                certificate: input.certificate.clone(),
            };
            tokio::spawn(async move { pipeline.sign(request).await })
        });
        let settled = join_all(tasks).await;

        let results: Vec<BatchItemResult> = document_ids
            .iter()
            .zip(settled)
            .map(|(id, joined)| {
                let outcome = joined.unwrap_or_else(|e| {
                    Err(Error::Crypto(format!("signing task aborted: {}", e)))
                });
                match outcome {
                    Ok(result) => BatchItemResult {
                        document_id: *id,
                        success: true,
                        result: Some(result),
                        error: None,
                    },
                    Err(e) => {
                        warn!("batch item {} failed: {}", id, e);
                        BatchItemResult {
                            document_id: *id,
                            success: false,
                            result: None,
                            error: Some(BatchItemError::from(&e)),
                        }
                    },
                }
            })
            .collect();

        let successful = results.iter().filter(|r| r.success).count();
        let summary = BatchResult {
            total: results.len(),
            successful,
            failed: results.len() - successful,
            results,
        };
        info!(
            "batch for {} finished: {}/{} signed",
            caller, summary.successful, summary.total
        );
        Ok(summary)
    }
}
