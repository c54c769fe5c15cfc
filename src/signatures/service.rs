//! Verification of stored signed documents.

use std::sync::Arc;

use uuid::Uuid;

use super::types::VerificationResult;
use super::verifier::SignatureVerifier;
use crate::error::{Error, Result};
use crate::model::DocumentStatus;
use crate::store::{DocumentRepository, ObjectStorage};

/// Verifies stored signed documents.
pub struct VerificationService {
    documents: Arc<dyn DocumentRepository>,
    storage: Arc<dyn ObjectStorage>,
    verifier: SignatureVerifier,
}

impl VerificationService {
    /// Create a service over the given stores.
    pub fn new(documents: Arc<dyn DocumentRepository>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self {
            documents,
            storage,
            verifier: SignatureVerifier::new(),
        }
    }

    /// Load the stored signed file of `document_id` and verify it against the
    /// hash recorded for those exact bytes.
    ///
    /// Code-gated documents require the access code. Unknown ids, drafts and
    /// a wrong code are indistinguishable to the caller.
    pub async fn verify_document(
        &self,
        document_id: Uuid,
        access_code: Option<&str>,
    ) -> Result<VerificationResult> {
        let document = self
            .documents
            .get(document_id)
            .await?
            .ok_or(Error::NotFound("Document"))?;

        if !matches!(document.status, DocumentStatus::Signed | DocumentStatus::Canceled) {
            return Err(Error::NotFound("Document"));
        }
        if !document.metadata.access.accepts(access_code) {
            return Err(Error::Forbidden("access code required".to_string()));
        }
        let path = document.signed_path.as_deref().ok_or(Error::NotFound("Document"))?;
        let bytes = self.storage.download(path).await?;

        let mut result = self.verifier.verify(&bytes, document.signed_file_hash.as_deref());
        if document.status == DocumentStatus::Canceled {
            result.messages.push("document was canceled by its owner".to_string());
        }
        log::info!(
            "verified document {}: {:?}, hash match {:?}",
            document_id,
            result.classification,
            result.hash_match
        );
        Ok(result)
    }

    /// Verify caller-supplied bytes.
    pub fn verify_bytes(&self, bytes: &[u8], expected_hash: Option<&str>) -> VerificationResult {
        self.verifier.verify(bytes, expected_hash)
    }
}
