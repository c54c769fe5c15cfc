//! Document lifecycle outside of signing: upload, cancel, expire.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{info, warn};
use uuid::Uuid;

use crate::config::SealConfig;
use crate::error::{Error, Result};
use crate::model::{AccessGate, Document};
use crate::store::{DocumentRepository, ObjectStorage, PDF_CONTENT_TYPE};

/// Largest accepted upload.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Creates, cancels and expires documents.
pub struct DocumentLifecycle {
    config: Arc<SealConfig>,
    storage: Arc<dyn ObjectStorage>,
    documents: Arc<dyn DocumentRepository>,
}

impl DocumentLifecycle {
    /// Create a lifecycle service.
    pub fn new(
        config: Arc<SealConfig>,
        storage: Arc<dyn ObjectStorage>,
        documents: Arc<dyn DocumentRepository>,
    ) -> Self {
        Self {
            config,
            storage,
            documents,
        }
    }

    /// Store an original PDF and create its draft.
    pub async fn create_draft(
        &self,
        owner_id: Option<Uuid>,
        title: &str,
        pdf: Vec<u8>,
        access: AccessGate,
    ) -> Result<Document> {
        if pdf.is_empty() || pdf.len() > MAX_UPLOAD_BYTES {
            return Err(Error::Validation("upload must be a PDF of at most 50 MiB".to_string()));
        }
        if !pdf.starts_with(b"%PDF-") {
            return Err(Error::InvalidPdf("missing %PDF- header".to_string()));
        }
        let code_missing = access
            .access_code
            .as_deref()
            .map_or(true, |c| c.trim().is_empty());
        if access.requires_access_code && code_missing {
            return Err(Error::Validation(
                "access code is required when the gate is enabled".to_string(),
            ));
        }
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::Validation("title is required".to_string()));
        }

        let mut document =
            Document::new_draft(owner_id, title, String::new(), Utc::now(), self.config.draft_ttl);
        document.original_path = format!("originals/{}.pdf", document.id);
        document.metadata.access = access;

        self.storage
            .upload(&document.original_path, pdf, PDF_CONTENT_TYPE, false)
            .await?;
        match self.documents.insert(document.clone()).await {
            Ok(document) => {
                info!("created draft {} ({})", document.id, document.title);
                Ok(document)
            },
            Err(e) => {
                if let Err(cleanup) = self.storage.remove(&[document.original_path.clone()]).await {
                    warn!("orphaned upload {}: {}", document.original_path, cleanup);
                }
                Err(e)
            },
        }
    }

    /// Cancel a draft or signed document owned by `owner_id`.
    pub async fn cancel(&self, owner_id: Uuid, document_id: Uuid) -> Result<Document> {
        self.documents
            .get(document_id)
            .await?
            .filter(|d| d.owner_id == Some(owner_id))
            .ok_or(Error::NotFound("Document"))?;
        let document = self.documents.cancel(document_id, Utc::now()).await?;
        info!("document {} canceled by {}", document_id, owner_id);
        Ok(document)
    }

    /// Move drafts past their expiry to `expired`.
    pub async fn expire_stale_drafts(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>> {
        let expired = self.documents.expire_drafts(now).await?;
        if !expired.is_empty() {
            info!("expired {} stale drafts", expired.len());
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DocumentStatus;
    use crate::store::{MemoryDatabase, MemoryObjectStorage};

    fn lifecycle() -> (DocumentLifecycle, Arc<MemoryObjectStorage>) {
        let storage = Arc::new(MemoryObjectStorage::default());
        let db = Arc::new(MemoryDatabase::new());
        (
            DocumentLifecycle::new(Arc::new(SealConfig::new()), storage.clone(), db),
            storage,
        )
    }

    #[tokio::test]
    async fn test_create_draft_stores_original() {
        let (lifecycle, storage) = lifecycle();
        let owner = Uuid::new_v4();
        let doc = lifecycle
            .create_draft(Some(owner), "Contract", b"%PDF-1.7\n".to_vec(), AccessGate::default())
            .await
            .unwrap();
        assert_eq!(doc.status, DocumentStatus::Draft);
        assert!(storage.contains(&doc.original_path));
        assert!(doc.expires_at.is_some());
    }

    #[tokio::test]
    async fn test_rejects_non_pdf_and_empty_gate() {
        let (lifecycle, storage) = lifecycle();
        assert!(lifecycle
            .create_draft(None, "x", b"hello".to_vec(), AccessGate::default())
            .await
            .is_err());
        let gate = AccessGate {
            requires_access_code: true,
            access_code: None,
        };
        assert!(lifecycle
            .create_draft(None, "x", b"%PDF-1.7".to_vec(), gate)
            .await
            .is_err());
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_requires_owner() {
        let (lifecycle, _) = lifecycle();
        let owner = Uuid::new_v4();
        let doc = lifecycle
            .create_draft(Some(owner), "Contract", b"%PDF-1.7\n".to_vec(), AccessGate::default())
            .await
            .unwrap();

        assert!(matches!(
            lifecycle.cancel(Uuid::new_v4(), doc.id).await,
            Err(Error::NotFound(_))
        ));
        let canceled = lifecycle.cancel(owner, doc.id).await.unwrap();
        assert_eq!(canceled.status, DocumentStatus::Canceled);
        assert!(canceled.canceled_at.is_some());
        assert!(matches!(lifecycle.cancel(owner, doc.id).await, Err(Error::Conflict(_))));
    }

    #[tokio::test]
    async fn test_expire_stale_drafts() {
        let (lifecycle, _) = lifecycle();
        let doc = lifecycle
            .create_draft(None, "Old", b"%PDF-1.7\n".to_vec(), AccessGate::default())
            .await
            .unwrap();
        let later = Utc::now() + chrono::Duration::days(8);
        assert_eq!(lifecycle.expire_stale_drafts(later).await.unwrap(), vec![doc.id]);
        assert!(lifecycle.expire_stale_drafts(later).await.unwrap().is_empty());
    }
}
