//! In-memory backends.
//!
//! Used by the tests and by single-process deployments. The database keeps
//! every table behind one lock so multi-row updates are atomic.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::trace;
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use super::{CertificateRepository, DocumentRepository, ObjectStorage, SigningEventRepository};
use crate::error::{Error, Result};
use crate::model::{CertificateRecord, Document, DocumentStatus, SignedUpdate, SigningEvent};

/// Object store kept in a `HashMap`.
pub struct MemoryObjectStorage {
    base_url: String,
    objects: RwLock<HashMap<String, (Vec<u8>, String)>>,
}

impl MemoryObjectStorage {
    /// Empty store whose public URLs start with `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Whether `path` is stored.
    pub fn contains(&self, path: &str) -> bool {
        self.objects.read().contains_key(path)
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Stored content type of `path`.
    pub fn content_type(&self, path: &str) -> Option<String> {
        self.objects.read().get(path).map(|(_, ct)| ct.clone())
    }

    /// Overwrite stored bytes directly, bypassing upload rules.
    pub fn put_raw(&self, path: &str, bytes: Vec<u8>) {
        self.objects
            .write()
            .insert(path.to_string(), (bytes, super::BINARY_CONTENT_TYPE.to_string()));
    }
}

impl Default for MemoryObjectStorage {
    fn default() -> Self {
        Self::new("memory://objects")
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        trace!("download {path}");
        self.objects
            .read()
            .get(path)
            .map(|(bytes, _)| bytes.clone())
            .ok_or(Error::NotFound("Object"))
    }

    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<String> {
        trace!("upload {path}, {} bytes", bytes.len());
        let mut objects = self.objects.write();
        if !upsert && objects.contains_key(path) {
            return Err(Error::Conflict(format!("object {} already exists", path)));
        }
        objects.insert(path.to_string(), (bytes, content_type.to_string()));
        Ok(path.to_string())
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn remove(&self, paths: &[String]) -> Result<()> {
        let mut objects = self.objects.write();
        for path in paths {
            objects.remove(path);
        }
        Ok(())
    }
}

#[derive(Default)]
struct Tables {
    certificates: HashMap<Uuid, CertificateRecord>,
    documents: HashMap<Uuid, Document>,
    events: Vec<SigningEvent>,
}

/// Relational store kept in memory.
#[derive(Default)]
pub struct MemoryDatabase {
    tables: Mutex<Tables>,
}

impl MemoryDatabase {
    /// Empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of certificate rows.
    pub fn certificate_count(&self) -> usize {
        self.tables.lock().certificates.len()
    }

    /// Number of signing events across all documents.
    pub fn event_count(&self) -> usize {
        self.tables.lock().events.len()
    }
}

fn owned_certificate<'a>(
    tables: &'a mut Tables,
    owner_id: Uuid,
    id: Uuid,
) -> Result<&'a mut CertificateRecord> {
    match tables.certificates.get_mut(&id) {
        Some(record) if record.owner_id == owner_id => Ok(record),
        _ => Err(Error::NotFound("Certificate")),
    }
}

#[async_trait]
impl CertificateRepository for MemoryDatabase {
    async fn insert_and_activate(
        &self,
        mut record: CertificateRecord,
    ) -> Result<CertificateRecord> {
        let mut tables = self.tables.lock();
        if tables.certificates.contains_key(&record.id) {
            return Err(Error::Persistence(format!("duplicate certificate id {}", record.id)));
        }
        for other in tables.certificates.values_mut() {
            if other.owner_id == record.owner_id {
                other.is_active = false;
            }
        }
        record.is_active = true;
        tables.certificates.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<Option<CertificateRecord>> {
        Ok(self.tables.lock().certificates.get(&id).cloned())
    }

    async fn active_for_owner(&self, owner_id: Uuid) -> Result<Option<CertificateRecord>> {
        Ok(self
            .tables
            .lock()
            .certificates
            .values()
            .find(|c| c.owner_id == owner_id && c.is_active)
            .cloned())
    }

    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<CertificateRecord>> {
        let mut out: Vec<CertificateRecord> = self
            .tables
            .lock()
            .certificates
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn activate(&self, owner_id: Uuid, id: Uuid) -> Result<CertificateRecord> {
        let mut tables = self.tables.lock();
        let target = owned_certificate(&mut tables, owner_id, id)?;
        if target.revoked_at.is_some() {
            return Err(Error::Conflict("revoked certificates cannot be activated".to_string()));
        }
        for other in tables.certificates.values_mut() {
            if other.owner_id == owner_id {
                other.is_active = other.id == id;
            }
        }
        tables
            .certificates
            .get(&id)
            .cloned()
            .ok_or(Error::NotFound("Certificate"))
    }

    async fn revoke(
        &self,
        owner_id: Uuid,
        id: Uuid,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<CertificateRecord> {
        let mut tables = self.tables.lock();
        let record = owned_certificate(&mut tables, owner_id, id)?;
        if record.revoked_at.is_some() {
            return Err(Error::Conflict("certificate is already revoked".to_string()));
        }
        record.is_active = false;
        record.revoked_at = Some(at);
        record.revocation_reason = reason;
        Ok(record.clone())
    }
}

#[async_trait]
impl DocumentRepository for MemoryDatabase {
    async fn insert(&self, document: Document) -> Result<Document> {
        let mut tables = self.tables.lock();
        if tables.documents.contains_key(&document.id) {
            return Err(Error::Persistence(format!("duplicate document id {}", document.id)));
        }
        tables.documents.insert(document.id, document.clone());
        Ok(document)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Document>> {
        Ok(self.tables.lock().documents.get(&id).cloned())
    }

    async fn mark_signed(&self, id: Uuid, update: SignedUpdate) -> Result<Document> {
        let mut tables = self.tables.lock();
        let document = tables.documents.get_mut(&id).ok_or(Error::NotFound("Document"))?;
        match document.status {
            DocumentStatus::Draft => {},
            DocumentStatus::Signed => return Err(Error::AlreadySigned(id)),
            other => {
                return Err(Error::Conflict(format!("document is {:?}", other).to_lowercase()))
            },
        }
        document.status = DocumentStatus::Signed;
        document.signed_path = Some(update.signed_path);
        document.signed_pdf_url = Some(update.signed_pdf_url);
        document.content_hash = Some(update.content_hash);
        document.signed_file_hash = Some(update.signed_file_hash);
        document.has_pki_signature = update.has_pki_signature;
        document.metadata.placements = update.metadata.placements;
        document.metadata.qr = update.metadata.qr;
        document.signed_at = Some(update.signed_at);
        document.expires_at = None;
        Ok(document.clone())
    }

    async fn cancel(&self, id: Uuid, at: DateTime<Utc>) -> Result<Document> {
        let mut tables = self.tables.lock();
        let document = tables.documents.get_mut(&id).ok_or(Error::NotFound("Document"))?;
        if !document.status.can_transition_to(DocumentStatus::Canceled) {
            return Err(Error::Conflict(
                format!("document is {:?}", document.status).to_lowercase(),
            ));
        }
        document.status = DocumentStatus::Canceled;
        document.canceled_at = Some(at);
        Ok(document.clone())
    }

    async fn expire_drafts(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>> {
        let mut tables = self.tables.lock();
        let mut expired = Vec::new();
        for document in tables.documents.values_mut() {
            if document.is_stale_draft(now) {
                document.status = DocumentStatus::Expired;
                expired.push(document.id);
            }
        }
        Ok(expired)
    }
}

#[async_trait]
impl SigningEventRepository for MemoryDatabase {
    async fn append(&self, event: SigningEvent) -> Result<()> {
        self.tables.lock().events.push(event);
        Ok(())
    }

    async fn list_for_document(&self, document_id: Uuid) -> Result<Vec<SigningEvent>> {
        let mut events: Vec<SigningEvent> = self
            .tables
            .lock()
            .events
            .iter()
            .filter(|e| e.document_id == document_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.signed_at);
        Ok(events)
    }
}
