//! Persistence collaborators.
//!
//! The engine talks to two external systems: an object store for binaries
//! (original and signed PDFs, QR images, certificate containers) and a
//! relational store for metadata rows. Both are traits so deployments can
//! plug in their own backends; this crate ships an in-memory database, an
//! in-memory object store, a local filesystem object store, and a timeout
//! decorator for outbound storage calls.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::model::{CertificateRecord, Document, SignedUpdate, SigningEvent};

mod local_fs;
mod memory;
mod timeout;

pub use local_fs::LocalFsStorage;
pub use memory::{MemoryDatabase, MemoryObjectStorage};
pub use timeout::TimeoutStorage;

/// Content type for PDF uploads.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Content type for QR images.
pub const PNG_CONTENT_TYPE: &str = "image/png";

/// Content type for encrypted containers.
pub const BINARY_CONTENT_TYPE: &str = "application/octet-stream";

/// Object storage for binaries.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Fetch an object.
    async fn download(&self, path: &str) -> Result<Vec<u8>>;

    /// Store an object. Without `upsert`, an existing path is a conflict.
    /// Returns the stored path.
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str, upsert: bool)
        -> Result<String>;

    /// Public URL for a stored path.
    fn public_url(&self, path: &str) -> String;

    /// Remove objects. Missing paths are ignored.
    async fn remove(&self, paths: &[String]) -> Result<()>;
}

/// Certificate metadata rows.
#[async_trait]
pub trait CertificateRepository: Send + Sync {
    /// Insert `record` as active and deactivate every other certificate of
    /// the same owner in one atomic step.
    async fn insert_and_activate(&self, record: CertificateRecord) -> Result<CertificateRecord>;

    /// Fetch by id.
    async fn get(&self, id: Uuid) -> Result<Option<CertificateRecord>>;

    /// The owner's active certificate, if any.
    async fn active_for_owner(&self, owner_id: Uuid) -> Result<Option<CertificateRecord>>;

    /// Every certificate of the owner, newest first.
    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<CertificateRecord>>;

    /// Atomically make `id` the owner's only active certificate.
    async fn activate(&self, owner_id: Uuid, id: Uuid) -> Result<CertificateRecord>;

    /// Mark revoked and inactive. The row is kept.
    async fn revoke(
        &self,
        owner_id: Uuid,
        id: Uuid,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<CertificateRecord>;
}

/// Document rows.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Insert a new document.
    async fn insert(&self, document: Document) -> Result<Document>;

    /// Fetch by id.
    async fn get(&self, id: Uuid) -> Result<Option<Document>>;

    /// Conditional update `draft -> signed`.
    ///
    /// Fails with `AlreadySigned` when another call won the race, and with
    /// `Conflict` for canceled or expired documents.
    async fn mark_signed(&self, id: Uuid, update: SignedUpdate) -> Result<Document>;

    /// Move a draft or signed document to canceled.
    async fn cancel(&self, id: Uuid, at: DateTime<Utc>) -> Result<Document>;

    /// Expire drafts whose `expires_at` is at or before `now`.
    async fn expire_drafts(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>>;
}

/// Append-only signing events.
#[async_trait]
pub trait SigningEventRepository: Send + Sync {
    /// Append one event.
    async fn append(&self, event: SigningEvent) -> Result<()>;

    /// Events of a document, oldest first.
    async fn list_for_document(&self, document_id: Uuid) -> Result<Vec<SigningEvent>>;
}
