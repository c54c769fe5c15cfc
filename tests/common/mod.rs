//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream};
use parking_lot::Mutex;
use uuid::Uuid;

use pdf_seal::certificates::{CertificateIssuer, CertificateVault, IssueRequest};
use pdf_seal::config::SealConfig;
use pdf_seal::model::{AccessGate, CertificateType, SubjectAttributes};
use pdf_seal::signatures::VerificationService;
use pdf_seal::signing::{BatchSigningCoordinator, DocumentLifecycle, PdfSigningPipeline};
use pdf_seal::store::{MemoryDatabase, MemoryObjectStorage, ObjectStorage};
use pdf_seal::{Error, Result};

pub const MASTER_KEY: &str = "test-master-key-0123456789abcdef0123";
pub const PASSPHRASE: &str = "correct horse battery";

/// A PDF with `pages` A4 pages, each drawing one rectangle.
pub fn sample_pdf(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::new();
    for i in 0..pages {
        let content = Content {
            operations: vec![
                Operation::new(
                    "re",
                    vec![
                        Object::Integer(50 + i as i64),
                        Object::Integer(50),
                        Object::Integer(200),
                        Object::Integer(100),
                    ],
                ),
                Operation::new("S", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(pages_id));
        page.set("Contents", Object::Reference(content_id));
        kids.push(Object::Reference(doc.add_object(page)));
    }
    let mut pages_dict = Dictionary::new();
    pages_dict.set("Type", Object::Name(b"Pages".to_vec()));
    pages_dict.set("Count", Object::Integer(pages as i64));
    pages_dict.set("Kids", Object::Array(kids));
    pages_dict.set(
        "MediaBox",
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(595),
            Object::Integer(842),
        ]),
    );
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));
    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// Memory storage whose downloads fail for chosen paths.
pub struct FlakyStorage {
    inner: MemoryObjectStorage,
    failing: Mutex<HashSet<String>>,
}

impl FlakyStorage {
    pub fn new() -> Self {
        Self {
            inner: MemoryObjectStorage::default(),
            failing: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail_downloads_of(&self, path: &str) {
        self.failing.lock().insert(path.to_string());
    }

    pub fn inner(&self) -> &MemoryObjectStorage {
        &self.inner
    }
}

#[async_trait]
impl ObjectStorage for FlakyStorage {
    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        if self.failing.lock().contains(path) {
            return Err(Error::Storage("connection reset by peer".to_string()));
        }
        self.inner.download(path).await
    }

    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<String> {
        self.inner.upload(path, bytes, content_type, upsert).await
    }

    fn public_url(&self, path: &str) -> String {
        self.inner.public_url(path)
    }

    async fn remove(&self, paths: &[String]) -> Result<()> {
        self.inner.remove(paths).await
    }
}

/// Every engine service over in-memory stores.
pub struct Harness {
    pub config: Arc<SealConfig>,
    pub storage: Arc<FlakyStorage>,
    pub db: Arc<MemoryDatabase>,
    pub issuer: CertificateIssuer,
    pub vault: Arc<CertificateVault>,
    pub pipeline: Arc<PdfSigningPipeline>,
    pub batch: BatchSigningCoordinator,
    pub lifecycle: DocumentLifecycle,
    pub verification: VerificationService,
}

impl Harness {
    pub fn new() -> Self {
        let config = Arc::new(
            SealConfig::new()
                .with_master_key(MASTER_KEY)
                .unwrap()
                .with_base_url("https://seal.example.com"),
        );
        let storage = Arc::new(FlakyStorage::new());
        let db = Arc::new(MemoryDatabase::new());
        let issuer = CertificateIssuer::new(config.clone(), storage.clone(), db.clone());
        let vault = Arc::new(CertificateVault::new(config.clone(), storage.clone(), db.clone()));
        let pipeline = Arc::new(PdfSigningPipeline::new(
            config.clone(),
            storage.clone(),
            db.clone(),
            db.clone(),
            vault.clone(),
        ));
        let batch = BatchSigningCoordinator::new(pipeline.clone(), db.clone());
        let lifecycle = DocumentLifecycle::new(config.clone(), storage.clone(), db.clone());
        let verification = VerificationService::new(db.clone(), storage.clone());
        Self {
            config,
            storage,
            db,
            issuer,
            vault,
            pipeline,
            batch,
            lifecycle,
            verification,
        }
    }

    /// Upload a draft of `pages` pages.
    pub async fn draft(&self, owner: Option<Uuid>, pages: usize) -> Uuid {
        self.draft_with_gate(owner, pages, AccessGate::default()).await
    }

    pub async fn draft_with_gate(
        &self,
        owner: Option<Uuid>,
        pages: usize,
        gate: AccessGate,
    ) -> Uuid {
        self.lifecycle
            .create_draft(owner, "Service agreement", sample_pdf(pages), gate)
            .await
            .unwrap()
            .id
    }
}

/// A 2048-bit personal certificate request.
pub fn issue_request(owner: Uuid, validity_years: u32) -> IssueRequest {
    let mut subject = SubjectAttributes::new("Ana Souza");
    subject.email = Some("ana@example.com".to_string());
    subject.country = Some("BR".to_string());
    IssueRequest {
        owner_id: owner,
        cert_type: CertificateType::Personal,
        name: None,
        subject,
        key_strength: 2048,
        validity_years,
        passphrase: PASSPHRASE.to_string(),
    }
}
