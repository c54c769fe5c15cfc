//! HTTP surface.
//!
//! Thin axum handlers over the engine services. Caller identity comes from
//! the upstream auth layer in `x-user-id`; every failure is rendered as an
//! [`ApiError`] with a stable code and a localized message.
//!
//! ```ignore
//! use std::sync::Arc;
//! use pdf_seal::api::{router, AppState};
//! use pdf_seal::config::SealConfig;
//! use pdf_seal::store::{MemoryDatabase, MemoryObjectStorage};
//!
//! let state = AppState::with_database(
//!     SealConfig::new().with_master_key("0123456789abcdef0123456789abcdef")?,
//!     Arc::new(MemoryObjectStorage::default()),
//!     Arc::new(MemoryDatabase::new()),
//! );
//! let app = router(state);
//! ```

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::certificates::{CertificateIssuer, CertificateVault};
use crate::config::SealConfig;
use crate::signatures::VerificationService;
use crate::signing::{
    BatchSigningCoordinator, DocumentLifecycle, PdfSigningPipeline, MAX_UPLOAD_BYTES,
};
use crate::store::{
    CertificateRepository, DocumentRepository, ObjectStorage, SigningEventRepository,
};
use crate::validation::ValidationGateway;

mod error;
mod extract;
mod handlers;
mod types;

pub use error::{ApiError, ErrorCode, ErrorDetails, Locale};
pub use extract::{
    resolve_client_ip, Caller, ClientIp, MaybeCaller, FORWARDED_FOR_HEADER, USER_ID_HEADER,
};
pub use types::*;

/// JSON bodies carry base64 images, so the limit is a bit above the upload cap.
const BODY_LIMIT: usize = MAX_UPLOAD_BYTES + 4 * 1024 * 1024;

/// Services shared by every handler.
#[derive(Clone)]
pub struct AppState {
    /// Engine configuration
    pub config: Arc<SealConfig>,
    /// Object storage
    pub storage: Arc<dyn ObjectStorage>,
    /// Document rows
    pub documents: Arc<dyn DocumentRepository>,
    /// Certificate issuance
    pub issuer: Arc<CertificateIssuer>,
    /// Certificate access and rotation
    pub vault: Arc<CertificateVault>,
    /// Single-document signing
    pub pipeline: Arc<PdfSigningPipeline>,
    /// Batch signing
    pub batch: Arc<BatchSigningCoordinator>,
    /// Upload, cancel, expire
    pub lifecycle: Arc<DocumentLifecycle>,
    /// Public validation lookups
    pub gateway: Arc<ValidationGateway>,
    /// Signature verification
    pub verification: Arc<VerificationService>,
}

impl AppState {
    /// Wire the services over the given stores.
    pub fn new(
        config: SealConfig,
        storage: Arc<dyn ObjectStorage>,
        certificates: Arc<dyn CertificateRepository>,
        documents: Arc<dyn DocumentRepository>,
        events: Arc<dyn SigningEventRepository>,
    ) -> Self {
        let config = Arc::new(config);
        let issuer = Arc::new(CertificateIssuer::new(
            config.clone(),
            storage.clone(),
            certificates.clone(),
        ));
        let vault = Arc::new(CertificateVault::new(config.clone(), storage.clone(), certificates));
        let pipeline = Arc::new(PdfSigningPipeline::new(
            config.clone(),
            storage.clone(),
            documents.clone(),
            events.clone(),
            vault.clone(),
        ));
        let batch = Arc::new(BatchSigningCoordinator::new(pipeline.clone(), documents.clone()));
        let lifecycle = Arc::new(DocumentLifecycle::new(
            config.clone(),
            storage.clone(),
            documents.clone(),
        ));
        let gateway = Arc::new(ValidationGateway::new(&config, documents.clone(), events));
        let verification = Arc::new(VerificationService::new(documents.clone(), storage.clone()));

        Self {
            config,
            storage,
            documents,
            issuer,
            vault,
            pipeline,
            batch,
            lifecycle,
            gateway,
            verification,
        }
    }

    /// Wire the services over one database implementing every repository.
    pub fn with_database<D>(
        config: SealConfig,
        storage: Arc<dyn ObjectStorage>,
        database: Arc<D>,
    ) -> Self
    where
        D: CertificateRepository + DocumentRepository + SigningEventRepository + 'static,
    {
        Self::new(config, storage, database.clone(), database.clone(), database)
    }
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/certificates",
            post(handlers::issue_certificate).get(handlers::list_certificates),
        )
        .route("/certificates/:id/activate", post(handlers::activate_certificate))
        .route("/certificates/:id/revoke", post(handlers::revoke_certificate))
        .route(
            "/certificates/:id/validate-passphrase",
            post(handlers::validate_passphrase),
        )
        .route("/documents", post(handlers::upload_document))
        .route("/documents/:id", get(handlers::get_document))
        .route("/documents/:id/cancel", post(handlers::cancel_document))
        .route("/sign", post(handlers::sign_document))
        .route("/sign/batch", post(handlers::sign_batch))
        .route(
            "/validate/:id",
            get(handlers::validate_get).post(handlers::validate_post),
        )
        .route("/verify-signature/:id", get(handlers::verify_signature))
        .route("/files/*path", get(handlers::serve_file))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(state)
}
