//! Domain records shared by the engine components.

mod certificate;
mod document;
mod request;

pub use certificate::{
    CertificateRecord, CertificateSummary, CertificateType, KeyStrength, SubjectAttributes,
};
pub use document::{
    AccessGate, Document, DocumentMetadata, DocumentStatus, PublicDocument, SignedUpdate,
    SigningEvent,
};
pub use request::{
    CertificateSelection, Placement, QrConfig, QrPages, QrPosition, SignedPdfResult, SignerInfo,
    SigningRequest,
};
