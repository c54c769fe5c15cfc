//! Single-document signing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::certificates::CertificateVault;
use crate::config::SealConfig;
use crate::error::{Error, Result};
use crate::model::{
    CertificateRecord, CertificateSelection, Document, DocumentMetadata, DocumentStatus, Placement,
    QrConfig, QrPosition, SignedPdfResult, SignedUpdate, SignerInfo, SigningEvent, SigningRequest,
};
use crate::pdf::{
    ImageData, ImagePlacement, QrCodeOptions, QrRenderer, SealEditor, VALIDATION_URL_INFO_KEY,
};
use crate::signatures::{PdfSigner, SignOptions};
use crate::store::{
    DocumentRepository, ObjectStorage, SigningEventRepository, PDF_CONTENT_TYPE, PNG_CONTENT_TYPE,
};

/// Distance of the QR mark from the page edges, in points.
const QR_MARGIN: f32 = 24.0;

/// Caption font size under the QR mark.
const CAPTION_SIZE: f32 = 6.0;

/// Output of the visual stage.
struct VisualSeal {
    pdf: Vec<u8>,
    qr_png: Option<Vec<u8>>,
}

/// Certificate used for an embedded signature.
struct PkiOutcome {
    pdf: Vec<u8>,
    record: CertificateRecord,
}

/// Signs one document: visual overlays, QR mark, canonical hash, optional
/// PKI embedding, persistence and the signing event.
pub struct PdfSigningPipeline {
    config: Arc<SealConfig>,
    storage: Arc<dyn ObjectStorage>,
    documents: Arc<dyn DocumentRepository>,
    events: Arc<dyn SigningEventRepository>,
    vault: Arc<CertificateVault>,
}

impl PdfSigningPipeline {
    /// Create a pipeline over the given collaborators.
    pub fn new(
        config: Arc<SealConfig>,
        storage: Arc<dyn ObjectStorage>,
        documents: Arc<dyn DocumentRepository>,
        events: Arc<dyn SigningEventRepository>,
        vault: Arc<CertificateVault>,
    ) -> Self {
        Self {
            config,
            storage,
            documents,
            events,
            vault,
        }
    }

    /// Load a document the caller may sign.
    ///
    /// Unknown and foreign ids both read as `NotFound`.
    pub async fn signable_document(
        &self,
        document_id: Uuid,
        caller: Option<Uuid>,
    ) -> Result<Document> {
        let document = self
            .documents
            .get(document_id)
            .await?
            .filter(|d| d.is_accessible_by(caller))
            .ok_or(Error::NotFound("Document"))?;

        match document.status {
            DocumentStatus::Draft if document.is_stale_draft(Utc::now()) => {
                Err(Error::Conflict("document draft has expired".to_string()))
            },
            DocumentStatus::Draft => Ok(document),
            DocumentStatus::Signed => Err(Error::AlreadySigned(document_id)),
            DocumentStatus::Canceled => Err(Error::Conflict("document is canceled".to_string())),
            DocumentStatus::Expired => Err(Error::Conflict("document is expired".to_string())),
        }
    }

    /// Sign the document named by `request`.
    ///
    /// A failed PKI embedding does not fail the call: the visually sealed
    /// document is stored and the problem is reported in `warnings`.
    pub async fn sign(&self, request: SigningRequest) -> Result<SignedPdfResult> {
        request.validate()?;
        let document = self.signable_document(request.document_id, request.caller).await?;
        let document_id = document.id;
        let source = self.storage.download(&document.original_path).await?;

        let signed_at = Utc::now();
        let validation_url = self.config.validation_url(&document_id);
        let visual = {
            let placements = request.placements.clone();
            let signer = request.signer.clone();
            let qr = request.qr.clone();
            let url = validation_url.clone();
            tokio::task::spawn_blocking(move || {
                apply_visual_seal(&source, &placements, &signer, &qr, &url, signed_at)
            })
            .await
            .map_err(|e| Error::InvalidPdf(format!("overlay task failed: {}", e)))??
        };

        let content_hash = sha256_hex(&visual.pdf);
        debug!("document {} canonical hash {}", document_id, content_hash);

        let mut warnings = Vec::new();
        let pki = match &request.certificate {
            Some(selection) => {
                match self.embed_pki(&request, selection, visual.pdf.clone()).await {
                    Ok(outcome) => Some(outcome),
                    Err(e) => {
                        warn!("PKI embedding skipped for document {}: {}", document_id, e);
                        warnings.push(pki_warning(&e));
                        None
                    },
                }
            },
            None => None,
        };

        let (final_pdf, certificate) = match pki {
            Some(outcome) => (outcome.pdf, Some(outcome.record)),
            None => (visual.pdf, None),
        };
        let has_pki_signature = certificate.is_some();
        let signed_file_hash = sha256_hex(&final_pdf);

        let attempt = Uuid::new_v4();
        let signed_path = format!("signed/{}/{}.pdf", document_id, attempt);
        let mut uploaded = Vec::new();
        self.storage
            .upload(&signed_path, final_pdf, PDF_CONTENT_TYPE, false)
            .await?;
        uploaded.push(signed_path.clone());

        if let Some(png) = visual.qr_png {
            let qr_path = format!("qr/{}/{}.png", document_id, attempt);
            match self.storage.upload(&qr_path, png, PNG_CONTENT_TYPE, false).await {
                Ok(_) => uploaded.push(qr_path),
                Err(e) => {
                    self.compensate(&uploaded).await;
                    return Err(e);
                },
            }
        }

        let signed_url = self.storage.public_url(&signed_path);
        let update = SignedUpdate {
            signed_path,
            signed_pdf_url: signed_url.clone(),
            content_hash: content_hash.clone(),
            signed_file_hash,
            has_pki_signature,
            metadata: DocumentMetadata {
                placements: request.placements.clone(),
                qr: request.qr.clone(),
                access: document.metadata.access.clone(),
            },
            signed_at,
        };
        if let Err(e) = self.documents.mark_signed(document_id, update).await {
            self.compensate(&uploaded).await;
            return Err(e);
        }

        let event = SigningEvent {
            id: Uuid::new_v4(),
            document_id,
            signer_name: request.signer.name.clone(),
            signer_registration: request.signer.registration.clone(),
            signer_email: request.signer.email.clone(),
            certificate_type: certificate.as_ref().map(|c| c.cert_type.as_str().to_string()),
            certificate_issuer: certificate.as_ref().map(|c| c.issuer.clone()),
            certificate_serial: certificate.as_ref().map(|c| c.serial_number.clone()),
            has_pki_signature,
            signed_at,
        };
        if let Err(e) = self.events.append(event).await {
            error!("document {} signed but its signing event was not recorded: {}", document_id, e);
            warnings.push("signing event could not be recorded".to_string());
        }

        info!(
            "signed document {} (pki: {}, placements: {})",
            document_id,
            has_pki_signature,
            request.placements.len()
        );
        Ok(SignedPdfResult {
            document_id,
            hash: content_hash,
            signed_url,
            validation_url,
            has_pki_signature,
            warnings,
        })
    }

    async fn embed_pki(
        &self,
        request: &SigningRequest,
        selection: &CertificateSelection,
        pdf: Vec<u8>,
    ) -> Result<PkiOutcome> {
        let owner = request.caller.ok_or_else(|| {
            Error::Validation("certificate signing requires a signed-in caller".to_string())
        })?;
        let Some((record, credentials)) = self.vault.credentials_for(owner, selection).await? else {
            return Err(Error::Validation("no active certificate".to_string()));
        };

        let mut options = SignOptions::default().with_name(request.signer.name.clone());
        if let Some(reason) = &request.signer.reason {
            options = options.with_reason(reason.clone());
        }
        if let Some(location) = &request.signer.location {
            options = options.with_location(location.clone());
        }
        if let Some(email) = &request.signer.email {
            options = options.with_contact_info(email.clone());
        }

        let signed =
            tokio::task::spawn_blocking(move || PdfSigner::new(credentials, options).sign_pdf(&pdf))
                .await
                .map_err(|e| Error::Crypto(format!("signing task failed: {}", e)))??;
        Ok(PkiOutcome { pdf: signed, record })
    }

    async fn compensate(&self, paths: &[String]) {
        if paths.is_empty() {
            return;
        }
        if let Err(e) = self.storage.remove(paths).await {
            error!("could not remove orphaned objects {:?}: {}", paths, e);
        }
    }
}

/// Caller-facing text for a skipped PKI embedding. Crypto detail stays in the log.
fn pki_warning(err: &Error) -> String {
    match err {
        Error::Validation(msg) => format!("digital signature skipped: {}", msg),
        Error::NotFound(_) => "digital signature skipped: certificate not found".to_string(),
        Error::MissingEncryptionKey => {
            "digital signature skipped: signing keys unavailable".to_string()
        },
        e if e.is_retryable() => {
            "digital signature skipped: certificate storage unavailable".to_string()
        },
        _ => "digital signature skipped: certificate could not be used".to_string(),
    }
}

/// SHA-256 of `bytes`, lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Draw placements and the QR mark, then serialize.
fn apply_visual_seal(
    source: &[u8],
    placements: &[Placement],
    signer: &SignerInfo,
    qr: &QrConfig,
    validation_url: &str,
    signed_at: DateTime<Utc>,
) -> Result<VisualSeal> {
    let mut editor = SealEditor::load(source)?;

    let signature = match &signer.signature_image {
        Some(bytes) => {
            let image = ImageData::from_bytes(bytes)?;
            let id = editor.add_image(&image);
            Some((id, image))
        },
        None => None,
    };
    let stamp = stamp_lines(signer, signed_at);

    for placement in placements {
        let index = editor.clamp_page(placement.page);
        let rect = editor.placement_rect(index, placement)?;
        match &signature {
            Some((id, image)) => editor.draw_image_fitted(index, *id, image, &rect)?,
            None => editor.draw_text_block(index, &rect, &stamp, true)?,
        }
    }

    let mut qr_png = None;
    if qr.enabled {
        let png = QrRenderer::render_png(validation_url, &QrCodeOptions::default())?;
        let image = ImageData::from_bytes(&png)?;
        let id = editor.add_image(&image);
        let caption = qr
            .caption
            .clone()
            .unwrap_or_else(|| format!("Validate at {}", validation_url));

        for index in qr.pages.resolve(editor.page_count()) {
            let rect = editor.corner_rect(index, qr.position, qr.size, QR_MARGIN)?;
            editor.draw_image(index, id, &rect)?;
            let (x, y) = caption_origin(&editor, index, &rect, qr.position, &caption)?;
            editor.draw_text(index, x, y, CAPTION_SIZE, &caption)?;
        }
        qr_png = Some(png);
    }

    editor.set_info(VALIDATION_URL_INFO_KEY, validation_url)?;
    Ok(VisualSeal {
        pdf: editor.save()?,
        qr_png,
    })
}

fn stamp_lines(signer: &SignerInfo, signed_at: DateTime<Utc>) -> Vec<String> {
    let mut lines = vec![format!("Signed by {}", signer.name.trim())];
    if let Some(registration) = signer.registration.as_deref().filter(|r| !r.trim().is_empty()) {
        lines.push(format!("Reg. {}", registration.trim()));
    }
    lines.push(signed_at.format("%Y-%m-%d %H:%M UTC").to_string());
    lines
}

/// Baseline origin for the caption: below the mark, right-aligned for
/// right-hand corners and kept on the page.
fn caption_origin(
    editor: &SealEditor,
    index: usize,
    rect: &ImagePlacement,
    position: QrPosition,
    caption: &str,
) -> Result<(f32, f32)> {
    let page = editor.page_box(index)?;
    let width = caption.chars().count() as f32 * CAPTION_SIZE * 0.5;
    let x = match position {
        QrPosition::BottomRight | QrPosition::TopRight => rect.x + rect.width - width,
        QrPosition::BottomLeft | QrPosition::TopLeft => rect.x,
    };
    let x = x.clamp(page.x + 4.0, (page.x + page.width - width - 4.0).max(page.x + 4.0));
    let y = (rect.y - CAPTION_SIZE - 3.0).max(page.y + 4.0);
    Ok((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_stamp_lines() {
        let mut signer = SignerInfo::new("  Ana Souza ");
        signer.registration = Some("123.456.789-00".to_string());
        let at = DateTime::parse_from_rfc3339("2026-03-01T10:20:00Z").unwrap().with_timezone(&Utc);
        assert_eq!(
            stamp_lines(&signer, at),
            vec![
                "Signed by Ana Souza".to_string(),
                "Reg. 123.456.789-00".to_string(),
                "2026-03-01 10:20 UTC".to_string()
            ]
        );
    }

    #[test]
    fn test_pki_warning_hides_crypto_detail() {
        let msg = pki_warning(&Error::Crypto("PKCS12 mac verify failure".to_string()));
        assert!(!msg.contains("PKCS12"));
        let msg = pki_warning(&Error::Decryption);
        assert!(msg.starts_with("digital signature skipped"));
    }
}
