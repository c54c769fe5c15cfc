//! Certificate issuance: key generation, PKCS#12 packaging and sealed storage.

use std::sync::Arc;

use chrono::Utc;
use log::{error, info, warn};
use uuid::Uuid;

use super::x509::{generate_self_signed, package_pkcs12};
use crate::config::SealConfig;
use crate::encryption::{EphemeralCipher, SecretCipher};
use crate::error::{Error, Result};
use crate::model::{CertificateRecord, CertificateType, KeyStrength, SubjectAttributes};
use crate::store::{CertificateRepository, ObjectStorage, BINARY_CONTENT_TYPE};

/// Shortest accepted container passphrase.
pub const MIN_PASSPHRASE_LEN: usize = 8;

/// Longest accepted validity period in years.
pub const MAX_VALIDITY_YEARS: u32 = 10;

/// Input for [`CertificateIssuer::issue`].
#[derive(Clone)]
pub struct IssueRequest {
    /// Owning user
    pub owner_id: Uuid,
    /// Holder kind
    pub cert_type: CertificateType,
    /// Display name; defaults to the common name
    pub name: Option<String>,
    /// Subject attributes
    pub subject: SubjectAttributes,
    /// RSA modulus size in bits
    pub key_strength: u32,
    /// Validity period in years
    pub validity_years: u32,
    /// Container passphrase
    pub passphrase: String,
}

impl std::fmt::Debug for IssueRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssueRequest")
            .field("owner_id", &self.owner_id)
            .field("cert_type", &self.cert_type)
            .field("subject", &self.subject)
            .field("key_strength", &self.key_strength)
            .field("validity_years", &self.validity_years)
            .field("passphrase", &"[REDACTED]")
            .finish()
    }
}

impl IssueRequest {
    fn validate(&self) -> Result<KeyStrength> {
        let strength = KeyStrength::try_from(self.key_strength)?;
        if !(1..=MAX_VALIDITY_YEARS).contains(&self.validity_years) {
            return Err(Error::Validation(format!(
                "validity must be between 1 and {} years",
                MAX_VALIDITY_YEARS
            )));
        }
        if self.passphrase.chars().count() < MIN_PASSPHRASE_LEN {
            return Err(Error::Validation(format!(
                "passphrase must have at least {} characters",
                MIN_PASSPHRASE_LEN
            )));
        }
        self.subject.validate(self.cert_type)?;
        Ok(strength)
    }
}

/// Issues self-signed signing certificates.
///
/// The PKCS#12 container is encrypted under a one-off data key and stored in
/// object storage. The data key and the container passphrase are each sealed
/// with the master key and kept on the metadata row, so neither the blob nor
/// the row alone opens the container.
pub struct CertificateIssuer {
    config: Arc<SealConfig>,
    cipher: SecretCipher,
    storage: Arc<dyn ObjectStorage>,
    certificates: Arc<dyn CertificateRepository>,
}

impl CertificateIssuer {
    /// Create an issuer.
    pub fn new(
        config: Arc<SealConfig>,
        storage: Arc<dyn ObjectStorage>,
        certificates: Arc<dyn CertificateRepository>,
    ) -> Self {
        let cipher = SecretCipher::new(config.kdf_iterations);
        Self {
            config,
            cipher,
            storage,
            certificates,
        }
    }

    /// Generate, package, store and activate a new certificate.
    ///
    /// Every other certificate of the owner is deactivated in the same
    /// atomic step. A failed row insert removes the uploaded container.
    pub async fn issue(&self, request: IssueRequest) -> Result<CertificateRecord> {
        let master_key = self.config.master_key()?.to_string();
        let strength = request.validate()?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        let display_name = request
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| request.subject.common_name.clone());

        let subject = request.subject.clone();
        let passphrase = request.passphrase.clone();
        let friendly_name = display_name.clone();
        let years = request.validity_years;
        let (container, meta) = tokio::task::spawn_blocking(move || -> Result<_> {
            let generated = generate_self_signed(&subject, strength, years, now)?;
            let container = package_pkcs12(&generated, &friendly_name, &passphrase)?;
            Ok((
                container,
                (
                    generated.serial_hex,
                    generated.fingerprint,
                    generated.issuer,
                    generated.not_before,
                    generated.not_after,
                ),
            ))
        })
        .await
        .map_err(|e| Error::Crypto(format!("key generation task failed: {}", e)))??;
        let (serial_number, fingerprint, issuer, valid_from, valid_until) = meta;

        let sealed = EphemeralCipher::seal(&container)?;
        let encrypted_container_key =
            self.cipher.encrypt_str(&sealed.key.to_base64(), &master_key)?;
        let encrypted_passphrase = self.cipher.encrypt_str(&request.passphrase, &master_key)?;

        let storage_path = format!("certificates/{}/{}.p12.enc", request.owner_id, id);
        self.storage
            .upload(&storage_path, sealed.ciphertext, BINARY_CONTENT_TYPE, false)
            .await?;

        let record = CertificateRecord {
            id,
            owner_id: request.owner_id,
            cert_type: request.cert_type,
            name: display_name,
            key_strength: strength,
            subject: request.subject,
            issuer,
            storage_path: storage_path.clone(),
            encrypted_container_key,
            encrypted_passphrase,
            valid_from,
            valid_until,
            serial_number,
            fingerprint,
            is_active: true,
            revoked_at: None,
            revocation_reason: None,
            created_at: now,
        };

        match self.certificates.insert_and_activate(record).await {
            Ok(record) => {
                info!(
                    "issued {}-bit certificate {} for owner {}, valid until {}",
                    strength.bits(),
                    record.id,
                    record.owner_id,
                    record.valid_until
                );
                Ok(record)
            },
            Err(e) => {
                warn!("certificate row insert failed, removing container {}: {}", storage_path, e);
                if let Err(cleanup) = self.storage.remove(&[storage_path.clone()]).await {
                    error!("orphaned certificate container {}: {}", storage_path, cleanup);
                }
                Err(e)
            },
        }
    }
}
