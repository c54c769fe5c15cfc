//! Access to stored certificates.
//!
//! Unlocking a container needs both the master key and the owner's passphrase.
//! Rotation and revocation never remove rows.

use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};
use uuid::Uuid;

use crate::config::SealConfig;
use crate::encryption::{EphemeralCipher, EphemeralKey, SecretCipher};
use crate::error::{Error, Result};
use crate::model::{CertificateRecord, CertificateSelection};
use crate::signatures::SigningCredentials;
use crate::store::{CertificateRepository, ObjectStorage};

/// Access to stored certificates: unlocking, rotation and revocation.
pub struct CertificateVault {
    config: Arc<SealConfig>,
    cipher: SecretCipher,
    storage: Arc<dyn ObjectStorage>,
    certificates: Arc<dyn CertificateRepository>,
}

impl CertificateVault {
    /// Create a vault over the given stores.
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

    /// Open the container of `record` with `passphrase`.
    ///
    /// Any failure collapses to [`Error::Decryption`]; detail is logged only.
    pub async fn unlock(
        &self,
        record: &CertificateRecord,
        passphrase: &str,
    ) -> Result<SigningCredentials> {
        let master_key = self.config.master_key()?;

        let stored = self
            .cipher
            .decrypt_to_string(&record.encrypted_passphrase, master_key)
            .map_err(|e| {
                warn!("stored passphrase of certificate {} is unreadable: {}", record.id, e);
                Error::Decryption
            })?;
        if stored.len() != passphrase.len()
            || !openssl::memcmp::eq(stored.as_bytes(), passphrase.as_bytes())
        {
            debug!("passphrase mismatch for certificate {}", record.id);
            return Err(Error::Decryption);
        }

        let key = self
            .cipher
            .decrypt_to_string(&record.encrypted_container_key, master_key)
            .and_then(|encoded| EphemeralKey::from_base64(&encoded))
            .map_err(|e| {
                warn!("container key of certificate {} is unreadable: {}", record.id, e);
                Error::Decryption
            })?;

        let sealed = self.storage.download(&record.storage_path).await?;
        let container = EphemeralCipher::open(&key, &sealed).map_err(|e| {
            warn!("container of certificate {} failed to open: {}", record.id, e);
            Error::Decryption
        })?;

        let passphrase = passphrase.to_string();
        tokio::task::spawn_blocking(move || {
            SigningCredentials::from_pkcs12(&container, &passphrase)
        })
        .await
        .map_err(|e| Error::Crypto(format!("container parse task failed: {}", e)))?
    }

    /// Whether `passphrase` opens the certificate. Errors other than an
    /// unknown id or a dependency failure all read as `false`.
    pub async fn validate_passphrase(
        &self,
        owner_id: Uuid,
        id: Uuid,
        passphrase: &str,
    ) -> Result<bool> {
        let record = self.get(owner_id, id).await?;
        match self.unlock(&record, passphrase).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_retryable() => Err(e),
            Err(Error::MissingEncryptionKey) => Err(Error::MissingEncryptionKey),
            Err(e) => {
                debug!("passphrase validation for {} failed: {}", id, e);
                Ok(false)
            },
        }
    }

    /// Resolve and unlock the certificate a signing request names, or the
    /// owner's active one when no id is given.
    ///
    /// Returns `Ok(None)` when the owner has no certificate to use.
    pub async fn credentials_for(
        &self,
        owner_id: Uuid,
        selection: &CertificateSelection,
    ) -> Result<Option<(CertificateRecord, SigningCredentials)>> {
        let record = match selection.certificate_id {
            Some(id) => Some(self.get(owner_id, id).await?),
            None => self.certificates.active_for_owner(owner_id).await?,
        };
        let Some(record) = record else {
            return Ok(None);
        };
        if !record.is_usable(Utc::now()) {
            return Err(Error::Validation(format!(
                "certificate {} is inactive, revoked or expired",
                record.id
            )));
        }
        let credentials = self.unlock(&record, &selection.passphrase).await?;
        Ok(Some((record, credentials)))
    }

    /// Make `id` the owner's only active certificate.
    pub async fn activate(&self, owner_id: Uuid, id: Uuid) -> Result<CertificateRecord> {
        let record = self.get(owner_id, id).await?;
        if record.revoked_at.is_some() {
            return Err(Error::Conflict("revoked certificates cannot be activated".to_string()));
        }
        let record = self.certificates.activate(owner_id, id).await?;
        info!("certificate {} is now active for owner {}", id, owner_id);
        Ok(record)
    }

    /// Revoke a certificate. The row and its container are kept.
    pub async fn revoke(
        &self,
        owner_id: Uuid,
        id: Uuid,
        reason: Option<String>,
    ) -> Result<CertificateRecord> {
        let record = self.get(owner_id, id).await?;
        if record.revoked_at.is_some() {
            return Err(Error::Conflict("certificate is already revoked".to_string()));
        }
        let record = self.certificates.revoke(owner_id, id, reason, Utc::now()).await?;
        info!("revoked certificate {} of owner {}", id, owner_id);
        Ok(record)
    }

    /// The owner's active certificate.
    pub async fn active_for(&self, owner_id: Uuid) -> Result<Option<CertificateRecord>> {
        self.certificates.active_for_owner(owner_id).await
    }

    /// Every certificate of the owner, newest first.
    pub async fn list(&self, owner_id: Uuid) -> Result<Vec<CertificateRecord>> {
        self.certificates.list_for_owner(owner_id).await
    }

    /// Fetch a certificate owned by `owner_id`. Foreign ids read as missing.
    pub async fn get(&self, owner_id: Uuid, id: Uuid) -> Result<CertificateRecord> {
        self.certificates
            .get(id)
            .await?
            .filter(|record| record.owner_id == owner_id)
            .ok_or(Error::NotFound("Certificate"))
    }
}
