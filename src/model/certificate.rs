//! Certificate records and issuance inputs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Kind of certificate holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CertificateType {
    /// Natural person
    #[default]
    Personal,
    /// Company; requires an organization name
    Business,
}

impl CertificateType {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateType::Personal => "personal",
            CertificateType::Business => "business",
        }
    }
}

/// RSA modulus size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum KeyStrength {
    /// 2048-bit RSA
    Rsa2048,
    /// 4096-bit RSA
    Rsa4096,
}

impl KeyStrength {
    /// Modulus size in bits.
    pub fn bits(&self) -> u32 {
        match self {
            KeyStrength::Rsa2048 => 2048,
            KeyStrength::Rsa4096 => 4096,
        }
    }
}

impl TryFrom<u32> for KeyStrength {
    type Error = Error;

    fn try_from(bits: u32) -> Result<Self> {
        match bits {
            2048 => Ok(KeyStrength::Rsa2048),
            4096 => Ok(KeyStrength::Rsa4096),
            other => Err(Error::InvalidKeyStrength(other)),
        }
    }
}

impl From<KeyStrength> for u32 {
    fn from(strength: KeyStrength) -> u32 {
        strength.bits()
    }
}

/// Subject identity placed in the certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAttributes {
    /// CN
    pub common_name: String,
    /// O
    #[serde(default)]
    pub organization: Option<String>,
    /// OU
    #[serde(default)]
    pub organizational_unit: Option<String>,
    /// Taxpayer registration, written to the X.509 `serialNumber` attribute
    #[serde(default)]
    pub tax_id: Option<String>,
    /// emailAddress
    #[serde(default)]
    pub email: Option<String>,
    /// C (ISO 3166 alpha-2)
    #[serde(default)]
    pub country: Option<String>,
    /// ST
    #[serde(default)]
    pub state: Option<String>,
    /// L
    #[serde(default)]
    pub locality: Option<String>,
    /// street
    #[serde(default)]
    pub street: Option<String>,
}

impl SubjectAttributes {
    /// Subject with only a common name.
    pub fn new(common_name: impl Into<String>) -> Self {
        Self {
            common_name: common_name.into(),
            ..Default::default()
        }
    }

    /// Check the attributes before any key material is generated.
    pub fn validate(&self, cert_type: CertificateType) -> Result<()> {
        if self.common_name.trim().is_empty() {
            return Err(Error::Validation("common name is required".to_string()));
        }
        if self.common_name.chars().count() > 64 {
            return Err(Error::Validation("common name exceeds 64 characters".to_string()));
        }
        if let Some(country) = &self.country {
            if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(Error::Validation(
                    "country must be a two-letter ISO code".to_string(),
                ));
            }
        }
        if let Some(email) = &self.email {
            if !email.contains('@') {
                return Err(Error::Validation("email is not valid".to_string()));
            }
        }
        if cert_type == CertificateType::Business
            && self.organization.as_deref().map_or(true, |o| o.trim().is_empty())
        {
            return Err(Error::Validation(
                "business certificates require an organization".to_string(),
            ));
        }
        Ok(())
    }
}

/// Persisted certificate metadata. The key material lives in object storage.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRecord {
    /// Certificate id
    pub id: Uuid,
    /// Owning user
    pub owner_id: Uuid,
    /// Holder kind
    pub cert_type: CertificateType,
    /// Display name
    pub name: String,
    /// RSA modulus size
    pub key_strength: KeyStrength,
    /// Subject attributes
    pub subject: SubjectAttributes,
    /// Issuer DN (equal to the subject DN, self-signed)
    pub issuer: String,
    /// Object storage path of the encrypted PKCS#12 container
    pub storage_path: String,
    /// Container data key, SecretCipher-encrypted under the master key
    pub encrypted_container_key: String,
    /// Container passphrase, SecretCipher-encrypted under the master key
    pub encrypted_passphrase: String,
    /// notBefore
    pub valid_from: DateTime<Utc>,
    /// notAfter
    pub valid_until: DateTime<Utc>,
    /// Hex serial number
    pub serial_number: String,
    /// SHA-256 fingerprint of the DER certificate, hex
    pub fingerprint: String,
    /// Exactly one active certificate per owner
    pub is_active: bool,
    /// Revocation time
    pub revoked_at: Option<DateTime<Utc>>,
    /// Revocation reason
    pub revocation_reason: Option<String>,
    /// Row creation time
    pub created_at: DateTime<Utc>,
}

impl CertificateRecord {
    /// Whether `now` lies inside the validity period.
    pub fn is_within_validity(&self, now: DateTime<Utc>) -> bool {
        now >= self.valid_from && now <= self.valid_until
    }

    /// Active, not revoked and not expired.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.revoked_at.is_none() && self.is_within_validity(now)
    }
}

impl std::fmt::Debug for CertificateRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateRecord")
            .field("id", &self.id)
            .field("owner_id", &self.owner_id)
            .field("cert_type", &self.cert_type)
            .field("key_strength", &self.key_strength)
            .field("issuer", &self.issuer)
            .field("serial_number", &self.serial_number)
            .field("valid_until", &self.valid_until)
            .field("is_active", &self.is_active)
            .field("encrypted_passphrase", &"[REDACTED]")
            .field("encrypted_container_key", &"[REDACTED]")
            .finish()
    }
}

/// Certificate metadata safe to return over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSummary {
    /// Certificate id
    pub id: Uuid,
    /// Holder kind
    #[serde(rename = "type")]
    pub cert_type: CertificateType,
    /// Display name
    pub name: String,
    /// Key size in bits
    pub key_strength: u32,
    /// Subject attributes
    pub subject: SubjectAttributes,
    /// Issuer DN
    pub issuer: String,
    /// notBefore
    pub valid_from: DateTime<Utc>,
    /// notAfter
    pub valid_until: DateTime<Utc>,
    /// Hex serial number
    pub serial_number: String,
    /// SHA-256 fingerprint
    pub fingerprint: String,
    /// Active flag
    pub is_active: bool,
    /// Revocation time
    pub revoked_at: Option<DateTime<Utc>>,
}

impl From<&CertificateRecord> for CertificateSummary {
    fn from(record: &CertificateRecord) -> Self {
        Self {
            id: record.id,
            cert_type: record.cert_type,
            name: record.name.clone(),
            key_strength: record.key_strength.bits(),
            subject: record.subject.clone(),
            issuer: record.issuer.clone(),
            valid_from: record.valid_from,
            valid_until: record.valid_until,
            serial_number: record.serial_number.clone(),
            fingerprint: record.fingerprint.clone(),
            is_active: record.is_active,
            revoked_at: record.revoked_at,
        }
    }
}
