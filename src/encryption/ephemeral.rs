//! Random-key AES-256-GCM for large binaries.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::RngCore;

use super::{KEY_SIZE, NONCE_SIZE, TAG_SIZE};
use crate::error::{Error, Result};

/// A one-off 256-bit data key.
#[derive(Clone, PartialEq, Eq)]
pub struct EphemeralKey([u8; KEY_SIZE]);

impl EphemeralKey {
    /// Generate a fresh random key.
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut key);
        Self(key)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Base64 form, for wrapping with [`super::SecretCipher`].
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    /// Parse the base64 form.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let raw = STANDARD.decode(encoded.trim()).map_err(|_| Error::Decryption)?;
        let key: [u8; KEY_SIZE] = raw.try_into().map_err(|_| Error::Decryption)?;
        Ok(Self(key))
    }
}

impl std::fmt::Debug for EphemeralKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EphemeralKey([REDACTED])")
    }
}

/// Output of [`EphemeralCipher::seal`]: key and ciphertext, meant to be stored apart.
#[derive(Debug, Clone)]
pub struct SealedBlob {
    /// Data key
    pub key: EphemeralKey,
    /// `nonce || ciphertext || tag`
    pub ciphertext: Vec<u8>,
}

/// Encrypts binaries under a freshly generated key.
pub struct EphemeralCipher;

impl EphemeralCipher {
    /// Encrypt `data` under a new random key.
    pub fn seal(data: &[u8]) -> Result<SealedBlob> {
        let key = EphemeralKey::generate();
        let ciphertext = Self::seal_with(&key, data)?;
        Ok(SealedBlob { key, ciphertext })
    }

    fn seal_with(key: &EphemeralKey, data: &[u8]) -> Result<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);

        let cipher =
            Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|e| Error::Crypto(e.to_string()))?;
        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), data)
            .map_err(|e| Error::Crypto(e.to_string()))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + sealed.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Decrypt a ciphertext produced by [`EphemeralCipher::seal`].
    pub fn open(key: &EphemeralKey, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < NONCE_SIZE + TAG_SIZE {
            return Err(Error::Decryption);
        }
        let (nonce_bytes, sealed) = ciphertext.split_at(NONCE_SIZE);
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| Error::Decryption)?;
        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), sealed)
            .map_err(|_| Error::Decryption)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let data = vec![7u8; 64 * 1024];
        let sealed = EphemeralCipher::seal(&data).unwrap();
        assert_eq!(sealed.ciphertext.len(), NONCE_SIZE + data.len() + TAG_SIZE);
        let opened = EphemeralCipher::open(&sealed.key, &sealed.ciphertext).unwrap();
        assert_eq!(opened, data);
    }

    #[test]
    fn test_each_seal_uses_a_new_key() {
        let a = EphemeralCipher::seal(b"container").unwrap();
        let b = EphemeralCipher::seal(b"container").unwrap();
        assert_ne!(a.key, b.key);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_open_with_other_key_fails() {
        let sealed = EphemeralCipher::seal(b"container").unwrap();
        let other = EphemeralKey::generate();
        assert!(matches!(
            EphemeralCipher::open(&other, &sealed.ciphertext),
            Err(Error::Decryption)
        ));
    }

    #[test]
    fn test_key_base64_roundtrip() {
        let key = EphemeralKey::generate();
        let parsed = EphemeralKey::from_base64(&key.to_base64()).unwrap();
        assert_eq!(parsed, key);
        assert!(EphemeralKey::from_base64("c2hvcnQ=").is_err());
    }

    #[test]
    fn test_key_debug_redacted() {
        let key = EphemeralKey::generate();
        assert_eq!(format!("{:?}", key), "EphemeralKey([REDACTED])");
    }
}
