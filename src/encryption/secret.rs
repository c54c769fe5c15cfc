//! Passphrase-based AES-256-GCM.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use openssl::hash::MessageDigest;
use rand::RngCore;

use super::{KEY_SIZE, MIN_KDF_ITERATIONS, NONCE_SIZE, SALT_SIZE, TAG_SIZE};
use crate::error::{Error, Result};

/// Password-based authenticated encryption for secrets at rest.
#[derive(Debug, Clone, Copy)]
pub struct SecretCipher {
    iterations: u32,
}

impl Default for SecretCipher {
    fn default() -> Self {
        Self::new(310_000)
    }
}

impl SecretCipher {
    /// Create a cipher. Iteration counts below the minimum are raised to it.
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(MIN_KDF_ITERATIONS),
        }
    }

    /// PBKDF2 iteration count in use.
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    fn derive_key(&self, passphrase: &str, salt: &[u8]) -> Result<[u8; KEY_SIZE]> {
        let mut key = [0u8; KEY_SIZE];
        openssl::pkcs5::pbkdf2_hmac(
            passphrase.as_bytes(),
            salt,
            self.iterations as usize,
            MessageDigest::sha256(),
            &mut key,
        )?;
        Ok(key)
    }

    /// Encrypt `plaintext` under `passphrase`.
    ///
    /// Returns `base64(salt || nonce || ciphertext || tag)`.
    pub fn encrypt(&self, plaintext: &[u8], passphrase: &str) -> Result<String> {
        if passphrase.is_empty() {
            return Err(Error::Validation("passphrase must not be empty".to_string()));
        }

        let mut salt = [0u8; SALT_SIZE];
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        let mut rng = rand::thread_rng();
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut nonce_bytes);

        let key = self.derive_key(passphrase, &salt)?;
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|e| Error::Crypto(e.to_string()))?;

        // aes-gcm appends the 16-byte tag to the ciphertext
        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|e| Error::Crypto(e.to_string()))?;

        let mut blob = Vec::with_capacity(SALT_SIZE + NONCE_SIZE + sealed.len());
        blob.extend_from_slice(&salt);
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&sealed);

        Ok(STANDARD.encode(blob))
    }

    /// Decrypt a blob produced by [`SecretCipher::encrypt`].
    ///
    /// Any malformed input, wrong passphrase or tampered byte yields
    /// [`Error::Decryption`].
    pub fn decrypt(&self, blob: &str, passphrase: &str) -> Result<Vec<u8>> {
        let raw = STANDARD.decode(blob.trim()).map_err(|_| Error::Decryption)?;
        if raw.len() < SALT_SIZE + NONCE_SIZE + TAG_SIZE {
            return Err(Error::Decryption);
        }

        let (salt, rest) = raw.split_at(SALT_SIZE);
        let (nonce_bytes, sealed) = rest.split_at(NONCE_SIZE);

        let key = self.derive_key(passphrase, salt)?;
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| Error::Decryption)?;

        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), sealed)
            .map_err(|_| Error::Decryption)
    }

    /// Encrypt a UTF-8 secret.
    pub fn encrypt_str(&self, plaintext: &str, passphrase: &str) -> Result<String> {
        self.encrypt(plaintext.as_bytes(), passphrase)
    }

    /// Decrypt into a UTF-8 string.
    pub fn decrypt_to_string(&self, blob: &str, passphrase: &str) -> Result<String> {
        let bytes = self.decrypt(blob, passphrase)?;
        String::from_utf8(bytes).map_err(|_| Error::Decryption)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let cipher = SecretCipher::default();
        let blob = cipher.encrypt(b"certificate passphrase", "master").unwrap();
        let plain = cipher.decrypt(&blob, "master").unwrap();
        assert_eq!(plain, b"certificate passphrase");
    }

    #[test]
    fn test_wrong_passphrase_fails() {
        let cipher = SecretCipher::default();
        let blob = cipher.encrypt(b"secret", "right").unwrap();
        assert!(matches!(cipher.decrypt(&blob, "wrong"), Err(Error::Decryption)));
    }

    #[test]
    fn test_blob_layout() {
        let cipher = SecretCipher::default();
        let blob = cipher.encrypt(b"abc", "pw").unwrap();
        let raw = STANDARD.decode(blob).unwrap();
        assert_eq!(raw.len(), SALT_SIZE + NONCE_SIZE + 3 + TAG_SIZE);
    }

    #[test]
    fn test_same_input_different_blobs() {
        let cipher = SecretCipher::default();
        let a = cipher.encrypt(b"same", "pw").unwrap();
        let b = cipher.encrypt(b"same", "pw").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_tampered_blob_fails() {
        let cipher = SecretCipher::default();
        let blob = cipher.encrypt(b"payload", "pw").unwrap();
        let mut raw = STANDARD.decode(&blob).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = STANDARD.encode(raw);
        assert!(matches!(cipher.decrypt(&tampered, "pw"), Err(Error::Decryption)));
    }

    #[test]
    fn test_garbage_input_fails() {
        let cipher = SecretCipher::default();
        assert!(matches!(cipher.decrypt("not base64!!", "pw"), Err(Error::Decryption)));
        assert!(matches!(cipher.decrypt("AAAA", "pw"), Err(Error::Decryption)));
    }

    #[test]
    fn test_empty_passphrase_rejected() {
        let cipher = SecretCipher::default();
        assert!(matches!(cipher.encrypt(b"x", ""), Err(Error::Validation(_))));
    }

    #[test]
    fn test_iterations_floor() {
        assert_eq!(SecretCipher::new(10).iterations(), MIN_KDF_ITERATIONS);
    }
}
