//! Secret encryption at rest.
//!
//! Two modes are provided:
//!
//! - [`SecretCipher`]: passphrase-based AEAD for short secrets (certificate
//!   passphrases, container keys). A 256-bit key is derived with
//!   PBKDF2-HMAC-SHA256 from a fresh 128-bit salt on every call, then the
//!   secret is sealed with AES-256-GCM under a fresh 96-bit nonce.
//! - [`EphemeralCipher`]: a random 256-bit key per call for large binaries,
//!   returned separately from the ciphertext so the two can be stored apart.
//!
//! # Blob layout
//!
//! ```text
//! SecretCipher:    base64( salt(16) || nonce(12) || ciphertext || tag(16) )
//! EphemeralCipher: nonce(12) || ciphertext || tag(16)
//! ```
//!
//! Fresh salt and nonce on every call means the same `(plaintext, passphrase)`
//! never produces the same blob twice, and a nonce is never reused under a key.

mod ephemeral;
mod secret;

pub use ephemeral::{EphemeralCipher, EphemeralKey, SealedBlob};
pub use secret::SecretCipher;

/// PBKDF2 salt size in bytes.
pub const SALT_SIZE: usize = 16;

/// AES-GCM nonce size in bytes.
pub const NONCE_SIZE: usize = 12;

/// AES-GCM authentication tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// AES-256 key size in bytes.
pub const KEY_SIZE: usize = 32;

/// Lowest accepted PBKDF2 iteration count.
pub const MIN_KDF_ITERATIONS: u32 = 300_000;
