//! Secret encryption properties.

use pdf_seal::encryption::{EphemeralCipher, SecretCipher, MIN_KDF_ITERATIONS};
use proptest::prelude::*;

proptest! {
    // Each case runs the full KDF twice.
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn prop_round_trip(plaintext in ".{0,64}", passphrase in "[a-zA-Z0-9 ]{1,32}") {
        let cipher = SecretCipher::new(MIN_KDF_ITERATIONS);
        let blob = cipher.encrypt_str(&plaintext, &passphrase).unwrap();
        prop_assert_eq!(cipher.decrypt_to_string(&blob, &passphrase).unwrap(), plaintext);
    }

    #[test]
    fn prop_wrong_passphrase_fails(plaintext in ".{1,64}", passphrase in "[a-z]{8,16}") {
        let cipher = SecretCipher::new(MIN_KDF_ITERATIONS);
        let blob = cipher.encrypt_str(&plaintext, &passphrase).unwrap();
        let wrong = format!("{}!", passphrase);
        prop_assert!(cipher.decrypt_to_string(&blob, &wrong).is_err());
    }
}

#[test]
fn test_same_input_never_repeats_ciphertext() {
    let cipher = SecretCipher::new(MIN_KDF_ITERATIONS);
    let a = cipher.encrypt_str("container passphrase", "master").unwrap();
    let b = cipher.encrypt_str("container passphrase", "master").unwrap();
    assert_ne!(a, b);
}

#[test]
fn test_ephemeral_keys_are_independent() {
    let first = EphemeralCipher::seal(b"pkcs12 container").unwrap();
    let second = EphemeralCipher::seal(b"pkcs12 container").unwrap();
    assert_ne!(first.ciphertext, second.ciphertext);
    assert!(EphemeralCipher::open(&second.key, &first.ciphertext).is_err());
    assert_eq!(
        EphemeralCipher::open(&first.key, &first.ciphertext).unwrap(),
        b"pkcs12 container"
    );
}
