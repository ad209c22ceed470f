//! # Share Envelope
//!
//! The password wrapper around a single Shamir [`Share`]:
//!
//! ```text
//! PBKDF2-HMAC-SHA256(password, salt, iterations) -> enc_key || hmac_key
//! AES-256-GCM(enc_key, nonce, share-JSON)        -> ciphertext || tag
//! HMAC-SHA256(hmac_key, ciphertext || tag)       -> mac
//! ```
//!
//! The HMAC over the GCM output is deliberate belt-and-braces: on decrypt
//! it is checked *first*, in constant time, before any AES work — a wrong
//! password gets a cheap deterministic rejection, and the GCM tag still
//! guards the actual decryption behind it.
//!
//! All four envelope fields travel as base64 strings because they are
//! embedded in the keeper records of the shares file. The nonce is 12
//! bytes, always. Files written with any other IV length are rejected on
//! decrypt; there is no legacy mode.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroizing;

use super::kdf::derive_envelope_keys;
use super::sealed::SealedBytes;
use super::shamir::Share;
use crate::crypto::hash::hmac_sha256;

/// PBKDF2 salt length in bytes.
pub const SALT_LENGTH: usize = 32;

/// AES-256-GCM nonce length in bytes. 96 bits, the only supported length.
pub const NONCE_LENGTH: usize = 12;

/// AES-256-GCM authentication tag length in bytes.
pub const TAG_LENGTH: usize = 16;

/// Errors from sealing or opening an envelope.
///
/// Kept deliberately coarse: the distinction an operator needs is
/// "the file is malformed" versus "the password or contents are wrong",
/// and nothing more — detailed crypto failure modes are a gift to nobody.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// Malformed input: bad base64, wrong IV length, truncated blob, or
    /// share JSON that does not parse.
    #[error("malformed envelope: {0}")]
    BadFormat(String),

    /// HMAC or GCM authentication failure. A wrong password lands here,
    /// via the HMAC check, before any AES work happens.
    #[error("envelope integrity check failed")]
    IntegrityFailure,

    /// A cryptographic primitive failed for reasons unrelated to key
    /// material. Should not happen; surfaced instead of panicking.
    #[error("crypto internal error: {0}")]
    CryptoInternal(String),
}

/// The four base64 fields of a sealed share, exactly as they appear in a
/// keeper record.
#[derive(Debug, Clone)]
pub struct ShareEnvelope {
    /// base64(ciphertext || GCM tag)
    pub encrypted_share: String,
    /// base64(HMAC-SHA256(hmac_key, ciphertext || tag))
    pub hmac: String,
    /// base64(32-byte PBKDF2 salt)
    pub salt: String,
    /// base64(12-byte GCM nonce)
    pub iv: String,
}

/// Seals a share under a keeper password.
///
/// Draws a fresh salt and nonce from the OS CSPRNG, derives the key pair,
/// encrypts the share's canonical JSON, and MACs the result. Derived keys
/// and the plaintext buffer are zeroized before return.
pub fn seal_share(
    share: &Share,
    password: &SealedBytes,
    iterations: u32,
) -> Result<ShareEnvelope, EnvelopeError> {
    let mut rng = rand::rngs::OsRng;
    let mut salt = [0u8; SALT_LENGTH];
    let mut nonce_bytes = [0u8; NONCE_LENGTH];
    rng.fill_bytes(&mut salt);
    rng.fill_bytes(&mut nonce_bytes);

    let keys = derive_envelope_keys(password, &salt, iterations);

    let plaintext = Zeroizing::new(
        serde_json::to_vec(share)
            .map_err(|e| EnvelopeError::CryptoInternal(format!("share serialization: {e}")))?,
    );

    let cipher = Aes256Gcm::new_from_slice(&keys.enc_key)
        .map_err(|e| EnvelopeError::CryptoInternal(format!("cipher init: {e}")))?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    // The aes-gcm crate appends the 16-byte tag, so this is already the
    // ciphertext || tag blob the format wants.
    let blob = cipher
        .encrypt(nonce, plaintext.as_slice())
        .map_err(|_| EnvelopeError::CryptoInternal("AES-GCM encryption failed".into()))?;

    let mac = hmac_sha256(&keys.hmac_key, &blob);

    Ok(ShareEnvelope {
        encrypted_share: BASE64.encode(&blob),
        hmac: BASE64.encode(mac),
        salt: BASE64.encode(salt),
        iv: BASE64.encode(nonce_bytes),
    })
}

/// Opens a sealed share with a keeper password.
///
/// `iterations` must be the count recorded in the shares file the
/// envelope came from — not the current configuration.
pub fn open_share(
    envelope: &ShareEnvelope,
    password: &SealedBytes,
    iterations: u32,
) -> Result<Share, EnvelopeError> {
    let blob = decode_field(&envelope.encrypted_share, "EncryptedShare")?;
    let mac = decode_field(&envelope.hmac, "Hmac")?;
    let salt = decode_field(&envelope.salt, "Salt")?;
    let nonce_bytes = decode_field(&envelope.iv, "Iv")?;

    if nonce_bytes.len() != NONCE_LENGTH {
        return Err(EnvelopeError::BadFormat(format!(
            "IV must be {NONCE_LENGTH} bytes, got {}",
            nonce_bytes.len()
        )));
    }
    if blob.len() < TAG_LENGTH {
        return Err(EnvelopeError::BadFormat(format!(
            "encrypted share too short: {} bytes",
            blob.len()
        )));
    }

    let keys = derive_envelope_keys(password, &salt, iterations);

    // Constant-time HMAC check before any AES work. This is the path a
    // wrong password takes.
    if !crate::crypto::hash::hmac_sha256_verify(&keys.hmac_key, &blob, &mac) {
        return Err(EnvelopeError::IntegrityFailure);
    }

    let cipher = Aes256Gcm::new_from_slice(&keys.enc_key)
        .map_err(|e| EnvelopeError::CryptoInternal(format!("cipher init: {e}")))?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    let plaintext = Zeroizing::new(
        cipher
            .decrypt(nonce, blob.as_slice())
            .map_err(|_| EnvelopeError::IntegrityFailure)?,
    );

    serde_json::from_slice::<Share>(&plaintext)
        .map_err(|e| EnvelopeError::BadFormat(format!("share JSON: {e}")))
}

fn decode_field(value: &str, field: &str) -> Result<Vec<u8>, EnvelopeError> {
    BASE64
        .decode(value)
        .map_err(|e| EnvelopeError::BadFormat(format!("{field} is not valid base64: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_share() -> Share {
        Share {
            x: 1,
            y: b"test share".to_vec(),
        }
    }

    fn pwd(s: &str) -> SealedBytes {
        SealedBytes::from_string(s.to_string(), 1)
    }

    const ITERATIONS: u32 = 10_000;

    #[test]
    fn seal_open_round_trip() {
        let share = test_share();
        let envelope = seal_share(&share, &pwd("testpassword123"), ITERATIONS).unwrap();
        let opened = open_share(&envelope, &pwd("testpassword123"), ITERATIONS).unwrap();
        assert_eq!(opened, share);
    }

    #[test]
    fn wrong_password_is_integrity_failure() {
        let envelope = seal_share(&test_share(), &pwd("right password"), ITERATIONS).unwrap();
        let result = open_share(&envelope, &pwd("wrong password"), ITERATIONS);
        assert!(matches!(result, Err(EnvelopeError::IntegrityFailure)));
    }

    #[test]
    fn wrong_iteration_count_is_integrity_failure() {
        // Decrypting with a different count than the file recorded derives
        // different keys — same failure mode as a wrong password.
        let envelope = seal_share(&test_share(), &pwd("pw"), ITERATIONS).unwrap();
        let result = open_share(&envelope, &pwd("pw"), ITERATIONS + 1);
        assert!(matches!(result, Err(EnvelopeError::IntegrityFailure)));
    }

    #[test]
    fn invalid_iv_string_is_bad_format() {
        let mut envelope = seal_share(&test_share(), &pwd("pw"), ITERATIONS).unwrap();
        envelope.iv = "invalid-iv".to_string();
        let result = open_share(&envelope, &pwd("pw"), ITERATIONS);
        assert!(matches!(result, Err(EnvelopeError::BadFormat(_))));
    }

    #[test]
    fn sixteen_byte_iv_is_bad_format() {
        // Legacy 16-byte IVs are rejected outright.
        let mut envelope = seal_share(&test_share(), &pwd("pw"), ITERATIONS).unwrap();
        envelope.iv = BASE64.encode([0u8; 16]);
        let result = open_share(&envelope, &pwd("pw"), ITERATIONS);
        assert!(matches!(result, Err(EnvelopeError::BadFormat(_))));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let envelope = seal_share(&test_share(), &pwd("pw"), ITERATIONS).unwrap();
        let mut blob = BASE64.decode(&envelope.encrypted_share).unwrap();
        blob[0] ^= 0xFF;
        let tampered = ShareEnvelope {
            encrypted_share: BASE64.encode(&blob),
            ..envelope
        };
        assert!(matches!(
            open_share(&tampered, &pwd("pw"), ITERATIONS),
            Err(EnvelopeError::IntegrityFailure)
        ));
    }

    #[test]
    fn tampered_tag_fails() {
        let envelope = seal_share(&test_share(), &pwd("pw"), ITERATIONS).unwrap();
        let mut blob = BASE64.decode(&envelope.encrypted_share).unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0x01; // inside the GCM tag
        let tampered = ShareEnvelope {
            encrypted_share: BASE64.encode(&blob),
            ..envelope
        };
        assert!(matches!(
            open_share(&tampered, &pwd("pw"), ITERATIONS),
            Err(EnvelopeError::IntegrityFailure)
        ));
    }

    #[test]
    fn tampered_hmac_fails() {
        let envelope = seal_share(&test_share(), &pwd("pw"), ITERATIONS).unwrap();
        let mut mac = BASE64.decode(&envelope.hmac).unwrap();
        mac[5] ^= 0x10;
        let tampered = ShareEnvelope {
            hmac: BASE64.encode(&mac),
            ..envelope
        };
        assert!(matches!(
            open_share(&tampered, &pwd("pw"), ITERATIONS),
            Err(EnvelopeError::IntegrityFailure)
        ));
    }

    #[test]
    fn tampered_salt_fails() {
        // A different salt derives different keys; the HMAC check catches it.
        let envelope = seal_share(&test_share(), &pwd("pw"), ITERATIONS).unwrap();
        let mut salt = BASE64.decode(&envelope.salt).unwrap();
        salt[0] ^= 0x01;
        let tampered = ShareEnvelope {
            salt: BASE64.encode(&salt),
            ..envelope
        };
        assert!(matches!(
            open_share(&tampered, &pwd("pw"), ITERATIONS),
            Err(EnvelopeError::IntegrityFailure)
        ));
    }

    #[test]
    fn truncated_blob_is_bad_format() {
        let mut envelope = seal_share(&test_share(), &pwd("pw"), ITERATIONS).unwrap();
        envelope.encrypted_share = BASE64.encode([0u8; 7]);
        assert!(matches!(
            open_share(&envelope, &pwd("pw"), ITERATIONS),
            Err(EnvelopeError::BadFormat(_))
        ));
    }

    #[test]
    fn envelope_fields_are_fresh_per_seal() {
        let share = test_share();
        let a = seal_share(&share, &pwd("pw"), ITERATIONS).unwrap();
        let b = seal_share(&share, &pwd("pw"), ITERATIONS).unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.encrypted_share, b.encrypted_share);
    }

    #[test]
    fn large_share_round_trips() {
        let share = Share {
            x: 200,
            y: vec![0xA5; 1024],
        };
        let envelope = seal_share(&share, &pwd("long secret pw"), ITERATIONS).unwrap();
        let opened = open_share(&envelope, &pwd("long secret pw"), ITERATIONS).unwrap();
        assert_eq!(opened, share);
    }
}
