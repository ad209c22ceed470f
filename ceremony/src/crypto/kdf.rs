//! # Password Key Derivation
//!
//! PBKDF2-HMAC-SHA256 in two roles:
//!
//! - **Envelope keys** — each keeper password is stretched into 64 bytes,
//!   split into an AES-256 encryption key and an HMAC key. Fresh 32-byte
//!   salt per envelope; iteration count comes from configuration on
//!   encrypt and from the shares *file* on decrypt, so old files stay
//!   readable after the configured count changes.
//! - **Admin session key** — the administrator password is stretched into
//!   a 32-byte key under a fixed ASCII salt. This key only ever signs the
//!   session journal; it is a provenance key, not a confidentiality key,
//!   which is why the fixed salt is acceptable (and required — a
//!   third-party verifier must be able to re-derive it from the password
//!   alone).

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::sealed::SealedBytes;

/// Fixed salt for the administrator session key. Changing this breaks
/// verification of every previously sealed session.
pub const ADMIN_SESSION_SALT: &[u8] = b"ShamirCeremonyAdminSession";

/// Floor on PBKDF2 iterations accepted anywhere in the engine.
pub const MIN_KDF_ITERATIONS: u32 = 10_000;

/// The two keys a keeper password derives into. Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct EnvelopeKeys {
    /// AES-256-GCM key — bytes 0..32 of the PBKDF2 output.
    pub enc_key: [u8; 32],
    /// HMAC-SHA256 key — bytes 32..64 of the PBKDF2 output.
    pub hmac_key: [u8; 32],
}

/// Derives the envelope key pair from a keeper password.
///
/// 64 bytes of PBKDF2-HMAC-SHA256 output, split in half. The intermediate
/// buffer is zeroized before return; the result zeroizes itself on drop.
pub fn derive_envelope_keys(password: &SealedBytes, salt: &[u8], iterations: u32) -> EnvelopeKeys {
    let mut derived = [0u8; 64];
    pbkdf2_hmac::<Sha256>(password.expose(), salt, iterations, &mut derived);

    let mut keys = EnvelopeKeys {
        enc_key: [0u8; 32],
        hmac_key: [0u8; 32],
    };
    keys.enc_key.copy_from_slice(&derived[..32]);
    keys.hmac_key.copy_from_slice(&derived[32..]);
    derived.zeroize();
    keys
}

/// Derives the 32-byte administrator session key under the fixed salt.
///
/// The caller passes the password sealed and gets the key back sealed;
/// plaintext key material never rests in an unmanaged buffer.
pub fn derive_admin_session_key(password: &SealedBytes, iterations: u32, passes: u8) -> SealedBytes {
    let mut key = vec![0u8; 32];
    pbkdf2_hmac::<Sha256>(password.expose(), ADMIN_SESSION_SALT, iterations, &mut key);
    SealedBytes::new(key, passes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sealed(s: &str) -> SealedBytes {
        SealedBytes::from_string(s.to_string(), 1)
    }

    #[test]
    fn envelope_keys_are_deterministic_per_salt_and_count() {
        let pwd = sealed("correct horse battery staple");
        let a = derive_envelope_keys(&pwd, b"salt-salt-salt-salt-salt-salt-32", 10_000);
        let b = derive_envelope_keys(&pwd, b"salt-salt-salt-salt-salt-salt-32", 10_000);
        assert_eq!(a.enc_key, b.enc_key);
        assert_eq!(a.hmac_key, b.hmac_key);
    }

    #[test]
    fn envelope_keys_differ_between_halves() {
        let pwd = sealed("pw");
        let keys = derive_envelope_keys(&pwd, b"salt", 10_000);
        assert_ne!(keys.enc_key, keys.hmac_key);
    }

    #[test]
    fn salt_changes_both_keys() {
        let pwd = sealed("pw");
        let a = derive_envelope_keys(&pwd, b"salt-a", 10_000);
        let b = derive_envelope_keys(&pwd, b"salt-b", 10_000);
        assert_ne!(a.enc_key, b.enc_key);
        assert_ne!(a.hmac_key, b.hmac_key);
    }

    #[test]
    fn iteration_count_changes_the_keys() {
        let pwd = sealed("pw");
        let a = derive_envelope_keys(&pwd, b"salt", 10_000);
        let b = derive_envelope_keys(&pwd, b"salt", 10_001);
        assert_ne!(a.enc_key, b.enc_key);
    }

    #[test]
    fn admin_key_is_32_bytes_and_password_bound() {
        let a = derive_admin_session_key(&sealed("admin-one"), 10_000, 1);
        let b = derive_admin_session_key(&sealed("admin-two"), 10_000, 1);
        assert_eq!(a.len(), 32);
        assert_eq!(b.len(), 32);
        assert_ne!(a.expose(), b.expose());
    }

    #[test]
    fn admin_key_reproducible_for_verification() {
        // A third-party verifier re-derives the key from the password and
        // the fixed salt; the derivation must be stable.
        let a = derive_admin_session_key(&sealed("witness"), 25_000, 1);
        let b = derive_admin_session_key(&sealed("witness"), 25_000, 1);
        assert_eq!(a.expose(), b.expose());
    }
}
