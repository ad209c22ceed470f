//! SHA-256 and HMAC-SHA256 helpers.
//!
//! Every digest in the ceremony file formats is SHA-256 — the master
//! secret fingerprint, the journal hash, the envelope MAC, the admin
//! session HMAC. One hash family, no negotiation, nothing to misconfigure.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// SHA-256 digest as a fixed-size array.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Base64 of the SHA-256 digest — the encoding used for
/// `MasterSecretHash` and `SessionDataHash` in the emitted files.
pub fn sha256_b64(data: &[u8]) -> String {
    BASE64.encode(sha256(data))
}

/// HMAC-SHA256 tag over `data` under `key`.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// Base64 of the HMAC-SHA256 tag.
pub fn hmac_sha256_b64(key: &[u8], data: &[u8]) -> String {
    BASE64.encode(hmac_sha256(key, data))
}

/// Constant-time verification of an HMAC-SHA256 tag.
pub fn hmac_sha256_verify(key: &[u8], data: &[u8], tag: &[u8]) -> bool {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.verify_slice(tag).is_ok()
}
