//! # Ceremony Cryptography
//!
//! Everything security-relevant in the engine flows through this module.
//! We deliberately chose boring, well-audited primitives:
//!
//! - **GF(256) + Shamir** — the splitting scheme itself, over the AES
//!   field, with log/exp table arithmetic.
//! - **PBKDF2-HMAC-SHA256** for password stretching — not the newest KDF,
//!   but the one the ceremony file format is defined over.
//! - **AES-256-GCM** for the share envelopes — AEAD done right.
//! - **HMAC-SHA256** for the outer envelope MAC and journal provenance.
//! - **SHA-256** for every digest in the file formats.
//!
//! Secret material lives in [`SealedBytes`] containers that overwrite
//! themselves multiple times on release. If you are tempted to optimize
//! anything in here, go read about timing attacks and come back when
//! you've lost the urge.

pub mod envelope;
pub mod gf256;
pub mod hash;
pub mod kdf;
pub mod sealed;
pub mod shamir;

pub use envelope::{open_share, seal_share, EnvelopeError, ShareEnvelope};
pub use kdf::{derive_admin_session_key, derive_envelope_keys, ADMIN_SESSION_SALT};
pub use sealed::SealedBytes;
pub use shamir::{combine, split, Share, ShamirError};
