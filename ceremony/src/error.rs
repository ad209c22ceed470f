//! # Error Taxonomy
//!
//! One error type crosses the engine's operation boundary:
//! [`CeremonyError`]. The orchestrator catches every variant at the top
//! of `create_shares` / `reconstruct_secret`, records it in the journal
//! and audit log, emits a failed completion event, and hands the caller a
//! structured result — errors never escape as panics and partial output
//! files never survive a failed create.
//!
//! The variants map onto recovery behavior, not onto modules: a
//! `Validation` is re-promptable, an `Integrity` burns an attempt budget
//! or kills the operation, a `BadFormat` is always fatal to the current
//! operation, and `Cancelled` is a clean user-initiated unwind.

use thiserror::Error;

use crate::crypto::envelope::EnvelopeError;
use crate::crypto::shamir::ShamirError;

/// Engine-level errors. See the module docs for the recovery semantics.
#[derive(Debug, Error)]
pub enum CeremonyError {
    /// Malformed or rejected input after the bounded re-prompt budget was
    /// exhausted.
    #[error("validation failed: {0}")]
    Validation(String),

    /// HMAC mismatch, GCM authentication failure, or a reconstructed
    /// secret whose hash does not match the recorded master hash.
    #[error("integrity failure: {0}")]
    Integrity(String),

    /// Structurally bad data: undecodable base64, wrong IV length,
    /// unparseable JSON, missing required fields.
    #[error("bad format: {0}")]
    BadFormat(String),

    /// Algebraic precondition violation in the Shamir codec.
    #[error(transparent)]
    Codec(#[from] ShamirError),

    /// A cryptographic primitive failed for a reason unrelated to key
    /// material (RNG, cipher init). Fatal; the cause is surfaced.
    #[error("crypto internal error: {0}")]
    CryptoInternal(String),

    /// Filesystem failure on a path that matters (the shares file).
    /// Journal and audit write failures are swallowed before reaching
    /// this type.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The cumulative failed-attempt budget for an operation ran out.
    #[error("too many failed attempts ({0})")]
    TooManyAttempts(u32),

    /// The user cancelled: chose 0 during keeper selection, or the shell
    /// failed the pending input request with a cancellation.
    #[error("cancelled by user")]
    Cancelled,

    /// The shell abandoned an input request (dropped the reply handle or
    /// failed it with a non-cancellation reason).
    #[error("input request abandoned: {0}")]
    InputAbandoned(String),
}

impl From<EnvelopeError> for CeremonyError {
    fn from(err: EnvelopeError) -> Self {
        match err {
            EnvelopeError::BadFormat(msg) => CeremonyError::BadFormat(msg),
            EnvelopeError::IntegrityFailure => {
                CeremonyError::Integrity("share envelope integrity check failed".into())
            }
            EnvelopeError::CryptoInternal(msg) => CeremonyError::CryptoInternal(msg),
        }
    }
}

impl CeremonyError {
    /// True for the clean user-initiated unwind, which operations report
    /// differently from real failures.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, CeremonyError::Cancelled)
    }
}
