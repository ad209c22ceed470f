// Copyright (c) 2026 Keyward Contributors. MIT License.
// See LICENSE for details.

//! # Keyward — Ceremony Engine
//!
//! Keyward performs **key-splitting ceremonies**: it takes a high-value
//! secret (a 256-bit master key, a root credential, anything that must
//! not live in one place) and distributes it among N human *keepers*
//! using Shamir's Secret Sharing over GF(256), such that any k of them
//! can later reconstruct it together — and fewer than k learn exactly
//! nothing. The inverse ceremony collects k keeper passwords, decrypts
//! their envelopes, and recovers the secret.
//!
//! Every ceremony is witnessed: an administrator password derives a
//! session key that HMAC-signs the session journal, so the record of who
//! did what, when, on which machine, is tamper-evident after the fact.
//!
//! ## Architecture
//!
//! The engine is layered, leaves first:
//!
//! - **crypto** — GF(256) arithmetic, the Shamir codec, the PBKDF2 +
//!   AES-256-GCM + HMAC share envelope, and sealed-memory containers.
//! - **model** — the keeper records and shares-file format.
//! - **journal** — the session journal, audit trail, and provenance seal.
//! - **events** — the input-request/reply surface a shell drives.
//! - **engine** — the ceremony orchestrator tying it all together.
//! - **config** / **validation** — configuration value and the pure
//!   validators behind every prompt.
//!
//! ## Design Philosophy
//!
//! 1. The engine owns the ceremony; the shell owns the terminal. They
//!    meet only at the event channel.
//! 2. A shares file that has not proven itself recoverable does not get
//!    written. The self-test is not optional paranoia, it is the product.
//! 3. Secrets live in sealed buffers and are overwritten on every exit
//!    path — success, failure, or cancellation.
//! 4. If it touches key material, it has tests. Plural.

pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod events;
pub mod journal;
pub mod model;
pub mod validation;

// Re-export the things people actually need so they don't have to
// memorize the module hierarchy.
pub use config::CeremonyConfig;
pub use engine::{CeremonyEngine, CeremonyResult};
pub use error::CeremonyError;
pub use events::{event_channel, CeremonyEvent, EventReceiver, EventSender, InputRequest};
pub use journal::{SessionJournal, SessionOutput};
pub use model::ShamirSecretOutput;
