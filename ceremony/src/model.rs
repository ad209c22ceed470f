//! # Ceremony Artifacts
//!
//! The long-lived data model: keeper records and the shares file they are
//! emitted in. These structs *are* the file format — field names
//! serialize in PascalCase exactly as written to disk, and the structural
//! invariants a well-formed file must satisfy live in
//! [`ShamirSecretOutput::validate`].
//!
//! Nothing in here is secret on its own. A keeper record carries only
//! envelope ciphertext and contact metadata; the shares file carries a
//! hash of the master secret, never the secret.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::envelope::ShareEnvelope;
use crate::error::CeremonyError;

/// Shares-file format version.
pub const OUTPUT_VERSION: &str = "1.0";

/// Splitting algorithm identifier recorded in the file.
pub const ALGORITHM: &str = "Shamir-GF256";

/// Envelope cipher identifier recorded in the file.
pub const ENCRYPTION_ALGORITHM: &str = "AES-256-GCM";

/// KDF identifier recorded in the file.
pub const KDF_ALGORITHM: &str = "PBKDF2-SHA256";

/// Ceiling on total shares per ceremony. The field supports 255; one
/// hundred humans in a key ceremony is already an organizational problem,
/// not a cryptographic one.
pub const MAX_TOTAL_SHARES: u8 = 100;

/// Floor on the reconstruction threshold.
pub const MIN_THRESHOLD: u8 = 2;

/// The encrypted envelope around one share, attributed to a named keeper.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecretKeeperRecord {
    /// Opaque unique record id.
    pub id: String,
    /// The share's x-coordinate.
    pub share_number: u8,
    /// Keeper display name.
    pub name: String,
    /// Keeper contact phone.
    pub phone: String,
    /// Keeper contact email.
    pub email: String,
    /// base64(ciphertext || GCM tag) over the share's canonical JSON.
    pub encrypted_share: String,
    /// base64(HMAC-SHA256 over the encrypted blob).
    pub hmac: String,
    /// base64(32-byte PBKDF2 salt).
    pub salt: String,
    /// base64(12-byte GCM nonce).
    pub iv: String,
    /// When the envelope was built.
    pub created_at: DateTime<Utc>,
    /// The ceremony session this record was created in.
    pub session_id: String,
}

impl SecretKeeperRecord {
    /// Builds a record from a sealed envelope plus keeper metadata.
    pub fn new(
        share_number: u8,
        name: String,
        phone: String,
        email: String,
        envelope: ShareEnvelope,
        session_id: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            share_number,
            name,
            phone,
            email,
            encrypted_share: envelope.encrypted_share,
            hmac: envelope.hmac,
            salt: envelope.salt,
            iv: envelope.iv,
            created_at: Utc::now(),
            session_id: session_id.to_string(),
        }
    }

    /// The envelope fields, for decryption.
    pub fn envelope(&self) -> ShareEnvelope {
        ShareEnvelope {
            encrypted_share: self.encrypted_share.clone(),
            hmac: self.hmac.clone(),
            salt: self.salt.clone(),
            iv: self.iv.clone(),
        }
    }
}

/// Organization block of the shares file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrganizationInfo {
    /// Organization name.
    pub name: String,
    /// Organization contact phone.
    pub contact_phone: String,
}

/// Configuration block of the shares file: the parameters a future
/// reconstruction must use, independent of whatever the tool is
/// configured with by then.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ShareConfiguration {
    /// Number of keeper records in the file.
    pub total_shares: u8,
    /// Minimum shares needed to reconstruct.
    pub threshold_required: u8,
    /// Always [`ALGORITHM`].
    pub algorithm: String,
    /// Always [`ENCRYPTION_ALGORITHM`].
    pub encryption_algorithm: String,
    /// Always [`KDF_ALGORITHM`].
    pub kdf_algorithm: String,
    /// The PBKDF2 iteration count the envelopes were sealed with.
    pub kdf_iterations: u32,
}

impl ShareConfiguration {
    /// Standard configuration block for a new ceremony.
    pub fn new(total_shares: u8, threshold_required: u8, kdf_iterations: u32) -> Self {
        Self {
            total_shares,
            threshold_required,
            algorithm: ALGORITHM.to_string(),
            encryption_algorithm: ENCRYPTION_ALGORITHM.to_string(),
            kdf_algorithm: KDF_ALGORITHM.to_string(),
            kdf_iterations,
        }
    }
}

/// The emitted ceremony artifact: everything needed to reconstruct the
/// secret given `ThresholdRequired` keeper passwords, and nothing more.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ShamirSecretOutput {
    /// File format version.
    pub version: String,
    /// Ceremony session id.
    pub session_id: String,
    /// When the file was emitted.
    pub created_at: DateTime<Utc>,
    /// Witnessing organization.
    pub organization: OrganizationInfo,
    /// Reconstruction parameters.
    pub configuration: ShareConfiguration,
    /// base64(SHA-256(master secret)) — the reconstruction check value.
    pub master_secret_hash: String,
    /// One record per share, ordered by share number.
    pub keepers: Vec<SecretKeeperRecord>,
}

impl ShamirSecretOutput {
    /// Parses and structurally validates a shares file.
    pub fn from_json_file(path: &Path) -> Result<Self, CeremonyError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CeremonyError::BadFormat(format!("cannot read shares file: {e}")))?;
        let output: Self = serde_json::from_str(&raw)
            .map_err(|e| CeremonyError::BadFormat(format!("shares file JSON: {e}")))?;
        output.validate()?;
        Ok(output)
    }

    /// Enforces the structural invariants of a well-formed shares file.
    pub fn validate(&self) -> Result<(), CeremonyError> {
        let config = &self.configuration;

        if config.threshold_required < MIN_THRESHOLD {
            return Err(CeremonyError::BadFormat(format!(
                "threshold must be >= {MIN_THRESHOLD}, got {}",
                config.threshold_required
            )));
        }
        if config.total_shares < config.threshold_required {
            return Err(CeremonyError::BadFormat(format!(
                "total shares ({}) below threshold ({})",
                config.total_shares, config.threshold_required
            )));
        }
        if config.total_shares > MAX_TOTAL_SHARES {
            return Err(CeremonyError::BadFormat(format!(
                "total shares must be <= {MAX_TOTAL_SHARES}, got {}",
                config.total_shares
            )));
        }
        if self.keepers.len() != config.total_shares as usize {
            return Err(CeremonyError::BadFormat(format!(
                "keeper count ({}) does not match total shares ({})",
                self.keepers.len(),
                config.total_shares
            )));
        }

        let mut seen = [false; 256];
        for keeper in &self.keepers {
            if keeper.share_number == 0 {
                return Err(CeremonyError::BadFormat(format!(
                    "keeper {:?} has share number 0",
                    keeper.name
                )));
            }
            if seen[keeper.share_number as usize] {
                return Err(CeremonyError::BadFormat(format!(
                    "duplicate share number {}",
                    keeper.share_number
                )));
            }
            seen[keeper.share_number as usize] = true;
        }

        if self.master_secret_hash.is_empty() {
            return Err(CeremonyError::BadFormat(
                "missing master secret hash".to_string(),
            ));
        }

        Ok(())
    }
}
