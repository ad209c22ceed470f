//! The reconstruct state machine.
//!
//! ```text
//! ADMIN_BIND -> LOAD_FILE -> GATHER_SHARES -> COMBINE -> VERIFY -> DONE
//! ```
//!
//! Gathering loops until `threshold` distinct shares decrypt, or ten
//! cumulative decryption failures abort the attempt. Every failed
//! decrypt is journaled individually — a reconstruction that ran into
//! resistance leaves exactly that evidence behind, which is the point of
//! the journal. A verified mismatch against the recorded master hash is
//! an operation failure but not a journal failure: the session still
//! seals cleanly, recording that the attempt happened.
//!
//! Reconstruction always uses the KDF iteration count stored in the
//! shares file, never the current configuration — the file describes how
//! its own envelopes were sealed.

use std::path::Path;

use chrono::Utc;
use tracing::info;
use zeroize::Zeroizing;

use crate::crypto::envelope::{open_share, EnvelopeError};
use crate::crypto::hash::sha256_b64;
use crate::crypto::shamir::{self, Share};
use crate::error::CeremonyError;
use crate::journal::{event_types, RecoveryRecord};
use crate::model::ShamirSecretOutput;

use super::{CeremonyEngine, CeremonyResult};

/// Cumulative decryption failures before the attempt is aborted.
const MAX_DECRYPT_FAILURES: u32 = 10;

impl CeremonyEngine {
    pub(super) async fn reconstruct_inner(
        &mut self,
        shares_file: Option<&Path>,
    ) -> Result<CeremonyResult, CeremonyError> {
        self.ensure_admin_bound().await?;
        self.journal
            .record(event_types::RECOVERY_STARTED, "reconstruction started");
        self.audit
            .record(event_types::RECOVERY_STARTED, "reconstruction started");

        // LOAD_FILE
        let path = match shares_file {
            Some(path) => path.to_path_buf(),
            None => {
                self.request_file_path("Path to the shares file", "json")
                    .await?
            }
        };
        let output = ShamirSecretOutput::from_json_file(&path)?;
        let threshold = output.configuration.threshold_required as usize;
        // File-supplied count, not the current configuration.
        let iterations = output.configuration.kdf_iterations;
        self.progress(
            &format!(
                "loaded shares file: {} keepers, threshold {threshold}",
                output.keepers.len()
            ),
            Some(10),
            "recovery",
        );

        // GATHER_SHARES
        let mut used = vec![false; output.keepers.len()];
        let mut collected: Vec<Share> = Vec::with_capacity(threshold);
        let mut failures: u32 = 0;

        while collected.len() < threshold {
            let remaining: Vec<String> = output
                .keepers
                .iter()
                .enumerate()
                .filter(|(i, _)| !used[*i])
                .map(|(i, k)| format!("{}: {} (share {})", i + 1, k.name, k.share_number))
                .collect();
            self.progress(
                &format!(
                    "{} of {threshold} shares decrypted; remaining keepers: {}",
                    collected.len(),
                    remaining.join(", ")
                ),
                None,
                "recovery",
            );

            let choice = self
                .request_integer(
                    &format!(
                        "Keeper to decrypt next (1-{}, 0 cancels)",
                        output.keepers.len()
                    ),
                    0,
                    output.keepers.len() as i64,
                    "enter a listed keeper number, or 0 to cancel",
                )
                .await?;
            if choice == 0 {
                return Err(CeremonyError::Cancelled);
            }

            let index = (choice - 1) as usize;
            if used[index] {
                self.validation(
                    false,
                    "that keeper's share is already decrypted; pick another",
                    "keeper selection",
                );
                continue;
            }

            let keeper = &output.keepers[index];
            let password = self
                .request_secret(&format!("Password for keeper {}", keeper.name))
                .await?;

            match open_share(&keeper.envelope(), &password, iterations) {
                Ok(share) => {
                    used[index] = true;
                    self.validation(true, "share decrypted", "keeper password");
                    self.journal.record(
                        event_types::RECOVERY_SHARE_DECRYPTED,
                        format!("keeper {} share {} decrypted", keeper.name, keeper.share_number),
                    );
                    self.audit.record(
                        event_types::RECOVERY_SHARE_DECRYPTED,
                        format!("keeper {} share {} decrypted", keeper.name, keeper.share_number),
                    );
                    collected.push(share);
                }
                Err(EnvelopeError::IntegrityFailure) => {
                    failures += 1;
                    let message = format!(
                        "keeper {} decrypt failed ({failures} of {MAX_DECRYPT_FAILURES} allowed)",
                        keeper.name
                    );
                    self.validation(false, &message, "keeper password");
                    self.journal
                        .record(event_types::RECOVERY_DECRYPT_FAILED, &message);
                    self.audit
                        .record(event_types::RECOVERY_DECRYPT_FAILED, &message);

                    if failures >= MAX_DECRYPT_FAILURES {
                        self.record_recovery_failure(
                            collected.len() as u8,
                            "too many failed decryption attempts",
                        );
                        return Err(CeremonyError::TooManyAttempts(failures));
                    }
                }
                Err(other) => return Err(other.into()),
            }
        }

        // COMBINE
        self.progress("combining shares", Some(80), "recovery");
        let reconstructed = Zeroizing::new(shamir::combine(&collected, threshold)?);
        drop(collected);

        // VERIFY
        if sha256_b64(&reconstructed) != output.master_secret_hash {
            // The Zeroizing buffer is wiped on this early return.
            self.record_recovery_failure(
                threshold as u8,
                "reconstructed secret hash doesn't match the recorded master hash",
            );
            return Err(CeremonyError::Integrity(
                "reconstructed secret hash doesn't match".to_string(),
            ));
        }

        self.journal.shares_recovered.push(RecoveryRecord {
            attempted_at: Utc::now(),
            success: true,
            shares_used: threshold as u8,
            message: "secret reconstructed and verified".to_string(),
        });
        self.journal.record(
            event_types::RECOVERY_COMPLETED,
            "secret reconstructed and hash-verified",
        );
        self.audit.record(
            event_types::RECOVERY_COMPLETED,
            "secret reconstructed and hash-verified",
        );
        self.progress("secret reconstructed and verified", Some(100), "recovery");
        info!(session_id = %self.session_id, threshold, "reconstruction completed");

        Ok(CeremonyResult::success("secret reconstructed and verified")
            .with_secret(reconstructed))
    }

    fn record_recovery_failure(&mut self, shares_used: u8, message: &str) {
        self.journal.shares_recovered.push(RecoveryRecord {
            attempted_at: Utc::now(),
            success: false,
            shares_used,
            message: message.to_string(),
        });
        self.journal.record(event_types::RECOVERY_FAILED, message);
        self.audit.record(event_types::RECOVERY_FAILED, message);
    }
}
