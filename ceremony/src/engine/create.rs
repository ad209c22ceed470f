//! The create-shares state machine.
//!
//! ```text
//! ADMIN_BIND -> ORG_INFO -> PARAMS -> SECRET_ACQUIRE -> SPLIT
//!   -> COLLECT_KEEPERS -> [SELFTEST] -> EMIT -> DONE
//! ```
//!
//! The self-test is the gate that matters: when confirmation is required
//! (the default), every one of the first `threshold` keepers must re-type
//! their password and the decrypted shares must reconstruct the original
//! secret byte-for-byte *before* anything touches disk. A ceremony that
//! cannot prove its own output is recoverable is abandoned with no file
//! written — a shares file that fails recovery later is strictly worse
//! than no file at all.

use chrono::Utc;
use tracing::info;
use zeroize::Zeroizing;

use crate::crypto::envelope::{open_share, seal_share, EnvelopeError, ShareEnvelope};
use crate::crypto::hash::sha256_b64;
use crate::crypto::shamir::{self, Share};
use crate::crypto::SealedBytes;
use crate::error::CeremonyError;
use crate::journal::{event_types, file_timestamp, ShareCreationRecord};
use crate::model::{
    OrganizationInfo, SecretKeeperRecord, ShamirSecretOutput, ShareConfiguration, MAX_TOTAL_SHARES,
    OUTPUT_VERSION,
};
use crate::validation::{self, MAX_NAME_LENGTH, MAX_PHONE_LENGTH};

use super::{CeremonyEngine, CeremonyResult};

/// Password attempts per keeper during the self-test.
const SELFTEST_ATTEMPTS: u32 = 3;

/// Generated master secret length in bytes.
const GENERATED_SECRET_LEN: usize = 32;

impl CeremonyEngine {
    pub(super) async fn create_shares_inner(&mut self) -> Result<CeremonyResult, CeremonyError> {
        self.ensure_admin_bound().await?;

        // ORG_INFO
        let organization = self.acquire_org_info().await?;
        self.journal.organization = Some(organization.clone());
        self.journal.record(
            event_types::ORG_INFO_SET,
            format!("organization: {}", organization.name),
        );
        self.audit.record(
            event_types::ORG_INFO_SET,
            format!("organization: {}", organization.name),
        );
        self.progress("organization recorded", Some(10), "create");

        // PARAMS — threshold first, then total. The ordering is part of
        // the shell contract.
        let threshold = self
            .request_integer(
                "Reconstruction threshold (minimum keepers needed to recover)",
                2,
                MAX_TOTAL_SHARES as i64,
                "threshold must be between 2 and 100",
            )
            .await? as u8;
        let total = self
            .request_integer(
                &format!("Total number of shares ({threshold} to {MAX_TOTAL_SHARES})"),
                threshold as i64,
                MAX_TOTAL_SHARES as i64,
                "total shares must be between the threshold and 100",
            )
            .await? as u8;
        self.journal.record(
            event_types::PARAMS_SET,
            format!("threshold={threshold} total={total}"),
        );
        self.audit.record(
            event_types::PARAMS_SET,
            format!("threshold={threshold} total={total}"),
        );
        self.progress(
            &format!("parameters set: {threshold} of {total}"),
            Some(15),
            "create",
        );

        // SECRET_ACQUIRE
        let passes = self.config.security.secure_delete_passes;
        let generate = self
            .request_yes_no("Generate a random 256-bit master secret?")
            .await?;
        let secret = if generate {
            self.journal
                .record(event_types::SECRET_GENERATED, "random 32-byte secret generated");
            SealedBytes::random(GENERATED_SECRET_LEN, passes)
        } else {
            let supplied = self.request_secret("Master secret to split").await?;
            if supplied.is_empty() {
                self.validation(
                    false,
                    "empty secret supplied; substituting a freshly generated one",
                    "Master secret to split",
                );
                self.journal.record(
                    event_types::SECRET_GENERATED,
                    "empty input replaced by a random 32-byte secret",
                );
                SealedBytes::random(GENERATED_SECRET_LEN, passes)
            } else {
                self.journal
                    .record(event_types::SECRET_PROVIDED, "master secret supplied by operator");
                supplied
            }
        };
        let master_secret_hash = sha256_b64(secret.expose());
        self.progress("master secret acquired", Some(25), "create");

        // SPLIT
        let shares = shamir::split(secret.expose(), threshold as usize, total as usize)?;
        self.journal.record(
            event_types::SHARES_SPLIT,
            format!("secret split into {total} shares at threshold {threshold}"),
        );
        self.progress("secret split into shares", Some(30), "split");

        // COLLECT_KEEPERS
        let keepers = self.collect_keepers(&shares).await?;
        drop(shares); // plaintext share material: out of scope before emit

        // SELFTEST
        if self.config.security.confirmation_required {
            self.run_self_test(&keepers, threshold, &secret).await?;
        }

        // EMIT
        let output = ShamirSecretOutput {
            version: OUTPUT_VERSION.to_string(),
            session_id: self.session_id.clone(),
            created_at: Utc::now(),
            organization,
            configuration: ShareConfiguration::new(
                total,
                threshold,
                self.config.security.kdf_iterations,
            ),
            master_secret_hash: master_secret_hash.clone(),
            keepers,
        };

        let now = Utc::now();
        let path = self
            .session_dir
            .join(format!("secret_shares_{}.json", file_timestamp(now)));
        let json = serde_json::to_string_pretty(&output)
            .map_err(|e| CeremonyError::CryptoInternal(format!("output serialization: {e}")))?;
        // The one write that is allowed to fail the ceremony.
        std::fs::write(&path, json)?;

        self.journal.shares_created.push(ShareCreationRecord {
            created_at: now,
            total_shares: total,
            threshold_required: threshold,
            output_file: path.clone(),
            master_secret_hash,
        });
        self.journal.record(
            event_types::SHARES_FILE_WRITTEN,
            format!("shares file written: {}", path.display()),
        );
        self.audit.record(
            event_types::SHARES_FILE_WRITTEN,
            format!("shares file written: {}", path.display()),
        );

        // DONE — the sealed secret is dropped (and overwritten) here.
        drop(secret);
        self.journal.record(
            event_types::CREATE_COMPLETED,
            format!("{total} shares emitted at threshold {threshold}"),
        );
        self.progress("shares file emitted", Some(100), "create");
        info!(session_id = %self.session_id, total, threshold, "create-shares ceremony completed");

        Ok(
            CeremonyResult::success(format!("{total} shares created at threshold {threshold}"))
                .with_output_file(path)
                .with_shares(output),
        )
    }

    /// ORG_INFO: reuse the configured organization when offered and
    /// accepted, otherwise prompt for it.
    async fn acquire_org_info(&mut self) -> Result<OrganizationInfo, CeremonyError> {
        if let Some(name) = self.config.organization.name.clone() {
            let reuse = self
                .request_yes_no(&format!("Use configured organization {name:?}?"))
                .await?;
            if reuse {
                let contact_phone = match self.config.organization.contact_phone.clone() {
                    Some(phone) => phone,
                    None => {
                        self.request_text(
                            "Organization contact phone",
                            Some(validation::is_valid_phone),
                            MAX_PHONE_LENGTH,
                            "phone may contain digits, spaces, +, -, parentheses, with at least 3 consecutive digits",
                        )
                        .await?
                    }
                };
                return Ok(OrganizationInfo {
                    name,
                    contact_phone,
                });
            }
        }

        let name = self
            .request_text(
                "Organization name",
                Some(validation::is_valid_name),
                MAX_NAME_LENGTH,
                "name may contain letters, spaces, hyphens, apostrophes (max 100)",
            )
            .await?;
        let contact_phone = self
            .request_text(
                "Organization contact phone",
                Some(validation::is_valid_phone),
                MAX_PHONE_LENGTH,
                "phone may contain digits, spaces, +, -, parentheses, with at least 3 consecutive digits",
            )
            .await?;
        Ok(OrganizationInfo {
            name,
            contact_phone,
        })
    }

    /// COLLECT_KEEPERS: offer the configured defaults in preferred order,
    /// then prompt for the rest. Keeper `i` is paired with share `i` in
    /// emitted order, so the record's share number is the share's x.
    async fn collect_keepers(
        &mut self,
        shares: &[Share],
    ) -> Result<Vec<SecretKeeperRecord>, CeremonyError> {
        let total = shares.len();
        let iterations = self.config.security.kdf_iterations;
        let rules = self.config.security.password_rules();
        let mut records: Vec<SecretKeeperRecord> = Vec::with_capacity(total);

        for default in self.config.sorted_default_keepers() {
            if records.len() == total {
                break;
            }
            let enroll = self
                .request_yes_no(&format!(
                    "Enroll default keeper {} ({}, {})?",
                    default.name, default.phone, default.email
                ))
                .await?;
            if !enroll {
                continue;
            }

            let share = &shares[records.len()];
            let password = self
                .request_password(&format!("Password for keeper {}", default.name), &rules)
                .await?;
            let envelope = seal_share(share, &password, iterations)?;
            drop(password);

            self.enroll(&mut records, share.x, default.name, default.phone, default.email, envelope, total);
        }

        while records.len() < total {
            let position = records.len() + 1;
            let name = self
                .request_text(
                    &format!("Keeper {position} of {total}: name"),
                    Some(validation::is_valid_name),
                    MAX_NAME_LENGTH,
                    "name may contain letters, spaces, hyphens, apostrophes (max 100)",
                )
                .await?;
            let phone = self
                .request_text(
                    &format!("Keeper {position} of {total}: phone"),
                    Some(validation::is_valid_phone),
                    MAX_PHONE_LENGTH,
                    "phone may contain digits, spaces, +, -, parentheses, with at least 3 consecutive digits",
                )
                .await?;
            let email = self
                .request_text(
                    &format!("Keeper {position} of {total}: email"),
                    Some(validation::is_valid_email),
                    validation::MAX_EMAIL_LENGTH,
                    "email must look like name@domain.tld",
                )
                .await?;
            let password = self
                .request_password(&format!("Password for keeper {name}"), &rules)
                .await?;

            let share = &shares[records.len()];
            let envelope = seal_share(share, &password, iterations)?;
            drop(password);

            self.enroll(&mut records, share.x, name, phone, email, envelope, total);
        }

        Ok(records)
    }

    fn enroll(
        &mut self,
        records: &mut Vec<SecretKeeperRecord>,
        share_number: u8,
        name: String,
        phone: String,
        email: String,
        envelope: ShareEnvelope,
        total: usize,
    ) {
        self.journal.record(
            event_types::KEEPER_ENROLLED,
            format!("keeper {name} holds share {share_number}"),
        );
        self.audit.record(
            event_types::KEEPER_ENROLLED,
            format!("keeper {name} holds share {share_number}"),
        );
        records.push(SecretKeeperRecord::new(
            share_number,
            name,
            phone,
            email,
            envelope,
            &self.session_id,
        ));

        // 30..=60 across keeper collection, monotone.
        let percent = 30 + (30 * records.len() / total) as u8;
        self.progress(
            &format!("keeper {} of {total} enrolled", records.len()),
            Some(percent),
            "keepers",
        );
    }

    /// SELFTEST: the first `threshold` keepers must each decrypt their
    /// share (3 attempts apiece), and the combined shares must equal the
    /// original secret. Any failure abandons the ceremony before a file
    /// exists.
    async fn run_self_test(
        &mut self,
        records: &[SecretKeeperRecord],
        threshold: u8,
        secret: &SealedBytes,
    ) -> Result<(), CeremonyError> {
        let iterations = self.config.security.kdf_iterations;
        self.journal.record(
            event_types::SELFTEST_STARTED,
            format!("reconstruction self-test over the first {threshold} keepers"),
        );
        self.progress("reconstruction self-test starting", Some(65), "selftest");

        let mut collected: Vec<Share> = Vec::with_capacity(threshold as usize);
        for record in &records[..threshold as usize] {
            let mut opened = None;
            for attempt in 1..=SELFTEST_ATTEMPTS {
                let prompt = format!(
                    "Self-test: password for keeper {} (attempt {attempt} of {SELFTEST_ATTEMPTS})",
                    record.name
                );
                let password = self.request_secret(&prompt).await?;
                match open_share(&record.envelope(), &password, iterations) {
                    Ok(share) => {
                        self.validation(true, "share decrypted", &prompt);
                        opened = Some(share);
                        break;
                    }
                    Err(EnvelopeError::IntegrityFailure) => {
                        self.validation(false, "password rejected", &prompt);
                        self.audit.record(
                            event_types::SELFTEST_DECRYPT_FAILED,
                            format!(
                                "keeper {} failed decrypt attempt {attempt} of {SELFTEST_ATTEMPTS}",
                                record.name
                            ),
                        );
                    }
                    Err(other) => return Err(other.into()),
                }
            }

            let Some(share) = opened else {
                let message = format!(
                    "self-test abandoned: keeper {} could not decrypt their share in {SELFTEST_ATTEMPTS} attempts",
                    record.name
                );
                self.journal.record(event_types::SELFTEST_FAILED, &message);
                self.audit.record(event_types::SELFTEST_FAILED, &message);
                return Err(CeremonyError::Integrity(message));
            };
            collected.push(share);
        }

        let reconstructed = Zeroizing::new(shamir::combine(&collected, threshold as usize)?);
        drop(collected);

        if reconstructed.as_slice() != secret.expose() {
            let message = "self-test abandoned: reconstructed secret does not match the original";
            self.journal.record(event_types::SELFTEST_FAILED, message);
            self.audit.record(event_types::SELFTEST_FAILED, message);
            return Err(CeremonyError::Integrity(message.to_string()));
        }

        self.journal.record(
            event_types::SELFTEST_PASSED,
            "reconstruction self-test passed",
        );
        self.audit.record(
            event_types::SELFTEST_PASSED,
            "reconstruction self-test passed",
        );
        self.progress("reconstruction self-test passed", Some(90), "selftest");
        Ok(())
    }
}
