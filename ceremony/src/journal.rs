//! # Session Journal & Provenance
//!
//! Every ceremony run builds an append-only [`SessionJournal`] in memory:
//! who ran it, where, what happened, in what order. At finalize time the
//! journal is sealed — serialized once, hashed with SHA-256, and signed
//! with HMAC-SHA256 under the administrator session key — and wrapped in
//! a [`SessionOutput`] that lands next to the shares file.
//!
//! The seal gives tamper-evident non-repudiation: a third party who
//! knows the admin password can re-derive the session key (fixed salt,
//! same PBKDF2 parameters), re-serialize the journal, and check both the
//! hash and the HMAC. Byte-equal means the record is intact and was
//! witnessed by that administrator.
//!
//! Alongside the sealed journal, an audit trail is written in two forms:
//! a line-delimited log streamed *during* the ceremony (so a crash still
//! leaves evidence) and a structured JSON file at finalize. Audit IO
//! failures are logged and swallowed — a full disk must not be able to
//! fail a completed ceremony.

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::crypto::hash::{hmac_sha256_b64, hmac_sha256_verify, sha256_b64};
use crate::crypto::kdf::derive_admin_session_key;
use crate::crypto::SealedBytes;
use crate::error::CeremonyError;
use crate::model::OrganizationInfo;

/// HMAC algorithm identifier recorded in sealed sessions.
pub const HMAC_ALGORITHM: &str = "HMAC-SHA256";

/// Journal and audit event type tags. String constants rather than an
/// enum: the set grows with the ceremony flows and the files are read by
/// humans and external tooling, not round-tripped back into the engine.
pub mod event_types {
    pub const SESSION_START: &str = "SESSION_START";
    pub const SESSION_END: &str = "SESSION_END";
    pub const ADMIN_BOUND: &str = "ADMIN_BOUND";
    pub const ORG_INFO_SET: &str = "ORG_INFO_SET";
    pub const PARAMS_SET: &str = "PARAMS_SET";
    pub const SECRET_GENERATED: &str = "SECRET_GENERATED";
    pub const SECRET_PROVIDED: &str = "SECRET_PROVIDED";
    pub const SHARES_SPLIT: &str = "SHARES_SPLIT";
    pub const KEEPER_ENROLLED: &str = "KEEPER_ENROLLED";
    pub const SELFTEST_STARTED: &str = "SELFTEST_STARTED";
    pub const SELFTEST_PASSED: &str = "SELFTEST_PASSED";
    pub const SELFTEST_DECRYPT_FAILED: &str = "SELFTEST_DECRYPT_FAILED";
    pub const SELFTEST_FAILED: &str = "SELFTEST_FAILED";
    pub const SHARES_FILE_WRITTEN: &str = "SHARES_FILE_WRITTEN";
    pub const CREATE_COMPLETED: &str = "CREATE_COMPLETED";
    pub const RECOVERY_STARTED: &str = "RECOVERY_STARTED";
    pub const RECOVERY_SHARE_DECRYPTED: &str = "RECOVERY_SHARE_DECRYPTED";
    pub const RECOVERY_DECRYPT_FAILED: &str = "RECOVERY_DECRYPT_FAILED";
    pub const RECOVERY_COMPLETED: &str = "RECOVERY_COMPLETED";
    pub const RECOVERY_FAILED: &str = "RECOVERY_FAILED";
    pub const OPERATION_FAILED: &str = "OPERATION_FAILED";
    pub const OPERATION_CANCELLED: &str = "OPERATION_CANCELLED";
}

/// Timestamp fragment used in every emitted file name.
pub fn file_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

/// Machine and user identity stamped into the journal and audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostIdentity {
    /// Machine name, from the environment.
    pub machine: String,
    /// User name, from the environment.
    pub user: String,
}

impl HostIdentity {
    /// Best-effort identity from environment variables. "unknown" beats
    /// failing a ceremony over a missing variable.
    pub fn detect() -> Self {
        let machine = std::env::var("HOSTNAME")
            .or_else(|_| std::env::var("COMPUTERNAME"))
            .unwrap_or_else(|_| "unknown".to_string());
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string());
        Self { machine, user }
    }
}

/// One journal entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JournalEvent {
    /// When it happened.
    pub timestamp: DateTime<Utc>,
    /// Event type tag (see [`event_types`]).
    pub event_type: String,
    /// Human-readable description.
    pub description: String,
}

/// Record of one emitted shares file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ShareCreationRecord {
    /// When the file was written.
    pub created_at: DateTime<Utc>,
    /// Total shares in the set.
    pub total_shares: u8,
    /// Reconstruction threshold of the set.
    pub threshold_required: u8,
    /// Where the file was written.
    pub output_file: PathBuf,
    /// The set's master secret hash (base64 SHA-256).
    pub master_secret_hash: String,
}

/// Record of one reconstruction attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecoveryRecord {
    /// When the attempt concluded.
    pub attempted_at: DateTime<Utc>,
    /// Whether the secret was recovered and verified.
    pub success: bool,
    /// How many shares were successfully decrypted.
    pub shares_used: u8,
    /// Outcome summary.
    pub message: String,
}

/// Terminal summary computed at finalize.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SessionSummary {
    /// Sum of shares across all emitted share sets.
    pub total_shares_created: u32,
    /// Number of emitted share sets.
    pub total_share_sets: u32,
    /// Number of reconstruction attempts.
    pub total_recovery_attempts: u32,
    /// Reconstruction attempts that succeeded.
    pub successful_recoveries: u32,
    /// Reconstruction attempts that failed.
    pub failed_recoveries: u32,
    /// Total journal events, including the terminal one.
    pub total_events: u32,
}

/// The append-only record of one ceremony session.
///
/// Created at session init, appended to throughout, sealed exactly once
/// by [`SessionJournal::seal`]. Never mutated after sealing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SessionJournal {
    /// Ceremony session id.
    pub session_id: String,
    /// Session start.
    pub start_time: DateTime<Utc>,
    /// Session end; set by seal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Whole-second session duration; set by seal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i64>,
    /// Where the ceremony ran.
    pub host: HostIdentity,
    /// Witnessing organization, once known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<OrganizationInfo>,
    /// Ordered event log.
    pub events: Vec<JournalEvent>,
    /// Emitted share sets.
    pub shares_created: Vec<ShareCreationRecord>,
    /// Reconstruction attempts.
    pub shares_recovered: Vec<RecoveryRecord>,
    /// Terminal summary; set by seal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<SessionSummary>,
}

impl SessionJournal {
    /// Opens a journal for a new session and records SESSION_START.
    pub fn new(session_id: &str, host: HostIdentity) -> Self {
        let mut journal = Self {
            session_id: session_id.to_string(),
            start_time: Utc::now(),
            end_time: None,
            duration_seconds: None,
            host,
            organization: None,
            events: Vec::new(),
            shares_created: Vec::new(),
            shares_recovered: Vec::new(),
            summary: None,
        };
        journal.record(event_types::SESSION_START, "ceremony session opened");
        journal
    }

    /// Appends an event.
    pub fn record(&mut self, event_type: &str, description: impl Into<String>) {
        self.events.push(JournalEvent {
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            description: description.into(),
        });
    }

    /// Seals the journal under the admin session key and returns the
    /// wrapper to persist. Consumes nothing; the journal itself is left
    /// in its sealed (terminal) state.
    pub fn seal(&mut self, admin_key: &SealedBytes) -> Result<SessionOutput, CeremonyError> {
        let end = Utc::now();
        self.end_time = Some(end);
        self.duration_seconds = Some((end - self.start_time).num_seconds());
        self.record(event_types::SESSION_END, "ceremony session closed");

        self.summary = Some(SessionSummary {
            total_shares_created: self
                .shares_created
                .iter()
                .map(|r| r.total_shares as u32)
                .sum(),
            total_share_sets: self.shares_created.len() as u32,
            total_recovery_attempts: self.shares_recovered.len() as u32,
            successful_recoveries: self.shares_recovered.iter().filter(|r| r.success).count()
                as u32,
            failed_recoveries: self.shares_recovered.iter().filter(|r| !r.success).count() as u32,
            total_events: self.events.len() as u32,
        });

        let canonical = serde_json::to_vec(self)
            .map_err(|e| CeremonyError::CryptoInternal(format!("journal serialization: {e}")))?;

        Ok(SessionOutput {
            session_data: self.clone(),
            session_data_hash: sha256_b64(&canonical),
            admin_session_hmac: hmac_sha256_b64(admin_key.expose(), &canonical),
            hmac_algorithm: HMAC_ALGORITHM.to_string(),
            signature_timestamp: Utc::now(),
            signature_note:
                "HMAC-SHA256 over the canonical session data under the administrator session key"
                    .to_string(),
        })
    }
}

/// Outcome of re-checking a sealed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SealVerification {
    /// The stored hash matches the re-serialized session data.
    pub hash_valid: bool,
    /// The stored HMAC verifies under the re-derived admin key.
    pub hmac_valid: bool,
}

impl SealVerification {
    /// True when both checks pass.
    pub fn is_intact(&self) -> bool {
        self.hash_valid && self.hmac_valid
    }
}

/// A sealed session: the journal plus its hash and admin HMAC.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SessionOutput {
    /// The sealed journal.
    pub session_data: SessionJournal,
    /// base64(SHA-256(canonical session data)).
    pub session_data_hash: String,
    /// base64(HMAC-SHA256(admin session key, canonical session data)).
    pub admin_session_hmac: String,
    /// Always [`HMAC_ALGORITHM`].
    pub hmac_algorithm: String,
    /// When the seal was computed.
    pub signature_timestamp: DateTime<Utc>,
    /// Human-readable note on what the signature covers.
    pub signature_note: String,
}

impl SessionOutput {
    /// Parses a sealed session file.
    pub fn from_json_file(path: &Path) -> Result<Self, CeremonyError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CeremonyError::BadFormat(format!("cannot read session file: {e}")))?;
        serde_json::from_str(&raw)
            .map_err(|e| CeremonyError::BadFormat(format!("session file JSON: {e}")))
    }

    /// Third-party verification: re-serialize the embedded journal,
    /// re-check the hash, re-derive the admin key from the password, and
    /// re-check the HMAC.
    pub fn verify(
        &self,
        admin_password: &SealedBytes,
        kdf_iterations: u32,
    ) -> Result<SealVerification, CeremonyError> {
        let canonical = serde_json::to_vec(&self.session_data)
            .map_err(|e| CeremonyError::CryptoInternal(format!("journal serialization: {e}")))?;

        let hash_valid = sha256_b64(&canonical) == self.session_data_hash;

        let admin_key = derive_admin_session_key(admin_password, kdf_iterations, 1);
        let stored_hmac = BASE64
            .decode(&self.admin_session_hmac)
            .map_err(|e| CeremonyError::BadFormat(format!("AdminSessionHmac base64: {e}")))?;
        let hmac_valid = hmac_sha256_verify(admin_key.expose(), &canonical, &stored_hmac);

        Ok(SealVerification {
            hash_valid,
            hmac_valid,
        })
    }
}

/// One audit trail entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuditEntry {
    /// When it happened.
    pub timestamp: DateTime<Utc>,
    /// Session the entry belongs to.
    pub session_id: String,
    /// Event type tag.
    pub event_type: String,
    /// Acting user.
    pub user: String,
    /// Machine the ceremony ran on.
    pub machine: String,
    /// Free-form message.
    pub message: String,
}

impl AuditEntry {
    /// The line-delimited form streamed to the audit log file.
    pub fn format_line(&self) -> String {
        format!(
            "{} | {} | {} | {}@{} | {}",
            self.timestamp.to_rfc3339(),
            self.session_id,
            self.event_type,
            self.user,
            self.machine,
            self.message
        )
    }
}

/// The audit trail for one session: entries in memory, streamed to a
/// line-delimited file as they happen.
#[derive(Debug)]
pub struct AuditLog {
    enabled: bool,
    session_id: String,
    host: HostIdentity,
    log_path: PathBuf,
    entries: Vec<AuditEntry>,
}

impl AuditLog {
    /// Opens the audit trail inside a session folder. Nothing is written
    /// until the first entry.
    pub fn new(
        session_dir: &Path,
        session_id: &str,
        host: HostIdentity,
        enabled: bool,
        opened_at: DateTime<Utc>,
    ) -> Self {
        Self {
            enabled,
            session_id: session_id.to_string(),
            host,
            log_path: session_dir.join(format!("audit_{}.log", file_timestamp(opened_at))),
            entries: Vec::new(),
        }
    }

    /// Records an entry and appends its line to the log file. File
    /// failures are logged and swallowed — audit IO must never fail a
    /// ceremony.
    pub fn record(&mut self, event_type: &str, message: impl Into<String>) {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            session_id: self.session_id.clone(),
            event_type: event_type.to_string(),
            user: self.host.user.clone(),
            machine: self.host.machine.clone(),
            message: message.into(),
        };

        if self.enabled {
            if let Err(e) = self.append_line(&entry.format_line()) {
                warn!(error = %e, path = %self.log_path.display(), "audit log write failed");
            }
        }
        self.entries.push(entry);
    }

    fn append_line(&self, line: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        writeln!(file, "{line}")
    }

    /// All entries recorded so far.
    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    /// Path of the line-delimited log file.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Writes the structured `audit_detail_<ts>.json` file. Failures are
    /// logged and swallowed, same as the line log.
    pub fn write_detail(&self, session_dir: &Path, at: DateTime<Utc>) -> Option<PathBuf> {
        if !self.enabled {
            return None;
        }
        let path = session_dir.join(format!("audit_detail_{}.json", file_timestamp(at)));
        match serde_json::to_string_pretty(&self.entries) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&path, json) {
                    warn!(error = %e, path = %path.display(), "audit detail write failed");
                    return None;
                }
                Some(path)
            }
            Err(e) => {
                warn!(error = %e, "audit detail serialization failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> HostIdentity {
        HostIdentity {
            machine: "vault-01".into(),
            user: "ceremony-admin".into(),
        }
    }

    fn admin_key() -> SealedBytes {
        SealedBytes::new(vec![7u8; 32], 1)
    }

    #[test]
    fn seal_produces_verifiable_output() {
        let mut journal = SessionJournal::new("session-abc", host());
        journal.record(event_types::PARAMS_SET, "threshold=2 total=3");
        let sealed = journal.seal(&admin_key()).unwrap();

        // The hash must match a fresh serialization of the sealed data.
        let canonical = serde_json::to_vec(&sealed.session_data).unwrap();
        assert_eq!(sealed.session_data_hash, sha256_b64(&canonical));
        assert_eq!(sealed.hmac_algorithm, "HMAC-SHA256");
    }

    #[test]
    fn seal_stamps_end_time_duration_and_summary() {
        let mut journal = SessionJournal::new("session-abc", host());
        journal.shares_created.push(ShareCreationRecord {
            created_at: Utc::now(),
            total_shares: 5,
            threshold_required: 3,
            output_file: PathBuf::from("shares.json"),
            master_secret_hash: "h".into(),
        });
        journal.shares_recovered.push(RecoveryRecord {
            attempted_at: Utc::now(),
            success: true,
            shares_used: 3,
            message: "ok".into(),
        });
        journal.shares_recovered.push(RecoveryRecord {
            attempted_at: Utc::now(),
            success: false,
            shares_used: 1,
            message: "too many failures".into(),
        });

        let sealed = journal.seal(&admin_key()).unwrap();
        let summary = sealed.session_data.summary.as_ref().unwrap();
        assert_eq!(summary.total_shares_created, 5);
        assert_eq!(summary.total_share_sets, 1);
        assert_eq!(summary.total_recovery_attempts, 2);
        assert_eq!(summary.successful_recoveries, 1);
        assert_eq!(summary.failed_recoveries, 1);
        assert_eq!(
            summary.total_events as usize,
            sealed.session_data.events.len()
        );

        assert!(sealed.session_data.end_time.is_some());
        assert!(sealed.session_data.duration_seconds.is_some());
        let last = sealed.session_data.events.last().unwrap();
        assert_eq!(last.event_type, event_types::SESSION_END);
    }

    #[test]
    fn verify_round_trip_with_admin_password() {
        let password = SealedBytes::from_string("Witness-Passw0rd!".into(), 1);
        let key = derive_admin_session_key(&password, 10_000, 1);

        let mut journal = SessionJournal::new("session-xyz", host());
        let sealed = journal.seal(&key).unwrap();

        let verification = sealed.verify(&password, 10_000).unwrap();
        assert!(verification.hash_valid);
        assert!(verification.hmac_valid);
        assert!(verification.is_intact());
    }

    #[test]
    fn tampering_session_data_breaks_both_checks() {
        let password = SealedBytes::from_string("Witness-Passw0rd!".into(), 1);
        let key = derive_admin_session_key(&password, 10_000, 1);

        let mut journal = SessionJournal::new("session-xyz", host());
        let mut sealed = journal.seal(&key).unwrap();
        sealed.session_data.session_id.push('X');

        let verification = sealed.verify(&password, 10_000).unwrap();
        assert!(!verification.hash_valid);
        assert!(!verification.hmac_valid);
    }

    #[test]
    fn wrong_admin_password_fails_only_the_hmac() {
        let password = SealedBytes::from_string("Witness-Passw0rd!".into(), 1);
        let key = derive_admin_session_key(&password, 10_000, 1);

        let mut journal = SessionJournal::new("session-xyz", host());
        let sealed = journal.seal(&key).unwrap();

        let impostor = SealedBytes::from_string("not-the-witness".into(), 1);
        let verification = sealed.verify(&impostor, 10_000).unwrap();
        assert!(verification.hash_valid);
        assert!(!verification.hmac_valid);
    }

    #[test]
    fn sealed_file_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let password = SealedBytes::from_string("Witness-Passw0rd!".into(), 1);
        let key = derive_admin_session_key(&password, 10_000, 1);

        let mut journal = SessionJournal::new("session-disk", host());
        journal.record(event_types::SHARES_SPLIT, "split into 3 shares");
        let sealed = journal.seal(&key).unwrap();

        let path = dir.path().join("session_complete.json");
        std::fs::write(&path, serde_json::to_string_pretty(&sealed).unwrap()).unwrap();

        let loaded = SessionOutput::from_json_file(&path).unwrap();
        assert!(loaded.verify(&password, 10_000).unwrap().is_intact());
    }

    #[test]
    fn audit_line_format() {
        let entry = AuditEntry {
            timestamp: DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            session_id: "s-1".into(),
            event_type: "SESSION_START".into(),
            user: "alice".into(),
            machine: "vault-01".into(),
            message: "ceremony session opened".into(),
        };
        assert_eq!(
            entry.format_line(),
            "2026-03-01T12:00:00+00:00 | s-1 | SESSION_START | alice@vault-01 | ceremony session opened"
        );
    }

    #[test]
    fn audit_log_streams_lines_incrementally() {
        let dir = tempfile::tempdir().unwrap();
        let mut audit = AuditLog::new(dir.path(), "s-1", host(), true, Utc::now());

        audit.record("SESSION_START", "opened");
        audit.record("PARAMS_SET", "threshold=2 total=3");

        let contents = std::fs::read_to_string(audit.log_path()).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("SESSION_START"));
        assert!(lines[1].contains("PARAMS_SET"));
        assert_eq!(audit.entries().len(), 2);
    }

    #[test]
    fn disabled_audit_keeps_entries_but_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut audit = AuditLog::new(dir.path(), "s-1", host(), false, Utc::now());
        audit.record("SESSION_START", "opened");

        assert!(!audit.log_path().exists());
        assert_eq!(audit.entries().len(), 1);
        assert!(audit.write_detail(dir.path(), Utc::now()).is_none());
    }

    #[test]
    fn audit_detail_contains_all_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut audit = AuditLog::new(dir.path(), "s-1", host(), true, Utc::now());
        audit.record("A", "first");
        audit.record("B", "second");

        let path = audit.write_detail(dir.path(), Utc::now()).unwrap();
        let parsed: Vec<AuditEntry> =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].event_type, "A");
        assert_eq!(parsed[1].event_type, "B");
    }

    #[test]
    fn file_timestamp_shape() {
        let at = DateTime::parse_from_rfc3339("2026-03-01T09:05:07Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(file_timestamp(at), "20260301_090507");
    }
}
