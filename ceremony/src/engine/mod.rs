//! # Ceremony Orchestrator
//!
//! [`CeremonyEngine`] drives the two ceremonies — create-shares and
//! reconstruct — plus session finalization. It owns the session journal
//! and audit trail exclusively; one engine instance is one session, and
//! concurrent ceremonies take independent instances (there is not a
//! single lock in here, by design).
//!
//! The engine never reads input directly. Every prompt goes out as an
//! input-request event with a one-shot reply handle, and the operation
//! suspends until the shell answers. Crypto work is synchronous and
//! non-interruptible; the only suspension points are those handles.
//!
//! Every public operation resolves to a [`CeremonyResult`] — errors are
//! caught at the operation boundary, recorded in the journal and audit
//! trail, surfaced as a failed completion event, and never escape as
//! panics. A failed create leaves no shares file behind, ever.

mod create;
mod input;
mod reconstruct;

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::config::CeremonyConfig;
use crate::crypto::kdf::derive_admin_session_key;
use crate::crypto::SealedBytes;
use crate::error::CeremonyError;
use crate::events::{CeremonyEvent, EventSender, OperationKind};
use crate::journal::{event_types, file_timestamp, AuditLog, HostIdentity, SessionJournal};
use crate::model::ShamirSecretOutput;

/// Structured outcome of one engine operation.
#[derive(Debug)]
pub struct CeremonyResult {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Outcome summary, suitable for display.
    pub message: String,
    /// Path of the file the operation emitted, if any.
    pub output_file: Option<PathBuf>,
    /// The shares data a successful create emitted.
    pub shares_data: Option<ShamirSecretOutput>,
    /// The recovered secret from a successful reconstruct. Zeroized when
    /// the caller drops it.
    pub reconstructed_secret: Option<Zeroizing<Vec<u8>>>,
}

impl CeremonyResult {
    fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            output_file: None,
            shares_data: None,
            reconstructed_secret: None,
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            output_file: None,
            shares_data: None,
            reconstructed_secret: None,
        }
    }

    fn with_output_file(mut self, path: PathBuf) -> Self {
        self.output_file = Some(path);
        self
    }

    fn with_shares(mut self, shares: ShamirSecretOutput) -> Self {
        self.shares_data = Some(shares);
        self
    }

    fn with_secret(mut self, secret: Zeroizing<Vec<u8>>) -> Self {
        self.reconstructed_secret = Some(secret);
        self
    }
}

/// The ceremony engine. One instance per session; operations must not
/// run concurrently on the same instance (each takes `&mut self`, so the
/// borrow checker enforces exactly that).
pub struct CeremonyEngine {
    config: CeremonyConfig,
    events: EventSender,
    session_id: String,
    session_dir: PathBuf,
    journal: SessionJournal,
    audit: AuditLog,
    admin_key: Option<SealedBytes>,
    finalized: bool,
}

impl CeremonyEngine {
    /// Builds an engine for a new session: validates the configuration,
    /// creates the exclusive session folder, and opens the journal and
    /// audit trail.
    pub fn new(config: CeremonyConfig, events: EventSender) -> Result<Self, CeremonyError> {
        config
            .validate()
            .map_err(|e| CeremonyError::Validation(e.to_string()))?;

        let session_id = Uuid::new_v4().to_string();
        let session_dir = config
            .file_system
            .output_folder
            .join(format!("session_{session_id}"));
        std::fs::create_dir_all(&session_dir)?;

        let host = HostIdentity::detect();
        let journal = SessionJournal::new(&session_id, host.clone());
        let mut audit = AuditLog::new(
            &session_dir,
            &session_id,
            host,
            config.security.audit_log_enabled,
            Utc::now(),
        );
        audit.record(event_types::SESSION_START, "ceremony session opened");

        info!(session_id = %session_id, dir = %session_dir.display(), "ceremony session opened");

        Ok(Self {
            config,
            events,
            session_id,
            session_dir,
            journal,
            audit,
            admin_key: None,
            finalized: false,
        })
    }

    /// This session's id.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// This session's exclusive output folder.
    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    /// Read access to the journal, mainly for tests and shells that
    /// display session state.
    pub fn journal(&self) -> &SessionJournal {
        &self.journal
    }

    /// Runs the create-shares ceremony.
    pub async fn create_shares(&mut self) -> CeremonyResult {
        self.progress("create-shares ceremony starting", Some(0), "create");
        match self.create_shares_inner().await {
            Ok(result) => {
                self.completed(OperationKind::CreateShares, true, &result.message);
                result
            }
            Err(err) => self.fail_operation(OperationKind::CreateShares, err),
        }
    }

    /// Runs the reconstruct ceremony. When `shares_file` is `None` the
    /// path is requested interactively.
    pub async fn reconstruct_secret(&mut self, shares_file: Option<&Path>) -> CeremonyResult {
        self.progress("reconstruction ceremony starting", Some(0), "recovery");
        match self.reconstruct_inner(shares_file).await {
            Ok(result) => {
                self.completed(OperationKind::ReconstructSecret, true, &result.message);
                result
            }
            Err(err) => self.fail_operation(OperationKind::ReconstructSecret, err),
        }
    }

    /// Seals the journal and writes the session artifacts: the sealed
    /// session file, the structured audit detail, and the folder README.
    ///
    /// Write failures here are logged and swallowed — the ceremony
    /// outcome is already decided and an unwritable journal must not
    /// change it. The admin session key is consumed and zeroized.
    pub async fn finalize_session(&mut self) -> CeremonyResult {
        match self.finalize_inner().await {
            Ok(result) => {
                self.completed(OperationKind::FinalizeSession, true, &result.message);
                result
            }
            Err(err) => self.fail_operation(OperationKind::FinalizeSession, err),
        }
    }

    async fn finalize_inner(&mut self) -> Result<CeremonyResult, CeremonyError> {
        if self.finalized {
            return Err(CeremonyError::Validation(
                "session is already finalized".to_string(),
            ));
        }
        self.ensure_admin_bound().await?;
        let admin_key = self
            .admin_key
            .take()
            .ok_or_else(|| CeremonyError::CryptoInternal("admin session key missing".into()))?;

        self.audit
            .record(event_types::SESSION_END, "ceremony session closed");

        let sealed = self.journal.seal(&admin_key)?;
        drop(admin_key); // multi-pass overwrite happens here

        let now = Utc::now();
        let session_path = self
            .session_dir
            .join(format!("session_complete_{}.json", file_timestamp(now)));
        match serde_json::to_string_pretty(&sealed) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&session_path, json) {
                    warn!(error = %e, path = %session_path.display(), "session file write failed");
                }
            }
            Err(e) => warn!(error = %e, "session output serialization failed"),
        }

        self.audit.write_detail(&self.session_dir, now);
        self.write_readme();
        self.finalized = true;

        info!(session_id = %self.session_id, "session finalized and sealed");
        Ok(CeremonyResult::success("session finalized").with_output_file(session_path))
    }

    /// Binds the administrator witness: requests the admin password and
    /// derives the session HMAC key from it. The password itself is
    /// dropped (and overwritten) the moment derivation completes.
    pub(crate) async fn ensure_admin_bound(&mut self) -> Result<(), CeremonyError> {
        if self.admin_key.is_some() {
            return Ok(());
        }

        for _ in 0..input::INPUT_ATTEMPTS {
            let password = self
                .request_secret("Administrator session password")
                .await?;
            if password.is_empty() {
                self.validation(false, "password must not be empty", "Administrator session password");
                continue;
            }

            let key = derive_admin_session_key(
                &password,
                self.config.security.kdf_iterations,
                self.config.security.secure_delete_passes,
            );
            drop(password);

            self.admin_key = Some(key);
            self.journal
                .record(event_types::ADMIN_BOUND, "administrator session key derived");
            self.audit
                .record(event_types::ADMIN_BOUND, "administrator session key derived");
            self.progress("administrator bound to session", Some(5), "admin");
            return Ok(());
        }

        Err(CeremonyError::Validation(
            "administrator password required".to_string(),
        ))
    }

    fn fail_operation(&mut self, operation: OperationKind, err: CeremonyError) -> CeremonyResult {
        let (event_type, message) = if err.is_cancellation() {
            (
                event_types::OPERATION_CANCELLED,
                format!("{operation} cancelled by user"),
            )
        } else {
            (event_types::OPERATION_FAILED, format!("{operation} failed: {err}"))
        };

        warn!(operation = %operation, error = %err, "operation did not complete");
        self.journal.record(event_type, &message);
        self.audit.record(event_type, &message);
        self.completed(operation, false, &message);
        CeremonyResult::failure(message)
    }

    fn write_readme(&self) {
        let content = format!(
            "Keyward ceremony session {id}\n\
             Started {start} by {user}@{machine}\n\
             \n\
             Contents of this folder:\n\
             \n\
             secret_shares_<ts>.json    encrypted share sets emitted by create ceremonies\n\
             session_complete_<ts>.json sealed session journal (SHA-256 + admin HMAC)\n\
             audit_<ts>.log             line-delimited audit trail, written live\n\
             audit_detail_<ts>.json     structured audit trail, written at finalize\n\
             \n\
             Verify the seal with: keyward verify <session_complete file>\n",
            id = self.session_id,
            start = self.journal.start_time.to_rfc3339(),
            user = self.journal.host.user,
            machine = self.journal.host.machine,
        );
        if let Err(e) = std::fs::write(self.session_dir.join("README.txt"), content) {
            warn!(error = %e, "session README write failed");
        }
    }

    // -----------------------------------------------------------------------
    // Event emission
    // -----------------------------------------------------------------------

    pub(crate) fn emit(&self, event: CeremonyEvent) {
        // A dropped receiver is handled at the next suspension point; a
        // fire-and-forget event going nowhere is not an error.
        let _ = self.events.send(event);
    }

    pub(crate) fn progress(&self, message: &str, percent: Option<u8>, event_type: &str) {
        self.emit(CeremonyEvent::Progress {
            message: message.to_string(),
            percent,
            event_type: event_type.to_string(),
        });
    }

    pub(crate) fn validation(&self, is_valid: bool, message: &str, target: &str) {
        self.emit(CeremonyEvent::ValidationResult {
            is_valid,
            message: message.to_string(),
            target: target.to_string(),
        });
    }

    fn completed(&self, operation: OperationKind, success: bool, message: &str) {
        self.emit(CeremonyEvent::OperationCompleted {
            operation,
            success,
            message: message.to_string(),
        });
    }
}
