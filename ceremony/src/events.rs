//! # Event Surface
//!
//! The engine never touches a terminal. Every state transition goes out
//! as a [`CeremonyEvent`] on an unbounded channel, and every piece of
//! user input comes back through a one-shot reply handle carried inside
//! an [`InputRequest`]. Whatever drives the engine — the bundled console
//! shell, a test harness, something else — owns the other end.
//!
//! Delivery is strictly in issue order within one operation (a plain
//! mpsc channel guarantees that). Progress and validation events are
//! fire-and-forget; input requests block the operation until the shell
//! fulfills or fails the handle. Timeouts are the shell's problem by
//! design: a ceremony waiting overnight for a keeper to walk to the
//! terminal is a feature, not a hang.
//!
//! If the shell drops the receiving end, pending input requests resolve
//! as abandoned and the operation unwinds cleanly — the engine never
//! blocks on a dead channel.

use std::path::PathBuf;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::crypto::SealedBytes;

/// Sending half handed to the engine at construction.
pub type EventSender = mpsc::UnboundedSender<CeremonyEvent>;

/// Receiving half owned by the shell.
pub type EventReceiver = mpsc::UnboundedReceiver<CeremonyEvent>;

/// Creates the event channel pair for one engine instance.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// The public operations, used to tag progress and completion events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// `create_shares()`
    CreateShares,
    /// `reconstruct_secret()`
    ReconstructSecret,
    /// `finalize_session()`
    FinalizeSession,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OperationKind::CreateShares => "create_shares",
            OperationKind::ReconstructSecret => "reconstruct_secret",
            OperationKind::FinalizeSession => "finalize_session",
        };
        f.write_str(name)
    }
}

/// Everything the engine emits.
#[derive(Debug)]
pub enum CeremonyEvent {
    /// Advisory progress. Percent is monotone within one operation when
    /// present.
    Progress {
        /// Human-readable progress line.
        message: String,
        /// 0–100 when the operation has a meaningful notion of progress.
        percent: Option<u8>,
        /// Coarse category tag (e.g. `"split"`, `"selftest"`).
        event_type: String,
    },

    /// The engine needs input; the shell must eventually fulfill or fail
    /// the embedded handle.
    InputRequested(InputRequest),

    /// Informational validation outcome for the last supplied value.
    ValidationResult {
        /// Whether the value was accepted.
        is_valid: bool,
        /// What was wrong (or confirmation of acceptance).
        message: String,
        /// Which prompt/field the result refers to.
        target: String,
    },

    /// Exactly one per public operation call.
    OperationCompleted {
        /// Which operation finished.
        operation: OperationKind,
        /// Whether it succeeded.
        success: bool,
        /// Outcome summary for display.
        message: String,
    },
}

/// The kind of value an input request expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Free text, possibly validated.
    Text,
    /// Sensitive text: passwords, master secrets. Shells must not echo.
    SecretText,
    /// Bounded integer.
    Integer,
    /// Path to an existing file.
    FilePath,
    /// Yes/no confirmation.
    YesNo,
}

/// Kind-specific constraints carried alongside the prompt.
#[derive(Debug)]
pub enum InputConstraints {
    /// Free text with an optional validator the shell may run for early
    /// feedback. The engine re-checks regardless.
    Text {
        /// Maximum accepted length in bytes.
        max_length: usize,
        /// Validator to apply; `None` accepts anything non-empty.
        validator: Option<fn(&str) -> bool>,
        /// Message to show when the validator rejects.
        error_message: String,
    },
    /// Sensitive text. No constraints are published; complexity checks
    /// happen engine-side so the policy cannot be bypassed.
    SecretText,
    /// Integer in `min_value..=max_value`.
    Integer {
        /// Inclusive lower bound.
        min_value: i64,
        /// Inclusive upper bound.
        max_value: i64,
        /// Message to show for out-of-range or unparseable values.
        error_message: String,
    },
    /// Path to an existing file with the given extension.
    FilePath {
        /// Required file extension, without the dot (e.g. `"json"`).
        expected_extension: String,
    },
    /// Yes/no, prompt only.
    YesNo,
}

/// A value supplied by the shell in reply to an input request.
#[derive(Debug)]
pub enum InputValue {
    /// Reply to [`InputKind::Text`].
    Text(String),
    /// Reply to [`InputKind::SecretText`], already sealed.
    Secret(SealedBytes),
    /// Reply to [`InputKind::Integer`].
    Integer(i64),
    /// Reply to [`InputKind::FilePath`].
    FilePath(PathBuf),
    /// Reply to [`InputKind::YesNo`].
    YesNo(bool),
}

/// Why an input request was not fulfilled.
#[derive(Debug, Error)]
pub enum InputError {
    /// The user explicitly cancelled at the prompt.
    #[error("cancelled by user")]
    Cancelled,

    /// The shell gave up on the request for some other reason.
    #[error("input abandoned: {0}")]
    Abandoned(String),
}

/// Reply payload travelling back through the one-shot handle.
pub type InputReply = Result<InputValue, InputError>;

/// An input request in flight. Single-shot: fulfilling, cancelling, or
/// failing it consumes the request.
#[derive(Debug)]
pub struct InputRequest {
    /// Unique id, mainly for shells that multiplex several engines.
    pub request_id: Uuid,
    /// Prompt text to present.
    pub prompt: String,
    /// Kind-specific constraints.
    pub constraints: InputConstraints,
    responder: oneshot::Sender<InputReply>,
}

impl InputRequest {
    /// Builds a request and the receiver the engine awaits on.
    pub(crate) fn new(
        prompt: impl Into<String>,
        constraints: InputConstraints,
    ) -> (Self, oneshot::Receiver<InputReply>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                request_id: Uuid::new_v4(),
                prompt: prompt.into(),
                constraints,
                responder: tx,
            },
            rx,
        )
    }

    /// The kind of value this request expects.
    pub fn kind(&self) -> InputKind {
        match self.constraints {
            InputConstraints::Text { .. } => InputKind::Text,
            InputConstraints::SecretText => InputKind::SecretText,
            InputConstraints::Integer { .. } => InputKind::Integer,
            InputConstraints::FilePath { .. } => InputKind::FilePath,
            InputConstraints::YesNo => InputKind::YesNo,
        }
    }

    /// Fulfills the request with a value of the declared kind.
    pub fn fulfill(self, value: InputValue) {
        // The engine may already have unwound (operation failed while the
        // prompt was pending); a dead receiver is not the shell's problem.
        let _ = self.responder.send(Ok(value));
    }

    /// Fails the request as a user cancellation.
    pub fn cancel(self) {
        let _ = self.responder.send(Err(InputError::Cancelled));
    }

    /// Fails the request for any other shell-side reason.
    pub fn fail(self, reason: impl Into<String>) {
        let _ = self.responder.send(Err(InputError::Abandoned(reason.into())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fulfill_delivers_the_value() {
        let (request, rx) = InputRequest::new("Total shares", InputConstraints::Integer {
            min_value: 2,
            max_value: 100,
            error_message: "out of range".into(),
        });
        assert_eq!(request.kind(), InputKind::Integer);

        request.fulfill(InputValue::Integer(5));
        match rx.await.unwrap() {
            Ok(InputValue::Integer(5)) => {}
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancel_delivers_cancellation() {
        let (request, rx) = InputRequest::new("Pick a keeper", InputConstraints::YesNo);
        request.cancel();
        assert!(matches!(rx.await.unwrap(), Err(InputError::Cancelled)));
    }

    #[tokio::test]
    async fn dropping_the_request_abandons_the_engine_side() {
        let (request, rx) = InputRequest::new("Anything", InputConstraints::SecretText);
        drop(request);
        // oneshot sender dropped without sending: the engine sees a recv
        // error and maps it to an abandoned input.
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn events_arrive_in_issue_order() {
        let (tx, mut rx) = event_channel();
        for i in 0..10u8 {
            tx.send(CeremonyEvent::Progress {
                message: format!("step {i}"),
                percent: Some(i * 10),
                event_type: "test".into(),
            })
            .unwrap();
        }
        for i in 0..10u8 {
            match rx.recv().await.unwrap() {
                CeremonyEvent::Progress { percent, .. } => assert_eq!(percent, Some(i * 10)),
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[test]
    fn kind_mapping_is_total() {
        let cases: Vec<(InputConstraints, InputKind)> = vec![
            (
                InputConstraints::Text {
                    max_length: 10,
                    validator: None,
                    error_message: String::new(),
                },
                InputKind::Text,
            ),
            (InputConstraints::SecretText, InputKind::SecretText),
            (
                InputConstraints::FilePath {
                    expected_extension: "json".into(),
                },
                InputKind::FilePath,
            ),
            (InputConstraints::YesNo, InputKind::YesNo),
        ];
        for (constraints, expected) in cases {
            let (request, _rx) = InputRequest::new("p", constraints);
            assert_eq!(request.kind(), expected);
        }
    }
}
