//! Bounded re-prompting input helpers.
//!
//! Each helper issues an input-request event, awaits the one-shot reply,
//! re-validates engine-side (the shell's validators are a courtesy, not
//! a trust boundary), and re-prompts up to [`INPUT_ATTEMPTS`] times with
//! a `validation_result` event per rejection. Exhausting the budget is a
//! `Validation` error; a cancelled or abandoned request propagates
//! immediately.

use std::path::PathBuf;

use crate::crypto::SealedBytes;
use crate::error::CeremonyError;
use crate::events::{CeremonyEvent, InputConstraints, InputError, InputKind, InputRequest, InputValue};
use crate::validation::{check_password, PasswordRules};

use super::CeremonyEngine;

/// Re-prompt budget for text, integer, and file-path requests.
pub(crate) const INPUT_ATTEMPTS: u32 = 3;

fn kind_mismatch(expected: InputKind, got: &InputValue) -> CeremonyError {
    CeremonyError::InputAbandoned(format!(
        "shell replied with the wrong input kind: expected {expected:?}, got {got:?}"
    ))
}

impl CeremonyEngine {
    /// Issues one input request and awaits the reply.
    async fn request(
        &self,
        prompt: &str,
        constraints: InputConstraints,
    ) -> Result<InputValue, CeremonyError> {
        let (request, reply) = InputRequest::new(prompt, constraints);
        self.events
            .send(CeremonyEvent::InputRequested(request))
            .map_err(|_| CeremonyError::InputAbandoned("event channel closed".into()))?;

        match reply.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(InputError::Cancelled)) => Err(CeremonyError::Cancelled),
            Ok(Err(InputError::Abandoned(reason))) => Err(CeremonyError::InputAbandoned(reason)),
            Err(_) => Err(CeremonyError::InputAbandoned(
                "input request dropped without a reply".into(),
            )),
        }
    }

    /// Validated free text: non-blank, bounded, passing `validator` when
    /// one is given.
    pub(crate) async fn request_text(
        &self,
        prompt: &str,
        validator: Option<fn(&str) -> bool>,
        max_length: usize,
        error_message: &str,
    ) -> Result<String, CeremonyError> {
        for _ in 0..INPUT_ATTEMPTS {
            let value = self
                .request(
                    prompt,
                    InputConstraints::Text {
                        max_length,
                        validator,
                        error_message: error_message.to_string(),
                    },
                )
                .await?;
            let text = match value {
                InputValue::Text(t) => t,
                other => return Err(kind_mismatch(InputKind::Text, &other)),
            };

            let trimmed = text.trim();
            let accepted = !trimmed.is_empty()
                && trimmed.len() <= max_length
                && validator.map_or(true, |check| check(trimmed));
            if accepted {
                self.validation(true, "accepted", prompt);
                return Ok(trimmed.to_string());
            }
            self.validation(false, error_message, prompt);
        }
        Err(CeremonyError::Validation(format!(
            "no valid value for {prompt:?} after {INPUT_ATTEMPTS} attempts"
        )))
    }

    /// Sensitive text, returned sealed, with no engine-side policy. Used
    /// for the admin password, supplied master secrets, and self-test /
    /// recovery password entries where wrongness is detected
    /// cryptographically rather than syntactically.
    pub(crate) async fn request_secret(&self, prompt: &str) -> Result<SealedBytes, CeremonyError> {
        match self.request(prompt, InputConstraints::SecretText).await? {
            InputValue::Secret(sealed) => Ok(sealed),
            other => Err(kind_mismatch(InputKind::SecretText, &other)),
        }
    }

    /// A new keeper password: sensitive text that must additionally meet
    /// the configured complexity rules.
    pub(crate) async fn request_password(
        &self,
        prompt: &str,
        rules: &PasswordRules,
    ) -> Result<SealedBytes, CeremonyError> {
        for _ in 0..INPUT_ATTEMPTS {
            let sealed = self.request_secret(prompt).await?;
            let verdict = match std::str::from_utf8(sealed.expose()) {
                Ok(text) => check_password(text, rules),
                Err(_) => Err("password must be valid UTF-8".to_string()),
            };
            match verdict {
                Ok(()) => {
                    self.validation(true, "password accepted", prompt);
                    return Ok(sealed);
                }
                Err(message) => self.validation(false, &message, prompt),
            }
        }
        Err(CeremonyError::Validation(format!(
            "no acceptable password for {prompt:?} after {INPUT_ATTEMPTS} attempts"
        )))
    }

    /// Bounded integer in `min..=max`.
    pub(crate) async fn request_integer(
        &self,
        prompt: &str,
        min: i64,
        max: i64,
        error_message: &str,
    ) -> Result<i64, CeremonyError> {
        for _ in 0..INPUT_ATTEMPTS {
            let value = self
                .request(
                    prompt,
                    InputConstraints::Integer {
                        min_value: min,
                        max_value: max,
                        error_message: error_message.to_string(),
                    },
                )
                .await?;
            let number = match value {
                InputValue::Integer(n) => n,
                other => return Err(kind_mismatch(InputKind::Integer, &other)),
            };

            if (min..=max).contains(&number) {
                self.validation(true, "accepted", prompt);
                return Ok(number);
            }
            self.validation(false, error_message, prompt);
        }
        Err(CeremonyError::Validation(format!(
            "no valid value for {prompt:?} after {INPUT_ATTEMPTS} attempts"
        )))
    }

    /// Path to an existing file with the expected extension.
    pub(crate) async fn request_file_path(
        &self,
        prompt: &str,
        expected_extension: &str,
    ) -> Result<PathBuf, CeremonyError> {
        for _ in 0..INPUT_ATTEMPTS {
            let value = self
                .request(
                    prompt,
                    InputConstraints::FilePath {
                        expected_extension: expected_extension.to_string(),
                    },
                )
                .await?;
            let path = match value {
                InputValue::FilePath(p) => p,
                other => return Err(kind_mismatch(InputKind::FilePath, &other)),
            };

            let extension_ok = path
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case(expected_extension))
                .unwrap_or(false);
            if path.is_file() && extension_ok {
                self.validation(true, "accepted", prompt);
                return Ok(path);
            }
            self.validation(
                false,
                &format!("file must exist and have a .{expected_extension} extension"),
                prompt,
            );
        }
        Err(CeremonyError::Validation(format!(
            "no valid path for {prompt:?} after {INPUT_ATTEMPTS} attempts"
        )))
    }

    /// Yes/no confirmation. Single-shot: there is nothing to re-validate.
    pub(crate) async fn request_yes_no(&self, prompt: &str) -> Result<bool, CeremonyError> {
        match self.request(prompt, InputConstraints::YesNo).await? {
            InputValue::YesNo(answer) => Ok(answer),
            other => Err(kind_mismatch(InputKind::YesNo, &other)),
        }
    }
}
