//! # Terminal Shell
//!
//! The stdin/stdout driver for the ceremony engine's event stream.
//! Progress and validation events render as lines; input-request events
//! prompt on stdout, read a line from stdin, and fulfill the one-shot
//! reply handle with a value of the requested kind.
//!
//! Reads happen on the blocking thread pool so the async runtime (and
//! with it, event delivery) never stalls behind a human deciding what to
//! type. EOF on stdin fails the pending request, which unwinds the
//! running ceremony cleanly.
//!
//! Secret entry is read like any other line. On a shared terminal that
//! means shoulder-surfable input; ceremonies are expected to run on a
//! dedicated machine with only the participants present, which is also
//! what the audit trail assumes.

use std::io::{BufRead, Write};

use keyward_ceremony::crypto::sealed::{SealedBytes, DEFAULT_WIPE_PASSES};
use keyward_ceremony::events::{
    CeremonyEvent, EventReceiver, InputKind, InputRequest, InputValue,
};

/// Consumes the engine's event stream until the channel closes.
pub async fn drive_events(mut events: EventReceiver) {
    while let Some(event) = events.recv().await {
        match event {
            CeremonyEvent::Progress {
                message, percent, ..
            } => match percent {
                Some(p) => println!("[{p:>3}%] {message}"),
                None => println!("       {message}"),
            },
            CeremonyEvent::ValidationResult {
                is_valid, message, ..
            } => {
                if !is_valid {
                    println!("  !  {message}");
                }
            }
            CeremonyEvent::InputRequested(request) => answer(request).await,
            CeremonyEvent::OperationCompleted {
                operation,
                success,
                message,
            } => {
                let marker = if success { "ok" } else { "FAILED" };
                println!("== {operation}: {marker} — {message}");
            }
        }
    }
}

/// Prompts for and supplies one input value of the requested kind.
async fn answer(request: InputRequest) {
    let prompt = request.prompt.clone();
    let suffix = match request.kind() {
        InputKind::YesNo => " [y/n]",
        InputKind::SecretText => " (input is sensitive)",
        _ => "",
    };

    loop {
        let line = match read_line(format!("{prompt}{suffix}: ")).await {
            Some(line) => line,
            None => {
                request.fail("stdin closed");
                return;
            }
        };

        match request.kind() {
            InputKind::Text => {
                request.fulfill(InputValue::Text(line));
                return;
            }
            InputKind::SecretText => {
                request.fulfill(InputValue::Secret(SealedBytes::from_string(
                    line,
                    DEFAULT_WIPE_PASSES,
                )));
                return;
            }
            InputKind::Integer => match line.trim().parse::<i64>() {
                Ok(number) => {
                    request.fulfill(InputValue::Integer(number));
                    return;
                }
                Err(_) => {
                    println!("  !  enter a whole number");
                    continue;
                }
            },
            InputKind::FilePath => {
                request.fulfill(InputValue::FilePath(line.trim().into()));
                return;
            }
            InputKind::YesNo => match line.trim().to_ascii_lowercase().as_str() {
                "y" | "yes" => {
                    request.fulfill(InputValue::YesNo(true));
                    return;
                }
                "n" | "no" => {
                    request.fulfill(InputValue::YesNo(false));
                    return;
                }
                _ => {
                    println!("  !  answer y or n");
                    continue;
                }
            },
        }
    }
}

/// Reads one line from stdin on the blocking pool. `None` on EOF or
/// read error.
pub async fn read_line(prompt: String) -> Option<String> {
    tokio::task::spawn_blocking(move || {
        print!("{prompt}");
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
        }
    })
    .await
    .ok()
    .flatten()
}
