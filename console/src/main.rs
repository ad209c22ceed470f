// Copyright (c) 2026 Keyward Contributors. MIT License.
// See LICENSE for details.

//! # Keyward Console
//!
//! Entry point for the `keyward` binary. Parses CLI arguments,
//! initializes logging, builds a ceremony engine, and drives it from the
//! terminal.
//!
//! The binary supports four subcommands:
//!
//! - `create`      — run a create-shares ceremony
//! - `reconstruct` — recover a secret from a shares file
//! - `verify`      — check a sealed session's hash and admin HMAC
//! - `version`     — print build version information

mod cli;
mod logging;
mod shell;

use anyhow::{bail, Context, Result};
use clap::Parser;

use keyward_ceremony::config::CeremonyConfig;
use keyward_ceremony::crypto::sealed::{SealedBytes, DEFAULT_WIPE_PASSES};
use keyward_ceremony::engine::CeremonyEngine;
use keyward_ceremony::events::event_channel;
use keyward_ceremony::journal::SessionOutput;
use keyward_ceremony::model::ShamirSecretOutput;

use cli::{Commands, CreateArgs, KeywardCli, ReconstructArgs, VerifyArgs};
use logging::LogFormat;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = KeywardCli::parse();

    let format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    logging::init_logging(&cli.log_level, format);

    match cli.command {
        Commands::Create(args) => run_create(args).await,
        Commands::Reconstruct(args) => run_reconstruct(args).await,
        Commands::Verify(args) => run_verify(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Loads the configuration file when given, defaults otherwise, and
/// applies the output-folder override.
fn load_config(
    config_path: Option<&std::path::Path>,
    output_override: Option<std::path::PathBuf>,
) -> Result<CeremonyConfig> {
    let mut config = match config_path {
        Some(path) => CeremonyConfig::from_json_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => CeremonyConfig::default(),
    };
    if let Some(output) = output_override {
        config.file_system.output_folder = output;
    }
    Ok(config)
}

// ---------------------------------------------------------------------------
// create — Full create-shares ceremony
// ---------------------------------------------------------------------------

async fn run_create(args: CreateArgs) -> Result<()> {
    let config = load_config(args.config.as_deref(), args.output)?;

    let (events, receiver) = event_channel();
    let terminal = tokio::spawn(shell::drive_events(receiver));
    let mut engine = CeremonyEngine::new(config, events).context("starting ceremony engine")?;

    println!("Keyward create-shares ceremony — session {}", engine.session_id());
    let result = engine.create_shares().await;
    let finalized = engine.finalize_session().await;

    drop(engine);
    let _ = terminal.await;

    if !finalized.success {
        tracing::warn!(message = %finalized.message, "session finalize reported failure");
    }
    if !result.success {
        bail!("{}", result.message);
    }
    if let Some(path) = result.output_file {
        println!("Shares file: {}", path.display());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// reconstruct — Recover a secret from a shares file
// ---------------------------------------------------------------------------

async fn run_reconstruct(args: ReconstructArgs) -> Result<()> {
    let config = load_config(args.config.as_deref(), args.output)?;

    let (events, receiver) = event_channel();
    let terminal = tokio::spawn(shell::drive_events(receiver));
    let mut engine = CeremonyEngine::new(config, events).context("starting ceremony engine")?;

    println!(
        "Keyward reconstruction ceremony — session {}",
        engine.session_id()
    );
    let result = engine.reconstruct_secret(args.shares_file.as_deref()).await;
    let finalized = engine.finalize_session().await;

    drop(engine);
    let _ = terminal.await;

    if !finalized.success {
        tracing::warn!(message = %finalized.message, "session finalize reported failure");
    }
    let Some(secret) = result.reconstructed_secret else {
        bail!("{}", result.message);
    };

    // Display once and drop; the buffer zeroizes itself. Printable UTF-8
    // is shown as text, anything else as base64.
    println!("Recovered secret follows. Clear this terminal afterwards.");
    match std::str::from_utf8(&secret) {
        Ok(text) if text.chars().all(|c| !c.is_control()) => println!("{text}"),
        _ => {
            use base64::engine::general_purpose::STANDARD as BASE64;
            use base64::Engine as _;
            println!("base64: {}", BASE64.encode(secret.as_slice()));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// verify — Third-party checks of ceremony artifacts
// ---------------------------------------------------------------------------

/// Verifies whichever artifacts were supplied: the structural invariants
/// of a shares file, the seal of a session file, or both. Every check
/// runs and reports before any failure aborts the command.
async fn run_verify(args: VerifyArgs) -> Result<()> {
    let mut failed = false;

    if let Some(path) = &args.shares_file {
        match ShamirSecretOutput::from_json_file(path) {
            Ok(output) => println!(
                "shares file structure: OK — {} keepers, threshold {}, session {}",
                output.keepers.len(),
                output.configuration.threshold_required,
                output.session_id
            ),
            Err(e) => {
                println!("shares file structure: INVALID — {e}");
                failed = true;
            }
        }
    }

    if let Some(path) = &args.session_file {
        let sealed = SessionOutput::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?;

        println!(
            "Session {} sealed at {}",
            sealed.session_data.session_id, sealed.signature_timestamp
        );

        let Some(password) = shell::read_line("Administrator password: ".to_string()).await
        else {
            bail!("no administrator password supplied");
        };
        let password = SealedBytes::from_string(password, DEFAULT_WIPE_PASSES);

        let verification = sealed.verify(&password, args.kdf_iterations)?;
        println!(
            "session data hash: {}",
            if verification.hash_valid { "OK" } else { "MISMATCH" }
        );
        println!(
            "admin HMAC:        {}",
            if verification.hmac_valid { "OK" } else { "MISMATCH" }
        );

        if verification.is_intact() {
            println!(
                "Seal intact: the journal is unmodified and was witnessed by this administrator."
            );
        } else {
            failed = true;
        }
    }

    if failed {
        bail!("verification failed");
    }
    Ok(())
}

fn print_version() {
    println!(
        "keyward {} (ceremony engine {})",
        env!("CARGO_PKG_VERSION"),
        keyward_ceremony::model::OUTPUT_VERSION
    );
}
