//! # CLI Interface
//!
//! Defines the command-line argument structure for the `keyward` binary
//! using `clap` derive. Supports four subcommands: `create`,
//! `reconstruct`, `verify`, and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Keyward — split-key custody ceremonies.
///
/// Splits a master secret among N keepers with Shamir's Secret Sharing,
/// wraps each share in a password envelope, and seals a tamper-evident
/// session journal under an administrator's HMAC key.
#[derive(Parser, Debug)]
#[command(
    name = "keyward",
    about = "Split-key custody ceremonies over Shamir's Secret Sharing",
    version,
    propagate_version = true
)]
pub struct KeywardCli {
    /// Default log level when RUST_LOG is not set.
    #[arg(long, global = true, env = "KEYWARD_LOG", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines instead of pretty text.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the keyward binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a create-shares ceremony: split a secret among keepers and
    /// emit an encrypted shares file.
    Create(CreateArgs),
    /// Run a reconstruction ceremony: decrypt keeper shares and recover
    /// the secret from a shares file.
    Reconstruct(ReconstructArgs),
    /// Verify ceremony artifacts offline: the hash and admin HMAC of a
    /// sealed session file, and/or the structural invariants of a
    /// shares file.
    Verify(VerifyArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `create` subcommand.
#[derive(Parser, Debug)]
pub struct CreateArgs {
    /// Path to the ceremony configuration file (JSON).
    ///
    /// When omitted, built-in defaults are used.
    #[arg(long, short = 'c', env = "KEYWARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Base output folder, overriding the configured one.
    #[arg(long, short = 'o', env = "KEYWARD_OUTPUT")]
    pub output: Option<PathBuf>,
}

/// Arguments for the `reconstruct` subcommand.
#[derive(Parser, Debug)]
pub struct ReconstructArgs {
    /// Path to the shares file. Prompted for when omitted.
    pub shares_file: Option<PathBuf>,

    /// Path to the ceremony configuration file (JSON).
    #[arg(long, short = 'c', env = "KEYWARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Base output folder, overriding the configured one.
    #[arg(long, short = 'o', env = "KEYWARD_OUTPUT")]
    pub output: Option<PathBuf>,
}

/// Arguments for the `verify` subcommand.
#[derive(Parser, Debug)]
pub struct VerifyArgs {
    /// Path to the sealed session file (session_complete_*.json).
    /// Prompts for the administrator password and re-checks the seal.
    #[arg(required_unless_present = "shares_file")]
    pub session_file: Option<PathBuf>,

    /// Path to a shares file (secret_shares_*.json) to check for
    /// structural invariants: distinct share numbers, keeper count,
    /// threshold bounds. No passwords are needed for this check.
    #[arg(long)]
    pub shares_file: Option<PathBuf>,

    /// PBKDF2 iteration count the session's admin key was derived with.
    #[arg(long, default_value_t = 100_000)]
    pub kdf_iterations: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        // Ensures the derive macros produce a valid CLI definition.
        KeywardCli::command().debug_assert();
    }

    #[test]
    fn reconstruct_accepts_positional_file() {
        let cli = KeywardCli::parse_from(["keyward", "reconstruct", "shares.json"]);
        match cli.command {
            Commands::Reconstruct(args) => {
                assert_eq!(args.shares_file, Some(PathBuf::from("shares.json")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn verify_accepts_either_artifact() {
        let cli = KeywardCli::parse_from(["keyward", "verify", "session.json"]);
        match cli.command {
            Commands::Verify(args) => {
                assert_eq!(args.session_file, Some(PathBuf::from("session.json")));
                assert_eq!(args.shares_file, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let cli =
            KeywardCli::parse_from(["keyward", "verify", "--shares-file", "shares.json"]);
        match cli.command {
            Commands::Verify(args) => {
                assert_eq!(args.session_file, None);
                assert_eq!(args.shares_file, Some(PathBuf::from("shares.json")));
            }
            other => panic!("unexpected command: {other:?}"),
        }

        // At least one artifact is required.
        assert!(KeywardCli::try_parse_from(["keyward", "verify"]).is_err());
    }
}
