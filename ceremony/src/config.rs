//! # Ceremony Configuration
//!
//! A plain value passed by reference into the engine constructor — no
//! process-wide singleton, no global state. The console shell loads it
//! from a JSON file (or takes the defaults); tests build it literally.
//!
//! Every tunable has a default that matches how the ceremony is meant to
//! be run in production. Weakening them (fewer KDF iterations, shorter
//! passwords) is possible but floor-checked: [`CeremonyConfig::validate`]
//! is a pure function over the struct and the engine refuses to start on
//! a config that fails it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::kdf::MIN_KDF_ITERATIONS;
use crate::validation::{self, PasswordRules};

/// Default PBKDF2 iteration count for new ceremonies.
pub const DEFAULT_KDF_ITERATIONS: u32 = 100_000;

/// Default number of random overwrite passes for sealed buffers.
pub const DEFAULT_SECURE_DELETE_PASSES: u8 = 3;

/// Default audit log retention, in days.
pub const DEFAULT_AUDIT_RETENTION_DAYS: u32 = 90;

/// Configuration loading/validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid JSON for this schema.
    #[error("cannot parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    /// One or more configuration rules are violated.
    #[error("invalid configuration: {}", violations.join("; "))]
    Rules {
        /// Every violated rule, so the operator fixes the file once.
        violations: Vec<String>,
    },
}

/// Security knobs: password policy, KDF strength, wipe passes, audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct SecurityConfig {
    /// Run the mandatory reconstruction self-test before emitting a
    /// shares file.
    pub confirmation_required: bool,
    /// Minimum keeper password length.
    pub min_password_length: usize,
    /// Require an uppercase letter in keeper passwords.
    pub require_uppercase: bool,
    /// Require a lowercase letter in keeper passwords.
    pub require_lowercase: bool,
    /// Require a digit in keeper passwords.
    pub require_digit: bool,
    /// Require a special character in keeper passwords.
    pub require_special_character: bool,
    /// PBKDF2-HMAC-SHA256 iteration count for new envelopes and the
    /// admin session key.
    pub kdf_iterations: u32,
    /// Random overwrite passes for sealed buffers (1–10).
    pub secure_delete_passes: u8,
    /// Write the line-delimited audit log during ceremonies.
    pub audit_log_enabled: bool,
    /// Advisory retention for audit files, in days (1–3650).
    pub audit_log_retention_days: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            confirmation_required: true,
            min_password_length: 12,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special_character: true,
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
            secure_delete_passes: DEFAULT_SECURE_DELETE_PASSES,
            audit_log_enabled: true,
            audit_log_retention_days: DEFAULT_AUDIT_RETENTION_DAYS,
        }
    }
}

impl SecurityConfig {
    /// The password complexity rules this config implies.
    pub fn password_rules(&self) -> PasswordRules {
        PasswordRules {
            min_length: self.min_password_length,
            require_uppercase: self.require_uppercase,
            require_lowercase: self.require_lowercase,
            require_digit: self.require_digit,
            require_special: self.require_special_character,
        }
    }
}

/// Filesystem knobs. The output folder is the base under which each
/// session gets its own exclusive `session_<id>/` directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct FileSystemConfig {
    /// Base directory for session folders.
    pub output_folder: PathBuf,
}

impl Default for FileSystemConfig {
    fn default() -> Self {
        Self {
            output_folder: default_output_folder(),
        }
    }
}

/// Optional organization defaults offered during the ORG_INFO step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct OrganizationConfig {
    /// Organization name to offer for reuse.
    pub name: Option<String>,
    /// Organization contact phone to pair with the name.
    pub contact_phone: Option<String>,
}

/// A keeper offered by default during collection, in preferred order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DefaultKeeper {
    /// Keeper display name.
    pub name: String,
    /// Contact phone.
    pub phone: String,
    /// Contact email.
    pub email: String,
    /// Free-form department label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    /// Free-form title label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Sort key: lower is offered first.
    #[serde(default)]
    pub preferred_order: u32,
}

/// The full ceremony configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct CeremonyConfig {
    /// Security policy.
    pub security: SecurityConfig,
    /// Filesystem layout.
    pub file_system: FileSystemConfig,
    /// Organization defaults.
    pub organization: OrganizationConfig,
    /// Keepers offered before free-form entry, sorted by
    /// `preferred_order` at use time.
    pub default_keepers: Vec<DefaultKeeper>,
}

impl CeremonyConfig {
    /// Loads a configuration from a JSON file and validates it.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every configuration rule, reporting all violations at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut violations = Vec::new();
        let s = &self.security;

        if s.min_password_length < 8 {
            violations.push(format!(
                "min_password_length must be >= 8, got {}",
                s.min_password_length
            ));
        }
        if s.kdf_iterations < MIN_KDF_ITERATIONS {
            violations.push(format!(
                "kdf_iterations must be >= {MIN_KDF_ITERATIONS}, got {}",
                s.kdf_iterations
            ));
        }
        if !(1..=10).contains(&s.secure_delete_passes) {
            violations.push(format!(
                "secure_delete_passes must be in 1..=10, got {}",
                s.secure_delete_passes
            ));
        }
        if !(1..=3650).contains(&s.audit_log_retention_days) {
            violations.push(format!(
                "audit_log_retention_days must be in 1..=3650, got {}",
                s.audit_log_retention_days
            ));
        }
        if self.file_system.output_folder.as_os_str().is_empty() {
            violations.push("output_folder must not be empty".to_string());
        }

        if let Some(phone) = &self.organization.contact_phone {
            if !validation::is_valid_phone(phone) {
                violations.push(format!("organization contact_phone is invalid: {phone:?}"));
            }
        }
        if let Some(name) = &self.organization.name {
            if !validation::is_valid_name(name) {
                violations.push(format!("organization name is invalid: {name:?}"));
            }
        }

        for keeper in &self.default_keepers {
            if !validation::is_valid_name(&keeper.name) {
                violations.push(format!("default keeper name is invalid: {:?}", keeper.name));
            }
            if !validation::is_valid_phone(&keeper.phone) {
                violations.push(format!(
                    "default keeper {:?} has invalid phone: {:?}",
                    keeper.name, keeper.phone
                ));
            }
            if !validation::is_valid_email(&keeper.email) {
                violations.push(format!(
                    "default keeper {:?} has invalid email: {:?}",
                    keeper.name, keeper.email
                ));
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Rules { violations })
        }
    }

    /// The default keepers sorted ascending by `preferred_order`, the
    /// order in which they are offered during collection.
    pub fn sorted_default_keepers(&self) -> Vec<DefaultKeeper> {
        let mut keepers = self.default_keepers.clone();
        keepers.sort_by_key(|k| k.preferred_order);
        keepers
    }
}

/// Platform-appropriate default base folder for ceremony output.
fn default_output_folder() -> PathBuf {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    home.join("Keyward")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = CeremonyConfig::default();
        config.validate().expect("defaults must satisfy the rules");
        assert!(config.security.confirmation_required);
        assert_eq!(config.security.kdf_iterations, 100_000);
        assert_eq!(config.security.secure_delete_passes, 3);
        assert_eq!(config.security.min_password_length, 12);
        assert_eq!(config.security.audit_log_retention_days, 90);
    }

    #[test]
    fn weak_password_floor_is_enforced() {
        let mut config = CeremonyConfig::default();
        config.security.min_password_length = 7;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("min_password_length"));
    }

    #[test]
    fn kdf_iteration_floor_is_enforced() {
        let mut config = CeremonyConfig::default();
        config.security.kdf_iterations = 9_999;
        assert!(config.validate().is_err());
        config.security.kdf_iterations = 10_000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn secure_delete_passes_range() {
        let mut config = CeremonyConfig::default();
        config.security.secure_delete_passes = 0;
        assert!(config.validate().is_err());
        config.security.secure_delete_passes = 11;
        assert!(config.validate().is_err());
        config.security.secure_delete_passes = 10;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn audit_retention_range() {
        let mut config = CeremonyConfig::default();
        config.security.audit_log_retention_days = 0;
        assert!(config.validate().is_err());
        config.security.audit_log_retention_days = 3651;
        assert!(config.validate().is_err());
        config.security.audit_log_retention_days = 3650;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn all_violations_reported_together() {
        let mut config = CeremonyConfig::default();
        config.security.min_password_length = 1;
        config.security.kdf_iterations = 1;
        config.security.secure_delete_passes = 0;
        let err = config.validate().unwrap_err();
        match err {
            ConfigError::Rules { violations } => assert_eq!(violations.len(), 3),
            other => panic!("expected Rules, got {other:?}"),
        }
    }

    #[test]
    fn default_keeper_contacts_are_checked() {
        let mut config = CeremonyConfig::default();
        config.default_keepers.push(DefaultKeeper {
            name: "Ada Lovelace".into(),
            phone: "no digits here".into(),
            email: "not-an-email".into(),
            department: None,
            title: None,
            preferred_order: 1,
        });
        let err = config.validate().unwrap_err();
        match err {
            ConfigError::Rules { violations } => assert_eq!(violations.len(), 2),
            other => panic!("expected Rules, got {other:?}"),
        }
    }

    #[test]
    fn keepers_sort_by_preferred_order() {
        let mut config = CeremonyConfig::default();
        for (name, order) in [("Charlie", 30), ("Alpha", 10), ("Bravo", 20)] {
            config.default_keepers.push(DefaultKeeper {
                name: name.into(),
                phone: "555 0100".into(),
                email: format!("{}@example.com", name.to_lowercase()),
                department: None,
                title: None,
                preferred_order: order,
            });
        }
        let sorted = config.sorted_default_keepers();
        let names: Vec<_> = sorted.iter().map(|k| k.name.as_str()).collect();
        assert_eq!(names, ["Alpha", "Bravo", "Charlie"]);
    }

    #[test]
    fn json_round_trip() {
        let config = CeremonyConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: CeremonyConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(
            parsed.security.kdf_iterations,
            config.security.kdf_iterations
        );
        assert_eq!(parsed.file_system.output_folder, config.file_system.output_folder);
    }

    #[test]
    fn partial_json_takes_defaults() {
        let parsed: CeremonyConfig =
            serde_json::from_str(r#"{"security": {"kdf_iterations": 150000}}"#).unwrap();
        assert_eq!(parsed.security.kdf_iterations, 150_000);
        assert_eq!(parsed.security.min_password_length, 12);
        assert!(parsed.default_keepers.is_empty());
    }

    #[test]
    fn from_json_file_reads_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        std::fs::write(&path, r#"{"security": {"kdf_iterations": 20000}}"#).unwrap();
        let config = CeremonyConfig::from_json_file(&path).unwrap();
        assert_eq!(config.security.kdf_iterations, 20_000);

        std::fs::write(&path, r#"{"security": {"kdf_iterations": 5}}"#).unwrap();
        assert!(matches!(
            CeremonyConfig::from_json_file(&path),
            Err(ConfigError::Rules { .. })
        ));
    }
}
