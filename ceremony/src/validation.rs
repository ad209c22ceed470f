//! # Input Validation Contracts
//!
//! The validators behind every prompt the ceremony issues: contact
//! fields for keeper records, and password complexity when the
//! configuration demands it. These are pure functions — the engine wires
//! them into input requests, and the shell may also call them for early
//! feedback, but the engine always re-checks.

use std::sync::OnceLock;

use regex::Regex;

/// Maximum accepted email length (RFC 5321 path limit).
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Maximum accepted phone length.
pub const MAX_PHONE_LENGTH: usize = 20;

/// Maximum accepted keeper/organization name length.
pub const MAX_NAME_LENGTH: usize = 100;

/// The characters that count as "special" for password complexity.
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*()_+=[{]};:<>|./?,-";

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("static regex")
    })
}

fn phone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\d\s\+\-\(\)]+$").expect("static regex"))
}

fn phone_digit_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{3}").expect("static regex"))
}

fn name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z\s\-']+$").expect("static regex"))
}

/// Email: local@domain.tld shape, bounded length.
pub fn is_valid_email(value: &str) -> bool {
    !value.is_empty() && value.len() <= MAX_EMAIL_LENGTH && email_re().is_match(value)
}

/// Phone: digits plus formatting characters, at least three consecutive
/// digits somewhere, bounded length.
pub fn is_valid_phone(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_PHONE_LENGTH
        && phone_re().is_match(value)
        && phone_digit_run_re().is_match(value)
}

/// Name: letters, spaces, hyphens, apostrophes; non-blank, bounded length.
pub fn is_valid_name(value: &str) -> bool {
    !value.trim().is_empty() && value.len() <= MAX_NAME_LENGTH && name_re().is_match(value)
}

/// Password complexity rules, lifted from the security configuration.
#[derive(Debug, Clone, Copy)]
pub struct PasswordRules {
    /// Minimum password length in characters.
    pub min_length: usize,
    /// Require at least one ASCII uppercase letter.
    pub require_uppercase: bool,
    /// Require at least one ASCII lowercase letter.
    pub require_lowercase: bool,
    /// Require at least one ASCII digit.
    pub require_digit: bool,
    /// Require at least one character from [`SPECIAL_CHARACTERS`].
    pub require_special: bool,
}

/// Checks a password against the configured complexity rules.
///
/// Returns the full list of unmet requirements so a keeper fixes the
/// password in one go instead of discovering the rules one prompt at a
/// time.
pub fn check_password(password: &str, rules: &PasswordRules) -> Result<(), String> {
    let mut failures = Vec::new();

    if password.chars().count() < rules.min_length {
        failures.push(format!("at least {} characters", rules.min_length));
    }
    if rules.require_uppercase && !password.chars().any(|c| c.is_ascii_uppercase()) {
        failures.push("an uppercase letter".to_string());
    }
    if rules.require_lowercase && !password.chars().any(|c| c.is_ascii_lowercase()) {
        failures.push("a lowercase letter".to_string());
    }
    if rules.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
        failures.push("a digit".to_string());
    }
    if rules.require_special && !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        failures.push(format!("a special character ({SPECIAL_CHARACTERS})"));
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(format!("password must contain {}", failures.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_emails() {
        assert!(is_valid_email("keeper@example.com"));
        assert!(is_valid_email("first.last+tag@sub.domain.co"));
    }

    #[test]
    fn rejects_malformed_emails() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("no-at-sign.example.com"));
        assert!(!is_valid_email("user@domain"));
        assert!(!is_valid_email("user@@example.com"));
        assert!(!is_valid_email("user@example.c"));
    }

    #[test]
    fn rejects_overlong_email() {
        let long = format!("{}@example.com", "a".repeat(250));
        assert!(!is_valid_email(&long));
    }

    #[test]
    fn accepts_formatted_phones() {
        assert!(is_valid_phone("+1 (555) 123-4567"));
        assert!(is_valid_phone("555 0100"));
        assert!(is_valid_phone("0800123456"));
    }

    #[test]
    fn rejects_bad_phones() {
        assert!(!is_valid_phone(""));
        assert!(!is_valid_phone("call me maybe"));
        // Valid charset but no run of three consecutive digits.
        assert!(!is_valid_phone("+1 (2) 3-4"));
        // Over the length bound.
        assert!(!is_valid_phone("123456789012345678901"));
    }

    #[test]
    fn accepts_human_names() {
        assert!(is_valid_name("Grace Hopper"));
        assert!(is_valid_name("O'Brien"));
        assert!(is_valid_name("Jean-Luc"));
    }

    #[test]
    fn rejects_bad_names() {
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("   "));
        assert!(!is_valid_name("R2-D2 unit #4")); // digits and '#'
        assert!(!is_valid_name(&"x".repeat(101)));
    }

    fn strict_rules() -> PasswordRules {
        PasswordRules {
            min_length: 12,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: true,
        }
    }

    #[test]
    fn password_meeting_all_rules_passes() {
        assert!(check_password("Correct-Horse-7battery", &strict_rules()).is_ok());
    }

    #[test]
    fn password_failures_are_reported_together() {
        let err = check_password("short", &strict_rules()).unwrap_err();
        assert!(err.contains("12 characters"));
        assert!(err.contains("uppercase"));
        assert!(err.contains("digit"));
        assert!(err.contains("special"));
    }

    #[test]
    fn rules_can_be_relaxed() {
        let relaxed = PasswordRules {
            min_length: 8,
            require_uppercase: false,
            require_lowercase: false,
            require_digit: false,
            require_special: false,
        };
        assert!(check_password("password", &relaxed).is_ok());
        assert!(check_password("short", &relaxed).is_err());
    }

    #[test]
    fn every_documented_special_character_counts() {
        for c in SPECIAL_CHARACTERS.chars() {
            let pwd = format!("Abcdefghijk1{c}");
            assert!(
                check_password(&pwd, &strict_rules()).is_ok(),
                "special character {c:?} was not accepted"
            );
        }
    }
}
