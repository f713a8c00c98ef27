//! Input validation utilities.
//!
//! This module contains functions for validating user inputs to ensure they meet
//! safety and correctness requirements before being used in operations.

use crate::{StudyError, StudyResult};

/// Validates an account uid before it is used as a directory name.
///
/// The file store keeps profiles under `users/<uid>/`, so the uid must not be able to escape
/// that directory:
/// - Rejects empty or whitespace-only strings
/// - Bounds the length to avoid pathological inputs
/// - Restricts characters to a conservative ASCII set
///
/// # Errors
///
/// Returns a `StudyError::InvalidInput` if the uid is invalid.
pub fn validate_uid(uid: &str) -> StudyResult<()> {
    const MAX_UID_LEN: usize = 128;

    if uid.trim().is_empty() {
        return Err(StudyError::InvalidInput("uid cannot be empty".into()));
    }

    if uid.len() > MAX_UID_LEN {
        return Err(StudyError::InvalidInput(format!(
            "uid exceeds maximum length of {} characters",
            MAX_UID_LEN
        )));
    }

    let ok = uid
        .bytes()
        .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'-' | b'_'));

    if !ok {
        return Err(StudyError::InvalidInput(
            "uid contains invalid characters (only alphanumeric, '-', '_' allowed)".into(),
        ));
    }

    Ok(())
}

/// Validates a free-text service area code and returns it trimmed.
///
/// # Errors
///
/// Returns a `StudyError::InvalidInput` if the code is blank, too long or contains control
/// characters.
pub fn validate_service(service: &str) -> StudyResult<String> {
    const MAX_SERVICE_LEN: usize = 64;

    let trimmed = service.trim();
    if trimmed.is_empty() {
        return Err(StudyError::InvalidInput("service cannot be empty".into()));
    }
    if trimmed.chars().count() > MAX_SERVICE_LEN {
        return Err(StudyError::InvalidInput(format!(
            "service exceeds maximum length of {} characters",
            MAX_SERVICE_LEN
        )));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(StudyError::InvalidInput(
            "service contains control characters".into(),
        ));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_rejects_path_tricks() {
        assert!(validate_uid("u-01_admin").is_ok());
        for bad in ["", "  ", "../etc", "a/b", "a.b", "uid with space"] {
            assert!(validate_uid(bad).is_err(), "accepted {bad:?}");
        }
        assert!(validate_uid(&"a".repeat(129)).is_err());
    }

    #[test]
    fn service_is_trimmed_and_bounded() {
        assert_eq!(validate_service("  C.EXT ").unwrap(), "C.EXT");
        assert!(validate_service("").is_err());
        assert!(validate_service("URG\n").is_ok());
        assert!(validate_service("UR\u{0007}G").is_err());
        assert!(validate_service(&"X".repeat(65)).is_err());
    }
}
