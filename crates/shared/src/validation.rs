//! Common validation utilities.
//!
//! Custom validators plugged into `#[validate(custom(function = ...))]` on the
//! request DTOs in the domain crate.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

/// Minimum username length (after trimming).
pub const USERNAME_MIN_LENGTH: usize = 3;

/// Maximum username length (after trimming).
pub const USERNAME_MAX_LENGTH: usize = 30;

/// Minimum password length.
pub const PASSWORD_MIN_LENGTH: usize = 8;

lazy_static! {
    static ref USERNAME_REGEX: Regex = Regex::new(r"^[a-zA-Z][a-zA-Z0-9_]*$").unwrap();
}

fn error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// Validates a public username.
///
/// Usernames are trimmed, must be 3-30 characters, start with a letter and
/// contain only ASCII letters, digits and underscores.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let trimmed = username.trim();
    let len = trimmed.chars().count();

    if !(USERNAME_MIN_LENGTH..=USERNAME_MAX_LENGTH).contains(&len) {
        return Err(error(
            "username_length",
            "Username must be between 3 and 30 characters",
        ));
    }

    if !USERNAME_REGEX.is_match(trimmed) {
        return Err(error(
            "username_format",
            "Username must start with a letter and contain only letters, numbers, and underscores",
        ));
    }

    Ok(())
}

/// Validates password strength.
///
/// Requires at least 8 characters with an uppercase letter, a lowercase letter
/// and a digit. The first failing rule is reported.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < PASSWORD_MIN_LENGTH {
        return Err(error(
            "password_length",
            "Password must be at least 8 characters long",
        ));
    }

    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(error(
            "password_uppercase",
            "Password must contain at least one uppercase letter",
        ));
    }

    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(error(
            "password_lowercase",
            "Password must contain at least one lowercase letter",
        ));
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(error(
            "password_digit",
            "Password must contain at least one digit",
        ));
    }

    Ok(())
}

/// Validates that a date-time is not in the past.
pub fn validate_not_in_past(value: &DateTime<Utc>) -> Result<(), ValidationError> {
    if *value < Utc::now() {
        return Err(error(
            "datetime_in_past",
            "Date & time cannot be in the past",
        ));
    }
    Ok(())
}

/// Validates that a URL uses the http or https scheme.
pub fn validate_http_url(url: &str) -> Result<(), ValidationError> {
    let lower = url.trim().to_ascii_lowercase();
    let rest = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"));

    match rest {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err(error(
            "url_scheme",
            "URL must start with http:// or https://",
        )),
    }
}

/// Validates that a string is not blank after trimming.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(error("blank", "Value cannot be blank"));
    }
    Ok(())
}
