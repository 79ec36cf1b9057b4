//! Field checks shared by the request and entity validators of each cell.
//!
//! Limits are counted in characters, not bytes.

use std::sync::OnceLock;

use regex::Regex;

static EMAIL_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

/// Non-blank and at most `max` characters.
pub fn require_text(field: &str, value: &str, max: usize) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} is required", field));
    }
    limit_text(field, value, max)
}

pub fn limit_text(field: &str, value: &str, max: usize) -> Result<(), String> {
    let length = value.chars().count();
    if length > max {
        return Err(format!("{} must be at most {} characters (got {})", field, max, length));
    }
    Ok(())
}

pub fn limit_optional_text(field: &str, value: Option<&str>, max: usize) -> Result<(), String> {
    match value {
        Some(text) => limit_text(field, text, max),
        None => Ok(()),
    }
}

pub fn is_valid_email(email: &str) -> bool {
    let pattern = EMAIL_PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").ok()
    });

    email.len() <= 254 && pattern.as_ref().is_some_and(|re| re.is_match(email))
}
