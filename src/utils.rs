use chrono::{DateTime, Utc};

use crate::errors::AppError;

const MAX_TEXT_LENGTH: usize = 4000;

/// Trimmed, non-empty, bounded free text.
pub fn require_text<'a>(field: &str, value: &'a str) -> Result<&'a str, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(format!("{field} must not be empty")));
    }
    if trimmed.chars().count() > MAX_TEXT_LENGTH {
        return Err(AppError::validation(format!(
            "{field} must be at most {MAX_TEXT_LENGTH} characters"
        )));
    }
    Ok(trimmed)
}

pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}
