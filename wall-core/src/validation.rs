//! Form validation applied before any remote call.

use crate::entities::{Content, Homework, Profile};
use crate::error::ValidationError;

/// Minimum length, in characters, of a text message.
pub const MIN_MESSAGE_CHARS: usize = 10;

/// Minimum length, in characters, of a homework description.
pub const MIN_HOMEWORK_DESCRIPTION_CHARS: usize = 10;

/// Validate message content. Only text payloads carry a length rule.
pub fn validate_content(content: &Content) -> Result<(), ValidationError> {
    if let Content::Text(text) = content {
        min_chars("content", text, MIN_MESSAGE_CHARS)?;
    }
    Ok(())
}

pub fn validate_profile(profile: &Profile) -> Result<(), ValidationError> {
    required("name", &profile.name)?;
    required("email", &profile.email)?;
    if !profile.email.contains('@') {
        return Err(ValidationError::InvalidValue {
            field: "email".to_string(),
            reason: "must contain '@'".to_string(),
        });
    }
    Ok(())
}

/// Only the description carries a rule; any title is accepted.
pub fn validate_homework(homework: &Homework) -> Result<(), ValidationError> {
    min_chars(
        "description",
        &homework.description,
        MIN_HOMEWORK_DESCRIPTION_CHARS,
    )
}

fn required(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn min_chars(field: &str, value: &str, min: usize) -> Result<(), ValidationError> {
    let actual = value.chars().count();
    if actual < min {
        return Err(ValidationError::TooShort {
            field: field.to_string(),
            min,
            actual,
        });
    }
    Ok(())
}
