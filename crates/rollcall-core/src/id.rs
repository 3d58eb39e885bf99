// Identifier validation for users, sections and students.
use thiserror::Error;

/// Longest identifier accepted anywhere in the API.
pub const MAX_ID_LEN: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("identifier must not be empty")]
    Empty,

    #[error("identifier exceeds {MAX_ID_LEN} characters")]
    TooLong,

    #[error("identifier contains invalid character {0:?}")]
    InvalidChar(char),
}

/// Validate an identifier.
///
/// Identifiers end up inside cache keys and URL paths, so only
/// `[A-Za-z0-9._@-]` is accepted.
pub fn validate_id(id: &str) -> Result<(), IdError> {
    if id.is_empty() {
        return Err(IdError::Empty);
    }
    if id.len() > MAX_ID_LEN {
        return Err(IdError::TooLong);
    }
    if let Some(c) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@')))
    {
        return Err(IdError::InvalidChar(c));
    }
    Ok(())
}
