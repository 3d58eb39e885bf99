use thiserror::Error;

/// Core error types for Rollcall operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid calendar day: {0}")]
    InvalidDay(String),

    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("Invalid attendance status: {0}")]
    InvalidStatus(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CoreError {
    /// Create a new InvalidDay error
    pub fn invalid_day(day: impl Into<String>) -> Self {
        Self::InvalidDay(day.into())
    }

    /// Create a new InvalidRole error
    pub fn invalid_role(role: impl Into<String>) -> Self {
        Self::InvalidRole(role.into())
    }

    /// Create a new InvalidStatus error
    pub fn invalid_status(status: impl Into<String>) -> Self {
        Self::InvalidStatus(status.into())
    }

    /// Create a new Configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
