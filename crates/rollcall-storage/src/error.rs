//! Storage error types.

use std::fmt;

/// Errors returned by an [`AttendanceStore`](crate::AttendanceStore).
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested grade section does not exist.
    #[error("Section not found: {id}")]
    SectionNotFound { id: String },

    /// A mark referenced a student who is not enrolled in the section.
    #[error("Student {student_id} is not enrolled in section {section_id}")]
    StudentNotInSection {
        student_id: String,
        section_id: String,
    },

    /// The request was well-formed but semantically invalid.
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// The seed file could not be read.
    #[error("Failed to read seed file: {0}")]
    SeedIo(#[from] std::io::Error),

    /// The seed file is not valid JSON of the expected shape.
    #[error("Invalid seed file: {0}")]
    SeedFormat(#[from] serde_json::Error),
}

impl StorageError {
    #[must_use]
    pub fn section_not_found(id: impl Into<String>) -> Self {
        Self::SectionNotFound { id: id.into() }
    }

    #[must_use]
    pub fn student_not_in_section(
        student_id: impl Into<String>,
        section_id: impl Into<String>,
    ) -> Self {
        Self::StudentNotInSection {
            student_id: student_id.into(),
            section_id: section_id.into(),
        }
    }

    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Returns the error category used to pick the HTTP status.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::SectionNotFound { .. } => ErrorCategory::NotFound,
            Self::StudentNotInSection { .. } | Self::InvalidInput { .. } => {
                ErrorCategory::Validation
            }
            Self::SeedIo(_) | Self::SeedFormat(_) => ErrorCategory::Seed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    NotFound,
    Validation,
    Seed,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Validation => write!(f, "validation"),
            Self::Seed => write!(f, "seed"),
        }
    }
}
