use rollcall_core::CalendarDay;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Notice sent after attendance for a section has been committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceNotice {
    pub section_id: String,
    pub date: CalendarDay,
    pub marked_by: String,
    pub written: usize,
    /// Students marked absent; their guardians are the usual push targets.
    pub absent_student_ids: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub sent_at: OffsetDateTime,
}

/// Outcome of a single delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DispatchResult {
    pub delivered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DispatchResult {
    pub fn delivered() -> Self {
        Self {
            delivered: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            delivered: false,
            error: Some(error.into()),
        }
    }
}
