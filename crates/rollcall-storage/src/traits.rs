//! The attendance store contract.

use async_trait::async_trait;
use rollcall_core::{AttendanceMark, CalendarDay, GradeSection, RosterView, SectionSummary, Student};
use serde::Serialize;

use crate::error::StorageError;

/// Result of a committed bulk mark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkMarkOutcome {
    pub section_id: String,
    pub date: CalendarDay,
    /// Number of distinct students written.
    pub written: usize,
    /// Students marked absent, sorted by id.
    pub absent_student_ids: Vec<String>,
}

/// Authoritative source for sections, enrolment and attendance records.
///
/// Implementations must be thread-safe (`Send + Sync`).
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// All sections, ordered by grade level then name.
    async fn list_sections(&self) -> Result<Vec<GradeSection>, StorageError>;

    /// Roster of a section for one business date.
    ///
    /// Enrolled students without a record appear as `Unmarked`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::SectionNotFound` if the section does not exist.
    async fn roster(&self, section_id: &str, date: CalendarDay)
    -> Result<RosterView, StorageError>;

    /// Aggregate counts over an inclusive date range.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidInput` if `from > to`.
    async fn summary(
        &self,
        section_id: &str,
        from: CalendarDay,
        to: CalendarDay,
    ) -> Result<SectionSummary, StorageError>;

    /// Record marks for a section on one date.
    ///
    /// Validation is all-or-nothing: either every mark is written or none.
    /// When a student appears more than once the last mark wins.
    async fn mark_bulk(
        &self,
        section_id: &str,
        date: CalendarDay,
        marks: &[AttendanceMark],
        marked_by: &str,
    ) -> Result<BulkMarkOutcome, StorageError>;

    async fn upsert_section(&self, section: GradeSection) -> Result<(), StorageError>;

    /// Insert or move a student. The target section must exist.
    async fn upsert_student(&self, student: Student) -> Result<(), StorageError>;
}
