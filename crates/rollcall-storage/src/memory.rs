use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rollcall_core::{
    AttendanceCounts, AttendanceMark, AttendanceRecord, AttendanceStatus, CalendarDay, Clock,
    GradeSection, RosterEntry, RosterView, SectionSummary, Student, SystemClock, validate_id,
};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::traits::{AttendanceStore, BulkMarkOutcome};

/// Longest date range a summary may cover.
pub const MAX_SUMMARY_DAYS: i64 = 366;

type RecordKey = (String, CalendarDay); // (section id, business date)

#[derive(Debug, Default)]
struct Inner {
    sections: BTreeMap<String, GradeSection>,
    students: BTreeMap<String, Student>,
    records: BTreeMap<RecordKey, BTreeMap<String, AttendanceRecord>>,
}

impl Inner {
    fn section(&self, section_id: &str) -> Result<&GradeSection, StorageError> {
        self.sections
            .get(section_id)
            .ok_or_else(|| StorageError::section_not_found(section_id))
    }

    fn enrolled<'a>(&'a self, section_id: &'a str) -> impl Iterator<Item = &'a Student> + 'a {
        self.students
            .values()
            .filter(move |s| s.section_id == section_id)
    }
}

/// Initial data for [`InMemoryAttendanceStore::load_seed`].
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedData {
    #[serde(default)]
    pub sections: Vec<GradeSection>,
    #[serde(default)]
    pub students: Vec<Student>,
}

/// In-memory attendance store.
///
/// All state sits behind one `tokio::sync::RwLock`, so a bulk mark is
/// applied atomically with respect to readers.
pub struct InMemoryAttendanceStore {
    inner: RwLock<Inner>,
    clock: Arc<dyn Clock>,
}

impl InMemoryAttendanceStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a store that timestamps records with `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            clock,
        }
    }

    /// Load sections and students from a JSON seed file.
    ///
    /// The file has the shape `{ "sections": [...], "students": [...] }`.
    /// Returns the number of sections and students loaded.
    pub async fn load_seed(&self, path: impl AsRef<Path>) -> Result<(usize, usize), StorageError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await?;
        let seed: SeedData = serde_json::from_str(&raw)?;
        let counts = self.apply_seed(seed).await?;
        tracing::info!(
            path = %path.display(),
            sections = counts.0,
            students = counts.1,
            "loaded attendance seed"
        );
        Ok(counts)
    }

    pub async fn apply_seed(&self, seed: SeedData) -> Result<(usize, usize), StorageError> {
        let (sections, students) = (seed.sections.len(), seed.students.len());
        for section in seed.sections {
            self.upsert_section(section).await?;
        }
        for student in seed.students {
            self.upsert_student(student).await?;
        }
        Ok((sections, students))
    }
}

impl Default for InMemoryAttendanceStore {
    fn default() -> Self {
        Self::new()
    }
}

fn check_id(kind: &str, id: &str) -> Result<(), StorageError> {
    validate_id(id).map_err(|e| StorageError::invalid_input(format!("{kind} id {id:?}: {e}")))
}

#[async_trait]
impl AttendanceStore for InMemoryAttendanceStore {
    async fn list_sections(&self) -> Result<Vec<GradeSection>, StorageError> {
        let inner = self.inner.read().await;
        let mut sections: Vec<GradeSection> = inner.sections.values().cloned().collect();
        sections.sort_by(|a, b| {
            a.grade_level
                .cmp(&b.grade_level)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(sections)
    }

    async fn roster(
        &self,
        section_id: &str,
        date: CalendarDay,
    ) -> Result<RosterView, StorageError> {
        let inner = self.inner.read().await;
        let section = inner.section(section_id)?.clone();
        let records = inner.records.get(&(section_id.to_string(), date));

        let mut entries: Vec<RosterEntry> = inner
            .enrolled(section_id)
            .map(|student| {
                let record = records.and_then(|r| r.get(&student.id));
                RosterEntry {
                    student_id: student.id.clone(),
                    full_name: student.full_name.clone(),
                    status: record.map(|r| r.status).unwrap_or_default(),
                    note: record.and_then(|r| r.note.clone()),
                }
            })
            .collect();
        entries.sort_by(|a, b| {
            a.full_name
                .cmp(&b.full_name)
                .then_with(|| a.student_id.cmp(&b.student_id))
        });

        let mut counts = AttendanceCounts::default();
        for entry in &entries {
            counts.record(entry.status);
        }

        Ok(RosterView {
            section,
            date,
            entries,
            counts,
        })
    }

    async fn summary(
        &self,
        section_id: &str,
        from: CalendarDay,
        to: CalendarDay,
    ) -> Result<SectionSummary, StorageError> {
        if from > to {
            return Err(StorageError::invalid_input(format!(
                "range start {from} is after end {to}"
            )));
        }
        if (to.date() - from.date()).whole_days() >= MAX_SUMMARY_DAYS {
            return Err(StorageError::invalid_input(format!(
                "range exceeds {MAX_SUMMARY_DAYS} days"
            )));
        }

        let inner = self.inner.read().await;
        inner.section(section_id)?;

        let mut counts = AttendanceCounts::default();
        let mut days_recorded = 0;
        let range = (section_id.to_string(), from)..=(section_id.to_string(), to);
        for (_, records) in inner.records.range(range) {
            if records.is_empty() {
                continue;
            }
            days_recorded += 1;
            for record in records.values() {
                counts.record(record.status);
            }
        }

        Ok(SectionSummary {
            section_id: section_id.to_string(),
            from,
            to,
            days_recorded,
            counts,
        })
    }

    async fn mark_bulk(
        &self,
        section_id: &str,
        date: CalendarDay,
        marks: &[AttendanceMark],
        marked_by: &str,
    ) -> Result<BulkMarkOutcome, StorageError> {
        if marks.is_empty() {
            return Err(StorageError::invalid_input("no marks supplied"));
        }

        let mut inner = self.inner.write().await;
        inner.section(section_id)?;

        // Validate everything before touching state; last mark per student wins.
        let mut latest: BTreeMap<&str, &AttendanceMark> = BTreeMap::new();
        for mark in marks {
            match inner.students.get(&mark.student_id) {
                Some(student) if student.section_id == section_id => {}
                _ => {
                    return Err(StorageError::student_not_in_section(
                        &mark.student_id,
                        section_id,
                    ));
                }
            }
            latest.insert(mark.student_id.as_str(), mark);
        }

        let marked_at = self.clock.now();
        let day = inner
            .records
            .entry((section_id.to_string(), date))
            .or_default();
        let mut absent_student_ids = Vec::new();
        for (student_id, mark) in &latest {
            if mark.status == AttendanceStatus::Absent {
                absent_student_ids.push(student_id.to_string());
            }
            day.insert(
                student_id.to_string(),
                AttendanceRecord {
                    student_id: student_id.to_string(),
                    section_id: section_id.to_string(),
                    date,
                    status: mark.status,
                    note: mark.note.clone(),
                    marked_by: marked_by.to_string(),
                    marked_at,
                },
            );
        }

        tracing::debug!(
            section = %section_id,
            date = %date,
            written = latest.len(),
            "attendance marks committed"
        );

        Ok(BulkMarkOutcome {
            section_id: section_id.to_string(),
            date,
            written: latest.len(),
            absent_student_ids,
        })
    }

    async fn upsert_section(&self, section: GradeSection) -> Result<(), StorageError> {
        check_id("section", &section.id)?;
        if section.name.trim().is_empty() {
            return Err(StorageError::invalid_input("section name must not be empty"));
        }
        let mut inner = self.inner.write().await;
        inner.sections.insert(section.id.clone(), section);
        Ok(())
    }

    async fn upsert_student(&self, student: Student) -> Result<(), StorageError> {
        check_id("student", &student.id)?;
        let mut inner = self.inner.write().await;
        inner.section(&student.section_id)?;
        inner.students.insert(student.id.clone(), student);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::ManualClock;
    use std::io::Write;
    use std::str::FromStr;
    use time::macros::datetime;

    fn day(s: &str) -> CalendarDay {
        CalendarDay::from_str(s).unwrap()
    }

    fn section(id: &str, name: &str, grade: u8) -> GradeSection {
        GradeSection {
            id: id.into(),
            name: name.into(),
            grade_level: grade,
            teacher_id: None,
        }
    }

    fn student(id: &str, name: &str, section_id: &str) -> Student {
        Student {
            id: id.into(),
            full_name: name.into(),
            email: None,
            section_id: section_id.into(),
        }
    }

    fn mark(student_id: &str, status: AttendanceStatus) -> AttendanceMark {
        AttendanceMark {
            student_id: student_id.into(),
            status,
            note: None,
        }
    }

    async fn seeded() -> InMemoryAttendanceStore {
        let clock = Arc::new(ManualClock::new(datetime!(2025-09-07 08:00:00 UTC)));
        let store = InMemoryAttendanceStore::with_clock(clock);
        store
            .apply_seed(SeedData {
                sections: vec![section("7b", "Grade 7 - Blue", 7), section("6a", "Grade 6 - Amber", 6)],
                students: vec![
                    student("s-1", "Bea Cruz", "7b"),
                    student("s-2", "Ana Reyes", "7b"),
                    student("s-3", "Carl Lim", "6a"),
                ],
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_list_sections_ordered() {
        let store = seeded().await;
        let ids: Vec<_> = store
            .list_sections()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["6a", "7b"]);
    }

    #[tokio::test]
    async fn test_roster_defaults_to_unmarked() {
        let store = seeded().await;
        let roster = store.roster("7b", day("2025-09-05")).await.unwrap();
        assert_eq!(roster.entries.len(), 2);
        assert_eq!(roster.entries[0].full_name, "Ana Reyes");
        assert!(roster
            .entries
            .iter()
            .all(|e| e.status == AttendanceStatus::Unmarked));
        assert_eq!(roster.counts.unmarked, 2);
    }

    #[tokio::test]
    async fn test_roster_unknown_section() {
        let store = seeded().await;
        let err = store.roster("9z", day("2025-09-05")).await.unwrap_err();
        assert!(matches!(err, StorageError::SectionNotFound { .. }));
    }

    #[tokio::test]
    async fn test_mark_bulk_last_mark_wins() {
        let store = seeded().await;
        let outcome = store
            .mark_bulk(
                "7b",
                day("2025-09-05"),
                &[
                    mark("s-1", AttendanceStatus::Absent),
                    mark("s-2", AttendanceStatus::Present),
                    mark("s-1", AttendanceStatus::Late),
                ],
                "t-1",
            )
            .await
            .unwrap();
        assert_eq!(outcome.written, 2);
        assert!(outcome.absent_student_ids.is_empty());

        let roster = store.roster("7b", day("2025-09-05")).await.unwrap();
        assert_eq!(roster.counts.late, 1);
        assert_eq!(roster.counts.present, 1);
    }

    #[tokio::test]
    async fn test_mark_bulk_is_all_or_nothing() {
        let store = seeded().await;
        let err = store
            .mark_bulk(
                "7b",
                day("2025-09-05"),
                &[
                    mark("s-1", AttendanceStatus::Absent),
                    mark("s-3", AttendanceStatus::Present),
                ],
                "t-1",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::StudentNotInSection { .. }));

        let roster = store.roster("7b", day("2025-09-05")).await.unwrap();
        assert_eq!(roster.counts.unmarked, 2);
    }

    #[tokio::test]
    async fn test_mark_bulk_rejects_empty_and_unknown_section() {
        let store = seeded().await;
        assert!(matches!(
            store.mark_bulk("7b", day("2025-09-05"), &[], "t-1").await,
            Err(StorageError::InvalidInput { .. })
        ));
        assert!(matches!(
            store
                .mark_bulk("9z", day("2025-09-05"), &[mark("s-1", AttendanceStatus::Present)], "t-1")
                .await,
            Err(StorageError::SectionNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_summary_counts_recorded_days() {
        let store = seeded().await;
        store
            .mark_bulk("7b", day("2025-09-01"), &[mark("s-1", AttendanceStatus::Absent)], "t-1")
            .await
            .unwrap();
        store
            .mark_bulk(
                "7b",
                day("2025-09-03"),
                &[
                    mark("s-1", AttendanceStatus::Present),
                    mark("s-2", AttendanceStatus::Present),
                ],
                "t-1",
            )
            .await
            .unwrap();
        store
            .mark_bulk("7b", day("2025-09-10"), &[mark("s-2", AttendanceStatus::Late)], "t-1")
            .await
            .unwrap();

        let summary = store
            .summary("7b", day("2025-09-01"), day("2025-09-07"))
            .await
            .unwrap();
        assert_eq!(summary.days_recorded, 2);
        assert_eq!(summary.counts.present, 2);
        assert_eq!(summary.counts.absent, 1);
        assert_eq!(summary.counts.late, 0);
    }

    #[tokio::test]
    async fn test_summary_rejects_inverted_range() {
        let store = seeded().await;
        let err = store
            .summary("7b", day("2025-09-07"), day("2025-09-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_upsert_student_requires_section() {
        let store = seeded().await;
        assert!(store.upsert_student(student("s-9", "Dee", "9z")).await.is_err());
        assert!(store.upsert_student(student("bad id", "Dee", "7b")).await.is_err());
    }

    #[tokio::test]
    async fn test_load_seed_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "sections": [{{"id": "7b", "name": "Grade 7 - Blue", "gradeLevel": 7}}],
                "students": [{{"id": "s-1", "fullName": "Ana Reyes", "sectionId": "7b"}}]
            }}"#
        )
        .unwrap();

        let store = InMemoryAttendanceStore::new();
        let (sections, students) = store.load_seed(file.path()).await.unwrap();
        assert_eq!((sections, students), (1, 1));
        let listed = store.list_sections().await.unwrap();
        assert_eq!(listed[0].id, "7b");
    }

    #[tokio::test]
    async fn test_load_seed_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let store = InMemoryAttendanceStore::new();
        assert!(matches!(
            store.load_seed(file.path()).await,
            Err(StorageError::SeedFormat(_))
        ));
    }
}
