pub mod attendance;
pub mod error;
pub mod id;
pub mod identity;
pub mod time;

pub use attendance::{
    AttendanceCounts, AttendanceMark, AttendanceRecord, AttendanceStatus, GradeSection,
    RosterEntry, RosterView, SectionSummary, Student,
};
pub use error::{CoreError, Result};
pub use id::{IdError, validate_id};
pub use identity::{Role, UserIdentity};
pub use time::{CalendarDay, Clock, ManualClock, SchoolCalendar, SystemClock};
