//! Attendance storage for Rollcall.
//!
//! [`AttendanceStore`] is the authoritative source the response cache sits in
//! front of. [`InMemoryAttendanceStore`] keeps everything in process and is
//! populated from a JSON seed file at startup.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{ErrorCategory, StorageError};
pub use memory::{InMemoryAttendanceStore, MAX_SUMMARY_DAYS, SeedData};
pub use traits::{AttendanceStore, BulkMarkOutcome};
