//! Out-of-band notices after attendance writes.
//!
//! The server hands every committed bulk mark to a [`NotificationDispatcher`]
//! on a spawned task. Delivery failures are logged and never reach the
//! writer.

pub mod dispatcher;
pub mod error;
pub mod types;

pub use dispatcher::{LogDispatcher, NotificationDispatcher, WebhookConfig, WebhookDispatcher};
pub use error::NotificationError;
pub use types::{AttendanceNotice, DispatchResult};
