pub mod config;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod observability;
pub mod rate_limiter;
pub mod server;
pub mod state;

pub use config::AppConfig;
pub use observability::{apply_logging_level, init_tracing};
pub use server::{RollcallServer, ServerBuilder, build_app, start_cleanup_task};
pub use state::AppState;
