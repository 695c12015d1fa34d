pub mod context;
pub mod reporter;
pub mod runner;

pub use context::AppContext;
pub use reporter::{spawn_reporter, ReportFormat};
pub use runner::{run_once, watch_and_sync};
