pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliConfig;

pub use app::AppContext;
pub use config::AppConfig;
pub use core::{
    dispatcher::RequestDispatcher,
    orchestrator::SyncOrchestrator,
    port_source::{parse_port, read_port},
    watcher::{PortWatcher, WatcherConfig},
};
pub use domain::model::{Credentials, Method, Port, RequestStep, ServiceGroup, ServiceMap};
pub use utils::error::{DispatchErrors, Result, StepError, SyncError};
