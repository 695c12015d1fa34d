pub mod dispatcher;
pub mod orchestrator;
pub mod port_source;
pub mod template;
pub mod watcher;

pub use crate::domain::model::{Port, ServiceMap, StatusEvent, StatusUpdate};
pub use crate::domain::ports::{Dispatch, DispatchOutcome, StatusSink};
pub use crate::utils::error::Result;
