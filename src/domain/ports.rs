use crate::domain::model::{Port, ServiceMap, StatusEvent};
use crate::utils::error::DispatchErrors;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Aggregate result of one dispatch over every service group.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub port: Port,
    pub errors: DispatchErrors,
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Something that can push a port to all configured services.
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch(&self, port: Port, services: &ServiceMap, status: &StatusSink)
        -> DispatchOutcome;
}

/// Outbound side of the status event stream.
#[derive(Debug, Clone, Default)]
pub struct StatusSink {
    tx: Option<mpsc::Sender<StatusEvent>>,
}

impl StatusSink {
    pub fn new(tx: mpsc::Sender<StatusEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sink that discards every event.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<StatusEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    pub async fn send(&self, event: StatusEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).await.is_err() {
                tracing::debug!("Status receiver dropped, discarding event");
            }
        }
    }
}
