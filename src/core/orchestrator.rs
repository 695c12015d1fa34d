use crate::domain::model::{Port, ServiceMap};
use crate::domain::ports::{Dispatch, DispatchOutcome, StatusSink};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Drives dispatches from the stream of observed ports.
///
/// Exactly one dispatch is in flight at any time. A failed dispatch arms a
/// single retry timer for the same port; further failures reset that timer
/// and a newly observed port discards it.
pub struct SyncOrchestrator<D> {
    dispatcher: D,
    services: watch::Receiver<Arc<ServiceMap>>,
    retry_interval: Duration,
    status: StatusSink,
}

impl<D: Dispatch> SyncOrchestrator<D> {
    pub fn new(
        dispatcher: D,
        services: watch::Receiver<Arc<ServiceMap>>,
        retry_interval: Duration,
        status: StatusSink,
    ) -> Self {
        Self {
            dispatcher,
            services,
            retry_interval,
            status,
        }
    }

    /// Dispatches `port` against the current service snapshot.
    pub async fn sync(&self, port: Port) -> DispatchOutcome {
        let services = Arc::clone(&self.services.borrow());
        let outcome = self.dispatcher.dispatch(port, &services, &self.status).await;

        if outcome.is_success() {
            tracing::info!("✅ Port {} synchronized with {} service(s)", port, services.len());
        } else {
            tracing::error!(
                "❌ Port {} failed for {} service(s): {}",
                port,
                outcome.errors.len(),
                outcome.errors
            );
        }
        outcome
    }

    /// Runs until `shutdown` is cancelled or the port stream ends.
    pub async fn run(&self, mut ports: mpsc::Receiver<Port>, shutdown: CancellationToken) {
        let retry = tokio::time::sleep(self.retry_interval);
        tokio::pin!(retry);
        let mut retrying: Option<Port> = None;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!("Shutdown signal received");
                    break;
                }
                received = ports.recv() => {
                    let Some(port) = received else {
                        tracing::info!("Port stream closed");
                        break;
                    };
                    if let Some(stale) = retrying.take() {
                        tracing::info!("Dropping pending retry for port {}", stale);
                    }
                    tracing::info!("🔌 Detected port {}", port);

                    if !self.sync(port).await.is_success() {
                        tracing::info!("Retrying every {:?}", self.retry_interval);
                        retry.as_mut().reset(Instant::now() + self.retry_interval);
                        retrying = Some(port);
                    }
                }
                _ = &mut retry, if retrying.is_some() => {
                    let Some(port) = retrying else { continue };
                    tracing::info!("🔁 Retrying port {}", port);

                    if self.sync(port).await.is_success() {
                        retrying = None;
                    } else {
                        tracing::warn!("Retry failed, resetting timer");
                        retry.as_mut().reset(Instant::now() + self.retry_interval);
                    }
                }
            }
        }
    }
}
