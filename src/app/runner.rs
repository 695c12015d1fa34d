use crate::app::context::AppContext;
use crate::core::orchestrator::SyncOrchestrator;
use crate::core::port_source::read_port;
use crate::core::watcher::PortWatcher;
use crate::domain::ports::{Dispatch, StatusSink};
use crate::utils::error::Result;
use tokio_util::sync::CancellationToken;

/// Reads the port file once and synchronizes every service with it.
///
/// A port file that cannot be read is fatal here, unlike in watch mode.
pub async fn run_once(context: &AppContext, status: &StatusSink) -> Result<()> {
    tracing::info!("Synchronizing port once");

    let port_file = context.config.port_file_path()?;
    let port = read_port(&port_file)?;
    tracing::info!("🔌 Detected port {}", port);

    let services = context.services_snapshot();
    context
        .dispatcher
        .dispatch(port, &services, status)
        .await
        .errors
        .into_result()
}

/// Watches the port file and keeps services synchronized until `shutdown`.
pub async fn watch_and_sync(
    context: &AppContext,
    status: StatusSink,
    shutdown: CancellationToken,
) -> Result<()> {
    let port_file = context.config.port_file_path()?;
    tracing::info!("👀 Monitoring: {}", port_file.display());

    let (ports, watcher) =
        PortWatcher::new(port_file, context.config.watcher_config()).spawn(shutdown.clone())?;

    let orchestrator = SyncOrchestrator::new(
        context.dispatcher.clone(),
        context.subscribe_services(),
        context.config.retry_interval(),
        status,
    );
    orchestrator.run(ports, shutdown.clone()).await;

    shutdown.cancel();
    if let Err(e) = watcher.await {
        tracing::warn!("Port watcher task failed: {}", e);
    }
    Ok(())
}
