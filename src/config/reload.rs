use crate::config::AppConfig;
use crate::core::watcher::{FileSubscription, WatcherConfig};
use crate::domain::model::ServiceMap;
use crate::utils::error::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Swaps the service snapshot whenever the configuration file changes.
///
/// Only `services` is reloaded. An invalid file leaves the current snapshot in
/// place; scalar settings need a restart.
pub struct ConfigReloader {
    path: PathBuf,
    watcher: WatcherConfig,
    services: watch::Sender<Arc<ServiceMap>>,
}

impl ConfigReloader {
    pub fn new(
        path: impl Into<PathBuf>,
        watcher: WatcherConfig,
        services: watch::Sender<Arc<ServiceMap>>,
    ) -> Self {
        Self {
            path: path.into(),
            watcher,
            services,
        }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> Result<JoinHandle<()>> {
        let subscription = FileSubscription::open(&self.path, self.watcher)?;
        Ok(tokio::spawn(self.run(subscription, shutdown)))
    }

    async fn run(self, mut subscription: FileSubscription, shutdown: CancellationToken) {
        tracing::info!("👀 Watching configuration {}", self.path.display());

        while subscription.next_settled(&shutdown).await.is_some() {
            tracing::info!("📁 Config file changed: {}", self.path.display());
            if let Err(e) = self.reload() {
                tracing::error!("❌ Keeping previous configuration: {}", e);
            }
        }
    }

    /// Loads the file and publishes its services.
    pub fn reload(&self) -> Result<()> {
        let services = AppConfig::load_services(&self.path)?;
        tracing::info!("✅ Updating configuration ({} service(s))", services.len());
        self.services.send_replace(Arc::new(services));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
[services.a]
[[services.a.requests]]
url = "http://a.local/port/{{Port}}"
"#;

    #[tokio::test]
    async fn test_reload_swaps_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, VALID).unwrap();

        let (tx, rx) = watch::channel(Arc::new(ServiceMap::new()));
        let reloader = ConfigReloader::new(&path, WatcherConfig::default(), tx);

        reloader.reload().unwrap();
        assert!(rx.borrow().contains_key("a"));
    }

    #[tokio::test]
    async fn test_invalid_file_keeps_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, VALID).unwrap();

        let (tx, rx) = watch::channel(Arc::new(ServiceMap::new()));
        let reloader = ConfigReloader::new(&path, WatcherConfig::default(), tx);
        reloader.reload().unwrap();

        std::fs::write(
            &path,
            r#"
[services.b]
[[services.b.requests]]
url = "http://b.local/{{Hostname}}"
"#,
        )
        .unwrap();
        assert!(reloader.reload().is_err());

        let snapshot = rx.borrow();
        assert!(snapshot.contains_key("a"));
        assert!(!snapshot.contains_key("b"));
    }
}
