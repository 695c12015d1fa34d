use anyhow::{Context, Result};
use gluetun_sync::{Port, PortWatcher, WatcherConfig};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(5);

fn fast_config() -> WatcherConfig {
    WatcherConfig::new(Duration::from_millis(200))
}

async fn next_port(ports: &mut mpsc::Receiver<Port>) -> Result<u16> {
    let port = timeout(WAIT, ports.recv())
        .await
        .context("timed out waiting for a port")?
        .context("port stream closed")?;
    Ok(port.get())
}

fn write(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))
}

#[tokio::test]
async fn test_watcher_emits_initial_and_settled_ports() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("forwarded_port");
    write(&path, "1337")?;

    let shutdown = CancellationToken::new();
    let (mut ports, handle) = PortWatcher::new(&path, fast_config()).spawn(shutdown.clone())?;

    assert_eq!(next_port(&mut ports).await?, 1337);

    // A quick burst collapses into the last value.
    write(&path, "1338")?;
    write(&path, "1339")?;
    assert_eq!(next_port(&mut ports).await?, 1339);

    // Removal and recreation keep the watch alive.
    std::fs::remove_file(&path)?;
    write(&path, "1")?;
    write(&path, "2")?;
    write(&path, "3")?;
    assert_eq!(next_port(&mut ports).await?, 3);

    shutdown.cancel();
    timeout(WAIT, handle).await??;
    Ok(())
}

#[tokio::test]
async fn test_watcher_skips_invalid_content() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("forwarded_port");
    write(&path, "51413\n")?;

    let shutdown = CancellationToken::new();
    let (mut ports, handle) = PortWatcher::new(&path, fast_config()).spawn(shutdown.clone())?;
    assert_eq!(next_port(&mut ports).await?, 51413);

    write(&path, "not-a-port")?;
    assert!(timeout(Duration::from_secs(1), ports.recv()).await.is_err());

    write(&path, "8080")?;
    assert_eq!(next_port(&mut ports).await?, 8080);

    shutdown.cancel();
    timeout(WAIT, handle).await??;
    Ok(())
}

#[tokio::test]
async fn test_watcher_waits_for_missing_file() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("forwarded_port");

    let shutdown = CancellationToken::new();
    let (mut ports, handle) = PortWatcher::new(&path, fast_config()).spawn(shutdown.clone())?;
    assert!(timeout(Duration::from_millis(500), ports.recv()).await.is_err());

    write(&path, "4242")?;
    assert_eq!(next_port(&mut ports).await?, 4242);

    shutdown.cancel();
    timeout(WAIT, handle).await??;
    Ok(())
}

#[tokio::test]
async fn test_watcher_fails_without_parent_directory() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing").join("forwarded_port");

    let result = PortWatcher::new(&path, fast_config()).spawn(CancellationToken::new());
    assert!(result.is_err());
}
