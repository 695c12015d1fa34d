use anyhow::Context;
use clap::Parser;
use gluetun_sync::app::{run_once, spawn_reporter, watch_and_sync};
use gluetun_sync::config::reload::ConfigReloader;
use gluetun_sync::domain::ports::StatusSink;
use gluetun_sync::utils::{logger, validation::Validate};
use gluetun_sync::{AppConfig, AppContext, CliConfig};
use tokio_util::sync::CancellationToken;

/// Cancels `token` on SIGINT or SIGTERM.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT (Ctrl+C)"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }

    token.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    tracing::info!("Starting gluetun-sync");

    let config_path = AppConfig::locate(cli.config.as_deref())?;
    tracing::info!("📁 Configuration: {}", config_path.display());

    let mut config = AppConfig::from_file(&config_path)
        .with_context(|| format!("couldn't parse config file {}", config_path.display()))?;
    cli.apply(&mut config);

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }
    tracing::info!("✅ Configuration loaded ({} service(s))", config.services.len());

    let context = AppContext::new(config)?;
    let (status, events) = StatusSink::channel(32);
    let reporter = spawn_reporter(events, cli.report_format());

    let result = if cli.once {
        let result = run_once(&context, &status).await;
        drop(status);
        result
    } else {
        let shutdown = CancellationToken::new();
        tokio::spawn(shutdown_signal(shutdown.clone()));

        let reloader = ConfigReloader::new(
            &config_path,
            context.config.watcher_config(),
            context.services_sender(),
        );
        if let Err(e) = reloader.spawn(shutdown.clone()) {
            tracing::warn!("⚠️ Configuration hot-reload disabled: {}", e);
        }

        watch_and_sync(&context, status, shutdown).await
    };

    // Flush pending status lines before reporting the outcome.
    let _ = reporter.await;

    match result {
        Ok(()) => {
            tracing::info!("gluetun-sync finished");
            Ok(())
        }
        Err(e) => {
            tracing::error!("❌ {}", e);
            Err(e.into())
        }
    }
}
