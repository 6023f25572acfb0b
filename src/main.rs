//! Mesh Provisioner - Main Entry Point

use std::sync::Arc;

use clap::Parser;
use mesh_provisioner::{
    backend::RpcMeshBackend,
    config::{CliArgs, Settings},
    core::service::{ProvisioningService, RunningService},
    peripheral::{Indicator, SignalButton, SysfsLed},
    storage::JsonFileStorage,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,mesh_provisioner=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse CLI arguments
    let args = CliArgs::parse();
    info!(?args, "Starting mesh provisioner");
    let settings = Settings::from(args);

    // Install the SIGUSR1 handler before anything can block, so an early
    // press is not fatal
    let button = SignalButton::new();

    // Connect to the mesh stack
    let backend = Arc::new(
        RpcMeshBackend::connect(&settings.socket_path, settings.request_timeout).await?,
    );

    let indicator = settings
        .led_path
        .as_ref()
        .and_then(|path| match SysfsLed::open(path) {
            Ok(led) => Some(Arc::new(led) as Arc<dyn Indicator>),
            Err(e) => {
                warn!("Indicator disabled, cannot open {}: {}", path.display(), e);
                None
            }
        });

    let storage = JsonFileStorage::new(&settings.directory_path);
    info!("Node directory at {}", settings.directory_path.display());

    // Bootstrap; failures here are fatal
    let service = ProvisioningService::new(backend.clone(), settings.provisioner_config());
    let RunningService {
        mut provisioner,
        input,
    } = match service.start(storage, indicator).await {
        Ok(running) => running,
        Err(e) => {
            error!("Bootstrap failed: {}", e);
            return Err(e.into());
        }
    };

    match button {
        Ok(button) => {
            button.spawn(input);
        }
        Err(e) => warn!("Operator button disabled: {}", e),
    }

    #[cfg(feature = "systemd")]
    {
        if let Err(e) = sd_notify::notify(false, &[sd_notify::NotifyState::Ready]) {
            warn!("Failed to notify systemd: {}", e);
        }
    }

    info!("Service started successfully");

    // Wait for shutdown signal
    tokio::select! {
        _ = provisioner.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully");
        }
        _ = shutdown_signal() => {
            info!("Received SIGTERM, shutting down gracefully");
        }
        _ = backend.closed() => {
            error!("Lost connection to mesh stack");
            return Err("mesh stack connection closed".into());
        }
    }

    info!("Shutting down...");
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!("Failed to register SIGTERM handler: {}", e);
            std::future::pending::<()>().await
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    // On non-Unix platforms, just wait forever
    std::future::pending::<()>().await
}
