#![doc = include_str!("../README.md")]

mod server;

use anyhow::Context;
use clap::Parser;
use projquota::ProvisioningService;
use server::config::{CliArgs, ServerConfig};
use server::routes::router;
use server::telemetry::init_telemetry;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry()?;

    let service = Arc::new(ProvisioningService::from_config(config.provision.clone()));
    service
        .initialize()
        .await
        .context("failed to initialize project registries")?;

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    log_startup_info(&config);

    let app = router(service, Arc::from(config.secret_key.as_str()));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Service shut down successfully");
    providers.shutdown();
    Ok(())
}

fn log_startup_info(config: &ServerConfig) {
    let provision = &config.provision;
    tracing::info!(
        addr = %config.listen_addr,
        mount_point = %provision.mount_point.display(),
        projects = %provision.registry.projects.display(),
        projid = %provision.registry.projid.display(),
        default_quota = %provision.default_size,
        "Starting quota provisioning service"
    );
    tracing::info!("Authentication is enabled; requests require ?secret=KEY");
    if cfg!(debug_assertions) {
        tracing::debug!(
            quota_tool = %provision.quota_tool.display(),
            timeout = ?provision.command_timeout,
            corrupt_lines = ?provision.corrupt_lines,
            "Quota tool settings"
        );
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }

    tracing::info!("Shutdown signal received, draining in-flight requests...");
}
