//! # Capacity Server
//!
//! HTTP and WebSocket front end for the ecogate capacity engine. Start-up
//! order: configuration, logging, backends, then the weather monitor and the
//! HTTP listener. Ctrl-C or SIGTERM cancels both and waits for them.

use anyhow::Result;
use lib_ecogate::loggers::setup_logging;
use std::net::SocketAddr;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod capacity_logic;
use capacity_logic::{api, config, state};

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Ctrl-C received, initiating shutdown.");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term_signal) => {
                term_signal.recv().await;
                info!("SIGTERM received, initiating shutdown.");
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let settings = config::load_config().resolve();
    let _log_guard = setup_logging(
        "server_capacity",
        &settings.log_dir,
        &settings.log_level,
        settings.log_keep_files,
    )?;
    info!(port = settings.port, "Configuration loaded");

    let app_state = state::AppState::build(&settings).await?;
    let shutdown = CancellationToken::new();

    let monitor_handle = tokio::spawn(
        app_state
            .monitor
            .clone()
            .run(settings.monitor_interval, shutdown.clone()),
    );

    let app = api::router(app_state);
    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Capacity server listening on http://{}", addr);

    let server_shutdown = shutdown.clone();
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                server_shutdown.cancelled().await;
                info!("HTTP server shutting down.");
            })
            .await
    });

    shutdown_signal().await;
    shutdown.cancel();

    let (server_result, monitor_result) = tokio::join!(server_handle, monitor_handle);
    server_result??;
    monitor_result?;

    info!("Shutdown complete.");
    Ok(())
}
