//! gh-relay - Edge reverse proxy for GitHub downloads.
//!
//! This is the main entry point for the application.

use config::Settings;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

// Use Jemalloc for better memory management on Linux
#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

// Module declarations
mod config;
mod errors;
mod handlers;
mod infra;
mod providers;
mod proxy;
mod router;
mod services;
mod state;
mod utils;

// Re-exports for use in other modules
pub use state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let settings = Settings::load()?;
    infra::log::setup_tracing(&settings.log);

    info!("Starting gh-relay server");
    info!("Log level: {}", settings.log.get_level());
    info!("Route prefix: {}", settings.proxy.prefix);
    if settings.proxy.mirror {
        info!("Mirror mode enabled: {}", settings.proxy.mirror_base);
    }
    if !settings.proxy.whitelist.is_empty() {
        info!("Whitelist: {:?}", settings.proxy.whitelist);
    }

    // Build HTTP client
    let bind_addr: SocketAddr = settings.server.bind_addr().parse()?;
    let client = services::client::build_client(&settings.server);
    let upstream = Arc::new(services::client::HyperUpstream::new(client));

    // Build application state
    let app_state = AppState::new(settings, upstream);
    info!(
        "Blocking user agents containing: {:?}",
        app_state.block_list.tokens()
    );

    // Create router
    let app = router::create_router(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;

    info!("=================================================");
    info!("gh-relay server listening on {}", bind_addr);
    info!("=================================================");

    let service = app.into_make_service_with_connect_info::<SocketAddr>();

    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("gh-relay server shut down gracefully");
    Ok(())
}

/// Resolve once Ctrl+C or SIGTERM arrives; in-flight requests then drain.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
