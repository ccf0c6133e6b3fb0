//! Serve command - runs the proxy until Ctrl+C or SIGTERM

use std::net::SocketAddr;

use axum::Router;
use clap::Args;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use crate::api::create_router_with_state;
use crate::config::AppConfig;
use crate::infrastructure::logging;
use crate::infrastructure::observability::{create_metrics_router, init_metrics};

#[derive(Args, Debug, Default, Clone)]
pub struct ServeArgs {
    /// Overrides `server.host`
    #[arg(long)]
    pub host: Option<String>,

    /// Overrides `server.port`
    #[arg(long, short)]
    pub port: Option<u16>,

    /// Overrides `origin.base_url`
    #[arg(long)]
    pub origin: Option<String>,
}

impl ServeArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(origin) = &self.origin {
            config.origin.base_url = origin.clone();
        }
    }
}

pub async fn run(args: ServeArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let (mut config, load_error) = match AppConfig::load() {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };
    args.apply(&mut config);

    logging::init_logging(&config.logging);
    if let Some(e) = load_error {
        warn!(error = %e, "Failed to load configuration, using defaults");
    }

    let state = crate::create_app_state_with_config(&config).await?;
    let app = build_app(create_router_with_state(state), &config);

    let addr = build_socket_addr(&config)?;
    info!(%addr, origin = %config.origin.base_url, "Starting cache proxy");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Cache proxy shutdown complete");
    Ok(())
}

/// Metrics are merged outside the proxy router so scrapes skip the
/// request logging and metrics middleware.
fn build_app(router: Router, config: &AppConfig) -> Router {
    match init_metrics(&config.metrics) {
        Some(metrics) => create_metrics_router(metrics, &config.metrics.path).merge(router),
        None => router,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

fn build_socket_addr(config: &AppConfig) -> anyhow::Result<SocketAddr> {
    Ok(SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    )))
}
