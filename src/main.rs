//! Discovery Feed Engine
//!
//! Serves the ranked, diversified discovery feed over HTTP.
//!
//! # Architecture
//!
//! - **Candidate store**: Paged reads of collections and units from PostgreSQL
//! - **Feed engine**: Windowed scoring, author diversification, fallback, interleaving
//! - **API Server**: REST endpoints for frontend consumption
//!
//! # Graceful Shutdown
//!
//! The engine handles SIGTERM and SIGINT signals, ensuring:
//! - In-flight requests complete
//! - Database connections are closed cleanly

use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use discovery_feed::api::{self, AppState};
use discovery_feed::config::Config;
use discovery_feed::database::Database;
use discovery_feed::error::Result;
use discovery_feed::feed::{FeedService, PgCandidateStore};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!(version = env!("CARGO_PKG_VERSION"), "Discovery feed engine starting");

    // Invalid configuration is fatal
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e);
        }
    };

    #[cfg(feature = "prometheus")]
    install_metrics_exporter()?;

    let db = Database::new(&config.database).await?;
    info!("Database connection pool established");

    let store = Arc::new(PgCandidateStore::new(db.pool().clone()));
    let service = FeedService::new(config.feed.clone(), store)?;

    let state = Arc::new(AppState {
        service,
        db: Some(db.clone()),
    });

    info!(
        host = %config.api.host,
        port = config.api.port,
        "Serving discover API"
    );

    let served = api::start_server(state, &config.api, shutdown_signal()).await;

    db.close().await;

    if let Err(e) = served {
        error!(error = ?e, "API server error");
        return Err(e.into());
    }

    info!("Discovery feed engine stopped gracefully");
    Ok(())
}

/// Initialize structured logging; `LOG_FORMAT=json` switches to JSON lines
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("discovery_feed=debug,tower_http=debug,sqlx=warn,info")
    });

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_current_span(true))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_ansi(std::env::var("NO_COLOR").is_err()),
            )
            .init();
    }
}

#[cfg(feature = "prometheus")]
fn install_metrics_exporter() -> Result<()> {
    let addr: std::net::SocketAddr = std::env::var("METRICS_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:9000".to_string())
        .parse()
        .map_err(|e: std::net::AddrParseError| {
            discovery_feed::error::Error::config(format!("Invalid METRICS_ADDR: {}", e))
        })?;

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| discovery_feed::error::Error::config(format!("Metrics exporter: {}", e)))?;

    info!(%addr, "Prometheus exporter listening");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
