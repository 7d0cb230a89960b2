//! HTTP API Server for the Discovery Feed
//!
//! Provides REST endpoints for the frontend to page through the feed.

use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ApiConfig;
use crate::database::{Database, PoolStats};
use crate::error::Error;
use crate::feed::{FeedPage, FeedRequest, FeedService};

/// Shared application state
pub struct AppState {
    pub service: FeedService,
    /// `None` when serving from an in-memory store
    pub db: Option<Database>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<PoolStats>,
}

/// Build the router; split from `start_server` so tests can drive it directly.
pub fn router(state: Arc<AppState>, config: &ApiConfig) -> Router {
    let mut app = Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/discover", get(discover))
        .with_state(state)
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(TraceLayer::new_for_http());

    if config.cors_enabled {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    app
}

/// Start the API server and run until `shutdown` resolves
pub async fn start_server<F>(state: Arc<AppState>, config: &ApiConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(state, config);

    let addr = format!("{}:{}", config.host, config.port);
    info!(%addr, "Starting discovery feed API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

/// Health check endpoint
async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let version = env!("CARGO_PKG_VERSION");

    let Some(db) = &state.db else {
        return (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                version,
                database: None,
            }),
        );
    };

    match db.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                version,
                database: Some(db.stats()),
            }),
        ),
        Err(e) => {
            warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy",
                    version,
                    database: Some(db.stats()),
                }),
            )
        }
    }
}

/// Serve one discover page
async fn discover(
    State(state): State<Arc<AppState>>,
    Query(request): Query<FeedRequest>,
) -> std::result::Result<Json<FeedPage>, Error> {
    match state.service.discover(request).await {
        Ok(page) => Ok(Json(page)),
        Err(e) => {
            if e.is_error_level() {
                error!(error = ?e, "Failed to serve discover page");
            } else {
                warn!(error = %e, "Rejected discover request");
            }
            Err(e)
        }
    }
}
