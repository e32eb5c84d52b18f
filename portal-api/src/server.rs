//! HTTP server assembly

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::router::create_router;
use crate::state::AppState;

/// Wrap the router with the service layers every deployment gets
pub fn build_app(state: AppState, max_upload_bytes: usize) -> Router {
    create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

/// Build state from configuration and serve until the process is stopped
pub async fn serve(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::new(&config).await?;
    let app = build_app(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "portal listening");
    axum::serve(listener, app).await?;
    Ok(())
}
