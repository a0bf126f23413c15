//! JSON HTTP surface over the catalog operations
//!
//! Handlers trust the `x-user-id` header set by the fronting auth layer.

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use crate::config::StoremapConfig;
use crate::storage::SqliteStore;

pub mod routes;

/// Server state
pub struct AppState {
    pub database_path: PathBuf,
    pub config: StoremapConfig,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/search", get(routes::search))
        .route("/api/stores", get(routes::list_stores).post(routes::create_store))
        .route("/api/stores/near", get(routes::nearby))
        .route("/api/stores/{id}", post(routes::update_store))
        .route("/api/stores/{id}/heart", post(routes::toggle_heart))
        .route("/api/store/{slug}", get(routes::get_store))
        .route("/api/tags", get(routes::tags))
        .route("/api/tags/{tag}", get(routes::tag))
        .route("/api/top", get(routes::top))
        .route("/api/hearts", get(routes::hearts))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: StoremapConfig, database_path: PathBuf) -> anyhow::Result<()> {
    // Create the schema up front so handlers only ever open existing files
    SqliteStore::open_with_timeout(&database_path, config.busy_timeout())?;

    let port = config.port;
    let state = Arc::new(AppState {
        database_path,
        config,
    });
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Starting server on {}", addr);
    println!("{} Server running at http://{}", crate::ui::Icons::ROCKET, addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
