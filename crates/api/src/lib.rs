use axum::{
    Router,
    response::Json,
    routing::{get, post},
};
use serde_json::{Value, json};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod error;
pub mod handlers;
pub mod responses;

pub use error::*;
pub use handlers::*;

#[derive(Clone)]
pub struct AppState {
    pub registry: std::sync::Arc<streamvault_engine::SourceRegistry>,
    pub backend: std::sync::Arc<streamvault_engine::MediaBackend>,
    pub gateway: std::sync::Arc<dyn streamvault_store::StorageGateway>,
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        // Upload protocol routes
        .route("/upload/start", post(handlers::upload_start))
        .route("/upload/presigned-urls", post(handlers::upload_presigned_urls))
        .route("/upload/complete", post(handlers::upload_complete))
        .route("/upload/abort", post(handlers::upload_abort))
        // Streaming routes (GET also answers HEAD)
        .route("/videos", get(handlers::list_videos))
        .route("/videos/:id", get(handlers::stream_video))
        // Health check
        .route("/health", get(health_check))
        // Apply middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "streamvault",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
