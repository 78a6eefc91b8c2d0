//! HTTP service for vegetation, water and naturalness indices.
//!
//! `POST /{index}/raster` returns the index over a bounding box as a GeoTIFF,
//! `POST /{index}/vector` aggregates it over GeoJSON polygons. Both report
//! the processing-unit estimate and consumption in `x-pu-*` headers.

pub mod config;
pub mod error;
pub mod geotiff;
pub mod handlers;
pub mod request;
pub mod state;

use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

pub use config::ServiceConfig;
pub use error::ApiError;
pub use state::AppState;

/// Build the router with all endpoints and layers.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        // Index endpoints
        .route("/:index/raster", post(handlers::raster_handler))
        .route("/:index/vector", post(handlers::vector_handler))
        // Health check
        .route("/health", get(handlers::health_handler))
        // Metrics
        .route("/metrics", get(handlers::metrics_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}
