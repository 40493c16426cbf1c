mod health;
mod index;
mod metrics;
mod predict;

pub use predict::PredictImageError;

use crate::server::SharedState;
use axum::{
    routing::{get, post},
    Router,
};

pub const IMAGE_FIELD: &str = "image";

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(index::index))
        .route("/predict", post(predict::predict))
        .route("/health", get(health::healthcheck))
        .route("/metrics", get(metrics::metrics_handler))
}
