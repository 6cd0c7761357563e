mod health;
mod metrics;
mod reserve;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use reserve::reserve_handler;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/reserve", post(reserve_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}
