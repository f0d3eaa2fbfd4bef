use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    routing::{MethodRouter, get},
};
use hyper::StatusCode;

use crate::{error::AppError, metrics::Metrics};

/// State shared by all handlers. Owns the metrics registry for the process.
pub struct AppState {
    pub metrics: Metrics,
}

/// The route table: every path the service answers, and its handler.
///
/// Kept as data so the dispatch surface can be read in one place; anything
/// not listed here falls through to axum's 404.
fn route_table() -> Vec<(&'static str, MethodRouter<Arc<AppState>>)> {
    vec![("/", get(home_handler)), ("/metrics", get(metrics_handler))]
}

pub fn build_router(app_state: AppState) -> Router {
    let mut router = Router::new();
    for (path, handler) in route_table() {
        router = router.route(path, handler);
    }
    router.with_state(Arc::new(app_state))
}

pub(crate) async fn home_handler(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    state.metrics.inc_requests("/");
    (StatusCode::OK, "Hello, DevOps!")
}

pub(crate) async fn metrics_handler(State(state): State<Arc<AppState>>) -> Result<(StatusCode, String), AppError> {
    match state.metrics.encode() {
        Ok(buffer) => Ok((StatusCode::OK, buffer)),
        Err(e) => {
            log::error!("Failed to encode metrics: {e:?}");
            Err(AppError::new(e))
        }
    }
}
