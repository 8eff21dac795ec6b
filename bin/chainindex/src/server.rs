//! The HTTP surface (spec §6): `/healthz` for liveness probes and
//! `/status` for the Worker Status Registry snapshot, the only outward
//! view into what the six loops are doing.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use chainindex_status::StatusRegistry;
use chainindex_types::WorkerStatus;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
struct AppState {
    status: Arc<StatusRegistry>,
}

pub fn router(status: Arc<StatusRegistry>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/status", get(status_snapshot))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { status })
}

async fn healthz() -> &'static str {
    "ok"
}

async fn status_snapshot(State(state): State<AppState>) -> Json<Vec<WorkerStatus>> {
    Json(state.status.snapshot())
}
