pub mod aicalls;
pub mod ais;
pub mod auth;
pub mod error;

use axum::extract::State;
use axum::middleware;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;

use ac_runtime::MetricsSnapshot;

use crate::state::AppState;

/// Build the full API router.
///
/// Routes are split into **public** (no auth required) and **protected**
/// (gated behind the bearer-token middleware).
///
/// `state` is needed to wire up the auth middleware at build time.
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new().route("/health", get(health));

    let protected = Router::new()
        // AI configurations
        .route("/v1/ais", post(ais::create_ai).get(ais::list_ais))
        .route(
            "/v1/ais/:id",
            get(ais::get_ai).put(ais::update_ai).delete(ais::delete_ai),
        )
        // Aicalls
        .route("/v1/aicalls", post(aicalls::start_aicall).get(aicalls::list_aicalls))
        .route(
            "/v1/aicalls/:id",
            get(aicalls::get_aicall).delete(aicalls::delete_aicall),
        )
        .route(
            "/v1/aicalls/:id/messages",
            get(aicalls::list_messages).post(aicalls::send_message),
        )
        .route("/v1/aicalls/:id/tools", post(aicalls::dispatch_tool))
        .route("/v1/aicalls/:id/start", post(aicalls::start))
        .route("/v1/aicalls/:id/pause", post(aicalls::pause))
        .route("/v1/aicalls/:id/resume", post(aicalls::resume))
        .route("/v1/aicalls/:id/terminate", post(aicalls::terminate))
        // Counters
        .route("/v1/metrics", get(metrics))
        .route_layer(middleware::from_fn_with_state(state, auth::require_api_token));

    public.merge(protected)
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let targets: Vec<String> = state
        .aicalls
        .engines()
        .targets()
        .iter()
        .map(|t| t.to_string())
        .collect();
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "engines": targets,
    }))
}

async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
