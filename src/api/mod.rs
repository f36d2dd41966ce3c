//! Operational endpoints: liveness, readiness, and relay counters.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use serde_json::json;

use crate::registry::RegistryStats;
use crate::router::RouterStatsSnapshot;
use crate::server::AppState;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health/live", get(liveness))
        .route("/health/ready", get(readiness))
        .route("/stats", get(stats))
}

async fn liveness() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness(State(state): State<AppState>) -> Json<serde_json::Value> {
    // The relay is ready as soon as it is serving; report the connection
    // count for operators watching a rollout
    Json(json!({
        "status": "ok",
        "connections": state.registry.len(),
    }))
}

#[derive(Serialize)]
struct StatsResponse {
    registry: RegistryStats,
    router: RouterStatsSnapshot,
}

async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        registry: state.registry.stats(),
        router: state.router.stats(),
    })
}
