use axum::extract::State;
use axum::Json;
use chrono::Utc;

use crate::dto::HealthResponse;
use crate::router::AppState;

/// GET /health: liveness plus process uptime.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().to_rfc3339(),
        uptime: state.started.elapsed().as_secs(),
    })
}
