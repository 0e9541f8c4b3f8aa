use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use tracing::{error, info};

use crate::health::HealthChecker;

pub struct HealthState {
    pub checker: HealthChecker,
}

/// GET /health
pub async fn health(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let health_status = state.checker.check_health().await;

    if health_status.is_healthy() {
        info!("✅ Health check passed");
        (StatusCode::OK, Json(health_status))
    } else {
        error!("❌ Health check failed - service unhealthy");
        (StatusCode::SERVICE_UNAVAILABLE, Json(health_status))
    }
}

/// GET /health/live
pub async fn liveness() -> &'static str {
    "OK"
}
