use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;

use crate::error::AppError;
use crate::services::dashboard::{DashboardService, DashboardStats, DonationQuery};

pub const EXPORT_FILENAME: &str = "donation_report.csv";

pub struct DashboardState {
    pub service: Arc<DashboardService>,
}

/// GET /dashboard/stats
pub async fn stats(
    State(state): State<Arc<DashboardState>>,
) -> Result<Json<DashboardStats>, AppError> {
    Ok(Json(state.service.stats(Utc::now()).await?))
}

/// GET /dashboard/donations
pub async fn donations(
    State(state): State<Arc<DashboardState>>,
    Query(query): Query<DonationQuery>,
) -> Result<Json<JsonValue>, AppError> {
    let donations = state.service.donations(&query).await?;
    Ok(Json(json!({ "donations": donations })))
}

/// GET /dashboard/failed
pub async fn failed_payments(
    State(state): State<Arc<DashboardState>>,
) -> Result<Json<JsonValue>, AppError> {
    let failed = state.service.failed_payments().await?;
    Ok(Json(json!({ "failed_payments": failed })))
}

/// GET /dashboard/messages
pub async fn messages(
    State(state): State<Arc<DashboardState>>,
) -> Result<Json<JsonValue>, AppError> {
    let messages = state.service.messages().await?;
    Ok(Json(json!({ "messages": messages })))
}

/// GET /dashboard/donations/export
pub async fn export_donations(
    State(state): State<Arc<DashboardState>>,
) -> Result<Response, AppError> {
    let csv = state.service.export_csv().await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", EXPORT_FILENAME),
            ),
        ],
        csv,
    )
        .into_response())
}
