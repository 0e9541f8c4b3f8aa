use axum::{extract::State, http::HeaderMap, Form, Json};
use std::sync::Arc;
use tracing::info;

use crate::error::AppError;
use crate::middleware::error::get_request_id_from_headers;
use crate::payments::types::CheckoutRequest;
use crate::services::donation::{DonationForm, DonationService};

pub struct DonationState {
    pub service: Arc<DonationService>,
}

/// POST /payments/create/
pub async fn create_payment(
    State(state): State<Arc<DonationState>>,
    headers: HeaderMap,
    Form(form): Form<DonationForm>,
) -> Result<Json<CheckoutRequest>, AppError> {
    info!(
        currency = ?form.currency_preference,
        donate_to = ?form.donate_to,
        "Received donation request"
    );

    state.service.create_donation(form).await.map(Json).map_err(|e| {
        match get_request_id_from_headers(&headers) {
            Some(request_id) => e.with_request_id(request_id),
            None => e,
        }
    })
}
