use axum::{
    extract::{rejection::FormRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Form, Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, warn};

use crate::services::contact::{ContactForm, ContactService};

pub struct ContactState {
    pub service: Arc<ContactService>,
}

/// POST /contact/ (and /contact)
pub async fn submit_contact(
    State(state): State<Arc<ContactState>>,
    form: Result<Form<ContactForm>, FormRejection>,
) -> impl IntoResponse {
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            warn!(error = %rejection, "Rejected contact submission");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "status": "error",
                    "message": "Please submit the contact form."
                })),
            );
        }
    };

    match state.service.submit(form).await {
        Ok(_) => (StatusCode::OK, Json(json!({"status": "success"}))),
        Err(e) => {
            error!(error = %e, "Failed to store contact message");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "error",
                    "message": "Your message could not be saved. Please try again later."
                })),
            )
        }
    }
}

pub async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({"status": "error", "message": "Method not allowed"})),
    )
}
