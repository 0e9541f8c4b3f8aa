use axum::{
    extract::{rejection::FormRejection, rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Form,
};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::payments::types::CallbackParams;
use crate::payments::utils::format_amount;
use crate::services::callback_processor::{CallbackError, CallbackOutcome, CallbackProcessor};
use crate::services::notification::escape_html;

pub struct CallbackState {
    pub processor: Arc<CallbackProcessor>,
    pub currency: String,
    pub home_url: String,
}

/// GET /payments/callback/
pub async fn handle_callback_get(
    State(state): State<Arc<CallbackState>>,
    query: Result<Query<CallbackParams>, QueryRejection>,
) -> Response {
    let params = query.map(|Query(q)| q).unwrap_or_default();
    respond(&state, params).await
}

/// POST /payments/callback/ (form fields win, query string is the fallback)
pub async fn handle_callback_post(
    State(state): State<Arc<CallbackState>>,
    query: Result<Query<CallbackParams>, QueryRejection>,
    form: Result<Form<CallbackParams>, FormRejection>,
) -> Response {
    let query = query.map(|Query(q)| q).unwrap_or_default();
    let params = form.map(|Form(f)| f).unwrap_or_default().or(query);
    respond(&state, params).await
}

async fn respond(state: &CallbackState, params: CallbackParams) -> Response {
    match state.processor.process_callback(&params).await {
        Ok(CallbackOutcome::Succeeded { payment, replay }) => {
            info!(transaction_id = %payment.transaction_id, replay, "Rendering donation success page");
            Html(success_page(
                &payment.first_name,
                &format!("{} {}", state.currency, format_amount(payment.amount)),
                &state.home_url,
            ))
            .into_response()
        }
        Ok(CallbackOutcome::Failed {
            payment,
            status_code,
            replay,
        }) => {
            info!(transaction_id = %payment.transaction_id, replay, "Payment reported as failed");
            (
                StatusCode::OK,
                format!(
                    "Payment failed. Status: {}",
                    status_code.as_deref().unwrap_or("none")
                ),
            )
                .into_response()
        }
        Err(CallbackError::MissingTransactionId) => {
            (StatusCode::BAD_REQUEST, "Missing transaction id.").into_response()
        }
        Err(CallbackError::NotFound(_)) => {
            (StatusCode::NOT_FOUND, "Transaction not found.").into_response()
        }
        Err(e @ CallbackError::Conflict { .. }) => {
            warn!(error = %e, "Conflicting gateway callback");
            (StatusCode::CONFLICT, "Transaction already finalized.").into_response()
        }
        Err(e) => {
            error!(error = %e, "Callback error");
            (StatusCode::INTERNAL_SERVER_ERROR, "A system error occurred.").into_response()
        }
    }
}

fn success_page(first_name: &str, amount: &str, home_url: &str) -> String {
    format!(
        r#"<html>
<head>
    <title>Success | BaithulMal</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <style>
        body {{ font-family: 'Segoe UI', Roboto, Helvetica, Arial, sans-serif; display: flex; justify-content: center; align-items: center; height: 100vh; margin: 0; background-color: #f0f2f5; }}
        .card {{ background: white; padding: 50px 40px; border-radius: 16px; box-shadow: 0 10px 25px rgba(0,0,0,0.08); max-width: 480px; width: 90%; text-align: center; border-top: 6px solid #92BC13; }}
        h1 {{ color: #2c5e77; margin: 0 0 15px 0; font-size: 28px; }}
        p {{ color: #555; font-size: 17px; line-height: 1.6; margin-bottom: 30px; }}
        .amount-box {{ background: #f9f9f9; padding: 15px; border-radius: 8px; font-weight: bold; color: #92BC13; font-size: 22px; margin-bottom: 30px; border: 1px solid #eee; }}
        .btn {{ background: #92BC13; color: white; padding: 14px 32px; text-decoration: none; border-radius: 8px; font-weight: bold; display: inline-block; }}
        .footer-text {{ margin-top: 25px; font-size: 14px; color: #888; font-style: italic; }}
    </style>
</head>
<body>
    <div class="card">
        <h1>Alhamdulillah!</h1>
        <p>Thank you, <strong>{name}</strong>. Your generous contribution has been received.</p>
        <div class="amount-box">{amount}</div>
        <a href="{home}" class="btn">Return to Home Page</a>
        <div class="footer-text">May Allah reward you and your family.</div>
    </div>
</body>
</html>"#,
        name = escape_html(first_name),
        amount = escape_html(amount),
        home = escape_html(home_url),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_page_shows_name_and_amount() {
        let page = success_page("Zainab", "LKR 3084.50", "https://baithulmal.lk/");
        assert!(page.contains("Thank you, <strong>Zainab</strong>"));
        assert!(page.contains("LKR 3084.50"));
        assert!(page.contains("href=\"https://baithulmal.lk/\""));
    }

    #[test]
    fn success_page_escapes_donor_input() {
        let page = success_page("<script>", "LKR 1.00", "/");
        assert!(!page.contains("<script>"));
        assert!(page.contains("&lt;script&gt;"));
    }
}
