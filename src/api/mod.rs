//! HTTP routes

pub mod callbacks;
pub mod contact;
pub mod dashboard;
pub mod donations;
pub mod health;

use axum::{
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::warn;

use crate::health::HealthChecker;
use crate::middleware::admin_auth::{require_admin_api_key, ADMIN_KEY_HEADER};
use crate::middleware::logging::{request_logging_middleware, UuidRequestId};
use crate::services::callback_processor::CallbackProcessor;
use crate::services::contact::ContactService;
use crate::services::dashboard::DashboardService;
use crate::services::donation::DonationService;

/// Everything the routes need, wired once at startup
pub struct AppServices {
    pub donations: Arc<DonationService>,
    pub callbacks: Arc<CallbackProcessor>,
    pub contact: Arc<ContactService>,
    pub dashboard: Arc<DashboardService>,
    pub health: HealthChecker,
    /// Shown on the success page, e.g. `LKR`
    pub settlement_currency: String,
    /// "Return to Home Page" link on the success page
    pub home_url: String,
    pub admin_api_key: String,
}

/// Build the route table without the outer request-id/logging/CORS layers
pub fn router(services: AppServices) -> Router {
    let donation_routes = Router::new()
        .route("/payments/create/", post(donations::create_payment))
        .route("/payments/create", post(donations::create_payment))
        .with_state(Arc::new(donations::DonationState {
            service: services.donations,
        }));

    let callback_routes = Router::new()
        .route(
            "/payments/callback/",
            get(callbacks::handle_callback_get).post(callbacks::handle_callback_post),
        )
        .route(
            "/payments/callback",
            get(callbacks::handle_callback_get).post(callbacks::handle_callback_post),
        )
        .with_state(Arc::new(callbacks::CallbackState {
            processor: services.callbacks,
            currency: services.settlement_currency,
            home_url: services.home_url,
        }));

    let contact_routes = Router::new()
        .route(
            "/contact/",
            post(contact::submit_contact).fallback(contact::method_not_allowed),
        )
        .route(
            "/contact",
            post(contact::submit_contact).fallback(contact::method_not_allowed),
        )
        .with_state(Arc::new(contact::ContactState {
            service: services.contact,
        }));

    let dashboard_routes = Router::new()
        .route("/stats", get(dashboard::stats))
        .route("/donations", get(dashboard::donations))
        .route("/donations/export", get(dashboard::export_donations))
        .route("/failed", get(dashboard::failed_payments))
        .route("/messages", get(dashboard::messages))
        .with_state(Arc::new(dashboard::DashboardState {
            service: services.dashboard,
        }))
        .layer(axum::middleware::from_fn_with_state(
            Arc::new(services.admin_api_key),
            require_admin_api_key,
        ));

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .with_state(Arc::new(health::HealthState {
            checker: services.health,
        }));

    Router::new()
        .merge(donation_routes)
        .merge(callback_routes)
        .merge(contact_routes)
        .nest("/dashboard", dashboard_routes)
        .merge(health_routes)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(ADMIN_KEY_HEADER)])
        .max_age(Duration::from_secs(60 * 60));

    if allowed_origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(origins))
}

/// Wrap the routes with request ids, request logging and CORS
pub fn with_middleware(router: Router, allowed_origins: &[String]) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
            .layer(axum::middleware::from_fn(request_logging_middleware))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(cors_layer(allowed_origins)),
    )
}
