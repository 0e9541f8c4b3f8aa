use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info};

use donations_backend::api::{self, AppServices};
use donations_backend::config::AppConfig;
use donations_backend::database::contact_message_repository::ContactMessageRepository;
use donations_backend::database::memory::{InMemoryContactMessageStore, InMemoryPaymentStore};
use donations_backend::database::payment_repository::PaymentRepository;
use donations_backend::database::repository::{ContactMessageStore, PaymentStore};
use donations_backend::database::{init_pool_from_config, run_migrations};
use donations_backend::health::HealthChecker;
use donations_backend::logging::init_tracing;
use donations_backend::payments::provider::PaymentGateway;
use donations_backend::payments::webxpay::WebXPayGateway;
use donations_backend::services::contact::ContactService;
use donations_backend::services::dashboard::DashboardService;
use donations_backend::services::donation::DonationService;
use donations_backend::services::notification::notifier_from_config;
use donations_backend::services::{CallbackProcessor, CurrencyConverter, ReceiptRenderer};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("failed to load configuration")?;
    init_tracing(&config.logging);
    config.validate().map_err(|e| {
        error!(error = %e, "Invalid configuration");
        e
    })?;

    let skip_externals = std::env::var("SKIP_EXTERNALS")
        .unwrap_or_else(|_| "false".to_string())
        .to_lowercase()
        == "true";

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        settlement_currency = %config.currency.settlement_currency,
        "🚀 Starting donations backend"
    );

    let db_pool = if skip_externals {
        info!("⏭️  Using in-memory stores (SKIP_EXTERNALS=true)");
        None
    } else {
        info!("📊 Initializing database connection pool...");
        let pool = init_pool_from_config(&config.database).await.map_err(|e| {
            error!("Failed to initialize database pool: {}", e);
            e
        })?;
        run_migrations(&pool).await?;
        info!(
            max_connections = pool.options().get_max_connections(),
            "✅ Database ready"
        );
        Some(pool)
    };

    let payments: Arc<dyn PaymentStore> = match &db_pool {
        Some(pool) => Arc::new(PaymentRepository::new(pool.clone())),
        None => Arc::new(InMemoryPaymentStore::new()),
    };
    let messages: Arc<dyn ContactMessageStore> = match &db_pool {
        Some(pool) => Arc::new(ContactMessageRepository::new(pool.clone())),
        None => Arc::new(InMemoryContactMessageStore::new()),
    };

    let gateway: Arc<dyn PaymentGateway> = Arc::new(
        WebXPayGateway::from_config(&config.gateway, &config.currency)
            .context("failed to initialize WebXPay gateway")?,
    );
    let notifier = notifier_from_config(&config.notification)
        .context("failed to initialize receipt notifier")?;
    let settlement_currency = config.currency.settlement_currency.clone();
    let renderer = ReceiptRenderer::new(config.notification.clone(), settlement_currency.clone());

    let services = AppServices {
        donations: Arc::new(DonationService::new(
            payments.clone(),
            gateway.clone(),
            CurrencyConverter::new(config.currency.clone()),
        )),
        callbacks: Arc::new(CallbackProcessor::new(
            payments.clone(),
            gateway,
            notifier,
            renderer,
        )),
        contact: Arc::new(ContactService::new(messages.clone())),
        dashboard: Arc::new(DashboardService::new(payments, messages)),
        health: HealthChecker::new(db_pool),
        settlement_currency,
        home_url: config.notification.site_url.clone(),
        admin_api_key: config.admin.api_key.clone(),
    };

    let app = api::with_middleware(api::router(services), &config.server.cors_allowed_origins);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid SERVER_HOST/SERVER_PORT")?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "🌐 Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}
