use std::{str::FromStr, sync::Arc, time::Duration};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bazaar::{
    api,
    auth::TokenService,
    config::{GatewayProvider, Settings},
    payments::{PaymentGateway, RazorpayGateway, SandboxGateway},
    service::{rate_provider::StaticRateProvider, ServiceContext},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bazaar=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    tracing::info!("Starting Bazaar settlement server on {}:{}", settings.server.host, settings.server.port);

    // Initialize database
    let connect_options = SqliteConnectOptions::from_str(&settings.database.url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(settings.database.busy_timeout_ms));

    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect_with(connect_options)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let gateway: Arc<dyn PaymentGateway> = match settings.gateway.provider {
        GatewayProvider::Razorpay => {
            tracing::info!("Using Razorpay gateway at {}", settings.gateway.api_base_url);
            Arc::new(RazorpayGateway::new(&settings.gateway)?)
        }
        GatewayProvider::Sandbox => {
            tracing::warn!("Using in-process sandbox gateway; no real payments will be taken");
            Arc::new(SandboxGateway::new(
                settings.gateway.key_id.clone(),
                settings.gateway.key_secret.clone(),
            ))
        }
    };

    let rates = Arc::new(StaticRateProvider::from_config(&settings.commission)?);

    // Create service context
    let service_context = Arc::new(ServiceContext::new(db_pool.clone(), gateway, rates, &settings));
    let tokens = Arc::new(TokenService::new(&settings.auth));

    // Commission accrual runs beside the server and drains on shutdown
    let shutdown = CancellationToken::new();
    let worker = service_context.accrual_worker(&settings);
    let worker_handle = tokio::spawn(worker.run(shutdown.clone()));

    let app = api::create_app(service_context, tokens, Arc::new(settings.clone()));

    let listener = tokio::net::TcpListener::bind(
        format!("{}:{}", settings.server.host, settings.server.port)
    ).await?;

    tracing::info!("Server listening on http://{}:{}", settings.server.host, settings.server.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Err(e) = worker_handle.await {
        tracing::error!("Accrual worker task failed: {}", e);
    }
    db_pool.close().await;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown signal received");
        }
        _ = shutdown.cancelled() => {}
    }
}
