mod config;
mod credentials;

use std::net::SocketAddr;
use std::sync::Arc;

use config::WorkerConfig;
use credentials::{PgCredentialStore, PgTokenSource};
use engines::{EngineRegistry, WeightedPriorityEngine};
use integrations::{
    CalDavAdapter, GoogleCalendarAdapter, MicrosoftCalendarAdapter, ProviderRegistry,
};
use services::{ConflictHandler, ImportWorker, PgStore};
use shared::types::ProviderKind;
use sqlx::PgPool;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Check for --migrate-only flag
    let migrate_only = std::env::args().any(|arg| arg == "--migrate-only");

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "worker=debug,services=debug,integrations=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env().expect("Failed to load configuration");

    // Initialize Prometheus metrics with an HTTP scrape endpoint
    let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .expect("Failed to install Prometheus metrics recorder");
    tracing::info!("Prometheus metrics on {}", metrics_addr);

    // Create database pool
    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    tracing::info!("Database migrations complete");

    if migrate_only {
        tracing::info!("Migration-only mode, exiting");
        return;
    }

    // Wire provider adapters
    let registry = Arc::new(build_provider_registry(&pool));
    tracing::info!(
        providers = ?registry.supported_providers(),
        "provider registry ready"
    );

    // Engine runtime: built-ins plus whatever discovery finds
    let engine_registry = Arc::new(EngineRegistry::new());
    engine_registry
        .register_builtin(Arc::new(WeightedPriorityEngine))
        .expect("Failed to register built-in engine");
    let discovered = engines::discover();
    for engine in &discovered.engines {
        tracing::info!(
            id = %engine.manifest.id,
            dir = %engine.directory.display(),
            "discovered plugin engine"
        );
    }
    for error in &discovered.errors {
        tracing::warn!(error = %error, "plugin discovery issue");
    }

    // Import worker
    let store = Arc::new(PgStore::new(pool.clone()));
    let conflicts = Arc::new(ConflictHandler::new(
        store.clone(),
        store.clone(),
        config.conflict_policy,
    ));
    let worker = ImportWorker::new(
        store.clone(),
        store.clone(),
        registry.clone(),
        conflicts,
        config.import.clone(),
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    let worker_task = tokio::spawn(async move { worker.run(stop_rx).await });

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for shutdown signal");
    tracing::info!("Shutdown requested");

    stop_tx.send(true).ok();
    worker_task.await.ok();

    let shutdown_errors = engine_registry.shutdown_all().await;
    for error in shutdown_errors {
        tracing::warn!(error = %error, "engine shutdown issue");
    }
    tracing::info!("Worker stopped");
}

/// Register one bidirectional adapter factory per provider family
fn build_provider_registry(pool: &PgPool) -> ProviderRegistry {
    let registry = ProviderRegistry::new();

    let google_tokens = Arc::new(PgTokenSource::new(pool.clone(), ProviderKind::Google));
    registry.register_bidirectional(ProviderKind::Google, move |calendar| {
        GoogleCalendarAdapter::new(calendar, google_tokens.clone())
    });

    let microsoft_tokens = Arc::new(PgTokenSource::new(pool.clone(), ProviderKind::Microsoft));
    registry.register_bidirectional(ProviderKind::Microsoft, move |calendar| {
        MicrosoftCalendarAdapter::new(calendar, microsoft_tokens.clone())
    });

    let caldav_store = Arc::new(PgCredentialStore::new(pool.clone()));
    let apple_store = caldav_store.clone();
    registry.register_bidirectional(ProviderKind::Caldav, move |calendar| {
        CalDavAdapter::new(calendar, caldav_store.clone())
    });
    registry.register_bidirectional(ProviderKind::Apple, move |calendar| {
        CalDavAdapter::apple(calendar, apple_store.clone())
    });

    registry
}
