use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vela_api::{app, providers, worker, AppState};
use vela_core::notify::{LogSms, SmsSender};
use vela_core::repository::OrderRepository;
use vela_order::{DispatchCoordinator, ReconciliationService, StaleOrderFallback};
use vela_store::{MemoryOrderRepository, PgOrderRepository};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vela_api=debug,vela_order=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = vela_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Vela API on port {}", config.server.port);

    let repo: Arc<dyn OrderRepository> = match &config.database.url {
        Some(url) => {
            let repo = PgOrderRepository::connect(url)
                .await
                .expect("Failed to connect to Postgres");
            repo.run_migrations()
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Using Postgres order store");
            Arc::new(repo)
        }
        None => {
            tracing::warn!("No database configured, orders are held in memory only");
            Arc::new(MemoryOrderRepository::new())
        }
    };

    let registry = Arc::new(providers::build_registry(&config.providers));
    tracing::info!(providers = ?registry.provider_names(), "provider registry ready");

    let sms: Arc<dyn SmsSender> = Arc::new(LogSms);

    let coordinator = Arc::new(DispatchCoordinator::new(
        registry.clone(),
        repo.clone(),
        sms.clone(),
    ));
    let reconciler = Arc::new(ReconciliationService::new(
        registry.clone(),
        repo.clone(),
        sms.clone(),
    ));
    let fallback = Arc::new(StaleOrderFallback::new(
        repo.clone(),
        sms.clone(),
        providers::fallback_policy(&config.fallback),
    ));

    worker::spawn_background_jobs(
        reconciler.clone(),
        fallback.clone(),
        Duration::from_secs(config.reconcile.interval_secs),
        Duration::from_secs(config.fallback.interval_secs),
    );

    let app_state = AppState {
        repo,
        registry,
        coordinator,
        reconciler,
        fallback,
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
