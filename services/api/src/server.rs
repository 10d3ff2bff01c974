use crate::cli::ServeArgs;
use crate::infra::{
    register_webhook_handlers, standard_chains, ApiContext, AppState, InMemoryStateRepository,
    OfflineProviderClient, RecordingPublisher,
};
use crate::routes::with_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use showops::config::{AppConfig, AppEnvironment};
use showops::error::AppError;
use showops::integrations::{
    ChainEngine, CredentialStore, ProviderClient, ProviderRegistry, RestProviderClient,
    RetryPolicy, WebhookProcessor,
};
use showops::telemetry;
use showops::workflows::production::WorkflowService;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let repository = Arc::new(InMemoryStateRepository::default());
    let publisher = Arc::new(RecordingPublisher::default());
    let service = WorkflowService::new(repository, publisher);

    let registry = Arc::new(ProviderRegistry::standard());
    let client: Arc<dyn ProviderClient> = match config.environment {
        AppEnvironment::Production => Arc::new(RestProviderClient::new(CredentialStore::new())),
        _ => Arc::new(OfflineProviderClient),
    };
    let retry = RetryPolicy::from_config(&config.integrations.retry);
    let engine = ChainEngine::new(registry.clone(), client, retry);

    let mut processor =
        WebhookProcessor::new(config.integrations.webhook_secret.clone(), registry);
    register_webhook_handlers(&mut processor);

    let context = Arc::new(ApiContext {
        service,
        engine,
        chains: standard_chains(),
        processor,
    });

    let app = with_routes(context)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "production workflow service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
