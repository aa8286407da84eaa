use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use app_trust_check::{
    analyzer::AppAnalyzer,
    api::routes::create_router,
    cache::FreshnessCache,
    config::Config,
    llm::provider_from_config,
    service::AnalysisService,
    store::LibsqlStore,
    AppState,
};

fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|error| format!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing()?;

    // Load configuration
    let config = Config::load()?;
    let server_addr = config.server_addr;

    let store = LibsqlStore::open_local(&config.database_path).await?;
    info!(path = %config.database_path, "analysis database ready");

    let provider = provider_from_config(&config.provider);
    info!(provider = provider.name(), "analysis provider configured");

    let service = AnalysisService::new(
        FreshnessCache::new(Arc::new(store)),
        AppAnalyzer::new(provider),
    );

    // Create application state
    let app_state = AppState {
        service: Arc::new(service),
        request_timeout: config.request_timeout,
    };

    // Build the router with routes
    let app = create_router(app_state);

    let listener = TcpListener::bind(server_addr).await?;

    info!(%server_addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
