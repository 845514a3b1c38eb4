use std::sync::Arc;
use tipster_bot::{
    api::start_server,
    providers::{HuggingFaceClient, SportsDbClient},
    storage::build_backends,
    BotConfig, Dispatcher, RefreshScheduler, ResponseCatalog,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = BotConfig::from_env()?;

    if config.huggingface_token.is_empty() {
        warn!("⚠️  HUGGINGFACE_API_TOKEN not set, tips will come from the local pool");
    }

    info!("🚀 Tipster Bot - API Server");
    info!("📍 Port: {}", config.port);
    info!("⚽ League: {}", config.league_id);

    // Create components
    let backends = build_backends(config.database_url.as_deref());
    let sports = SportsDbClient::new(
        &config.sports_api_base_url,
        config.sports_api_key.clone(),
        config.fetch_timeout,
    )?;
    let generator = HuggingFaceClient::new(
        config.huggingface_token.clone(),
        config.huggingface_model_url.clone(),
        config.fetch_timeout,
    )?;

    let mut builder = Dispatcher::builder()
        .backends(backends)
        .data_provider(Arc::new(sports))
        .generation_provider(Arc::new(generator))
        .league_id(config.league_id.clone())
        .sports_ttl(config.sports_cache_ttl)
        .generation_ttl(config.generation_cache_ttl)
        .fetch_timeout(config.fetch_timeout);

    if let Some(path) = &config.catalog_path {
        info!("📖 Phrase catalog: {}", path.display());
        builder = builder.catalog(ResponseCatalog::from_file(path)?);
    }

    let dispatcher = builder.build()?;
    info!("✅ Dispatcher initialized");

    // Scheduled refresh
    let cancel = CancellationToken::new();
    let scheduler = RefreshScheduler::builder()
        .interval(config.refresh_interval)
        .build();
    tokio::spawn(scheduler.run(dispatcher.clone(), cancel.clone()));

    info!("📡 Starting API server...");
    let result = start_server(Arc::new(dispatcher), config.port).await;

    cancel.cancel();
    result
}
