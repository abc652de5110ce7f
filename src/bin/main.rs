use ledgerbot::{
    api::start_server,
    config::Config,
    parser::RecordParser,
    provider,
    service::LedgerService,
    sink::SqliteRecordStore,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config = Config::from_env();

    info!("AI Bookkeeping Bot");
    info!("Port: {}", config.port);

    // Create components
    let completion_provider = provider::from_config(&config)?;
    let parser = RecordParser::new(completion_provider);
    let store = Arc::new(SqliteRecordStore::connect(&config.database_url).await?);
    let service = Arc::new(LedgerService::new(parser, store));

    info!("Service initialized, starting API server...");

    start_server(service, config.port).await?;

    Ok(())
}
