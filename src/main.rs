use std::sync::Arc;

use orders_loader::config::LoaderConfig;
use orders_loader::jobs::orders_sync::run_orders_sync_job;
use orders_loader::{build_loader, init_tracing};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    let config = LoaderConfig::from_env()?;

    tracing::info!(
        file_name = %config.loader.file_name,
        batch_size = config.loader.batch_size,
        "Starting orders loader"
    );

    let loader = build_loader(&config).await?;

    run_orders_sync_job(Arc::new(loader), config.schedule).await;

    Ok(())
}
