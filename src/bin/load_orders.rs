//! Run the orders pipeline once and exit.

use orders_loader::config::LoaderConfig;
use orders_loader::jobs::orders_sync::load_orders;
use orders_loader::{build_loader, init_tracing};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    init_tracing();

    let config = LoaderConfig::from_env()?;
    let loader = build_loader(&config).await?;

    let report = load_orders(&loader).await?;

    println!(
        "Loaded {} orders at {} (rate {}), removed {} stale rows",
        report.rows, report.loaded_at, report.rate, report.deleted
    );

    Ok(())
}
