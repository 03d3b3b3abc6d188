// src/lib.rs

use sea_orm::{Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::LoaderConfig;
use services::cbr::{CbrRateFetcher, RateFetchError};
use services::google_drive::{GoogleDriveClient, StaticToken, StorageClientError};
use services::loader::Loader;
use services::order_repository::SeaOrmOrderRepository;

pub mod config;

pub mod entities {
    pub mod prelude;
    pub mod orders;
}

pub mod services {
    pub mod cbr;
    pub mod decimal;
    pub mod google_drive;
    pub mod loader;
    pub mod order_repository;
    pub mod spreadsheet;
}

pub mod jobs;
pub mod models;

/// The production wiring of the pipeline.
pub type OrdersLoader = Loader<GoogleDriveClient, CbrRateFetcher, SeaOrmOrderRepository>;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database setup failed: {0}")]
    Database(#[from] DbErr),

    #[error("Google Drive client setup failed: {0}")]
    Storage(#[from] StorageClientError),

    #[error("CBR client setup failed: {0}")]
    Rate(#[from] RateFetchError),
}

/// Install the process-wide tracing subscriber.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,orders_loader=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Connect to the database and bring the schema up to date.
pub async fn connect_database(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    tracing::info!("Connecting to database...");
    let db = Database::connect(database_url).await?;

    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None).await?;

    Ok(db)
}

/// Build the loader from configuration, connecting to every collaborator.
pub async fn build_loader(config: &LoaderConfig) -> Result<OrdersLoader, BootstrapError> {
    let db = connect_database(&config.database_url).await?;

    let drive = GoogleDriveClient::new(
        config.drive_api_url.clone(),
        Box::new(StaticToken::new(config.drive_token.clone())),
        config.http_timeout,
    )?;
    let rates = CbrRateFetcher::new(
        config.cbr_url.clone(),
        config.cbr_valute_id.clone(),
        config.http_timeout,
    )?;

    Ok(Loader::new(
        drive,
        rates,
        SeaOrmOrderRepository::new(db),
        config.loader.clone(),
    ))
}
