//! Orders pipeline: Drive spreadsheet → CBR rate → `orders` table.
//!
//! 1. Resolve the spreadsheet id by name
//! 2. Export it as XLSX and map the columns
//! 3. Fetch the USD rate and compute `price_rur` (truncated to cents)
//! 4. Stamp every row with one `loaded_at`
//! 5. Upsert in batches, then delete rows from earlier runs
//!
//! A failure aborts the run. Batches already committed stay in place and the
//! stale-row cleanup is skipped, so the next successful run reconciles the table.

use chrono::{DateTime, FixedOffset, SubsecRound, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::DbErr;
use thiserror::Error;

use crate::config::LoaderSettings;
use crate::entities::orders;
use crate::models::order::{LoadReport, OrderRow};
use crate::services::cbr::{RateFetchError, RateSource};
use crate::services::decimal::convert_truncated;
use crate::services::google_drive::{FileStorage, StorageClientError, name_query};
use crate::services::order_repository::OrderRepository;
use crate::services::spreadsheet::{self, MIME_TYPE_XLSX, SpreadsheetError};

/// Fractional digits kept in `price_usd` and `price_rur`
pub const PRICE_DECIMAL_PLACES: u32 = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FileResolutionError {
    #[error("no file named '{name}' found")]
    NotFound { name: String },

    #[error("found {count} files named '{name}'")]
    Ambiguous { name: String, count: usize },
}

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error(transparent)]
    FileResolution(#[from] FileResolutionError),

    #[error("storage client error: {0}")]
    Storage(#[from] StorageClientError),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] SpreadsheetError),

    #[error("rate fetch error: {0}")]
    Rate(#[from] RateFetchError),

    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

pub struct Loader<S, R, P> {
    storage: S,
    rates: R,
    repository: P,
    settings: LoaderSettings,
}

impl<S, R, P> Loader<S, R, P>
where
    S: FileStorage,
    R: RateSource,
    P: OrderRepository,
{
    pub fn new(storage: S, rates: R, repository: P, settings: LoaderSettings) -> Self {
        Self {
            storage,
            rates,
            repository,
            settings,
        }
    }

    pub fn settings(&self) -> &LoaderSettings {
        &self.settings
    }

    pub fn repository(&self) -> &P {
        &self.repository
    }

    /// Run the pipeline once.
    pub async fn load_data(&self) -> Result<LoadReport, LoaderError> {
        let file_id = resolve_file_id(&self.storage, &self.settings.file_name).await?;

        let bytes = self.storage.export_file(&file_id, MIME_TYPE_XLSX).await?;
        let rows = spreadsheet::read_orders(bytes)?;
        tracing::info!(file_id = %file_id, rows = rows.len(), "Parsed orders spreadsheet");

        let rate = self.rates.fetch_rate().await?;

        let loaded_at = run_timestamp();
        let records = build_records(rows, rate, loaded_at);
        if records.is_empty() {
            tracing::warn!("Orders spreadsheet is empty, the table will be cleared");
        }

        let mut upserted = 0;
        let mut batches = 0;
        for batch in records.chunks(self.settings.batch_size.max(1)) {
            upserted += self.repository.upsert_batch(batch).await?;
            batches += 1;
        }

        let deleted = self.repository.delete_stale(loaded_at).await?;

        let report = LoadReport {
            loaded_at,
            rate,
            rows: records.len(),
            batches,
            upserted,
            deleted,
        };

        tracing::info!(
            rows = report.rows,
            batches = report.batches,
            upserted = report.upserted,
            deleted = report.deleted,
            rate = %report.rate,
            loaded_at = %report.loaded_at,
            "Orders loaded"
        );

        Ok(report)
    }
}

/// Find the single file called `name`.
pub async fn resolve_file_id<S>(storage: &S, name: &str) -> Result<String, LoaderError>
where
    S: FileStorage + ?Sized,
{
    let mut files = storage.search_files(&name_query(name)).await?;

    match files.len() {
        0 => Err(FileResolutionError::NotFound {
            name: name.to_string(),
        }
        .into()),
        1 => Ok(files.remove(0).id),
        count => Err(FileResolutionError::Ambiguous {
            name: name.to_string(),
            count,
        }
        .into()),
    }
}

/// Attach the converted price and the run timestamp to every parsed row.
///
/// `price_usd` is rounded half away from zero to the `NUMERIC(10,2)` scale
/// before conversion, matching what PostgreSQL stores.
pub fn build_records(
    rows: Vec<OrderRow>,
    rate: Decimal,
    loaded_at: DateTime<FixedOffset>,
) -> Vec<orders::Model> {
    rows.into_iter()
        .map(|row| {
            let price_usd = row.price_usd.round_dp_with_strategy(
                PRICE_DECIMAL_PLACES,
                RoundingStrategy::MidpointAwayFromZero,
            );
            orders::Model {
                number: row.number,
                order_number: row.order_number,
                price_usd,
                price_rur: convert_truncated(price_usd, rate, PRICE_DECIMAL_PLACES),
                delivery_time: row.delivery_time,
                loaded_at,
            }
        })
        .collect()
}

/// Current time at PostgreSQL `timestamptz` precision, so the value compared in
/// the stale-row delete is exactly the one stored.
pub fn run_timestamp() -> DateTime<FixedOffset> {
    Utc::now().trunc_subsecs(6).fixed_offset()
}
