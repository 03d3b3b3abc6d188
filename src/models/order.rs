use chrono::{DateTime, FixedOffset, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One data row of the orders spreadsheet, after column mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRow {
    pub number: i64,
    pub order_number: i64,
    pub price_usd: Decimal,
    pub delivery_time: NaiveDate,
}

/// Summary of a completed pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub loaded_at: DateTime<FixedOffset>,
    pub rate: Decimal,
    pub rows: usize,
    pub batches: usize,
    pub upserted: u64,
    pub deleted: u64,
}
