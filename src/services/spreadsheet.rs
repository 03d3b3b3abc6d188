//! Orders spreadsheet parsing.
//!
//! The sheet is exported from Google Sheets as XLSX. Its header row carries the
//! original Russian column titles; [`COLUMN_MAP`] pins each one to an
//! [`OrderRow`] field and parsing fails if any of them is missing.

use std::io::Cursor;

use calamine::{Data, Range, Reader, Xlsx};
use chrono::{Duration, NaiveDate};
use thiserror::Error;

use crate::models::order::OrderRow;
use crate::services::decimal::{ConversionError, ToDecimal, parse_decimal};

pub const MIME_TYPE_XLSX: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderField {
    Number,
    OrderNumber,
    PriceUsd,
    DeliveryTime,
}

/// Source header title → target field.
pub const COLUMN_MAP: [(&str, OrderField); 4] = [
    ("№", OrderField::Number),
    ("заказ №", OrderField::OrderNumber),
    ("стоимость,$", OrderField::PriceUsd),
    ("срок поставки", OrderField::DeliveryTime),
];

#[derive(Debug, Error)]
pub enum SpreadsheetError {
    #[error("failed to read XLSX workbook: {0}")]
    Xlsx(#[from] calamine::XlsxError),

    #[error("workbook has no worksheets")]
    NoWorksheet,

    #[error("spreadsheet has no header row")]
    NoHeader,

    #[error("expected column '{0}' not found in header row")]
    MissingColumn(&'static str),

    #[error("row {row}, column '{column}': cannot read '{value}' as {expected}")]
    InvalidCell {
        row: u32,
        column: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("row {row}: invalid price: {source}")]
    InvalidPrice {
        row: u32,
        #[source]
        source: ConversionError,
    },
}

#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    number: usize,
    order_number: usize,
    price_usd: usize,
    delivery_time: usize,
}

impl ColumnIndex {
    fn from_header(header: &[Data]) -> Result<Self, SpreadsheetError> {
        let titles: Vec<String> = header.iter().map(|c| c.to_string().trim().to_string()).collect();

        let position = |title: &'static str| {
            titles
                .iter()
                .position(|t| t == title)
                .ok_or(SpreadsheetError::MissingColumn(title))
        };

        let mut index = ColumnIndex {
            number: 0,
            order_number: 0,
            price_usd: 0,
            delivery_time: 0,
        };
        for (title, field) in COLUMN_MAP {
            let at = position(title)?;
            match field {
                OrderField::Number => index.number = at,
                OrderField::OrderNumber => index.order_number = at,
                OrderField::PriceUsd => index.price_usd = at,
                OrderField::DeliveryTime => index.delivery_time = at,
            }
        }
        Ok(index)
    }
}

/// Parse exported XLSX bytes; the first worksheet holds the orders.
pub fn read_orders(bytes: Vec<u8>) -> Result<Vec<OrderRow>, SpreadsheetError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(SpreadsheetError::NoWorksheet)??;
    parse_orders(&range)
}

/// Map a worksheet range to order rows. The first non-empty row is the header;
/// blank rows are skipped.
pub fn parse_orders(range: &Range<Data>) -> Result<Vec<OrderRow>, SpreadsheetError> {
    let first_row = range.start().map(|(row, _)| row).unwrap_or(0);

    let mut rows = range
        .rows()
        .enumerate()
        .map(|(i, cells)| (first_row + i as u32 + 1, cells))
        .filter(|(_, cells)| !is_blank(cells));

    let (_, header) = rows.next().ok_or(SpreadsheetError::NoHeader)?;
    let columns = ColumnIndex::from_header(header)?;

    let mut orders = Vec::new();
    for (row_number, cells) in rows {
        orders.push(parse_row(row_number, cells, columns)?);
    }

    tracing::debug!(rows = orders.len(), "Parsed orders spreadsheet");

    Ok(orders)
}

fn parse_row(row: u32, cells: &[Data], columns: ColumnIndex) -> Result<OrderRow, SpreadsheetError> {
    let cell = |at: usize| cells.get(at).unwrap_or(&Data::Empty);

    Ok(OrderRow {
        number: read_integer(row, COLUMN_MAP[0].0, cell(columns.number))?,
        order_number: read_integer(row, COLUMN_MAP[1].0, cell(columns.order_number))?,
        price_usd: read_price(row, COLUMN_MAP[2].0, cell(columns.price_usd))?,
        delivery_time: read_date(row, COLUMN_MAP[3].0, cell(columns.delivery_time))?,
    })
}

fn is_blank(cells: &[Data]) -> bool {
    cells.iter().all(|c| match c {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    })
}

fn invalid(row: u32, column: &'static str, value: &Data, expected: &'static str) -> SpreadsheetError {
    SpreadsheetError::InvalidCell {
        row,
        column,
        value: value.to_string(),
        expected,
    }
}

fn read_integer(row: u32, column: &'static str, value: &Data) -> Result<i64, SpreadsheetError> {
    let parsed = match value {
        Data::Int(i) => Some(*i),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Some(*f as i64),
        Data::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| invalid(row, column, value, "integer"))
}

fn read_price(
    row: u32,
    column: &'static str,
    value: &Data,
) -> Result<rust_decimal::Decimal, SpreadsheetError> {
    let converted = match value {
        Data::Float(f) => f.to_decimal(),
        Data::Int(i) => i.to_decimal(),
        Data::String(s) => parse_decimal(s),
        _ => return Err(invalid(row, column, value, "decimal")),
    };
    converted.map_err(|source| SpreadsheetError::InvalidPrice { row, source })
}

fn read_date(row: u32, column: &'static str, value: &Data) -> Result<NaiveDate, SpreadsheetError> {
    let parsed = match value {
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64()),
        Data::Float(f) => excel_serial_to_date(*f),
        Data::Int(i) => excel_serial_to_date(*i as f64),
        Data::DateTimeIso(s) => s.get(..10).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
        Data::String(s) => {
            let s = s.trim();
            NaiveDate::parse_from_str(s, "%d.%m.%Y")
                .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
                .ok()
        }
        _ => None,
    };
    parsed.ok_or_else(|| invalid(row, column, value, "date"))
}

/// Convert an Excel serial day number (1900 date system) to a date.
///
/// Serial 60 is Excel's phantom 1900-02-29 and has no date. Serials below it
/// count from 1899-12-31, the rest from 1899-12-30.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let days = serial.trunc() as i64;
    let epoch = match days {
        1..=59 => NaiveDate::from_ymd_opt(1899, 12, 31)?,
        60 => return None,
        _ => NaiveDate::from_ymd_opt(1899, 12, 30)?,
    };
    epoch.checked_add_signed(Duration::try_days(days)?)
}
