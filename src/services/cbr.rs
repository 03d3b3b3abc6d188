//! Central Bank of Russia daily rates client.
//!
//! `XML_daily.asp` returns every quoted currency for the current day:
//!
//! ```xml
//! <ValCurs Date="24.05.2024" name="Foreign Currency Market">
//!   <Valute ID="R01235">
//!     <CharCode>USD</CharCode>
//!     <Nominal>1</Nominal>
//!     <Value>90,5000</Value>
//!   </Valute>
//! </ValCurs>
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::services::decimal::{parse_decimal, ConversionError};

#[derive(Debug, Error)]
pub enum RateFetchError {
    #[error("request to CBR failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("CBR responded with {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed CBR document: {0}")]
    Xml(String),

    #[error("currency {0} not found in CBR document")]
    MissingCurrency(String),

    #[error("currency {0} has no Value element")]
    MissingValue(String),

    #[error("invalid CBR rate: {0}")]
    Conversion(#[from] ConversionError),
}

/// Source of the exchange rate used to convert prices.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch_rate(&self) -> Result<Decimal, RateFetchError>;
}

#[derive(Debug, Deserialize)]
struct ValCurs {
    #[serde(rename = "Valute", default)]
    valutes: Vec<Valute>,
}

#[derive(Debug, Deserialize)]
struct Valute {
    #[serde(rename = "@ID")]
    id: String,
    #[serde(rename = "Value")]
    value: Option<String>,
}

#[derive(Clone)]
pub struct CbrRateFetcher {
    client: Client,
    url: String,
    valute_id: String,
}

impl CbrRateFetcher {
    pub fn new(url: String, valute_id: String, timeout: Duration) -> Result<Self, RateFetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url,
            valute_id,
        })
    }
}

#[async_trait]
impl RateSource for CbrRateFetcher {
    async fn fetch_rate(&self) -> Result<Decimal, RateFetchError> {
        tracing::info!(url = %self.url, valute_id = %self.valute_id, "Fetching rate from CBR");

        let response = self.client.get(&self.url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RateFetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let rate = parse_rate(&body, &self.valute_id)?;

        tracing::info!(valute_id = %self.valute_id, rate = %rate, "Fetched CBR rate");

        Ok(rate)
    }
}

/// Extract the `Value` of the `Valute` with the given `ID`.
pub fn parse_rate(xml: &str, valute_id: &str) -> Result<Decimal, RateFetchError> {
    let document: ValCurs =
        quick_xml::de::from_str(xml).map_err(|e| RateFetchError::Xml(e.to_string()))?;

    let valute = document
        .valutes
        .into_iter()
        .find(|v| v.id == valute_id)
        .ok_or_else(|| RateFetchError::MissingCurrency(valute_id.to_string()))?;

    let value = valute
        .value
        .ok_or_else(|| RateFetchError::MissingValue(valute_id.to_string()))?;

    Ok(parse_decimal(&value)?)
}
