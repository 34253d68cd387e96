//! Rates scraped from the x-rates.com exchange rates table.

use crate::core::config::SourceConfig;
use crate::core::currency::{CurrencyCode, RateRecord, RateSource, Rates};
use crate::core::error::FetchError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, instrument, warn};

const RATES_TABLE: &str = "table.tablesorter.ratesTable";
const ROWS: &str = "tbody tr";
const NAME_CELL: &str = "td";
const RATE_LINK: &str = "td.rtRates a";

pub struct XRatesSource {
    url: String,
    client: reqwest::Client,
    base: RateRecord,
}

impl XRatesSource {
    pub fn new(config: &SourceConfig, base: RateRecord) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("Invalid header name: {name}"))?;
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("Invalid value for header {name}"))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(XRatesSource {
            url: config.url.clone(),
            client,
            base,
        })
    }
}

#[async_trait]
impl RateSource for XRatesSource {
    #[instrument(name = "XRatesFetch", skip(self), fields(url = %self.url))]
    async fn fetch_rates(&self) -> Result<Rates, FetchError> {
        debug!("Requesting rates page");
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status,
                url: self.url.clone(),
            });
        }

        let body = response.text().await?;
        let mut rates = parse_rates_table(&body)?;
        rates.insert(self.base.code.clone(), self.base.clone());

        debug!(currencies = rates.len(), "Parsed rates page");
        Ok(rates)
    }
}

fn selector(css: &str) -> Result<Selector, FetchError> {
    Selector::parse(css).map_err(|e| FetchError::Parse(format!("bad selector {css:?}: {e}")))
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Extracts one record per row of the sortable rates table.
///
/// Each row holds the display name in its first cell and the rate in the first
/// `rtRates` link, whose target ends with the three letter currency code.
pub fn parse_rates_table(html: &str) -> Result<Rates, FetchError> {
    let table_selector = selector(RATES_TABLE)?;
    let row_selector = selector(ROWS)?;
    let name_selector = selector(NAME_CELL)?;
    let rate_selector = selector(RATE_LINK)?;

    let document = Html::parse_document(html);
    let table = document
        .select(&table_selector)
        .next()
        .ok_or_else(|| FetchError::Parse("rates table not found".to_string()))?;

    let mut rates = Rates::new();
    for (index, row) in table.select(&row_selector).enumerate() {
        let name = row
            .select(&name_selector)
            .next()
            .map(element_text)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| FetchError::Parse(format!("row {index}: missing currency name")))?;

        let link = row
            .select(&rate_selector)
            .next()
            .ok_or_else(|| FetchError::Parse(format!("row {index} ({name}): missing rate")))?;

        let value_text = element_text(link);
        let value: f64 = value_text.replace(',', "").parse().map_err(|_| {
            FetchError::Parse(format!("row {index} ({name}): invalid rate {value_text:?}"))
        })?;

        let href = link.value().attr("href").unwrap_or_default();
        let code = href
            .char_indices()
            .rev()
            .nth(2)
            .map(|(start, _)| &href[start..])
            .ok_or_else(|| FetchError::Parse(format!("row {index} ({name}): missing rate link")))
            .and_then(|tail| {
                CurrencyCode::new(tail)
                    .map_err(|e| FetchError::Parse(format!("row {index} ({name}): {e}")))
            })?;

        let record = RateRecord::new(name, value, code)
            .map_err(|e| FetchError::Parse(format!("row {index}: {e}")))?;
        if let Some(previous) = rates.insert(record.code.clone(), record) {
            warn!(code = %previous.code, row = index, "Duplicate currency row, keeping the later one");
        }
    }

    if rates.is_empty() {
        return Err(FetchError::Parse("rates table has no rows".to_string()));
    }
    Ok(rates)
}
