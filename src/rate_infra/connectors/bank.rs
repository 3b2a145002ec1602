use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, REFERER};
use crate::config::sources::BankConfig;
use crate::error::{Error, Result};
use crate::observability::metrics::SOURCE_FALLBACKS;
use crate::rate_infra::connectors::RateConnector;
use crate::types::reading::SourceReading;

/// Fetches the bank's delimited daily quote feed and reads the cash sell
/// rate of the tracked currency.
pub struct BankQuoteParser {
    config: BankConfig,
    client: Client,
}

impl BankQuoteParser {
    pub fn new(config: BankConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::HttpError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(BankQuoteParser { config, client })
    }

    async fn fetch_rate(&self) -> Result<f64> {
        let response = self.client
            .get(&self.config.url)
            .header(ACCEPT, "text/csv, text/plain, */*")
            .header(ACCEPT_LANGUAGE, "zh-TW,zh;q=0.9,en-US;q=0.8,en;q=0.7")
            .header(REFERER, "https://rate.bot.com.tw/")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                status = status.as_u16(),
                body_preview = %body.chars().take(500).collect::<String>(),
                "Bank feed returned error status"
            );
            return Err(Error::UnexpectedStatus { source_id: "bank", status: status.as_u16() });
        }

        let feed = response.text().await?;
        parse_cash_sell(&feed, &self.config.currency_code, self.config.column_index)
    }

    pub async fn quote(&self) -> SourceReading<f64> {
        match self.fetch_rate().await {
            Ok(rate) => {
                tracing::info!(currency = %self.config.currency_code, rate, "Bank quote fetched");
                SourceReading::Live(rate)
            }
            Err(e) => {
                SOURCE_FALLBACKS.with_label_values(&["bank"]).inc();
                tracing::error!(
                    error = %e,
                    fallback = self.config.fallback_rate,
                    "Bank fetch failed, using fallback rate"
                );
                SourceReading::Fallback(self.config.fallback_rate)
            }
        }
    }
}

#[async_trait]
impl RateConnector<f64> for BankQuoteParser {
    async fn fetch(&self) -> SourceReading<f64> {
        self.quote().await
    }

    fn source_id(&self) -> &str {
        "bank"
    }
}

/// Find the first line led by `currency` whose `column` parses as a positive
/// finite rate.
pub fn parse_cash_sell(feed: &str, currency: &str, column: usize) -> Result<f64> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(feed.as_bytes());

    let mut last_error = Error::CurrencyNotFound(currency.to_string());

    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unreadable feed line");
                continue;
            }
        };

        let lead = record.get(0).map(|f| f.trim_start_matches('\u{feff}'));
        if lead != Some(currency) {
            continue;
        }

        let Some(field) = record.get(column) else {
            last_error = Error::ColumnMissing { currency: currency.to_string(), index: column };
            continue;
        };

        match field.parse::<f64>() {
            Ok(rate) if rate.is_finite() && rate > 0.0 => return Ok(rate),
            _ => last_error = Error::InvalidRate(field.to_string()),
        }
    }

    Err(last_error)
}
