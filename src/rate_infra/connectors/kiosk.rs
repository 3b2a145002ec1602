use std::sync::Arc;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::Instrument;
use crate::config::sources::KioskConfig;
use crate::error::{Error, Result};
use crate::observability::metrics::{KIOSK_ATTEMPTS, SOURCE_FALLBACKS};
use crate::observability::tracing::trace_kiosk_attempt;
use crate::rate_infra::browser::{with_session, PageDriver, PageSession, PageTask};
use crate::rate_infra::connectors::RateConnector;
use crate::types::reading::SourceReading;
use crate::types::snapshot::KioskRates;

/// Reads the raw rate attributes of the two options we need, plus every USD
/// option for diagnostics. Arguments: select selector, direct unit, USD unit,
/// USD denomination, rate attribute.
const EXTRACT_SCRIPT: &str = r#"
const [sel, directUnit, usdUnit, denom, attr] = arguments;
const direct = document.querySelector(`${sel} option[data-unit="${directUnit}"]`);
const usd = document.querySelector(`${sel} option[data-unit="${usdUnit}"][data-demon="${denom}"]`);
const usdOptions = Array.from(document.querySelectorAll(`${sel} option[data-unit="${usdUnit}"]`))
    .map(opt => ({ text: opt.innerText, denomination: opt.getAttribute('data-demon'), buy: opt.getAttribute(attr) }));
return {
    direct: direct ? direct.getAttribute(attr) : null,
    usd: usd ? usd.getAttribute(attr) : null,
    usdOptions
};
"#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractedAttributes {
    direct: Option<String>,
    usd: Option<String>,
    #[serde(default)]
    usd_options: Vec<Value>,
}

pub struct KioskPageExtractor {
    config: KioskConfig,
    driver: Arc<dyn PageDriver>,
}

impl KioskPageExtractor {
    pub fn new(config: KioskConfig, driver: Arc<dyn PageDriver>) -> Self {
        KioskPageExtractor { config, driver }
    }

    fn fallback(&self) -> KioskRates {
        KioskRates {
            twd_rate: self.config.fallback_twd_rate,
            usd_rate: self.config.fallback_usd_rate,
        }
    }

    /// Initial attempt plus `max_retries` retries, each in a fresh session.
    pub async fn extract(&self) -> SourceReading<KioskRates> {
        let total_attempts = self.config.max_retries.saturating_add(1);
        let task = KioskScrape { config: &self.config };

        for attempt in 1..=total_attempts {
            KIOSK_ATTEMPTS.inc();
            let span = trace_kiosk_attempt(attempt, total_attempts);

            match with_session(self.driver.as_ref(), &task).instrument(span).await {
                Ok(rates) => {
                    tracing::info!(attempt, twd = rates.twd_rate, usd = rates.usd_rate, "Kiosk rates extracted");
                    return SourceReading::Live(rates);
                }
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        retries_left = total_attempts - attempt,
                        error = %e,
                        "Kiosk scraping failed"
                    );
                }
            }
        }

        SOURCE_FALLBACKS.with_label_values(&["kiosk"]).inc();
        let fallback = self.fallback();
        tracing::error!(
            attempts = total_attempts,
            twd = fallback.twd_rate,
            usd = fallback.usd_rate,
            "Kiosk retries exhausted, using fallback rates"
        );
        SourceReading::Fallback(fallback)
    }
}

#[async_trait]
impl RateConnector<KioskRates> for KioskPageExtractor {
    async fn fetch(&self) -> SourceReading<KioskRates> {
        self.extract().await
    }

    fn source_id(&self) -> &str {
        "kiosk"
    }
}

struct KioskScrape<'a> {
    config: &'a KioskConfig,
}

#[async_trait]
impl PageTask for KioskScrape<'_> {
    type Output = KioskRates;

    async fn run(&self, session: &mut dyn PageSession) -> Result<KioskRates> {
        let config = self.config;
        session.navigate(&config.page_url, config.navigation_timeout()).await?;
        // Rate data arrives asynchronously after first render; the hidden
        // option being attached is the readiness signal.
        session.wait_for_selector(&config.ready_selector(), config.selector_timeout()).await?;

        let raw = session.evaluate(
            EXTRACT_SCRIPT,
            vec![
                json!(config.select_selector),
                json!(config.direct_unit),
                json!(config.usd_unit),
                json!(config.usd_denomination),
                json!(config.rate_attribute),
            ],
        ).await?;

        parse_extraction(raw, config)
    }
}

fn parse_extraction(raw: Value, config: &KioskConfig) -> Result<KioskRates> {
    let attrs: ExtractedAttributes = serde_json::from_value(raw)
        .map_err(|e| Error::DeserializationError(e.to_string()))?;

    if attrs.usd.is_none() {
        let available = Value::Array(attrs.usd_options.clone()).to_string();
        tracing::warn!(
            unit = %config.usd_unit,
            denomination = %config.usd_denomination,
            available = %available,
            "USD option missing, dumping available USD options"
        );
    }

    let direct = attrs.direct.as_deref().and_then(parse_rate);
    let usd = attrs.usd.as_deref().and_then(parse_rate);

    match (direct, usd) {
        (Some(twd_rate), Some(usd_rate)) => Ok(KioskRates { twd_rate, usd_rate }),
        (direct, usd) => Err(Error::ExtractionFailed { direct, usd }),
    }
}

fn parse_rate(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}
