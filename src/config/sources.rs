use std::time::Duration;
use serde::{Deserialize, Serialize};

/// Bank quote feed (delimited text, one line per currency).
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct BankConfig {
    pub url: String,
    pub currency_code: String,
    /// Zero-based column holding the cash sell rate.
    pub column_index: usize,
    pub timeout_secs: u64,
    pub fallback_rate: f64,
    pub user_agent: String,
}

impl BankConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for BankConfig {
    fn default() -> Self {
        BankConfig {
            url: "https://rate.bot.com.tw/xrt/flcsv/0/day".to_string(),
            currency_code: "USD".to_string(),
            column_index: 12,
            timeout_secs: 10,
            fallback_rate: 31.815,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Kiosk exchange page rendered through a WebDriver-controlled browser.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct KioskConfig {
    pub page_url: String,
    pub webdriver_url: String,
    /// Options live under this `<select>`.
    pub select_selector: String,
    pub direct_unit: String,
    pub usd_unit: String,
    pub usd_denomination: String,
    pub rate_attribute: String,
    pub max_retries: u32,
    pub navigation_timeout_secs: u64,
    pub selector_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub fallback_twd_rate: f64,
    pub fallback_usd_rate: f64,
    pub user_agent: String,
}

impl KioskConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn selector_timeout(&self) -> Duration {
        Duration::from_secs(self.selector_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Readiness signal: the direct-currency option is attached to the DOM.
    pub fn ready_selector(&self) -> String {
        format!(r#"{} option[data-unit="{}"]"#, self.select_selector, self.direct_unit)
    }
}

impl Default for KioskConfig {
    fn default() -> Self {
        KioskConfig {
            page_url: "https://www.superrichthailand.com/#!/en/exchange".to_string(),
            webdriver_url: "http://localhost:9515".to_string(),
            select_selector: "select#selectCurrency".to_string(),
            direct_unit: "TWD".to_string(),
            usd_unit: "USD".to_string(),
            usd_denomination: "100".to_string(),
            rate_attribute: "data-buy".to_string(),
            max_retries: 2,
            navigation_timeout_secs: 60,
            selector_timeout_secs: 30,
            poll_interval_ms: 250,
            fallback_twd_rate: 1.005,
            fallback_usd_rate: 31.39,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
