use serde::{Deserialize, Serialize};

pub mod sources;
pub mod ledger;
pub mod loader;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub enabled: bool,
    /// Local wall-clock time, `HH:MM`.
    pub time: String,
    /// Reference timezone. Also used to derive each snapshot's calendar day.
    pub timezone: String,
    pub run_on_startup: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        ScheduleConfig {
            enabled: true,
            time: "23:50".to_string(),
            timezone: "Asia/Taipei".to_string(),
            run_on_startup: true,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub history_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: "0.0.0.0:3000".to_string(),
            history_limit: 30,
        }
    }
}

/// Substitutes used by the comparison engine when a rate is missing or zero.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ComparisonConfig {
    pub default_bank_sell_usd: f64,
    pub default_kiosk_usd_rate: f64,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        ComparisonConfig {
            default_bank_sell_usd: 31.8,
            default_kiosk_usd_rate: 31.36,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub json: bool,
}
