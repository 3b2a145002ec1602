use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use crate::types::reading::Provenance;

/// Rates read from the kiosk page in one attempt.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct KioskRates {
    pub twd_rate: f64,
    pub usd_rate: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStatus {
    pub bank: Provenance,
    pub kiosk: Provenance,
}

/// One acquisition's combined result, keyed by `calendar_day`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateSnapshot {
    pub calendar_day: NaiveDate,
    pub recorded_at: DateTime<Utc>,
    pub bank_sell_usd: f64,
    pub kiosk_twd_rate: f64,
    pub kiosk_usd_rate: f64,
    #[serde(default)]
    pub degraded: bool,
    #[serde(default)]
    pub sources: SourceStatus,
}

impl RateSnapshot {
    pub fn new(
        recorded_at: DateTime<Utc>,
        calendar_day: NaiveDate,
        bank_sell_usd: f64,
        rates: KioskRates,
        sources: SourceStatus,
    ) -> Self {
        RateSnapshot {
            calendar_day,
            recorded_at,
            bank_sell_usd,
            kiosk_twd_rate: rates.twd_rate,
            kiosk_usd_rate: rates.usd_rate,
            degraded: sources.bank == Provenance::Fallback || sources.kiosk == Provenance::Fallback,
            sources,
        }
    }

    /// True when all three rates are positive finite numbers.
    pub fn rates_valid(&self) -> bool {
        [self.bank_sell_usd, self.kiosk_twd_rate, self.kiosk_usd_rate]
            .iter()
            .all(|r| r.is_finite() && *r > 0.0)
    }
}
