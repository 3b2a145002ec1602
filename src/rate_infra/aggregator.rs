use std::sync::Arc;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use crate::rate_infra::connectors::RateConnector;
use crate::types::calendar::calendar_day;
use crate::types::reading::SourceReading;
use crate::types::snapshot::{KioskRates, RateSnapshot, SourceStatus};

/// Runs both rate sources concurrently and assembles a day-keyed snapshot.
pub struct RateAggregator {
    bank: Arc<dyn RateConnector<f64>>,
    kiosk: Arc<dyn RateConnector<KioskRates>>,
    timezone: Tz,
}

impl RateAggregator {
    pub fn new(
        bank: Arc<dyn RateConnector<f64>>,
        kiosk: Arc<dyn RateConnector<KioskRates>>,
        timezone: Tz,
    ) -> Self {
        RateAggregator { bank, kiosk, timezone }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Never fails: each connector settles on its own fallback.
    pub async fn collect(&self) -> RateSnapshot {
        let (bank, kiosk) = tokio::join!(self.bank.fetch(), self.kiosk.fetch());
        let snapshot = Self::assemble(bank, kiosk, Utc::now(), self.timezone);

        if snapshot.degraded {
            tracing::warn!(
                bank = ?snapshot.sources.bank,
                kiosk = ?snapshot.sources.kiosk,
                source_bank = self.bank.source_id(),
                source_kiosk = self.kiosk.source_id(),
                "Snapshot assembled from fallback values"
            );
        }
        snapshot
    }

    pub fn assemble(
        bank: SourceReading<f64>,
        kiosk: SourceReading<KioskRates>,
        recorded_at: DateTime<Utc>,
        timezone: Tz,
    ) -> RateSnapshot {
        let sources = SourceStatus {
            bank: bank.provenance(),
            kiosk: kiosk.provenance(),
        };

        RateSnapshot::new(
            recorded_at,
            calendar_day(recorded_at, timezone),
            bank.into_value(),
            kiosk.into_value(),
            sources,
        )
    }
}
