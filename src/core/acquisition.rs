use std::sync::Arc;
use std::time::Instant;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::Instrument;
use crate::config::loader::AppConfig;
use crate::error::{Error, Result};
use crate::ledger::LedgerStore;
use crate::observability::metrics::{CYCLE_LATENCY, CYCLES_TOTAL, DEGRADED_CYCLES};
use crate::rate_infra::aggregator::RateAggregator;
use crate::rate_infra::browser::webdriver::WebDriverClient;
use crate::rate_infra::connectors::bank::BankQuoteParser;
use crate::rate_infra::connectors::kiosk::KioskPageExtractor;
use crate::types::snapshot::RateSnapshot;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitOutcome {
    Committed,
    /// Degraded snapshot not stored because a live record for the same day
    /// already exists.
    KeptExisting,
}

#[derive(Clone, Debug, Serialize)]
pub struct CycleReport {
    pub snapshot: RateSnapshot,
    pub outcome: CommitOutcome,
}

/// Single entry point for acquisition cycles, shared by the scheduled timer
/// and on-demand requests.
///
/// At most one cycle runs at a time. `trigger` queues behind a running
/// cycle, `try_trigger` refuses instead.
pub struct AcquisitionService {
    aggregator: RateAggregator,
    ledger: Arc<LedgerStore>,
    keep_live_over_degraded: bool,
    guard: Mutex<()>,
}

impl AcquisitionService {
    pub fn new_with_dependencies(
        aggregator: RateAggregator,
        ledger: Arc<LedgerStore>,
        keep_live_over_degraded: bool,
    ) -> Self {
        AcquisitionService {
            aggregator,
            ledger,
            keep_live_over_degraded,
            guard: Mutex::new(()),
        }
    }

    /// Wires the production adapters: HTTP bank feed and WebDriver-backed
    /// kiosk page.
    pub fn from_config(config: &AppConfig, ledger: Arc<LedgerStore>) -> Result<Self> {
        let driver = WebDriverClient::new(
            config.kiosk.webdriver_url.clone(),
            config.kiosk.user_agent.clone(),
            config.kiosk.poll_interval(),
        )?;
        let bank = BankQuoteParser::new(config.bank.clone())?;
        let kiosk = KioskPageExtractor::new(config.kiosk.clone(), Arc::new(driver));
        let aggregator = RateAggregator::new(Arc::new(bank), Arc::new(kiosk), config.timezone()?);

        Ok(Self::new_with_dependencies(aggregator, ledger, config.ledger.keep_live_over_degraded))
    }

    pub fn ledger(&self) -> &Arc<LedgerStore> {
        &self.ledger
    }

    pub fn is_running(&self) -> bool {
        self.guard.try_lock().is_err()
    }

    pub async fn trigger(&self) -> Result<CycleReport> {
        let _guard = self.guard.lock().await;
        self.run_cycle().await
    }

    pub async fn try_trigger(&self) -> Result<CycleReport> {
        let _guard = self.guard.try_lock().map_err(|_| Error::AcquisitionInProgress)?;
        self.run_cycle().await
    }

    async fn run_cycle(&self) -> Result<CycleReport> {
        let span = tracing::info_span!("acquisition_cycle");
        async {
            let started = Instant::now();
            CYCLES_TOTAL.inc();

            let snapshot = self.aggregator.collect().await;
            if snapshot.degraded {
                DEGRADED_CYCLES.inc();
            }

            let outcome = self.commit(&snapshot).await;
            CYCLE_LATENCY.observe(started.elapsed().as_secs_f64());

            let outcome = outcome?;
            tracing::info!(
                calendar_day = %snapshot.calendar_day,
                bank = snapshot.bank_sell_usd,
                twd = snapshot.kiosk_twd_rate,
                usd = snapshot.kiosk_usd_rate,
                degraded = snapshot.degraded,
                outcome = ?outcome,
                "Acquisition cycle completed"
            );
            Ok(CycleReport { snapshot, outcome })
        }
        .instrument(span)
        .await
    }

    async fn commit(&self, snapshot: &RateSnapshot) -> Result<CommitOutcome> {
        let committed = if self.keep_live_over_degraded {
            self.ledger.upsert_unless_live(snapshot.clone()).await
        } else {
            self.ledger.upsert(snapshot.clone()).await.map(|_| true)
        };

        match committed {
            Ok(true) => Ok(CommitOutcome::Committed),
            Ok(false) => {
                tracing::warn!(
                    calendar_day = %snapshot.calendar_day,
                    "Degraded snapshot not stored, live record for the day already present"
                );
                Ok(CommitOutcome::KeptExisting)
            }
            Err(e) => {
                tracing::error!(calendar_day = %snapshot.calendar_day, error = %e, "Ledger commit failed");
                Err(e)
            }
        }
    }
}
