use std::sync::Once;
use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Acquisition metrics
    pub static ref CYCLES_TOTAL: IntCounter = IntCounter::new(
        "acquisition_cycles_total",
        "Total number of acquisition cycles started"
    ).unwrap();

    pub static ref DEGRADED_CYCLES: IntCounter = IntCounter::new(
        "acquisition_degraded_cycles_total",
        "Acquisition cycles that produced a degraded snapshot"
    ).unwrap();

    pub static ref CYCLE_LATENCY: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "acquisition_cycle_latency_seconds",
            "Acquisition cycle latency"
        ).buckets(vec![0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0])
    ).unwrap();

    // Source metrics
    pub static ref KIOSK_ATTEMPTS: IntCounter = IntCounter::new(
        "kiosk_attempts_total",
        "Kiosk page extraction attempts"
    ).unwrap();

    pub static ref SOURCE_FALLBACKS: IntCounterVec = IntCounterVec::new(
        Opts::new("source_fallbacks_total", "Readings replaced by a fallback value"),
        &["source"]
    ).unwrap();

    // Ledger metrics
    pub static ref LEDGER_ENTRIES: IntGauge = IntGauge::new(
        "ledger_entries",
        "Snapshots currently held in the ledger"
    ).unwrap();
}

static REGISTER: Once = Once::new();

/// Registers every collector with [`REGISTRY`]. Safe to call more than once.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(CYCLES_TOTAL.clone()),
            Box::new(DEGRADED_CYCLES.clone()),
            Box::new(CYCLE_LATENCY.clone()),
            Box::new(KIOSK_ATTEMPTS.clone()),
            Box::new(SOURCE_FALLBACKS.clone()),
            Box::new(LEDGER_ENTRIES.clone()),
        ];
        for collector in collectors {
            if let Err(e) = REGISTRY.register(collector) {
                tracing::error!(error = %e, "Failed to register metric");
            }
        }
    });
}

/// Prometheus text exposition of [`REGISTRY`].
pub fn gather_text() -> String {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
