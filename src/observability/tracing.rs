use tracing::Span;
use tracing_subscriber::EnvFilter;
use chrono::NaiveDate;

/// Installs the global subscriber. `RUST_LOG` overrides the default `info` filter.
pub fn init(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

pub fn trace_kiosk_attempt(attempt: u32, max_attempts: u32) -> Span {
    tracing::info_span!(
        "kiosk_attempt",
        attempt,
        max_attempts,
    )
}

pub fn trace_ledger_commit(calendar_day: NaiveDate) -> Span {
    tracing::info_span!(
        "ledger_commit",
        calendar_day = %calendar_day,
    )
}
