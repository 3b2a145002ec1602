//! Import of the legacy flat history file.
//!
//! The file is a JSON array of `{ "time": "YYYY/MM/DD HH:MM", "botUsd",
//! "srTwd", "srUsd" }` where `time` is local to the reference timezone and
//! rates may be written as numbers or numeric strings.

use std::path::Path;
use chrono_tz::Tz;
use serde::Deserialize;
use crate::error::{Error, Result};
use crate::ledger::LedgerStore;
use crate::types::calendar::{calendar_day, parse_local};
use crate::types::snapshot::{KioskRates, RateSnapshot, SourceStatus};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LegacyNumber {
    Number(f64),
    Text(String),
}

impl LegacyNumber {
    fn value(&self) -> Option<f64> {
        match self {
            LegacyNumber::Number(n) => Some(*n),
            LegacyNumber::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyRecord {
    time: Option<String>,
    bot_usd: Option<LegacyNumber>,
    sr_twd: Option<LegacyNumber>,
    sr_usd: Option<LegacyNumber>,
}

#[derive(Debug, Default)]
pub struct LegacyBatch {
    pub records: Vec<RateSnapshot>,
    pub skipped: usize,
}

/// Converts the legacy document into snapshots. Records with an unparseable
/// time or a non-positive rate are skipped with a warning.
pub fn parse_legacy(document: &str, tz: Tz) -> Result<LegacyBatch> {
    let raw: Vec<LegacyRecord> = serde_json::from_str(document)
        .map_err(|e| Error::DeserializationError(format!("legacy history is not a record array: {}", e)))?;

    let mut batch = LegacyBatch::default();
    for (index, record) in raw.into_iter().enumerate() {
        match convert(&record, tz) {
            Some(snapshot) => batch.records.push(snapshot),
            None => {
                tracing::warn!(index, time = ?record.time, "Skipping invalid legacy record");
                batch.skipped += 1;
            }
        }
    }
    Ok(batch)
}

fn convert(record: &LegacyRecord, tz: Tz) -> Option<RateSnapshot> {
    let recorded_at = parse_local(record.time.as_deref()?, tz)?;
    let rate = |n: &Option<LegacyNumber>| n.as_ref()?.value().filter(|v| v.is_finite() && *v > 0.0);

    let bank = rate(&record.bot_usd)?;
    let rates = KioskRates {
        twd_rate: rate(&record.sr_twd)?,
        usd_rate: rate(&record.sr_usd)?,
    };
    Some(RateSnapshot::new(
        recorded_at,
        calendar_day(recorded_at, tz),
        bank,
        rates,
        SourceStatus::default(),
    ))
}

/// Reads `path` and upserts every valid record into `ledger` in one commit.
/// Returns the number of records applied.
pub async fn import_file(path: &Path, ledger: &LedgerStore, tz: Tz) -> Result<usize> {
    let document = tokio::fs::read_to_string(path).await?;
    let batch = parse_legacy(&document, tz)?;

    tracing::info!(
        path = %path.display(),
        valid = batch.records.len(),
        skipped = batch.skipped,
        "Legacy history parsed"
    );
    if batch.records.is_empty() {
        return Ok(0);
    }
    ledger.import(batch.records).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use chrono_tz::Asia::Taipei;
    use crate::ledger::memory::MemoryBackend;
    use crate::ledger::WindowOrder;

    const LEGACY: &str = r#"[
        {"time": "2025/12/24 23:50", "botUsd": 31.8, "srTwd": 0.995, "srUsd": 31.36},
        {"time": "2025/12/25 22:23", "botUsd": "31.75", "srTwd": "0.99", "srUsd": "31.3"},
        {"time": "not a date", "botUsd": 31.8, "srTwd": 0.995, "srUsd": 31.36},
        {"time": "2025/12/26 09:00", "botUsd": "n/a", "srTwd": 0.995, "srUsd": 31.36},
        {"botUsd": 31.8, "srTwd": 0.995, "srUsd": 31.36}
    ]"#;

    #[test]
    fn test_parse_accepts_numeric_strings_and_skips_invalid() {
        let batch = parse_legacy(LEGACY, Taipei).unwrap();

        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.skipped, 3);

        let second = &batch.records[1];
        assert_eq!(second.calendar_day, NaiveDate::from_ymd_opt(2025, 12, 25).unwrap());
        assert_eq!(second.bank_sell_usd, 31.75);
        assert_eq!(second.kiosk_usd_rate, 31.3);
        assert!(!second.degraded);
    }

    #[test]
    fn test_time_is_local_to_reference_timezone() {
        let batch = parse_legacy(
            r#"[{"time": "2025/12/25 00:30", "botUsd": 31.8, "srTwd": 0.995, "srUsd": 31.36}]"#,
            Taipei,
        )
        .unwrap();

        let record = &batch.records[0];
        assert_eq!(record.calendar_day, NaiveDate::from_ymd_opt(2025, 12, 25).unwrap());
        assert_eq!(record.recorded_at.to_rfc3339(), "2025-12-24T16:30:00+00:00");
    }

    #[test]
    fn test_non_array_document_rejected() {
        assert!(matches!(
            parse_legacy(r#"{"time": "2025/12/25 00:30"}"#, Taipei),
            Err(Error::DeserializationError(_))
        ));
    }

    #[tokio::test]
    async fn test_import_file_upserts_by_day() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(
            &path,
            r#"[
                {"time": "2025/12/25 08:00", "botUsd": 31.7, "srTwd": 0.99, "srUsd": 31.3},
                {"time": "2025/12/25 23:50", "botUsd": 31.8, "srTwd": 0.995, "srUsd": 31.36},
                {"time": "2025/12/24 23:50", "botUsd": 31.9, "srTwd": 1.0, "srUsd": 31.4}
            ]"#,
        )
        .unwrap();

        let backend = MemoryBackend::new();
        let ledger = LedgerStore::open(Box::new(backend.clone()), 30).await;

        let count = import_file(&path, &ledger, Taipei).await.unwrap();

        assert_eq!(count, 3);
        assert_eq!(backend.commit_count(), 1);
        let days: Vec<_> = ledger
            .window(30, WindowOrder::Ascending)
            .await
            .into_iter()
            .map(|s| (s.calendar_day.to_string(), s.bank_sell_usd))
            .collect();
        assert_eq!(days, vec![("2025-12-24".to_string(), 31.9), ("2025-12-25".to_string(), 31.8)]);
    }

    #[tokio::test]
    async fn test_import_missing_file_is_io_error() {
        let backend = MemoryBackend::new();
        let ledger = LedgerStore::open(Box::new(backend), 30).await;

        let err = import_file(Path::new("/nonexistent/history.json"), &ledger, Taipei).await;
        assert!(matches!(err, Err(Error::IoError(_))));
    }
}
