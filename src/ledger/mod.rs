//! Day-keyed, bounded, chronologically ordered rate history.
//!
//! `LedgerStore` implements upsert, sort and trim once; backends only load
//! and commit whole collections.

pub mod json_file;
pub mod memory;
pub mod sqlite;

use std::collections::HashMap;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use crate::config::ledger::{LedgerBackendKind, LedgerConfig};
use crate::error::Result;
use tracing::Instrument;
use crate::observability::metrics::LEDGER_ENTRIES;
use crate::observability::tracing::trace_ledger_commit;
use crate::types::snapshot::RateSnapshot;

/// Persistence medium for the ledger.
///
/// `commit` must replace the stored collection as one unit: a reader of
/// the medium sees either the previous collection or the new one.
#[async_trait]
pub trait LedgerBackend: Send + Sync {
    async fn load(&self) -> Result<Vec<RateSnapshot>>;
    async fn commit(&self, records: &[RateSnapshot]) -> Result<()>;
    fn describe(&self) -> String;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowOrder {
    /// Oldest first, for charting.
    #[default]
    Ascending,
    /// Most recent first, for listings.
    Descending,
}

pub struct LedgerStore {
    backend: Box<dyn LedgerBackend>,
    max_entries: usize,
    entries: RwLock<Vec<RateSnapshot>>,
    writer: Mutex<()>,
}

impl LedgerStore {
    /// Load the ledger from `backend`. An unreadable or corrupt medium yields
    /// an empty ledger.
    pub async fn open(backend: Box<dyn LedgerBackend>, max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        let entries = match backend.load().await {
            Ok(records) => {
                let loaded = records.len();
                let entries = normalize(records, max_entries);
                tracing::info!(
                    backend = %backend.describe(),
                    loaded,
                    retained = entries.len(),
                    "Ledger loaded"
                );
                entries
            }
            Err(e) => {
                tracing::error!(
                    backend = %backend.describe(),
                    error = %e,
                    "Ledger unreadable, starting from an empty ledger"
                );
                Vec::new()
            }
        };

        LEDGER_ENTRIES.set(entries.len() as i64);
        LedgerStore {
            backend,
            max_entries,
            entries: RwLock::new(entries),
            writer: Mutex::new(()),
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Replace the entry for `snapshot.calendar_day` (or append), sort, trim
    /// and commit. Readers keep seeing the previous state until the commit
    /// succeeded.
    pub async fn upsert(&self, snapshot: RateSnapshot) -> Result<()> {
        let day = snapshot.calendar_day;
        self.apply(|entries| {
            apply_upsert(entries, snapshot, self.max_entries);
            true
        })
        .instrument(trace_ledger_commit(day))
        .await?;
        tracing::info!(calendar_day = %day, "Ledger upserted");
        Ok(())
    }

    /// Like [`upsert`](Self::upsert), except that a degraded snapshot does not
    /// replace a live record for the same day. The check and the write happen
    /// under the same writer lock. Returns whether the snapshot was committed.
    pub async fn upsert_unless_live(&self, snapshot: RateSnapshot) -> Result<bool> {
        let day = snapshot.calendar_day;
        let committed = self
            .apply(|entries| {
                let live_exists = entries.iter().any(|e| e.calendar_day == day && !e.degraded);
                if snapshot.degraded && live_exists {
                    return false;
                }
                apply_upsert(entries, snapshot, self.max_entries);
                true
            })
            .instrument(trace_ledger_commit(day))
            .await?;
        if committed {
            tracing::info!(calendar_day = %day, "Ledger upserted");
        }
        Ok(committed)
    }

    /// Bulk upsert committed once. Returns the number of records applied.
    pub async fn import(&self, records: Vec<RateSnapshot>) -> Result<usize> {
        let count = records.len();
        self.apply(|entries| {
            for record in records {
                apply_upsert(entries, record, self.max_entries);
            }
            true
        })
        .await?;
        tracing::info!(count, "Ledger import committed");
        Ok(count)
    }

    /// Reload the cache from the medium, picking up commits made by other
    /// processes sharing it.
    pub async fn refresh(&self) {
        let _writer = self.writer.lock().await;
        let current = self.current().await;
        self.replace_cache(current).await;
    }

    /// Runs `change` against the medium's latest committed collection and
    /// commits the result when `change` returns true.
    async fn apply<F>(&self, change: F) -> Result<bool>
    where
        F: FnOnce(&mut Vec<RateSnapshot>) -> bool,
    {
        let _writer = self.writer.lock().await;

        let mut next = self.current().await;
        if !change(&mut next) {
            self.replace_cache(next).await;
            return Ok(false);
        }

        self.backend.commit(&next).await?;
        self.replace_cache(next).await;
        Ok(true)
    }

    /// Collection as last committed to the medium. Falls back to the cache
    /// when the medium cannot be read.
    async fn current(&self) -> Vec<RateSnapshot> {
        match self.backend.load().await {
            Ok(records) => normalize(records, self.max_entries),
            Err(e) => {
                tracing::warn!(
                    backend = %self.backend.describe(),
                    error = %e,
                    "Ledger reload failed, using cached entries"
                );
                self.entries.read().await.clone()
            }
        }
    }

    async fn replace_cache(&self, entries: Vec<RateSnapshot>) {
        LEDGER_ENTRIES.set(entries.len() as i64);
        *self.entries.write().await = entries;
    }

    pub async fn latest(&self) -> Option<RateSnapshot> {
        self.entries.read().await.last().cloned()
    }

    pub async fn get(&self, day: NaiveDate) -> Option<RateSnapshot> {
        self.entries.read().await
            .iter()
            .find(|s| s.calendar_day == day)
            .cloned()
    }

    /// The most recent `n` entries in the requested order.
    pub async fn window(&self, n: usize, order: WindowOrder) -> Vec<RateSnapshot> {
        let entries = self.entries.read().await;
        let start = entries.len().saturating_sub(n);
        let mut window = entries[start..].to_vec();
        if order == WindowOrder::Descending {
            window.reverse();
        }
        window
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Opens the backend selected by `config` and loads it into a store. An
/// unreadable medium yields an empty store.
pub async fn open_configured(config: &LedgerConfig) -> LedgerStore {
    let backend: Box<dyn LedgerBackend> = match config.backend {
        LedgerBackendKind::Json => Box::new(json_file::JsonFileBackend::new(&config.path)),
        LedgerBackendKind::Sqlite => Box::new(sqlite::SqliteBackend::open(&config.path)),
    };
    LedgerStore::open(backend, config.max_entries).await
}

/// Upsert keyed on calendar day, then sort ascending and trim the oldest
/// entries down to `max_entries`.
pub fn apply_upsert(entries: &mut Vec<RateSnapshot>, snapshot: RateSnapshot, max_entries: usize) {
    match entries.iter_mut().find(|e| e.calendar_day == snapshot.calendar_day) {
        Some(existing) => *existing = snapshot,
        None => entries.push(snapshot),
    }
    sort_and_trim(entries, max_entries);
}

fn sort_and_trim(entries: &mut Vec<RateSnapshot>, max_entries: usize) {
    entries.sort_by(|a, b| {
        a.recorded_at.cmp(&b.recorded_at)
            .then(a.calendar_day.cmp(&b.calendar_day))
    });
    if entries.len() > max_entries {
        let excess = entries.len() - max_entries;
        entries.drain(..excess);
    }
}

/// Repair a loaded collection: one record per day (latest `recorded_at`
/// wins), sorted, trimmed.
fn normalize(records: Vec<RateSnapshot>, max_entries: usize) -> Vec<RateSnapshot> {
    let mut by_day: HashMap<NaiveDate, RateSnapshot> = HashMap::new();
    for record in records {
        match by_day.get(&record.calendar_day) {
            Some(existing) if existing.recorded_at > record.recorded_at => {}
            _ => {
                by_day.insert(record.calendar_day, record);
            }
        }
    }

    let mut entries: Vec<_> = by_day.into_values().collect();
    sort_and_trim(&mut entries, max_entries);
    entries
}
