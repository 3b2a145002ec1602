use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};
use crate::error::{Error, Result};
use crate::ledger::LedgerBackend;
use crate::types::reading::Provenance;
use crate::types::snapshot::{RateSnapshot, SourceStatus};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS rate_snapshots (
    calendar_day TEXT PRIMARY KEY,
    recorded_at TEXT NOT NULL,
    bank_sell_usd REAL NOT NULL,
    kiosk_twd_rate REAL NOT NULL,
    kiosk_usd_rate REAL NOT NULL,
    degraded INTEGER NOT NULL DEFAULT 0,
    bank_source TEXT NOT NULL DEFAULT 'live',
    kiosk_source TEXT NOT NULL DEFAULT 'live'
)";

/// Database backend. `calendar_day` is the primary key and every commit
/// replaces the table contents inside one transaction.
///
/// File databases are opened on first use, so an unreadable file surfaces
/// as a `load`/`commit` error rather than at construction.
#[derive(Clone)]
pub struct SqliteBackend {
    path: Option<PathBuf>,
    conn: Arc<Mutex<Option<Connection>>>,
    label: String,
}

impl SqliteBackend {
    pub fn open(path: &Path) -> Self {
        SqliteBackend {
            path: Some(path.to_path_buf()),
            conn: Arc::new(Mutex::new(None)),
            label: format!("sqlite:{}", path.display()),
        }
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Storage(format!("Failed to create in-memory database: {}", e)))?;
        conn.execute(SCHEMA, [])?;

        Ok(SqliteBackend {
            path: None,
            conn: Arc::new(Mutex::new(Some(conn))),
            label: "sqlite::memory:".to_string(),
        })
    }

    async fn blocking<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|e| Error::Storage(e.to_string()))?;
            if guard.is_none() {
                let path = path.ok_or_else(|| Error::Storage("database connection lost".to_string()))?;
                *guard = Some(connect(&path)?);
            }
            match guard.as_mut() {
                Some(conn) => work(conn),
                None => Err(Error::Storage("database connection unavailable".to_string())),
            }
        })
        .await
        .map_err(|e| Error::Storage(format!("database task failed: {}", e)))?
    }
}

fn connect(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)
        .map_err(|e| Error::Storage(format!("Failed to open database: {}", e)))?;
    conn.execute(SCHEMA, [])
        .map_err(|e| Error::CorruptLedger(format!("{}: {}", path.display(), e)))?;
    Ok(conn)
}

fn provenance_str(p: Provenance) -> &'static str {
    match p {
        Provenance::Live => "live",
        Provenance::Fallback => "fallback",
    }
}

fn parse_provenance(text: &str) -> Provenance {
    if text == "fallback" { Provenance::Fallback } else { Provenance::Live }
}

type Row = (String, String, f64, f64, f64, bool, String, String);

fn row_to_snapshot(row: Row) -> Result<RateSnapshot> {
    let (day, recorded_at, bank, twd, usd, degraded, bank_source, kiosk_source) = row;
    let calendar_day = NaiveDate::parse_from_str(&day, "%Y-%m-%d")
        .map_err(|e| Error::CorruptLedger(format!("calendar_day {:?}: {}", day, e)))?;
    let recorded_at = DateTime::parse_from_rfc3339(&recorded_at)
        .map_err(|e| Error::CorruptLedger(format!("recorded_at {:?}: {}", recorded_at, e)))?
        .with_timezone(&Utc);

    Ok(RateSnapshot {
        calendar_day,
        recorded_at,
        bank_sell_usd: bank,
        kiosk_twd_rate: twd,
        kiosk_usd_rate: usd,
        degraded,
        sources: SourceStatus {
            bank: parse_provenance(&bank_source),
            kiosk: parse_provenance(&kiosk_source),
        },
    })
}

#[async_trait]
impl LedgerBackend for SqliteBackend {
    async fn load(&self) -> Result<Vec<RateSnapshot>> {
        let rows = self.blocking(|conn| {
            let mut stmt = conn.prepare(
                "SELECT calendar_day, recorded_at, bank_sell_usd, kiosk_twd_rate, kiosk_usd_rate,
                        degraded, bank_source, kiosk_source
                 FROM rate_snapshots ORDER BY recorded_at",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                ))
            })?
            .collect::<std::result::Result<Vec<Row>, _>>()?;
            Ok(rows)
        })
        .await?;

        rows.into_iter().map(row_to_snapshot).collect()
    }

    async fn commit(&self, records: &[RateSnapshot]) -> Result<()> {
        let records = records.to_vec();
        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM rate_snapshots", [])?;
            {
                let mut insert = tx.prepare(
                    "INSERT INTO rate_snapshots
                        (calendar_day, recorded_at, bank_sell_usd, kiosk_twd_rate, kiosk_usd_rate,
                         degraded, bank_source, kiosk_source)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )?;
                for r in &records {
                    insert.execute(params![
                        r.calendar_day.format("%Y-%m-%d").to_string(),
                        r.recorded_at.to_rfc3339(),
                        r.bank_sell_usd,
                        r.kiosk_twd_rate,
                        r.kiosk_usd_rate,
                        r.degraded,
                        provenance_str(r.sources.bank),
                        provenance_str(r.sources.kiosk),
                    ])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}
