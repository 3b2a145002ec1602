use std::path::{Path, PathBuf};
use async_trait::async_trait;
use tokio::fs as async_fs;
use crate::error::{Error, Result};
use crate::ledger::LedgerBackend;
use crate::types::snapshot::RateSnapshot;

/// Flat-file backend: the whole ledger as one pretty-printed JSON array.
///
/// Commits write a sibling temp file and rename it over the target, so the
/// file on disk is always either the old or the new collection.
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl AsRef<Path>) -> Self {
        JsonFileBackend {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "ledger.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl LedgerBackend for JsonFileBackend {
    async fn load(&self) -> Result<Vec<RateSnapshot>> {
        let data = match async_fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = ?self.path, "No ledger file yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(Error::IoError(e)),
        };

        serde_json::from_slice(&data)
            .map_err(|e| Error::CorruptLedger(format!("{}: {}", self.path.display(), e)))
    }

    async fn commit(&self, records: &[RateSnapshot]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            async_fs::create_dir_all(parent).await?;
        }

        let data = serde_json::to_vec_pretty(records)?;
        let temp = self.temp_path();
        async_fs::write(&temp, data).await?;
        async_fs::rename(&temp, &self.path).await?;

        tracing::debug!(path = ?self.path, records = records.len(), "Ledger file written");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::testing::snapshot;
    use crate::ledger::{LedgerStore, WindowOrder};

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::new(dir.path().join("history.json"));

        assert!(backend.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_then_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history.json");
        let records = vec![snapshot(0, 31.0), snapshot(1, 31.1)];

        JsonFileBackend::new(&path).commit(&records).await.unwrap();

        assert_eq!(JsonFileBackend::new(&path).load().await.unwrap(), records);
        assert!(!dir.path().join("nested").join("history.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(JsonFileBackend::new(&path).load().await, Err(Error::CorruptLedger(_))));
    }

    #[tokio::test]
    async fn test_store_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");

        let store = LedgerStore::open(Box::new(JsonFileBackend::new(&path)), 30).await;
        store.upsert(snapshot(0, 31.0)).await.unwrap();
        store.upsert(snapshot(1, 31.1)).await.unwrap();
        drop(store);

        let reopened = LedgerStore::open(Box::new(JsonFileBackend::new(&path)), 30).await;
        let entries = reopened.window(30, WindowOrder::Ascending).await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].bank_sell_usd, 31.1);
    }

    #[tokio::test]
    async fn test_store_over_corrupt_file_starts_empty_and_recovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "garbage").unwrap();

        let store = LedgerStore::open(Box::new(JsonFileBackend::new(&path)), 30).await;
        assert!(store.is_empty().await);

        store.upsert(snapshot(0, 31.0)).await.unwrap();
        assert_eq!(JsonFileBackend::new(&path).load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_two_stores_on_one_file_do_not_lose_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");

        let a = LedgerStore::open(Box::new(JsonFileBackend::new(&path)), 30).await;
        let b = LedgerStore::open(Box::new(JsonFileBackend::new(&path)), 30).await;
        b.upsert(snapshot(0, 31.0)).await.unwrap();
        a.upsert(snapshot(1, 31.1)).await.unwrap();

        let days: Vec<String> = JsonFileBackend::new(&path)
            .load()
            .await
            .unwrap()
            .iter()
            .map(|s| s.calendar_day.to_string())
            .collect();
        assert_eq!(days, vec!["2025-12-01".to_string(), "2025-12-02".to_string()]);
    }
}
