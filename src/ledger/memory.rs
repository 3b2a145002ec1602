use std::sync::{Arc, Mutex};
#[cfg(test)]
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use async_trait::async_trait;
use crate::error::{Error, Result};
use crate::ledger::LedgerBackend;
use crate::types::snapshot::RateSnapshot;

/// Process-local backend. Clones share the same storage.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    records: Arc<Mutex<Vec<RateSnapshot>>>,
    #[cfg(test)]
    faults: Faults,
}

/// Failure injection and commit counting for tests.
#[cfg(test)]
#[derive(Clone, Default)]
struct Faults {
    commits: Arc<AtomicUsize>,
    fail_loads: Arc<AtomicBool>,
    fail_commits: Arc<AtomicBool>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<RateSnapshot>) -> Self {
        let backend = Self::default();
        if let Ok(mut stored) = backend.records.lock() {
            *stored = records;
        }
        backend
    }

    pub fn records(&self) -> Vec<RateSnapshot> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
impl MemoryBackend {
    pub fn commit_count(&self) -> usize {
        self.faults.commits.load(Ordering::SeqCst)
    }

    /// Simulate an unreadable medium.
    pub fn fail_loads(&self, fail: bool) {
        self.faults.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Simulate a failing write.
    pub fn fail_commits(&self, fail: bool) {
        self.faults.fail_commits.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerBackend for MemoryBackend {
    async fn load(&self) -> Result<Vec<RateSnapshot>> {
        #[cfg(test)]
        if self.faults.fail_loads.load(Ordering::SeqCst) {
            return Err(Error::CorruptLedger("simulated load failure".to_string()));
        }
        self.records.lock()
            .map(|r| r.clone())
            .map_err(|e| Error::Storage(e.to_string()))
    }

    async fn commit(&self, records: &[RateSnapshot]) -> Result<()> {
        #[cfg(test)]
        if self.faults.fail_commits.load(Ordering::SeqCst) {
            return Err(Error::Storage("simulated commit failure".to_string()));
        }
        let mut stored = self.records.lock().map_err(|e| Error::Storage(e.to_string()))?;
        *stored = records.to_vec();
        #[cfg(test)]
        self.faults.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
