use std::path::PathBuf;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackendKind {
    Json,
    Sqlite,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub backend: LedgerBackendKind,
    pub path: PathBuf,
    /// Maximum retained days (W).
    pub max_entries: usize,
    /// Do not let a degraded snapshot replace a live record for the same day.
    pub keep_live_over_degraded: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            backend: LedgerBackendKind::Json,
            path: PathBuf::from("data/history.json"),
            max_entries: 30,
            keep_live_over_degraded: true,
        }
    }
}
