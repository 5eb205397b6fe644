use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::model::LedgerEntry;
use crate::util::write_json_atomic;

/// Persisted map of document key to outcome, used to resume batch runs.
#[derive(Debug, Clone)]
pub struct ProgressLedger {
    path: PathBuf,
    entries: BTreeMap<String, LedgerEntry>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerCounts {
    pub succeeded: usize,
    pub failed: usize,
}

impl ProgressLedger {
    /// Loads the ledger at `path`; a missing file is an empty ledger.
    pub fn load(path: &Path) -> Result<Self> {
        let entries = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read progress ledger {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse progress ledger {}", path.display()))?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn is_success(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .map(LedgerEntry::is_success)
            .unwrap_or(false)
    }

    pub fn record(&mut self, key: &str, entry: LedgerEntry) {
        self.entries.insert(key.to_string(), entry);
    }

    pub fn entries(&self) -> &BTreeMap<String, LedgerEntry> {
        &self.entries
    }

    pub fn counts(&self) -> LedgerCounts {
        let succeeded = self.entries.values().filter(|entry| entry.is_success()).count();
        LedgerCounts {
            succeeded,
            failed: self.entries.len() - succeeded,
        }
    }

    pub fn save(&self) -> Result<()> {
        write_json_atomic(&self.path, &self.entries)?;
        info!(path = %self.path.display(), entries = self.entries.len(), "saved progress ledger");
        Ok(())
    }
}
