use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{TableExtractor, TextExtractor};
use crate::model::RawTable;
use crate::util::{ensure_directory, sha256_hex, write_json_atomic};

/// Memoizes extractor output by key. Implementations must be shareable
/// between worker threads.
pub trait ExtractionCache: Send + Sync {
    fn get_or_compute(
        &self,
        key: &str,
        compute: &mut dyn FnMut() -> Result<Value>,
    ) -> Result<Value>;
}

/// Always recomputes.
#[derive(Debug, Default)]
pub struct NoCache;

impl ExtractionCache for NoCache {
    fn get_or_compute(
        &self,
        _key: &str,
        compute: &mut dyn FnMut() -> Result<Value>,
    ) -> Result<Value> {
        compute()
    }
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExtractionCache for MemoryCache {
    fn get_or_compute(
        &self,
        key: &str,
        compute: &mut dyn FnMut() -> Result<Value>,
    ) -> Result<Value> {
        {
            let entries = self
                .entries
                .lock()
                .map_err(|_| anyhow!("extraction cache lock poisoned"))?;
            if let Some(value) = entries.get(key) {
                return Ok(value.clone());
            }
        }

        // Two workers may compute the same key; the later insert wins.
        let value = compute()?;
        self.entries
            .lock()
            .map_err(|_| anyhow!("extraction cache lock poisoned"))?
            .insert(key.to_string(), value.clone());
        Ok(value)
    }
}

/// One JSON file per key, named by the key's SHA-256.
#[derive(Debug, Clone)]
pub struct DiskCache {
    directory: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct DiskEntry {
    key: String,
    value: Value,
}

impl DiskCache {
    pub fn open(directory: &Path) -> Result<Self> {
        ensure_directory(directory)?;
        Ok(Self {
            directory: directory.to_path_buf(),
        })
    }

    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{}.json", sha256_hex(key)))
    }

    fn read_entry(&self, key: &str, path: &Path) -> Option<Value> {
        let raw = fs::read_to_string(path).ok()?;
        match serde_json::from_str::<DiskEntry>(&raw) {
            Ok(entry) if entry.key == key => Some(entry.value),
            Ok(entry) => {
                warn!(path = %path.display(), expected = %key, found = %entry.key, "cache key mismatch");
                None
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "discarding corrupt cache entry");
                None
            }
        }
    }
}

impl ExtractionCache for DiskCache {
    fn get_or_compute(
        &self,
        key: &str,
        compute: &mut dyn FnMut() -> Result<Value>,
    ) -> Result<Value> {
        let path = self.entry_path(key);
        if let Some(value) = self.read_entry(key, &path) {
            debug!(key = %key, "extraction cache hit");
            return Ok(value);
        }

        let value = compute()?;
        let entry = DiskEntry {
            key: key.to_string(),
            value,
        };
        write_json_atomic(&path, &entry)
            .with_context(|| format!("failed to write cache entry for {key}"))?;
        Ok(entry.value)
    }
}

/// Tables of the document at `path`, cached under its content digest.
pub fn cached_tables(
    cache: &dyn ExtractionCache,
    extractor: &dyn TableExtractor,
    path: &Path,
    digest: &str,
) -> Result<Vec<RawTable>> {
    let key = format!("tables:{digest}");
    let value = cache.get_or_compute(&key, &mut || {
        let tables = extractor.extract_tables(path)?;
        serde_json::to_value(tables).context("failed to encode extracted tables")
    })?;
    serde_json::from_value(value).with_context(|| format!("cached tables unreadable for {key}"))
}

pub fn cached_text(
    cache: &dyn ExtractionCache,
    extractor: &dyn TextExtractor,
    path: &Path,
    digest: &str,
    page_index: usize,
) -> Result<Vec<String>> {
    let key = format!("text:{digest}:{page_index}");
    let value = cache.get_or_compute(&key, &mut || {
        let lines = extractor.extract_text(path, page_index)?;
        serde_json::to_value(lines).context("failed to encode extracted text")
    })?;
    serde_json::from_value(value).with_context(|| format!("cached text unreadable for {key}"))
}
