pub mod lookup;
pub mod parse;
pub mod parse_all;
pub mod status;

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::cli::{CacheMode, ExtractorArgs};
use crate::extract::{
    DiskCache, ExtractionCache, MemoryCache, NoCache, PdftotextTextExtractor, TabulaTableExtractor,
};
use crate::pipeline::DocumentParser;

pub(crate) fn manifest_dir(cache_root: &Path) -> PathBuf {
    cache_root.join("manifests")
}

pub(crate) fn ledger_path(cache_root: &Path, explicit: Option<&PathBuf>) -> PathBuf {
    explicit
        .cloned()
        .unwrap_or_else(|| manifest_dir(cache_root).join("parse_progress.json"))
}

pub(crate) fn db_path(cache_root: &Path, explicit: Option<&PathBuf>) -> PathBuf {
    explicit
        .cloned()
        .unwrap_or_else(|| cache_root.join("results.sqlite"))
}

/// The external tools and the cache a document parser borrows.
pub(crate) struct Extractors {
    tables: TabulaTableExtractor,
    text: PdftotextTextExtractor,
    cache: Box<dyn ExtractionCache>,
}

impl Extractors {
    pub(crate) fn from_args(args: &ExtractorArgs, cache_root: &Path) -> Result<Self> {
        let cache: Box<dyn ExtractionCache> = match args.cache_mode {
            CacheMode::Off => Box::new(NoCache),
            CacheMode::Memory => Box::new(MemoryCache::new()),
            CacheMode::Disk => {
                let directory = args
                    .extract_cache_dir
                    .clone()
                    .unwrap_or_else(|| cache_root.join("extract"));
                Box::new(DiskCache::open(&directory)?)
            }
        };

        Ok(Self {
            tables: TabulaTableExtractor::new(args.java_bin.clone(), args.tabula_jar.clone()),
            text: PdftotextTextExtractor::new(args.pdftotext_bin.clone(), args.pdfinfo_bin.clone()),
            cache,
        })
    }

    pub(crate) fn parser(&self) -> Result<DocumentParser<'_>> {
        DocumentParser::new(&self.tables, &self.text, self.cache.as_ref())
    }
}
