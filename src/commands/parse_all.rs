use std::collections::BTreeMap;
use std::io::{self, Write};

use anyhow::Result;
use chrono::Utc;
use tracing::info;

use super::{Extractors, db_path, ledger_path, manifest_dir};
use crate::cli::{CacheMode, ParseAllArgs};
use crate::model::{ParseCounts, ParsePaths, ParseRunManifest};
use crate::pipeline::{
    BatchOptions, BatchSummary, DocumentOutcome, DocumentStatus, ProgressLedger, parse_all,
};
use crate::store::ResultStore;
use crate::util::{ensure_directory, now_utc_string, utc_compact_string, write_json_pretty};

pub fn run(args: ParseAllArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let cache_root = args.cache_root.clone();
    let manifest_dir = manifest_dir(&cache_root);
    ensure_directory(&manifest_dir)?;

    let ledger_path = ledger_path(&cache_root, args.ledger_path.as_ref());
    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!("parse_run_{}.json", utc_compact_string(started_ts)))
    });
    let db_path = db_path(&cache_root, args.db_path.as_ref());

    info!(
        directory = %args.dir.display(),
        cache_root = %cache_root.display(),
        run_id = %run_id,
        "starting batch parse run"
    );

    let extractors = Extractors::from_args(&args.extractors, &cache_root)?;
    let parser = extractors.parser()?;
    let mut store = ResultStore::open(&db_path)?;
    let mut ledger = ProgressLedger::load(&ledger_path)?;

    let options = BatchOptions {
        parallel: !args.sequential,
        jobs: args.jobs,
        show_progress: !args.no_progress,
    };
    let mut records_stored = 0usize;
    let summary = parse_all(&parser, &args.dir, options, &mut ledger, &mut |document| {
        records_stored += store.upsert_records(&document.records)?;
        Ok(())
    })?;

    let counts = summarize(&summary, records_stored);
    let failures = summary
        .outcomes
        .iter()
        .filter_map(|outcome: &DocumentOutcome| match &outcome.status {
            DocumentStatus::Failed(message) => Some((outcome.key.clone(), message.clone())),
            DocumentStatus::Parsed(_) => None,
        })
        .collect::<BTreeMap<String, String>>();

    let manifest = ParseRunManifest {
        manifest_version: 1,
        run_id: run_id.clone(),
        status: "completed".to_string(),
        started_at,
        updated_at: now_utc_string(),
        command: render_parse_all_command(&args),
        paths: ParsePaths {
            cache_root: cache_root.display().to_string(),
            source_directory: args.dir.display().to_string(),
            ledger_path: ledger_path.display().to_string(),
            db_path: db_path.display().to_string(),
        },
        counts: counts.clone(),
        failures,
    };
    write_json_pretty(&manifest_path, &manifest)?;

    info!(
        run_id = %run_id,
        manifest = %manifest_path.display(),
        records_stored = counts.records_stored,
        "batch parse run completed"
    );

    let mut output = io::BufWriter::new(io::stdout().lock());
    writeln!(
        output,
        "documents: {} succeeded, {} failed, {} skipped; pages: {} parsed, {} failed; records: {} stored",
        counts.succeeded_documents,
        counts.failed_documents,
        counts.skipped_documents,
        counts.pages_parsed,
        counts.pages_failed,
        counts.records_stored,
    )?;
    output.flush()?;
    Ok(())
}

pub(crate) fn summarize(summary: &BatchSummary, records_stored: usize) -> ParseCounts {
    let mut counts = ParseCounts {
        discovered_documents: summary.discovered,
        skipped_documents: summary.skipped,
        succeeded_documents: summary.succeeded(),
        failed_documents: summary.failed(),
        records_stored,
        ..ParseCounts::default()
    };

    for document in summary.parsed_documents() {
        counts.pages_parsed += document.pages_parsed;
        counts.pages_failed += document.page_failures.len();
        counts.records_produced += document.records.len();
        counts.rows_skipped += document.rows_skipped;
        counts.papers_failed_warnings += document.warnings.len();
    }

    counts
}

pub(crate) fn render_parse_all_command(args: &ParseAllArgs) -> String {
    let mut command = vec![
        "exam-results".to_string(),
        "parse-all".to_string(),
        "--cache-root".to_string(),
        args.cache_root.display().to_string(),
        "--dir".to_string(),
        args.dir.display().to_string(),
    ];

    if let Some(path) = &args.ledger_path {
        command.push("--ledger-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.manifest_path {
        command.push("--manifest-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.db_path {
        command.push("--db-path".to_string());
        command.push(path.display().to_string());
    }
    if args.extractors.cache_mode != CacheMode::Disk {
        command.push("--cache-mode".to_string());
        command.push(args.extractors.cache_mode.as_str().to_string());
    }
    if let Some(jobs) = args.jobs {
        command.push("--jobs".to_string());
        command.push(jobs.to_string());
    }
    if args.sequential {
        command.push("--sequential".to_string());
    }

    command.join(" ")
}
