use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::info;

use super::{Extractors, db_path};
use crate::cli::ParseArgs;
use crate::pipeline::FailurePolicy;
use crate::store::ResultStore;

pub fn run(args: ParseArgs) -> Result<()> {
    info!(file = %args.file.display(), cache_mode = %args.extractors.cache_mode.as_str(), "parsing document");

    let extractors = Extractors::from_args(&args.extractors, &args.cache_root)?;
    let parser = extractors.parser()?;
    let parsed = parser
        .parse_document(&args.file, FailurePolicy::Propagate)
        .with_context(|| format!("failed to parse {}", args.file.display()))?;

    info!(
        document = %parsed.document,
        pages = parsed.pages_parsed,
        records = parsed.records.len(),
        rows_skipped = parsed.rows_skipped,
        warnings = parsed.warnings.len(),
        "document parsed"
    );

    if args.store {
        let path = db_path(&args.cache_root, args.db_path.as_ref());
        let mut store = ResultStore::open(&path)?;
        let stored = store.upsert_records(&parsed.records)?;
        info!(path = %path.display(), stored, "stored records");
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, &parsed.records)
        .context("failed to serialize parsed records")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}
