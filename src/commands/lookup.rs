use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use tracing::info;

use super::db_path;
use crate::cli::LookupArgs;
use crate::store::{ResultStore, StoredResult};
use crate::subjects::lookup_subject;

pub fn run(args: LookupArgs) -> Result<()> {
    let path = db_path(&args.cache_root, args.db_path.as_ref());
    if !path.exists() {
        bail!("result store not found at {}; run parse-all first", path.display());
    }

    let store = ResultStore::open(&path)?;
    let results = store.lookup(&args.rollno)?;
    info!(rollno = %args.rollno, results = results.len(), "lookup finished");

    let mut output = io::BufWriter::new(io::stdout().lock());
    if args.json {
        serde_json::to_writer_pretty(&mut output, &results)
            .context("failed to serialize lookup json output")?;
        writeln!(output)?;
    } else {
        write_text_results(&mut output, &args.rollno, &results)?;
    }
    output.flush()?;
    Ok(())
}

fn write_text_results(output: &mut impl Write, rollno: &str, results: &[StoredResult]) -> Result<()> {
    if results.is_empty() {
        writeln!(output, "No results for {}", rollno.trim())?;
        return Ok(());
    }

    for result in results {
        writeln!(output, "{} ({})", result.name, result.rollno)?;
        writeln!(
            output,
            "\t{} {} semester {}\texamination {}\treleased {}",
            result.program, result.branch, result.semester, result.examination_date, result.release_date
        )?;
        writeln!(output, "\t{}", result.notice)?;
        for (code, mark) in &result.marks {
            match lookup_subject(code) {
                Some(subject) => writeln!(
                    output,
                    "\t{code}\t{mark}/{}\t{} credits\t{}",
                    subject.max_marks, subject.credits, subject.name
                )?,
                None => writeln!(output, "\t{code}\t{mark}")?,
            }
        }
        writeln!(output, "\tTC {}\tSPI {}", result.total_credits, result.spi)?;
        if !result.papers_failed.is_empty() {
            writeln!(output, "\tpapers failed: {}", result.papers_failed.join(", "))?;
        }
    }

    Ok(())
}
