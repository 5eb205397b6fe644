use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, params};
use serde::Serialize;
use tracing::debug;

use crate::model::{Cell, ResultRecord};
use crate::util::{ensure_directory, now_utc_string};

const DB_SCHEMA_VERSION: &str = "1";

/// sqlite-backed store of result records, one row per student per program
/// and semester.
pub struct ResultStore {
    connection: Connection,
}

/// A stored result as shown to a reader, without bookkeeping columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredResult {
    pub name: String,
    pub rollno: String,
    pub program: String,
    pub branch: String,
    pub semester: String,
    pub release_date: String,
    pub examination_date: String,
    pub notice: String,
    pub spi: Cell,
    pub total_credits: Cell,
    pub papers_failed: Vec<String>,
    pub marks: BTreeMap<String, Cell>,
}

struct StoredRow {
    name: String,
    rollno: String,
    program: String,
    branch: String,
    semester: String,
    release_date: String,
    examination_date: String,
    notice: String,
    spi: String,
    total_credits: String,
    papers_failed: String,
    marks: String,
}

impl ResultStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            ensure_directory(parent)?;
        }

        let connection = Connection::open(path)
            .with_context(|| format!("failed to open result store {}", path.display()))?;
        configure_connection(&connection)?;
        ensure_schema(&connection)?;
        Ok(Self { connection })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let connection =
            Connection::open_in_memory().context("failed to open in-memory result store")?;
        ensure_schema(&connection)?;
        Ok(Self { connection })
    }

    /// Inserts or replaces records keyed by `(rollno, program, semester)`.
    pub fn upsert_records(&mut self, records: &[ResultRecord]) -> Result<usize> {
        let updated_at = Utc::now();
        let tx = self
            .connection
            .transaction()
            .context("failed to start result store transaction")?;

        {
            let mut statement = tx.prepare_cached(
                "INSERT INTO results(
                   rollno, program, semester, name, branch, release_date, examination_date,
                   notice, spi, total_credits, papers_failed, marks, pdf_filename, pdf_pagenum,
                   updated_at
                 ) VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                 ON CONFLICT(rollno, program, semester) DO UPDATE SET
                   name=excluded.name,
                   branch=excluded.branch,
                   release_date=excluded.release_date,
                   examination_date=excluded.examination_date,
                   notice=excluded.notice,
                   spi=excluded.spi,
                   total_credits=excluded.total_credits,
                   papers_failed=excluded.papers_failed,
                   marks=excluded.marks,
                   pdf_filename=excluded.pdf_filename,
                   pdf_pagenum=excluded.pdf_pagenum,
                   updated_at=excluded.updated_at",
            )?;

            for record in records {
                let pdf_pagenum = i64::try_from(record.pdf_pagenum)
                    .context("page number does not fit in sqlite integer")?;
                statement
                    .execute(params![
                        record.rollno,
                        record.program,
                        record.semester,
                        record.name,
                        record.branch,
                        record.release_date,
                        record.examination_date,
                        record.notice,
                        serde_json::to_string(&record.spi)?,
                        serde_json::to_string(&record.total_credits)?,
                        serde_json::to_string(&record.papers_failed)?,
                        serde_json::to_string(&record.marks)?,
                        record.pdf_filename,
                        pdf_pagenum,
                        updated_at,
                    ])
                    .with_context(|| {
                        format!(
                            "failed to store result for {} from {} page {}",
                            record.rollno, record.pdf_filename, record.pdf_pagenum
                        )
                    })?;
            }
        }

        tx.commit().context("failed to commit result store transaction")?;
        debug!(records = records.len(), "stored result records");
        Ok(records.len())
    }

    /// Every stored result for `rollno`, earliest semester first.
    pub fn lookup(&self, rollno: &str) -> Result<Vec<StoredResult>> {
        let mut statement = self.connection.prepare_cached(
            "SELECT name, rollno, program, branch, semester, release_date, examination_date,
                    notice, spi, total_credits, papers_failed, marks
             FROM results
             WHERE rollno = ?1",
        )?;

        let rows = statement
            .query_map([rollno.trim()], |row| {
                Ok(StoredRow {
                    name: row.get(0)?,
                    rollno: row.get(1)?,
                    program: row.get(2)?,
                    branch: row.get(3)?,
                    semester: row.get(4)?,
                    release_date: row.get(5)?,
                    examination_date: row.get(6)?,
                    notice: row.get(7)?,
                    spi: row.get(8)?,
                    total_credits: row.get(9)?,
                    papers_failed: row.get(10)?,
                    marks: row.get(11)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<StoredRow>>>()
            .with_context(|| format!("failed to query results for {rollno}"))?;

        let mut results = rows
            .into_iter()
            .map(StoredRow::into_result)
            .collect::<Result<Vec<StoredResult>>>()?;
        results.sort_by(|left, right| {
            semester_rank(&left.semester)
                .cmp(&semester_rank(&right.semester))
                .then_with(|| left.semester.cmp(&right.semester))
                .then_with(|| left.program.cmp(&right.program))
        });
        Ok(results)
    }

    pub fn count_records(&self) -> Result<usize> {
        let count: i64 = self
            .connection
            .query_row("SELECT COUNT(*) FROM results", [], |row| row.get(0))
            .context("failed to count stored results")?;
        usize::try_from(count).context("negative result count")
    }
}

impl StoredRow {
    fn into_result(self) -> Result<StoredResult> {
        let context = || format!("corrupt stored result for {} sem {}", self.rollno, self.semester);
        let spi = serde_json::from_str(&self.spi).with_context(context)?;
        let total_credits = serde_json::from_str(&self.total_credits).with_context(context)?;
        let papers_failed = serde_json::from_str(&self.papers_failed).with_context(context)?;
        let marks = serde_json::from_str(&self.marks).with_context(context)?;

        Ok(StoredResult {
            name: self.name,
            rollno: self.rollno,
            program: self.program,
            branch: self.branch,
            semester: self.semester,
            release_date: self.release_date,
            examination_date: self.examination_date,
            notice: self.notice,
            spi,
            total_credits,
            papers_failed,
            marks,
        })
    }
}

/// Numeric rank of a semester written in roman numerals or digits.
fn semester_rank(semester: &str) -> u32 {
    let semester = semester.trim();
    if let Ok(number) = semester.parse::<u32>() {
        return number;
    }

    let mut total = 0u32;
    let mut previous = 0u32;
    for character in semester.chars().rev() {
        let value = match character.to_ascii_uppercase() {
            'I' => 1,
            'V' => 5,
            'X' => 10,
            'L' => 50,
            _ => return u32::MAX,
        };
        if value < previous {
            total = total.saturating_sub(value);
        } else {
            total += value;
            previous = value;
        }
    }
    if total == 0 { u32::MAX } else { total }
}

fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
            CREATE TABLE IF NOT EXISTS metadata (
              key TEXT PRIMARY KEY,
              value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS results (
              rollno TEXT NOT NULL,
              program TEXT NOT NULL,
              semester TEXT NOT NULL,
              name TEXT NOT NULL,
              branch TEXT NOT NULL,
              release_date TEXT NOT NULL,
              examination_date TEXT NOT NULL,
              notice TEXT NOT NULL,
              spi TEXT NOT NULL,
              total_credits TEXT NOT NULL,
              papers_failed TEXT NOT NULL,
              marks TEXT NOT NULL,
              pdf_filename TEXT NOT NULL,
              pdf_pagenum INTEGER NOT NULL,
              updated_at TEXT NOT NULL,
              PRIMARY KEY (rollno, program, semester)
            );

            CREATE INDEX IF NOT EXISTS idx_results_rollno ON results(rollno);
            ",
        )
        .context("failed to create result store schema")?;

    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [DB_SCHEMA_VERSION],
    )?;
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_updated_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now_utc_string()],
    )?;

    Ok(())
}
