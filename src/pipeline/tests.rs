use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::anyhow;

use super::batch::ledger_key;
use super::ledger::LedgerCounts;
use super::*;
use crate::error::SanitizeError;
use crate::extract::{MemoryCache, NoCache, TableExtractor, TextExtractor};
use crate::model::{Cell, LedgerEntry, RawTable};
use crate::util::file_name_of;

#[derive(Default)]
struct FakeTables {
    documents: HashMap<String, Vec<RawTable>>,
    calls: AtomicUsize,
}

impl TableExtractor for FakeTables {
    fn extract_tables(&self, path: &Path) -> anyhow::Result<Vec<RawTable>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.documents
            .get(&path.display().to_string())
            .or_else(|| self.documents.get(&file_name_of(path)))
            .cloned()
            .ok_or_else(|| anyhow!("tabula could not read {}", path.display()))
    }
}

#[derive(Default)]
struct FakeText {
    documents: HashMap<String, Vec<Vec<String>>>,
}

impl TextExtractor for FakeText {
    fn extract_text(&self, path: &Path, page_index: usize) -> anyhow::Result<Vec<String>> {
        let document = file_name_of(path);
        let pages = self
            .documents
            .get(&path.display().to_string())
            .or_else(|| self.documents.get(&document))
            .ok_or_else(|| anyhow!("pdftotext could not read {document}"))?;
        pages.get(page_index).cloned().ok_or_else(|| {
            SanitizeError::PageOutOfRange {
                document,
                page: page_index,
                page_count: pages.len(),
            }
            .into()
        })
    }
}

fn write_pdf(root: &Path, relative: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("fixture dir");
    }
    fs::write(&path, format!("%PDF-1.4 {relative}")).expect("write fixture");
    path
}

fn page_table(rows: &[[&str; 6]]) -> RawTable {
    let header = ["Unnamed: 0", "Sr.No. Name", "Unnamed: 1", "Roll No.", "MC-301", "SPI"];
    let units = ["", "Max. Marks / Credits", "Papers Failed", "", "100/4", ""];
    RawTable {
        columns: header.iter().map(|label| label.to_string()).collect(),
        rows: std::iter::once(&units)
            .chain(rows.iter())
            .map(|row| row.iter().map(|value| Cell::text(value)).collect())
            .collect(),
    }
}

fn page_text(semester: &str, branch: Option<&str>) -> Vec<String> {
    let mut lines = vec![
        "DELHI TECHNOLOGICAL UNIVERSITY".to_string(),
        "No. DTU/Exam/2015/123".to_string(),
        "RESULT NOTIFICATION            Dated : 12/01/2015".to_string(),
        "THE RESULT OF THE CANDIDATES WHO APPEARED IN THE FOLLOWING EXAMINATIONS HELD IN DEC-2014 IS DECLARED AS UNDER : -".to_string(),
        format!("Program : B.Tech.       Sem : {semester}"),
    ];
    if let Some(branch) = branch {
        lines.push(format!("Branch : {branch}"));
    }
    lines
}

fn two_page_fixture(second_page_branch: Option<&str>) -> (FakeTables, FakeText) {
    let mut tables = FakeTables::default();
    tables.documents.insert(
        "O14_BT_MCEN_335.pdf".to_string(),
        vec![
            page_table(&[
                ["1", "25 KISHAN", "", "2K12/MC/29", "75", "62.93"],
                ["", "ASHIYA", "", "", "", ""],
                ["2", "26 KRISHNA KUMAR", "MC-301", "2K12/MC/31", "32", "53.13"],
            ]),
            page_table(&[["1", "4 ANKIT GUPTA", "", "2K12/EN/04", "81", "77.50"]]),
        ],
    );

    let mut text = FakeText::default();
    text.documents.insert(
        "O14_BT_MCEN_335.pdf".to_string(),
        vec![
            page_text("V", Some("MATHEMATICS AND COMPUTING")),
            page_text("V", second_page_branch),
        ],
    );
    (tables, text)
}

#[test]
fn parse_document_concatenates_pages_in_order() {
    let (tables, text) = two_page_fixture(Some("ENVIRONMENTAL ENGINEERING"));
    let parser = DocumentParser::new(&tables, &text, &NoCache).expect("parser");
    let root = tempfile::tempdir().expect("tempdir");
    let path = write_pdf(root.path(), "data/O14_BT_MCEN_335.pdf");

    let parsed = parser
        .parse_document(&path, FailurePolicy::Propagate)
        .expect("document parses");

    assert_eq!(parsed.document, "O14_BT_MCEN_335.pdf");
    assert_eq!(parsed.pages_parsed, 2);
    let summary = parsed
        .records
        .iter()
        .map(|record| (record.name.as_str(), record.pdf_pagenum, record.branch.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(
        summary,
        vec![
            ("KISHAN ASHIYA", 0, "MATHEMATICS AND COMPUTING"),
            ("KRISHNA KUMAR", 0, "MATHEMATICS AND COMPUTING"),
            ("ANKIT GUPTA", 1, "ENVIRONMENTAL ENGINEERING"),
        ]
    );
    assert_eq!(parsed.records[1].papers_failed, vec!["MC-301"]);
    assert_eq!(parsed.records[0].examination_date, "DEC-2014");
}

#[test]
fn parse_document_is_deterministic() {
    let (tables, text) = two_page_fixture(Some("ENVIRONMENTAL ENGINEERING"));
    let parser = DocumentParser::new(&tables, &text, &NoCache).expect("parser");
    let root = tempfile::tempdir().expect("tempdir");
    let path = write_pdf(root.path(), "O14_BT_MCEN_335.pdf");

    let first = parser
        .parse_document(&path, FailurePolicy::IsolatePages)
        .expect("first run");
    let second = parser
        .parse_document(&path, FailurePolicy::IsolatePages)
        .expect("second run");

    assert_eq!(first, second);
}

#[test]
fn memory_cache_avoids_repeated_table_extraction() {
    let (tables, text) = two_page_fixture(Some("ENVIRONMENTAL ENGINEERING"));
    let cache = MemoryCache::new();
    let parser = DocumentParser::new(&tables, &text, &cache).expect("parser");
    let root = tempfile::tempdir().expect("tempdir");
    let path = write_pdf(root.path(), "O14_BT_MCEN_335.pdf");

    for _ in 0..3 {
        parser
            .parse_document(&path, FailurePolicy::Propagate)
            .expect("document parses");
    }
    assert_eq!(tables.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn interactive_mode_propagates_page_failure() {
    let (tables, text) = two_page_fixture(None);
    let parser = DocumentParser::new(&tables, &text, &NoCache).expect("parser");
    let root = tempfile::tempdir().expect("tempdir");
    let path = write_pdf(root.path(), "O14_BT_MCEN_335.pdf");

    let error = parser
        .parse_document(&path, FailurePolicy::Propagate)
        .expect_err("missing branch on page 1");

    assert_eq!(
        error.downcast_ref::<SanitizeError>(),
        Some(&SanitizeError::MetadataIncomplete {
            field: "branch",
            document: "O14_BT_MCEN_335.pdf".to_string(),
            page: 1,
        })
    );
}

#[test]
fn batch_mode_isolates_failed_page() {
    let (tables, text) = two_page_fixture(None);
    let parser = DocumentParser::new(&tables, &text, &NoCache).expect("parser");
    let root = tempfile::tempdir().expect("tempdir");
    let path = write_pdf(root.path(), "O14_BT_MCEN_335.pdf");

    let parsed = parser
        .parse_document(&path, FailurePolicy::IsolatePages)
        .expect("first page still parses");

    assert_eq!(parsed.pages_parsed, 1);
    assert_eq!(parsed.records.len(), 2);
    assert_eq!(parsed.page_failures.len(), 1);
    assert_eq!(parsed.page_failures[0].page, 1);
    assert!(parsed.page_failures[0].error.contains("'branch'"));
}

#[test]
fn document_fails_when_every_page_fails() {
    let (tables, mut text) = two_page_fixture(None);
    text.documents.insert(
        "O14_BT_MCEN_335.pdf".to_string(),
        vec![page_text("V", None), page_text("V", None)],
    );
    let parser = DocumentParser::new(&tables, &text, &NoCache).expect("parser");
    let root = tempfile::tempdir().expect("tempdir");
    let path = write_pdf(root.path(), "O14_BT_MCEN_335.pdf");

    let error = parser
        .parse_document(&path, FailurePolicy::IsolatePages)
        .expect_err("no page parses");
    let rendered = format!("{error:#}");
    assert!(rendered.contains("every page of O14_BT_MCEN_335.pdf failed"));
    assert!(rendered.contains("couldn't determine 'branch'"));
}

#[test]
fn missing_text_page_is_out_of_range() {
    let (tables, mut text) = two_page_fixture(None);
    text.documents.insert(
        "O14_BT_MCEN_335.pdf".to_string(),
        vec![page_text("V", Some("MATHEMATICS AND COMPUTING"))],
    );
    let parser = DocumentParser::new(&tables, &text, &NoCache).expect("parser");
    let root = tempfile::tempdir().expect("tempdir");
    let path = write_pdf(root.path(), "O14_BT_MCEN_335.pdf");

    let error = parser
        .parse_document(&path, FailurePolicy::Propagate)
        .expect_err("page 1 has no text");
    assert!(matches!(
        error.downcast_ref::<SanitizeError>(),
        Some(SanitizeError::PageOutOfRange {
            page: 1,
            page_count: 1,
            ..
        })
    ));
}

#[test]
fn document_without_tables_fails() {
    let mut tables = FakeTables::default();
    tables
        .documents
        .insert("empty.pdf".to_string(), Vec::new());
    let text = FakeText::default();
    let parser = DocumentParser::new(&tables, &text, &NoCache).expect("parser");
    let root = tempfile::tempdir().expect("tempdir");
    let path = write_pdf(root.path(), "empty.pdf");

    let error = parser
        .parse_document(&path, FailurePolicy::IsolatePages)
        .expect_err("no tables");
    assert!(error.to_string().contains("table extractor found 0 pages"));
}

#[test]
fn ledger_load_of_missing_file_is_empty() {
    let root = tempfile::tempdir().expect("tempdir");
    let ledger = ProgressLedger::load(&root.path().join("parse_progress.json")).expect("load");

    assert!(ledger.entries().is_empty());
    assert_eq!(ledger.counts(), LedgerCounts::default());
}

#[test]
fn ledger_round_trips_flags_and_error_strings() {
    let root = tempfile::tempdir().expect("tempdir");
    let path = root.path().join("manifests").join("parse_progress.json");
    fs::create_dir_all(path.parent().expect("parent")).expect("manifest dir");
    fs::write(
        &path,
        r#"{"a.pdf": true, "b.pdf": false, "c.pdf": "KeyError('name')"}"#,
    )
    .expect("seed ledger");

    let mut ledger = ProgressLedger::load(&path).expect("load");
    assert!(ledger.is_success("a.pdf"));
    assert!(!ledger.is_success("b.pdf"));
    assert!(!ledger.is_success("c.pdf"));
    assert!(!ledger.is_success("d.pdf"));

    ledger.record("d.pdf", LedgerEntry::Flag(true));
    ledger.save().expect("save");

    let reloaded = ProgressLedger::load(&path).expect("reload");
    assert_eq!(reloaded.entries(), ledger.entries());
    assert_eq!(
        reloaded.counts(),
        LedgerCounts {
            succeeded: 2,
            failed: 2,
        }
    );
}

fn batch_fixture(root: &Path) -> (FakeTables, FakeText) {
    for relative in ["O14_BT_MCEN_335.pdf", "done.pdf", "2015/broken.pdf", "README.txt"] {
        write_pdf(root, relative);
    }

    let (mut tables, mut text) = two_page_fixture(Some("ENVIRONMENTAL ENGINEERING"));
    let done_tables = tables.documents["O14_BT_MCEN_335.pdf"].clone();
    tables.documents.insert("done.pdf".to_string(), done_tables);
    let done_text = text.documents["O14_BT_MCEN_335.pdf"].clone();
    text.documents.insert("done.pdf".to_string(), done_text);
    tables.documents.insert("broken.pdf".to_string(), Vec::new());
    (tables, text)
}

#[test]
fn parse_all_skips_successes_and_records_failures() {
    let root = tempfile::tempdir().expect("tempdir");
    let (tables, text) = batch_fixture(root.path());
    let parser = DocumentParser::new(&tables, &text, &NoCache).expect("parser");

    let ledger_path = root.path().join("state").join("parse_progress.json");
    let mut ledger = ProgressLedger::load(&ledger_path).expect("load ledger");
    ledger.record(&ledger_key(&root.path().join("done.pdf")), LedgerEntry::Flag(true));

    let mut stored = Vec::new();
    let options = BatchOptions {
        parallel: false,
        jobs: None,
        show_progress: false,
    };
    let summary = parse_all(&parser, root.path(), options, &mut ledger, &mut |document| {
        stored.push(document.document.clone());
        Ok(())
    })
    .expect("batch completes");

    assert_eq!(summary.discovered, 3);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.succeeded(), 1);
    assert_eq!(summary.failed(), 1);
    assert_eq!(stored, vec!["O14_BT_MCEN_335.pdf"]);

    let reloaded = ProgressLedger::load(&ledger_path).expect("ledger saved");
    let broken_key = ledger_key(&root.path().join("2015").join("broken.pdf"));
    assert!(matches!(
        reloaded.entries().get(&broken_key),
        Some(LedgerEntry::Error(message)) if message.contains("found 0 pages")
    ));
    assert!(reloaded.is_success(&ledger_key(&root.path().join("O14_BT_MCEN_335.pdf"))));
}

#[test]
fn parallel_rerun_only_retries_failed_documents() {
    let root = tempfile::tempdir().expect("tempdir");
    let (tables, text) = batch_fixture(root.path());
    let parser = DocumentParser::new(&tables, &text, &NoCache).expect("parser");
    let ledger_path = root.path().join("parse_progress.json");
    let options = BatchOptions {
        parallel: true,
        jobs: Some(2),
        show_progress: false,
    };

    let mut ledger = ProgressLedger::load(&ledger_path).expect("load ledger");
    let first = parse_all(&parser, root.path(), options, &mut ledger, &mut |_| Ok(()))
        .expect("first batch");
    assert_eq!(first.skipped, 0);
    assert_eq!(first.outcomes.len(), 3);
    assert_eq!(first.failed(), 1);

    let mut ledger = ProgressLedger::load(&ledger_path).expect("reload ledger");
    let second = parse_all(&parser, root.path(), options, &mut ledger, &mut |_| Ok(()))
        .expect("second batch");
    assert_eq!(second.skipped, 2);
    assert_eq!(second.outcomes.len(), 1);
    assert!(second.outcomes[0].key.ends_with("broken.pdf"));
}

#[test]
fn sink_failure_marks_document_failed() {
    let root = tempfile::tempdir().expect("tempdir");
    let (tables, text) = batch_fixture(root.path());
    let parser = DocumentParser::new(&tables, &text, &NoCache).expect("parser");
    let mut ledger =
        ProgressLedger::load(&root.path().join("parse_progress.json")).expect("load ledger");
    let options = BatchOptions {
        parallel: false,
        jobs: None,
        show_progress: false,
    };

    let summary = parse_all(&parser, root.path(), options, &mut ledger, &mut |_| {
        Err(anyhow!("database is locked"))
    })
    .expect("batch completes");

    assert_eq!(summary.succeeded(), 0);
    assert_eq!(summary.failed(), 3);
    assert!(summary.outcomes.iter().any(|outcome| matches!(
        &outcome.status,
        DocumentStatus::Failed(message) if message.contains("database is locked")
    )));
}

#[test]
fn same_named_documents_in_different_directories_do_not_share_cache_entries() {
    let root = tempfile::tempdir().expect("tempdir");
    let december = write_pdf(root.path(), "2014/result.pdf");
    let may = write_pdf(root.path(), "2015/result.pdf");

    let mut tables = FakeTables::default();
    let mut text = FakeText::default();
    for (path, rollno) in [(&december, "2K12/MC/01"), (&may, "2K13/MC/01")] {
        tables.documents.insert(
            path.display().to_string(),
            vec![page_table(&[["1", "1 AMAN VERMA", "", rollno, "70", "70.00"]])],
        );
        text.documents.insert(
            path.display().to_string(),
            vec![page_text("V", Some("MATHEMATICS AND COMPUTING"))],
        );
    }

    let cache = MemoryCache::new();
    let parser = DocumentParser::new(&tables, &text, &cache).expect("parser");
    let mut ledger =
        ProgressLedger::load(&root.path().join("parse_progress.json")).expect("load ledger");
    let options = BatchOptions {
        parallel: false,
        jobs: None,
        show_progress: false,
    };

    let mut rollnos = Vec::new();
    let summary = parse_all(&parser, root.path(), options, &mut ledger, &mut |document| {
        rollnos.extend(document.records.iter().map(|record| record.rollno.clone()));
        Ok(())
    })
    .expect("batch completes");

    assert_eq!(summary.succeeded(), 2);
    assert_eq!(rollnos, vec!["2K12/MC/01", "2K13/MC/01"]);
    assert_eq!(tables.calls.load(Ordering::SeqCst), 2);
}
