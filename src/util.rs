use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

pub fn now_utc_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn utc_compact_string(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%dT%H%M%SZ").to_string()
}

pub fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))
}

pub fn sha256_hex(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .with_context(|| format!("failed to open file for hashing: {}", path.display()))?;

    let mut hasher = Sha256::new();
    let mut buf = [0_u8; 8192];

    loop {
        let count = file
            .read(&mut buf)
            .with_context(|| format!("failed to read file for hashing: {}", path.display()))?;
        if count == 0 {
            break;
        }
        hasher.update(&buf[..count]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// File name component of `path`, falling back to the whole path.
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let data = serde_json::to_vec_pretty(value)
        .with_context(|| format!("failed to serialize json: {}", path.display()))?;

    let mut file = File::create(path)
        .with_context(|| format!("failed to create json file: {}", path.display()))?;
    file.write_all(&data)
        .with_context(|| format!("failed to write json file: {}", path.display()))?;
    file.write_all(b"\n")
        .with_context(|| format!("failed to finalize json file: {}", path.display()))?;

    Ok(())
}

/// Writes pretty json next to `path` and renames it into place.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file_name = file_name_of(path);
    let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));

    write_json_pretty(&tmp_path, value)?;
    fs::rename(&tmp_path, path).with_context(|| {
        format!(
            "failed to rename {} to {}",
            tmp_path.display(),
            path.display()
        )
    })?;

    Ok(())
}

/// Every regular file below `root`, recursively, sorted by path.
pub fn discover_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

pub fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_files_walks_nested_directories_without_filtering() {
        let root = tempfile::tempdir().expect("tempdir");
        let nested = root.path().join("2014").join("dec");
        fs::create_dir_all(&nested).expect("nested dirs");
        fs::write(root.path().join("a.pdf"), b"%PDF").expect("write a");
        fs::write(nested.join("b.PDF"), b"%PDF").expect("write b");
        fs::write(nested.join("notes.txt"), b"x").expect("write notes");

        let files = discover_files(root.path()).expect("discover");
        assert_eq!(files.len(), 3);

        let pdfs = files
            .iter()
            .filter(|path| has_pdf_extension(path))
            .count();
        assert_eq!(pdfs, 2);
    }

    #[test]
    fn write_json_atomic_replaces_existing_file_and_leaves_no_temp() {
        let root = tempfile::tempdir().expect("tempdir");
        let path = root.path().join("progress.json");
        fs::write(&path, b"{\"stale\": true}").expect("seed");

        write_json_atomic(&path, &serde_json::json!({"fresh": "yes"})).expect("write");

        let raw = fs::read_to_string(&path).expect("read back");
        assert!(raw.contains("fresh"));
        assert!(!raw.contains("stale"));
        assert!(!root.path().join(".progress.json.tmp").exists());
    }

    #[test]
    fn sha256_file_tracks_content_not_name() {
        let root = tempfile::tempdir().expect("tempdir");
        let first = root.path().join("2014").join("result.pdf");
        let second = root.path().join("2015").join("result.pdf");
        let copy = root.path().join("copy.pdf");
        fs::create_dir_all(first.parent().expect("parent")).expect("2014 dir");
        fs::create_dir_all(second.parent().expect("parent")).expect("2015 dir");
        fs::write(&first, b"%PDF-1.4 december").expect("write first");
        fs::write(&second, b"%PDF-1.4 may").expect("write second");
        fs::write(&copy, b"%PDF-1.4 december").expect("write copy");

        let first_digest = sha256_file(&first).expect("hash first");
        assert_ne!(first_digest, sha256_file(&second).expect("hash second"));
        assert_eq!(first_digest, sha256_file(&copy).expect("hash copy"));
        assert!(sha256_file(&root.path().join("missing.pdf")).is_err());
    }
}
