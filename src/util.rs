use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

pub fn now_utc_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn utc_compact_string(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Like [`utc_compact_string`] with microseconds, for artifact names.
pub fn utc_artifact_stamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%dT%H%M%S%.6fZ").to_string()
}

pub fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))
}

pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;

    let mut hasher = Sha256::new();
    let mut buf = [0_u8; 8192];

    loop {
        let count = file.read(&mut buf)?;
        if count == 0 {
            break;
        }
        hasher.update(&buf[..count]);
    }

    Ok(format!("{:x}", hasher.finalize()))
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

/// Returns `dir/stem.extension`, or `dir/stem-N.extension` for the first free N.
pub fn unique_path(dir: &Path, stem: &str, extension: &str) -> PathBuf {
    let candidate = dir.join(format!("{stem}.{extension}"));
    if !candidate.exists() {
        return candidate;
    }

    (1_u32..)
        .map(|suffix| dir.join(format!("{stem}-{suffix}.{extension}")))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

/// Reads every `*.sql` file in `dir` as `(file stem, statement)`, sorted by
/// file name. Blank files are skipped and a trailing `;` is removed.
pub fn read_sql_definitions(dir: &Path) -> io::Result<Vec<(String, String)>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "sql") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut definitions = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        let statement = trim_statement(&fs::read_to_string(&path)?);
        if statement.is_empty() {
            continue;
        }
        definitions.push((name.to_string(), statement));
    }

    Ok(definitions)
}

pub fn trim_statement(raw: &str) -> String {
    raw.trim().trim_end_matches(';').trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_path_appends_suffix_when_taken() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = unique_path(dir.path(), "rooms_report", "json");
        assert_eq!(first, dir.path().join("rooms_report.json"));

        fs::write(&first, "[]").expect("write first");
        let second = unique_path(dir.path(), "rooms_report", "json");
        assert_eq!(second, dir.path().join("rooms_report-1.json"));
    }

    #[test]
    fn read_sql_definitions_sorts_and_strips_semicolons() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("b_second.sql"), "SELECT 2;\n").expect("write");
        fs::write(dir.path().join("a_first.sql"), "  SELECT 1  ").expect("write");
        fs::write(dir.path().join("empty.sql"), "\n").expect("write");
        fs::write(dir.path().join("notes.txt"), "SELECT 3").expect("write");

        let definitions = read_sql_definitions(dir.path()).expect("definitions");
        assert_eq!(
            definitions,
            vec![
                ("a_first".to_string(), "SELECT 1".to_string()),
                ("b_second".to_string(), "SELECT 2".to_string()),
            ]
        );
    }

    #[test]
    fn artifact_stamp_keeps_sub_second_precision() {
        let ts = DateTime::parse_from_rfc3339("2024-05-01T10:20:30.123456Z")
            .expect("timestamp")
            .with_timezone(&Utc);
        assert_eq!(utc_artifact_stamp(ts), "20240501T102030.123456Z");
        assert_eq!(utc_compact_string(ts), "20240501T102030Z");
    }
}
