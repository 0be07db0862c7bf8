use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::cli::{ReportFormat, StatusArgs};
use crate::config::AppConfig;
use crate::consistency::REFRESHES_TABLE;
use crate::ingest::DATASET_EXTENSION;
use crate::store::{count_rows, list_tables};

pub fn run(args: StatusArgs) -> Result<()> {
    let config = AppConfig::from_args(&args.store);

    info!(
        cache_root = %config.cache_root.display(),
        conflict_policy = config.conflict_policy.as_str(),
        "status requested"
    );

    let manifests = file_names(&config.manifest_dir, "json")?;
    match manifests.last() {
        Some(latest) => info!(count = manifests.len(), latest = %latest, "ingest run manifests"),
        None => warn!(path = %config.manifest_dir.display(), "no ingest run manifests"),
    }

    if config.db_path.exists() {
        let store = config.store();
        let session = store.open()?;
        let tables = list_tables(session.connection())?;
        for table in &tables {
            let rows = count_rows(session.connection(), table)?;
            info!(table = %table, rows, "table status");
        }
        if tables.iter().any(|table| table == REFRESHES_TABLE) {
            match aggregate_refreshes(session.connection()) {
                Ok(refreshes) => {
                    for (name, refreshed_at, rows) in refreshes {
                        info!(aggregate = %name, refreshed_at = %refreshed_at, rows, "aggregate status");
                    }
                }
                Err(err) => warn!(error = %err, "aggregate refresh bookkeeping unreadable"),
            }
        } else {
            debug!("no aggregate has been refreshed yet");
        }
        session.close()?;
    } else {
        warn!(path = %config.db_path.display(), "database file missing");
    }

    let pending = file_names(&config.dataset_dir, DATASET_EXTENSION)?;
    let processed = file_names(&config.processed_dir(), DATASET_EXTENSION)?;
    info!(
        dataset_dir = %config.dataset_dir.display(),
        pending = pending.len(),
        processed = processed.len(),
        "dataset status"
    );

    for format in ReportFormat::ALL {
        let dir = config.reports_dir.join(format.as_str());
        let artifacts = file_names(&dir, format.extension())?;
        info!(
            format = format.as_str(),
            artifacts = artifacts.len(),
            latest = %artifacts.last().map(String::as_str).unwrap_or_default(),
            "report status"
        );
    }

    Ok(())
}

fn aggregate_refreshes(conn: &Connection) -> rusqlite::Result<Vec<(String, String, i64)>> {
    let mut statement = conn
        .prepare("SELECT name, refreshed_at, row_count FROM aggregate_refreshes ORDER BY name")?;
    statement
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect()
}

/// Sorted names of regular files in `dir` with the given extension.
/// A missing directory has no files.
fn file_names(dir: &Path, extension: &str) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
            if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}
