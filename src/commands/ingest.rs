use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use crate::cli::IngestArgs;
use crate::config::AppConfig;
use crate::consistency::ConsistencyCoordinator;
use crate::ingest::IngestionEngine;
use crate::model::{IngestPaths, IngestRunManifest, IngestionReport};
use crate::util::{ensure_directory, now_utc_string, utc_compact_string, write_json_pretty};

pub fn run(args: IngestArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let config = AppConfig::from_args(&args.store);
    ensure_directory(&config.manifest_dir)?;
    let manifest_path = args.ingest_manifest_path.clone().unwrap_or_else(|| {
        config.manifest_dir.join(format!(
            "ingest_run_{}.json",
            utc_compact_string(started_ts)
        ))
    });

    info!(run_id = %run_id, tables = ?args.tables, "starting ingest run");

    let mut coordinator = ConsistencyCoordinator::load(&config.aggregates_dir())?;
    info!(
        aggregates = coordinator.aggregates().len(),
        "aggregates maintained after each batch"
    );
    let mut reports = Vec::with_capacity(args.tables.len());
    for table in &args.tables {
        reports.push(ingest_table(&config, table, &mut coordinator)?);
    }

    let manifest = IngestRunManifest {
        manifest_version: 1,
        run_id,
        status: "completed".to_string(),
        started_at,
        completed_at: now_utc_string(),
        conflict_policy: config.conflict_policy.as_str().to_string(),
        paths: IngestPaths {
            cache_root: config.cache_root.display().to_string(),
            db_path: config.db_path.display().to_string(),
            dataset_dir: config.dataset_dir.display().to_string(),
            manifest_path: manifest_path.display().to_string(),
        },
        tables: reports,
    };
    write_json_pretty(&manifest_path, &manifest)?;

    info!(path = %manifest_path.display(), "wrote ingest run manifest");
    Ok(())
}

pub fn ingest_table(
    config: &AppConfig,
    table: &str,
    coordinator: &mut ConsistencyCoordinator,
) -> Result<IngestionReport> {
    let store = config.store();
    IngestionEngine::new(&store, config.processed_dir())
        .ingest(&config.dataset_dir, table, coordinator)
        .with_context(|| format!("failed to ingest table {table}"))
}
