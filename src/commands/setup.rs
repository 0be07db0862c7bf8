use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::SetupArgs;
use crate::config::AppConfig;
use crate::util::ensure_directory;

pub fn run(args: SetupArgs) -> Result<()> {
    let config = AppConfig::from_args(&args.store);
    let script = args
        .schema_script
        .clone()
        .unwrap_or_else(|| config.default_schema_script());

    setup_store(&config, &script, args.reset)
}

/// Creates the store (optionally from scratch) and applies the schema script.
pub fn setup_store(config: &AppConfig, script: &Path, reset: bool) -> Result<()> {
    if let Some(parent) = config.db_path.parent() {
        ensure_directory(parent)?;
    }
    if reset {
        remove_store_files(&config.db_path)?;
    }

    let raw = fs::read_to_string(script)
        .with_context(|| format!("failed to read schema script {}", script.display()))?;

    let session = config.store().create()?;
    session
        .connection()
        .execute_batch(&raw)
        .with_context(|| format!("failed to apply schema script {}", script.display()))?;
    session.close()?;

    info!(
        db_path = %config.db_path.display(),
        script = %script.display(),
        reset,
        "store schema applied"
    );
    Ok(())
}

fn remove_store_files(db_path: &Path) -> Result<()> {
    let mut paths = vec![db_path.to_path_buf()];
    for suffix in ["-wal", "-shm"] {
        let mut name = db_path.as_os_str().to_owned();
        name.push(suffix);
        paths.push(name.into());
    }

    for path in paths {
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("failed to remove {}", path.display()))?;
        }
    }

    info!(db_path = %db_path.display(), "store reset");
    Ok(())
}
