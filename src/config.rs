use std::path::PathBuf;

use crate::cli::{ConflictPolicy, StoreArgs};
use crate::store::Store;

pub const PROCESSED_DIR_NAME: &str = "processed";

/// Resolved locations and policies shared by every command.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub cache_root: PathBuf,
    pub manifest_dir: PathBuf,
    pub db_path: PathBuf,
    pub dataset_dir: PathBuf,
    pub sql_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub conflict_policy: ConflictPolicy,
}

impl AppConfig {
    pub fn from_args(args: &StoreArgs) -> Self {
        let cache_root = args.cache_root.clone();
        let db_path = args
            .db_path
            .clone()
            .unwrap_or_else(|| cache_root.join("seedrep.sqlite"));

        Self {
            manifest_dir: cache_root.join("manifests"),
            cache_root,
            db_path,
            dataset_dir: args.dataset_dir.clone(),
            sql_dir: args.sql_dir.clone(),
            reports_dir: args.reports_dir.clone(),
            conflict_policy: args.conflict_policy,
        }
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.dataset_dir.join(PROCESSED_DIR_NAME)
    }

    pub fn aggregates_dir(&self) -> PathBuf {
        self.sql_dir.join("aggregates")
    }

    pub fn reporting_dir(&self) -> PathBuf {
        self.sql_dir.join("reporting")
    }

    pub fn default_schema_script(&self) -> PathBuf {
        self.sql_dir.join("tables.sql")
    }

    pub fn store(&self) -> Store {
        Store::new(self.db_path.clone(), self.conflict_policy)
    }
}
