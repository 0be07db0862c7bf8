use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::cli::ConflictPolicy;
use crate::store::Store;

pub const ROOMS_AND_STUDENTS: &str = "
    CREATE TABLE rooms (
      id INTEGER PRIMARY KEY NOT NULL,
      name TEXT
    );
    CREATE TABLE students (
      id INTEGER PRIMARY KEY NOT NULL,
      name TEXT NOT NULL,
      birthday DATE NOT NULL,
      room INTEGER
    );
";

/// Temporary workspace with a store, dataset and report directories.
pub struct Fixture {
    pub dir: TempDir,
    pub store: Store,
}

impl Fixture {
    pub fn new(schema: &str) -> Self {
        Self::with_policy(schema, ConflictPolicy::Overwrite)
    }

    pub fn with_policy(schema: &str, policy: ConflictPolicy) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::new(dir.path().join("store.sqlite"), policy);
        let session = store.create().expect("store should be created");
        session
            .connection()
            .execute_batch(schema)
            .expect("schema should apply");
        session.close().expect("store should close");

        fs::create_dir_all(dir.path().join("datasets")).expect("dataset dir");
        Self { dir, store }
    }

    pub fn dataset_dir(&self) -> PathBuf {
        self.dir.path().join("datasets")
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.dataset_dir().join("processed")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.dir.path().join("reports")
    }

    pub fn write_dataset(&self, file_name: &str, content: &str) -> PathBuf {
        let path = self.dataset_dir().join(file_name);
        fs::write(&path, content).expect("dataset should be written");
        path
    }

    pub fn execute(&self, sql: &str) {
        let session = self.store.open().expect("store should open");
        session.connection().execute_batch(sql).expect("sql should run");
        session.close().expect("store should close");
    }

    pub fn query_strings(&self, sql: &str) -> Vec<String> {
        let session = self.store.open().expect("store should open");
        let values = {
            let mut statement = session.connection().prepare(sql).expect("prepare");
            statement
                .query_map([], |row| row.get::<_, String>(0))
                .expect("query")
                .collect::<rusqlite::Result<Vec<_>>>()
                .expect("rows")
        };
        session.close().expect("store should close");
        values
    }
}

pub fn files_in(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    names.sort();
    names
}
