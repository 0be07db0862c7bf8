use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::model::SemanticType;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("table {table} not found")]
    NotFound { table: String },

    #[error("table {table} has no columns")]
    NoColumns { table: String },

    #[error("column {table}.{column} has unsupported type {declared:?}")]
    UnsupportedType {
        table: String,
        column: String,
        declared: String,
    },

    #[error("table {table} has no single-column primary key or unique index to upsert on")]
    NoConflictKey { table: String },

    #[error("conflict key {key} is not a column of table {table}")]
    UnknownConflictKey { table: String, key: String },

    #[error("failed to inspect table {table}")]
    Inspect {
        table: String,
        #[source]
        source: rusqlite::Error,
    },
}

/// Per-value rejection. Recoverable: the engine drops the record and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizationError {
    #[error("column {column} is not nullable but the value is null")]
    NotNullable { column: String },

    #[error("column {column} expects {expected}, got {value:?}")]
    TypeMismatch {
        column: String,
        expected: SemanticType,
        value: String,
    },
}

impl NormalizationError {
    pub fn column(&self) -> &str {
        match self {
            Self::NotNullable { column } | Self::TypeMismatch { column, .. } => column,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot connect to store at {}", path.display())]
    Connectivity {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("store statement failed")]
    Sql(#[from] rusqlite::Error),
}

#[derive(Debug, Error)]
pub enum ConsistencyError {
    #[error("failed to read aggregate definitions from {}", dir.display())]
    Definitions {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unknown aggregate {0}")]
    UnknownAggregate(String),

    #[error("failed to refresh aggregate {name}")]
    Refresh {
        name: String,
        #[source]
        source: StoreError,
    },
}

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("no dataset files for table {table} in {}", dir.display())]
    NoInput { table: String, dir: PathBuf },

    #[error("no schema for table {table}")]
    NoSchema {
        table: String,
        #[source]
        source: SchemaError,
    },

    #[error("schema discovery failed")]
    Schema(#[source] SchemaError),

    #[error("dataset {} is not valid JSON", path.display())]
    InvalidDataset {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("dataset {} must be a JSON array of objects", path.display())]
    NotARecordArray { path: PathBuf },

    #[error("i/o failure on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("store failure")]
    Store(#[from] StoreError),

    #[error("aggregate maintenance failed")]
    Consistency(#[from] ConsistencyError),
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report {report} returned no rows")]
    EmptyResult { report: String },

    #[error("failed to read report definitions from {}", dir.display())]
    Definitions {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write report artifact {}: {reason}", path.display())]
    Artifact { path: PathBuf, reason: String },

    #[error("store failure")]
    Store(#[from] StoreError),

    #[error("aggregate maintenance failed")]
    Consistency(#[from] ConsistencyError),
}
