use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use rusqlite::ToSql;
use rusqlite::types::{Null, ToSqlOutput};
use serde::Serialize;

use crate::error::SchemaError;

/// Normalized type category a column maps external values into.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    Integer,
    Float,
    Text,
    Timestamp,
}

impl SemanticType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Text => "text",
            Self::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    pub name: String,
    pub semantic_type: SemanticType,
    pub nullable: bool,
}

/// Column contract of one table, in catalog discovery order.
///
/// Always holds at least one column, and `conflict_key` always names one of
/// them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableContract {
    table: String,
    columns: Vec<ColumnSpec>,
    conflict_key: String,
}

impl TableContract {
    pub fn new(
        table: impl Into<String>,
        columns: Vec<ColumnSpec>,
        conflict_key: impl Into<String>,
    ) -> Result<Self, SchemaError> {
        let table = table.into();
        let conflict_key = conflict_key.into();

        if columns.is_empty() {
            return Err(SchemaError::NoColumns { table });
        }
        if !columns.iter().any(|column| column.name == conflict_key) {
            return Err(SchemaError::UnknownConflictKey {
                table,
                key: conflict_key,
            });
        }

        Ok(Self {
            table,
            columns,
            conflict_key,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn conflict_key(&self) -> &str {
        &self.conflict_key
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TimestampValue {
    Date(NaiveDate),
    Naive(NaiveDateTime),
    Zoned(DateTime<FixedOffset>),
}

impl TimestampValue {
    pub fn to_literal(&self) -> String {
        match self {
            Self::Date(value) => value.format("%Y-%m-%d").to_string(),
            Self::Naive(value) => value.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            Self::Zoned(value) => value.to_rfc3339(),
        }
    }
}

/// A value after column-contract normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Timestamp(TimestampValue),
}

impl TypedValue {
    pub fn to_literal(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Integer(value) => Some(value.to_string()),
            Self::Float(value) => Some(value.to_string()),
            Self::Text(value) => Some(value.clone()),
            Self::Timestamp(value) => Some(value.to_literal()),
        }
    }
}

impl ToSql for TypedValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Self::Null => Null.to_sql(),
            Self::Integer(value) => value.to_sql(),
            Self::Float(value) => value.to_sql(),
            Self::Text(value) => value.to_sql(),
            Self::Timestamp(TimestampValue::Date(value)) => value.to_sql(),
            Self::Timestamp(TimestampValue::Naive(value)) => value.to_sql(),
            Self::Timestamp(TimestampValue::Zoned(value)) => value.to_sql(),
        }
    }
}

/// Typed values aligned 1:1 with a [`TableContract`]'s columns.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    values: Vec<TypedValue>,
}

impl NormalizedRow {
    pub fn new(values: Vec<TypedValue>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[TypedValue] {
        &self.values
    }
}

pub type RawRecord = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDefinition {
    pub name: String,
    pub query: String,
}

/// Derived aggregate kept as a refreshable table named after the definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateView {
    pub name: String,
    pub query: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub file_name: String,
    pub sha256: String,
    pub records_seen: usize,
    pub rows_upserted: usize,
    pub rows_changed: usize,
    pub records_dropped: usize,
    pub processed_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestionReport {
    pub table: String,
    pub conflict_key: String,
    pub files: Vec<FileOutcome>,
}

impl IngestionReport {
    pub fn rows_upserted(&self) -> usize {
        self.files.iter().map(|file| file.rows_upserted).sum()
    }

    pub fn records_dropped(&self) -> usize {
        self.files.iter().map(|file| file.records_dropped).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestPaths {
    pub cache_root: String,
    pub db_path: String,
    pub dataset_dir: String,
    pub manifest_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub completed_at: String,
    pub conflict_policy: String,
    pub paths: IngestPaths,
    pub tables: Vec<IngestionReport>,
}
