//! Column-contract discovery from SQLite metadata.
//!
//! Contracts are never cached: each ingestion resolves its table again so
//! schema changes between runs are picked up.

use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use crate::error::SchemaError;
use crate::model::{ColumnSpec, SemanticType, TableContract};
use crate::store::quote_identifier;

pub struct SchemaCatalog<'conn> {
    connection: &'conn Connection,
}

struct ColumnInfo {
    name: String,
    declared_type: String,
    not_null: bool,
    pk_position: i64,
}

impl<'conn> SchemaCatalog<'conn> {
    pub fn new(connection: &'conn Connection) -> Self {
        Self { connection }
    }

    pub fn resolve(&self, table: &str) -> Result<TableContract, SchemaError> {
        let Some(table_name) = self.canonical_name(table)? else {
            return Err(SchemaError::NotFound {
                table: table.to_string(),
            });
        };

        let columns = self.columns_of(&table_name)?;
        if columns.is_empty() {
            return Err(SchemaError::NoColumns { table: table_name });
        }

        let conflict_key = self.conflict_key_of(&table_name, &columns)?;

        let mut specs = Vec::with_capacity(columns.len());
        for column in columns {
            let Some(semantic_type) = semantic_type_for(&column.declared_type) else {
                return Err(SchemaError::UnsupportedType {
                    table: table_name,
                    column: column.name,
                    declared: column.declared_type,
                });
            };
            // Key columns must be present for conflict resolution, whatever
            // the declaration says.
            let nullable = !column.not_null && column.pk_position == 0;
            specs.push(ColumnSpec {
                name: column.name,
                semantic_type,
                nullable,
            });
        }

        let contract = TableContract::new(table_name, specs, conflict_key)?;
        debug!(
            table = %contract.table(),
            columns = contract.columns().len(),
            conflict_key = %contract.conflict_key(),
            "resolved table contract"
        );
        Ok(contract)
    }

    /// Stored name of `table`. SQLite table names are case-insensitive.
    fn canonical_name(&self, table: &str) -> Result<Option<String>, SchemaError> {
        self.connection
            .query_row(
                "SELECT name FROM sqlite_master
                 WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
                [table],
                |row| row.get(0),
            )
            .optional()
            .map_err(|source| inspect_error(table, source))
    }

    /// The single-column primary key, else the first column (in declaration
    /// order) carrying a single-column unique index. Upserts need one of
    /// the two to target with `ON CONFLICT`.
    fn conflict_key_of(
        &self,
        table: &str,
        columns: &[ColumnInfo],
    ) -> Result<String, SchemaError> {
        let primary = columns
            .iter()
            .filter(|column| column.pk_position > 0)
            .collect::<Vec<_>>();
        if let [key] = primary.as_slice() {
            return Ok(key.name.clone());
        }

        let unique = self.unique_columns_of(table)?;
        columns
            .iter()
            .find(|column| unique.contains(&column.name))
            .map(|column| column.name.clone())
            .ok_or_else(|| SchemaError::NoConflictKey {
                table: table.to_string(),
            })
    }

    fn unique_columns_of(&self, table: &str) -> Result<Vec<String>, SchemaError> {
        let list_sql = format!("PRAGMA index_list({})", quote_identifier(table));
        let mut statement = self
            .connection
            .prepare(&list_sql)
            .map_err(|source| inspect_error(table, source))?;
        let indexes = statement
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)? != 0,
                    row.get::<_, i64>(4)? != 0,
                ))
            })
            .map_err(|source| inspect_error(table, source))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|source| inspect_error(table, source))?;

        let mut unique = Vec::new();
        for (index, is_unique, partial) in indexes {
            if !is_unique || partial {
                continue;
            }
            let info_sql = format!("PRAGMA index_info({})", quote_identifier(&index));
            let mut statement = self
                .connection
                .prepare(&info_sql)
                .map_err(|source| inspect_error(table, source))?;
            let indexed = statement
                .query_map([], |row| row.get::<_, Option<String>>(2))
                .map_err(|source| inspect_error(table, source))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|source| inspect_error(table, source))?;
            if let [Some(column)] = indexed.as_slice() {
                unique.push(column.clone());
            }
        }
        Ok(unique)
    }

    fn columns_of(&self, table: &str) -> Result<Vec<ColumnInfo>, SchemaError> {
        let pragma_sql = format!("PRAGMA table_info({})", quote_identifier(table));
        let mut statement = self
            .connection
            .prepare(&pragma_sql)
            .map_err(|source| inspect_error(table, source))?;

        let rows = statement
            .query_map([], |row| {
                Ok(ColumnInfo {
                    name: row.get(1)?,
                    declared_type: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    not_null: row.get::<_, i64>(3)? != 0,
                    pk_position: row.get(5)?,
                })
            })
            .map_err(|source| inspect_error(table, source))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|source| inspect_error(table, source))
    }
}

fn inspect_error(table: &str, source: rusqlite::Error) -> SchemaError {
    SchemaError::Inspect {
        table: table.to_string(),
        source,
    }
}

/// Maps a declared column type to its semantic type, ignoring case and any
/// `(precision, scale)` suffix.
pub fn semantic_type_for(declared: &str) -> Option<SemanticType> {
    let base = declared
        .split('(')
        .next()
        .unwrap_or(declared)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    match base.as_str() {
        "integer" | "int" | "smallint" | "bigint" | "tinyint" | "mediumint" | "int2" | "int4"
        | "int8" | "serial" | "bigserial" => Some(SemanticType::Integer),
        "real" | "float" | "double" | "double precision" | "numeric" | "decimal" | "float4"
        | "float8" => Some(SemanticType::Float),
        "text" | "varchar" | "character varying" | "char" | "character" | "nchar"
        | "nvarchar" | "clob" | "uuid" => Some(SemanticType::Text),
        "date" | "datetime" | "timestamp" | "timestamptz" | "timestamp with time zone"
        | "timestamp without time zone" => Some(SemanticType::Timestamp),
        other
            if ["character", "varchar", "nvarchar"]
                .iter()
                .any(|prefix| other.starts_with(prefix)) =>
        {
            Some(SemanticType::Text)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection_with(schema: &str) -> Connection {
        let connection = Connection::open_in_memory().expect("in-memory DB should open");
        connection.execute_batch(schema).expect("schema should apply");
        connection
    }

    #[test]
    fn resolve_reads_columns_in_declaration_order() {
        let connection = connection_with(
            "CREATE TABLE students (
               id INTEGER PRIMARY KEY NOT NULL,
               name VARCHAR(120) NOT NULL,
               birthday DATE,
               room INTEGER,
               score NUMERIC(5, 2)
             );",
        );

        let contract = SchemaCatalog::new(&connection)
            .resolve("students")
            .expect("contract should resolve");

        let summary: Vec<(&str, SemanticType, bool)> = contract
            .columns()
            .iter()
            .map(|column| (column.name.as_str(), column.semantic_type, column.nullable))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("id", SemanticType::Integer, false),
                ("name", SemanticType::Text, false),
                ("birthday", SemanticType::Timestamp, true),
                ("room", SemanticType::Integer, true),
                ("score", SemanticType::Float, true),
            ]
        );
        assert_eq!(contract.conflict_key(), "id");
    }

    #[test]
    fn conflict_key_is_the_declared_primary_key_not_the_first_column() {
        let connection = connection_with(
            "CREATE TABLE rooms (label TEXT, code TEXT PRIMARY KEY, capacity INTEGER);",
        );

        let contract = SchemaCatalog::new(&connection)
            .resolve("rooms")
            .expect("contract should resolve");
        assert_eq!(contract.conflict_key(), "code");
        assert!(!contract.columns()[1].nullable);
    }

    #[test]
    fn conflict_key_uses_a_unique_column_without_primary_key() {
        let connection = connection_with("CREATE TABLE rooms (id INTEGER UNIQUE, name TEXT);");

        let contract = SchemaCatalog::new(&connection)
            .resolve("rooms")
            .expect("contract should resolve");
        assert_eq!(contract.conflict_key(), "id");
    }

    #[test]
    fn conflict_key_prefers_a_unique_column_over_the_first_column() {
        let connection =
            connection_with("CREATE TABLE tags (label TEXT, code TEXT UNIQUE, weight INTEGER);");

        let contract = SchemaCatalog::new(&connection)
            .resolve("tags")
            .expect("contract should resolve");
        assert_eq!(contract.conflict_key(), "code");
    }

    #[test]
    fn table_without_upsert_target_is_rejected() {
        let connection = connection_with(
            "CREATE TABLE tags (label TEXT, weight INTEGER);
             CREATE TABLE pairs (a INTEGER, b INTEGER, PRIMARY KEY (a, b));
             CREATE UNIQUE INDEX tags_heavy ON tags(label) WHERE weight > 10;",
        );
        let catalog = SchemaCatalog::new(&connection);

        for table in ["tags", "pairs"] {
            let error = catalog.resolve(table).expect_err("no usable conflict key");
            assert!(
                matches!(&error, SchemaError::NoConflictKey { table: name } if name == table),
                "{table}: {error:?}"
            );
        }
    }

    #[test]
    fn table_lookup_ignores_case_and_returns_the_stored_name() {
        let connection = connection_with("CREATE TABLE rooms (id INTEGER PRIMARY KEY, name TEXT);");

        let contract = SchemaCatalog::new(&connection)
            .resolve("ROOMS")
            .expect("contract should resolve");
        assert_eq!(contract.table(), "rooms");
        assert_eq!(contract.columns().len(), 2);
    }

    #[test]
    fn missing_table_is_not_found() {
        let connection = connection_with("CREATE TABLE rooms (id INTEGER);");

        let error = SchemaCatalog::new(&connection)
            .resolve("students")
            .expect_err("missing table should fail");
        assert!(matches!(error, SchemaError::NotFound { table } if table == "students"));
    }

    #[test]
    fn unmappable_column_type_rejects_the_whole_contract() {
        let connection = connection_with("CREATE TABLE photos (id INTEGER PRIMARY KEY, data BLOB);");

        let error = SchemaCatalog::new(&connection)
            .resolve("photos")
            .expect_err("blob column should be rejected");
        assert!(matches!(
            error,
            SchemaError::UnsupportedType { column, declared, .. }
                if column == "data" && declared == "BLOB"
        ));
    }

    #[test]
    fn semantic_type_for_ignores_case_and_precision() {
        assert_eq!(semantic_type_for("BIGINT"), Some(SemanticType::Integer));
        assert_eq!(semantic_type_for("Decimal(10,2)"), Some(SemanticType::Float));
        assert_eq!(semantic_type_for("double  precision"), Some(SemanticType::Float));
        assert_eq!(semantic_type_for("character varying(32)"), Some(SemanticType::Text));
        assert_eq!(semantic_type_for("TIMESTAMP"), Some(SemanticType::Timestamp));
        assert_eq!(
            semantic_type_for("CHARACTER LARGE OBJECT"),
            Some(SemanticType::Text)
        );
        assert_eq!(semantic_type_for("varchar2"), Some(SemanticType::Text));
        assert_eq!(semantic_type_for(""), None);
        assert_eq!(semantic_type_for("json"), None);
    }
}
