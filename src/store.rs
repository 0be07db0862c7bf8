use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};
use rusqlite::functions::FunctionFlags;
use tracing::{debug, trace};

use crate::cli::ConflictPolicy;
use crate::error::StoreError;

/// Name of the store-side predicate consulted by upserts on key conflicts.
pub const CONFLICT_HOOK: &str = "should_overwrite";

#[derive(Debug, Clone)]
pub struct Store {
    db_path: PathBuf,
    conflict_policy: ConflictPolicy,
}

impl Store {
    pub fn new(db_path: PathBuf, conflict_policy: ConflictPolicy) -> Self {
        Self {
            db_path,
            conflict_policy,
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Opens one connection for one unit of work. The connection is released
    /// when the session is closed or dropped. A missing database file is a
    /// connectivity failure; nothing is created.
    pub fn open(&self) -> Result<StoreSession, StoreError> {
        self.connect(
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
    }

    /// Like [`Store::open`], but creates the database file if it is missing.
    pub fn create(&self) -> Result<StoreSession, StoreError> {
        self.connect(
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
    }

    fn connect(&self, flags: OpenFlags) -> Result<StoreSession, StoreError> {
        let connection = Connection::open_with_flags(&self.db_path, flags).map_err(|source| {
            StoreError::Connectivity {
                path: self.db_path.clone(),
                source,
            }
        })?;
        configure_connection(&connection)?;
        register_conflict_hook(&connection, self.conflict_policy)?;

        debug!(path = %self.db_path.display(), "store connection opened");
        Ok(StoreSession {
            connection,
            path: self.db_path.clone(),
        })
    }
}

pub struct StoreSession {
    connection: Connection,
    path: PathBuf,
}

impl StoreSession {
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.connection
    }

    pub fn close(self) -> Result<(), StoreError> {
        let path = self.path;
        self.connection
            .close()
            .map_err(|(_, source)| StoreError::Sql(source))?;
        debug!(path = %path.display(), "store connection closed");
        Ok(())
    }
}

fn configure_connection(connection: &Connection) -> Result<(), StoreError> {
    connection.pragma_update(None, "journal_mode", "WAL")?;
    connection.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(())
}

fn register_conflict_hook(
    connection: &Connection,
    policy: ConflictPolicy,
) -> Result<(), StoreError> {
    connection.create_scalar_function(
        CONFLICT_HOOK,
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        move |ctx| {
            let table: String = ctx.get(0)?;
            let overwrite = policy.should_overwrite();
            trace!(table = %table, overwrite, "conflict hook evaluated");
            Ok(overwrite)
        },
    )?;
    Ok(())
}

pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub fn count_rows(connection: &Connection, table: &str) -> Result<i64, StoreError> {
    let sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(table));
    Ok(connection.query_row(&sql, [], |row| row.get(0))?)
}

/// User tables, excluding SQLite internals, in name order.
pub fn list_tables(connection: &Connection) -> Result<Vec<String>, StoreError> {
    let mut statement = connection.prepare(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
         ORDER BY name",
    )?;
    let names = statement
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names)
}
