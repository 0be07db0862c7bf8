//! Derived aggregates and per-format dirty state.
//!
//! SQLite has no materialized views, so each aggregate is an ordinary table
//! created from its defining query and fully rebuilt on refresh.

use std::io;
use std::path::Path;

use rusqlite::{Connection, params};
use tracing::{debug, info, warn};

use crate::cli::ReportFormat;
use crate::error::{ConsistencyError, StoreError};
use crate::model::AggregateView;
use crate::store::{count_rows, quote_identifier};
use crate::util::{now_utc_string, read_sql_definitions};

/// Bookkeeping table recording the last refresh of every aggregate.
pub const REFRESHES_TABLE: &str = "aggregate_refreshes";

/// Whether each report format is stale relative to the ingested data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyFlags {
    json: bool,
    xml: bool,
}

impl Default for DirtyFlags {
    /// Every format starts dirty so the first run always generates.
    fn default() -> Self {
        Self {
            json: true,
            xml: true,
        }
    }
}

impl DirtyFlags {
    pub fn is_dirty(&self, format: ReportFormat) -> bool {
        match format {
            ReportFormat::Json => self.json,
            ReportFormat::Xml => self.xml,
        }
    }

    fn set(&mut self, format: ReportFormat, dirty: bool) {
        match format {
            ReportFormat::Json => self.json = dirty,
            ReportFormat::Xml => self.xml = dirty,
        }
    }
}

#[derive(Debug, Default)]
pub struct ConsistencyCoordinator {
    aggregates: Vec<AggregateView>,
    flags: DirtyFlags,
}

impl ConsistencyCoordinator {
    pub fn new(aggregates: Vec<AggregateView>) -> Self {
        Self {
            aggregates,
            flags: DirtyFlags::default(),
        }
    }

    /// Loads one aggregate per `*.sql` file in `dir`. A missing directory
    /// means no aggregates.
    pub fn load(dir: &Path) -> Result<Self, ConsistencyError> {
        let definitions = match read_sql_definitions(dir) {
            Ok(definitions) => definitions,
            Err(source) if source.kind() == io::ErrorKind::NotFound => {
                warn!(dir = %dir.display(), "aggregate directory missing, no aggregates to maintain");
                Vec::new()
            }
            Err(source) => {
                return Err(ConsistencyError::Definitions {
                    dir: dir.to_path_buf(),
                    source,
                });
            }
        };

        let aggregates = definitions
            .into_iter()
            .map(|(name, query)| AggregateView { name, query })
            .collect::<Vec<_>>();
        debug!(dir = %dir.display(), count = aggregates.len(), "loaded aggregate definitions");
        Ok(Self::new(aggregates))
    }

    pub fn aggregates(&self) -> &[AggregateView] {
        &self.aggregates
    }

    pub fn flags(&self) -> DirtyFlags {
        self.flags
    }

    /// Creates the aggregate if absent, then rebuilds it from its query.
    /// Returns the aggregate's row count after the refresh.
    pub fn refresh(
        &self,
        connection: &mut Connection,
        view_name: &str,
    ) -> Result<i64, ConsistencyError> {
        let view = self
            .aggregates
            .iter()
            .find(|view| view.name == view_name)
            .ok_or_else(|| ConsistencyError::UnknownAggregate(view_name.to_string()))?;

        let row_count =
            refresh_view(connection, view).map_err(|source| ConsistencyError::Refresh {
                name: view.name.clone(),
                source,
            })?;
        info!(aggregate = %view.name, rows = row_count, "aggregate refreshed");
        Ok(row_count)
    }

    pub fn refresh_all(&self, connection: &mut Connection) -> Result<(), ConsistencyError> {
        for view in &self.aggregates {
            self.refresh(connection, &view.name)?;
        }
        Ok(())
    }

    pub fn mark_dirty(&mut self, formats: &[ReportFormat]) {
        for format in formats {
            self.flags.set(*format, true);
        }
        debug!(flags = ?self.flags, "report formats marked dirty");
    }

    pub fn is_dirty(&self, format: ReportFormat) -> bool {
        self.flags.is_dirty(format)
    }

    pub fn clear(&mut self, format: ReportFormat) {
        self.flags.set(format, false);
        debug!(format = format.as_str(), "report format clean");
    }
}

fn refresh_view(connection: &mut Connection, view: &AggregateView) -> Result<i64, StoreError> {
    let name = quote_identifier(&view.name);

    connection.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {name} AS {query};
         CREATE TABLE IF NOT EXISTS {REFRESHES_TABLE} (
           name TEXT PRIMARY KEY,
           refreshed_at TEXT NOT NULL,
           row_count INTEGER NOT NULL
         );",
        query = view.query
    ))?;

    let tx = connection.transaction()?;
    tx.execute(&format!("DELETE FROM {name}"), [])?;
    tx.execute(&format!("INSERT INTO {name} {}", view.query), [])?;
    let row_count = count_rows(&tx, &view.name)?;
    tx.execute(
        "INSERT INTO aggregate_refreshes(name, refreshed_at, row_count) VALUES(?1, ?2, ?3)
         ON CONFLICT(name) DO UPDATE SET
           refreshed_at=excluded.refreshed_at,
           row_count=excluded.row_count",
        params![view.name, now_utc_string(), row_count],
    )?;
    tx.commit()?;

    Ok(row_count)
}
