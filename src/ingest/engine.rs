use super::*;

/// Loads dataset files for one table into the store.
///
/// Precondition failures (no input files, no schema) abort before any store
/// mutation. Records that fail normalization are logged and dropped without
/// failing the batch. Store failures abort the remaining files of the run.
pub struct IngestionEngine<'a> {
    store: &'a Store,
    processed_dir: PathBuf,
}

impl<'a> IngestionEngine<'a> {
    pub fn new(store: &'a Store, processed_dir: PathBuf) -> Self {
        Self {
            store,
            processed_dir,
        }
    }

    pub fn ingest(
        &self,
        dataset_dir: &Path,
        table: &str,
        coordinator: &mut ConsistencyCoordinator,
    ) -> Result<IngestionReport, IngestionError> {
        info!(
            table = %table,
            dataset_dir = %dataset_dir.display(),
            db_path = %self.store.db_path().display(),
            "ingest started"
        );

        let files = discover_dataset_files(dataset_dir, table)?;
        if files.is_empty() {
            return Err(IngestionError::NoInput {
                table: table.to_string(),
                dir: dataset_dir.to_path_buf(),
            });
        }

        let mut session = self.store.open()?;
        let contract = crate::catalog::SchemaCatalog::new(session.connection())
            .resolve(table)
            .map_err(|error| match error {
                SchemaError::NotFound { .. } | SchemaError::NoColumns { .. } => {
                    IngestionError::NoSchema {
                        table: table.to_string(),
                        source: error,
                    }
                }
                other => IngestionError::Schema(other),
            })?;
        let upsert_sql = build_upsert_sql(&contract);

        let mut report = IngestionReport {
            table: table.to_string(),
            conflict_key: contract.conflict_key().to_string(),
            files: Vec::with_capacity(files.len()),
        };

        for path in files {
            let outcome = self.ingest_file(
                session.connection_mut(),
                &contract,
                &upsert_sql,
                &path,
                coordinator,
            )?;
            report.files.push(outcome);
        }

        session.close()?;

        info!(
            table = %table,
            files = report.files.len(),
            rows_upserted = report.rows_upserted(),
            records_dropped = report.records_dropped(),
            "ingest completed"
        );
        Ok(report)
    }

    fn ingest_file(
        &self,
        connection: &mut Connection,
        contract: &TableContract,
        upsert_sql: &str,
        path: &Path,
        coordinator: &mut ConsistencyCoordinator,
    ) -> Result<FileOutcome, IngestionError> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let sha256 = crate::util::sha256_file(path).map_err(|source| IngestionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let records = read_records(path)?;

        let key_index = contract
            .columns()
            .iter()
            .position(|column| column.name == contract.conflict_key())
            .unwrap_or(0);
        let mut batch = Vec::with_capacity(records.len());
        let mut records_dropped = 0;
        for (index, record) in records.iter().enumerate() {
            match normalize_record(contract, record) {
                Ok(row) => {
                    debug!(
                        file = %file_name,
                        record = index,
                        key = %row.values()[key_index].to_literal().unwrap_or_default(),
                        "record normalized"
                    );
                    batch.push(row);
                }
                Err(error) => {
                    records_dropped += 1;
                    warn!(
                        file = %file_name,
                        record = index,
                        column = %error.column(),
                        reason = %error,
                        "dropped record"
                    );
                }
            }
        }

        let rows_changed = upsert_batch(connection, upsert_sql, &batch)?;
        coordinator.mark_dirty(&ReportFormat::ALL);

        let processed_path = relocate_processed(path, &self.processed_dir)?;
        coordinator.refresh_all(connection)?;

        info!(
            file = %file_name,
            table = %contract.table(),
            records = records.len(),
            upserted = batch.len(),
            changed = rows_changed,
            dropped = records_dropped,
            "dataset batch committed"
        );

        Ok(FileOutcome {
            file_name,
            sha256,
            records_seen: records.len(),
            rows_upserted: batch.len(),
            rows_changed,
            records_dropped,
            processed_path: processed_path.display().to_string(),
        })
    }
}
