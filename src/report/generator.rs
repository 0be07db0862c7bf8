use super::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateOutcome {
    /// Nothing changed since the last generation; no query ran, no file written.
    Skipped,
    Generated { artifacts: Vec<PathBuf> },
}

/// Runs every report definition against the store and writes one artifact
/// per report for the requested format.
pub struct ReportGenerator<'a> {
    store: &'a Store,
    definitions: Vec<ReportDefinition>,
    reports_dir: PathBuf,
}

impl<'a> ReportGenerator<'a> {
    pub fn new(
        store: &'a Store,
        definitions: Vec<ReportDefinition>,
        reports_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            definitions,
            reports_dir,
        }
    }

    /// Loads one report per `*.sql` file in `definitions_dir`.
    pub fn load(
        store: &'a Store,
        definitions_dir: &Path,
        reports_dir: PathBuf,
    ) -> Result<Self, ReportError> {
        let definitions = read_sql_definitions(definitions_dir)
            .map_err(|source| ReportError::Definitions {
                dir: definitions_dir.to_path_buf(),
                source,
            })?
            .into_iter()
            .map(|(name, query)| ReportDefinition { name, query })
            .collect();
        Ok(Self::new(store, definitions, reports_dir))
    }

    pub fn definitions(&self) -> &[ReportDefinition] {
        &self.definitions
    }

    pub fn output_dir(&self, format: ReportFormat) -> PathBuf {
        self.reports_dir.join(format.as_str())
    }

    /// Generates every report in `format` if the format is dirty.
    ///
    /// The first report returning no rows aborts the pass; artifacts already
    /// written in the pass are kept and the format stays dirty.
    pub fn generate(
        &self,
        format: ReportFormat,
        coordinator: &mut ConsistencyCoordinator,
    ) -> Result<GenerateOutcome, ReportError> {
        if !coordinator.is_dirty(format) {
            info!(format = format.as_str(), "reports up to date, generation skipped");
            return Ok(GenerateOutcome::Skipped);
        }
        if self.definitions.is_empty() {
            warn!(format = format.as_str(), "no report definitions configured");
        }

        info!(
            format = format.as_str(),
            reports = self.definitions.len(),
            "report generation started"
        );

        let mut session = self.store.open()?;
        coordinator.refresh_all(session.connection_mut())?;

        let output_dir = self.output_dir(format);
        let stamp = utc_artifact_stamp(Utc::now());
        let mut artifacts = Vec::with_capacity(self.definitions.len());

        for definition in &self.definitions {
            let rows = query_report_rows(session.connection(), definition)?;
            if rows.is_empty() {
                return Err(ReportError::EmptyResult {
                    report: definition.name.clone(),
                });
            }

            let path = unique_path(
                &output_dir,
                &format!("{}_{stamp}", definition.name),
                format.extension(),
            );
            write_artifact(format, &path, definition, &rows).map_err(|err| {
                ReportError::Artifact {
                    path: path.clone(),
                    reason: format!("{err:#}"),
                }
            })?;
            info!(
                report = %definition.name,
                rows = rows.len(),
                path = %path.display(),
                "report written"
            );
            artifacts.push(path);
        }

        session.close()?;
        coordinator.clear(format);

        info!(
            format = format.as_str(),
            artifacts = artifacts.len(),
            "report generation completed"
        );
        Ok(GenerateOutcome::Generated { artifacts })
    }
}

fn write_artifact(
    format: ReportFormat,
    path: &Path,
    definition: &ReportDefinition,
    rows: &[ReportRow],
) -> anyhow::Result<()> {
    match format {
        ReportFormat::Json => write_json_pretty(path, &rows),
        ReportFormat::Xml => {
            if let Some(parent) = path.parent() {
                ensure_directory(parent)?;
            }
            let rendered = render_xml(&definition.name, rows)?;
            fs::write(path, rendered)
                .with_context(|| format!("failed to write xml file: {}", path.display()))
        }
    }
}
