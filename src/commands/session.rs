use anyhow::{Context, Result, bail};
use regex::Regex;
use tracing::info;

use crate::cli::{ReportFormat, SessionArgs};
use crate::commands::{ingest, report, run_step, setup};
use crate::config::AppConfig;
use crate::consistency::ConsistencyCoordinator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Setup,
    Ingest(String),
    Report(ReportFormat),
}

impl Step {
    pub fn label(&self) -> String {
        match self {
            Self::Setup => "setup".to_string(),
            Self::Ingest(table) => format!("ingest({table})"),
            Self::Report(format) => format!("report({})", format.as_str()),
        }
    }
}

/// Runs steps in order within one process, sharing dirty state between
/// them. A failing step does not stop the steps after it.
pub fn run(args: SessionArgs) -> Result<()> {
    let config = AppConfig::from_args(&args.store);
    let mut coordinator = ConsistencyCoordinator::load(&config.aggregates_dir())?;

    let mut failed = 0;
    for token in tokenize(&args.steps)? {
        let Some(steps) = parse_step(&token) else {
            println!("unknown step: {token}");
            continue;
        };
        for step in steps {
            let label = step.label();
            if !run_step(&label, || execute(&config, &step, &mut coordinator)) {
                failed += 1;
            }
        }
    }

    info!(failed, flags = ?coordinator.flags(), "session finished");
    if failed > 0 {
        bail!("{failed} session step(s) failed");
    }
    Ok(())
}

fn execute(config: &AppConfig, step: &Step, coordinator: &mut ConsistencyCoordinator) -> Result<()> {
    match step {
        Step::Setup => setup::setup_store(config, &config.default_schema_script(), false),
        Step::Ingest(table) => ingest::ingest_table(config, table, coordinator).map(|_| ()),
        Step::Report(format) => report::generate_format(config, *format, coordinator).map(|_| ()),
    }
}

/// Splits step arguments on spaces and commas.
pub fn tokenize(raw: &[String]) -> Result<Vec<String>> {
    let separators = Regex::new(r"[ ,]+").context("failed to compile step separator regex")?;
    Ok(raw
        .iter()
        .flat_map(|arg| separators.split(arg.trim()))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect())
}

/// Parses one token. `report:all` expands to one step per format.
pub fn parse_step(token: &str) -> Option<Vec<Step>> {
    let lowered = token.to_ascii_lowercase();
    match lowered.split_once(':') {
        None if lowered == "setup" => Some(vec![Step::Setup]),
        Some(("ingest", table)) if !table.is_empty() => {
            let table = &token[token.len() - table.len()..];
            Some(vec![Step::Ingest(table.to_string())])
        }
        Some(("report", "all")) => Some(ReportFormat::ALL.into_iter().map(Step::Report).collect()),
        Some(("report", "json")) => Some(vec![Step::Report(ReportFormat::Json)]),
        Some(("report", "xml")) => Some(vec![Step::Report(ReportFormat::Xml)]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::*;
    use crate::cli::{ConflictPolicy, StoreArgs};
    use crate::test_support::files_in;

    #[test]
    fn tokenize_accepts_spaces_and_commas() {
        let raw = vec!["setup, ingest:rooms".to_string(), "report:json,report:xml".to_string()];
        assert_eq!(
            tokenize(&raw).expect("tokens"),
            vec!["setup", "ingest:rooms", "report:json", "report:xml"]
        );
    }

    #[test]
    fn parse_step_recognizes_each_form() {
        assert_eq!(parse_step("setup"), Some(vec![Step::Setup]));
        assert_eq!(
            parse_step("ingest:Rooms"),
            Some(vec![Step::Ingest("Rooms".to_string())])
        );
        assert_eq!(
            parse_step("REPORT:all"),
            Some(vec![
                Step::Report(ReportFormat::Json),
                Step::Report(ReportFormat::Xml)
            ])
        );
        assert_eq!(parse_step("report:csv"), None);
        assert_eq!(parse_step("ingest:"), None);
        assert_eq!(parse_step("7"), None);
    }

    fn write(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("parent dir");
        }
        fs::write(path, content).expect("write");
    }

    #[test]
    fn session_carries_dirty_state_between_steps() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        write(
            &root.join("sql/tables.sql"),
            "CREATE TABLE IF NOT EXISTS rooms (id INTEGER PRIMARY KEY NOT NULL, name TEXT);",
        );
        write(
            &root.join("sql/aggregates/room_totals.sql"),
            "SELECT COUNT(*) AS total FROM rooms;",
        );
        write(
            &root.join("sql/reporting/totals.sql"),
            "SELECT total FROM room_totals",
        );
        write(
            &root.join("datasets/rooms.json"),
            r#"[{"id": 1, "name": "Red"}, {"id": "x", "name": "Blue"}]"#,
        );

        let args = SessionArgs {
            store: StoreArgs {
                cache_root: root.join("cache"),
                db_path: None,
                dataset_dir: root.join("datasets"),
                sql_dir: root.join("sql"),
                reports_dir: root.join("reports"),
                conflict_policy: ConflictPolicy::Overwrite,
            },
            steps: vec![
                "setup ingest:rooms report:json report:json".to_string(),
                "bogus,report:xml".to_string(),
            ],
        };

        run(args).expect("every known step should succeed");

        assert_eq!(files_in(&root.join("reports/json")).len(), 1);
        assert_eq!(files_in(&root.join("reports/xml")).len(), 1);
        assert_eq!(files_in(&root.join("datasets/processed")), vec!["rooms.json"]);
    }

    #[test]
    fn failing_step_does_not_stop_later_steps() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        write(
            &root.join("sql/tables.sql"),
            "CREATE TABLE IF NOT EXISTS rooms (id INTEGER PRIMARY KEY NOT NULL, name TEXT);",
        );
        write(&root.join("sql/reporting/rooms.sql"), "SELECT 1 AS one");

        let args = SessionArgs {
            store: StoreArgs {
                cache_root: root.join("cache"),
                db_path: None,
                dataset_dir: root.join("datasets"),
                sql_dir: root.join("sql"),
                reports_dir: root.join("reports"),
                conflict_policy: ConflictPolicy::Overwrite,
            },
            steps: vec!["setup ingest:rooms report:json".to_string()],
        };

        let err = run(args).expect_err("ingest without datasets fails");
        assert_eq!(err.to_string(), "1 session step(s) failed");
        assert_eq!(files_in(&root.join("reports/json")).len(), 1);
    }
}
