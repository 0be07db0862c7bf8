use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use crate::cli::{ReportArgs, ReportFormat};
use crate::commands::run_step;
use crate::config::AppConfig;
use crate::consistency::ConsistencyCoordinator;
use crate::report::{GenerateOutcome, ReportGenerator};

pub fn run(args: ReportArgs) -> Result<()> {
    let config = AppConfig::from_args(&args.store);
    let formats = if args.formats.is_empty() {
        ReportFormat::ALL.to_vec()
    } else {
        args.formats.clone()
    };

    let mut coordinator = ConsistencyCoordinator::load(&config.aggregates_dir())?;
    let mut failed = 0;
    for format in formats {
        let label = format!("report({})", format.as_str());
        let succeeded = run_step(&label, || {
            generate_format(&config, format, &mut coordinator).map(|_| ())
        });
        if !succeeded {
            failed += 1;
        }
    }

    if failed > 0 {
        bail!("{failed} report format(s) failed");
    }
    Ok(())
}

pub fn generate_format(
    config: &AppConfig,
    format: ReportFormat,
    coordinator: &mut ConsistencyCoordinator,
) -> Result<GenerateOutcome> {
    if !coordinator.is_dirty(format) {
        info!(format = format.as_str(), "reports up to date, generation skipped");
        return Ok(GenerateOutcome::Skipped);
    }

    let store = config.store();
    let generator =
        ReportGenerator::load(&store, &config.reporting_dir(), config.reports_dir.clone())?;
    debug!(
        format = format.as_str(),
        reports = generator.definitions().len(),
        "report definitions loaded"
    );
    generator
        .generate(format, coordinator)
        .with_context(|| format!("failed to generate {} reports", format.as_str()))
}
