use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "seedrep",
    version,
    about = "Seed a SQLite store from JSON datasets and generate reports from it"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Setup(SetupArgs),
    Ingest(IngestArgs),
    Report(ReportArgs),
    Session(SessionArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    #[arg(long, env = "SEEDREP_CACHE_ROOT", default_value = ".cache/seedrep")]
    pub cache_root: PathBuf,

    #[arg(long, env = "SEEDREP_DB_PATH")]
    pub db_path: Option<PathBuf>,

    #[arg(long, env = "SEEDREP_DATASET_DIR", default_value = "datasets")]
    pub dataset_dir: PathBuf,

    #[arg(long, env = "SEEDREP_SQL_DIR", default_value = "sql")]
    pub sql_dir: PathBuf,

    #[arg(long, env = "SEEDREP_REPORTS_DIR", default_value = "reports")]
    pub reports_dir: PathBuf,

    #[arg(
        long,
        value_enum,
        env = "SEEDREP_CONFLICT_POLICY",
        default_value_t = ConflictPolicy::Overwrite
    )]
    pub conflict_policy: ConflictPolicy,
}

#[derive(Args, Debug, Clone)]
pub struct SetupArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long)]
    pub schema_script: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub reset: bool,
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long = "table", required = true)]
    pub tables: Vec<String>,

    #[arg(long)]
    pub ingest_manifest_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Formats to generate; all formats when omitted.
    #[arg(long = "format", value_enum)]
    pub formats: Vec<ReportFormat>,
}

#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Steps such as `setup`, `ingest:rooms`, `report:json`, `report:all`.
    #[arg(required = true, num_args = 1..)]
    pub steps: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ReportFormat {
    Json,
    Xml,
}

impl ReportFormat {
    pub const ALL: [ReportFormat; 2] = [ReportFormat::Json, ReportFormat::Xml];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Xml => "xml",
        }
    }

    pub fn extension(self) -> &'static str {
        self.as_str()
    }
}

/// Decision made by the store-side `should_overwrite` hook when an upserted
/// row collides with an existing key.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ConflictPolicy {
    Overwrite,
    KeepExisting,
}

impl ConflictPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Overwrite => "overwrite",
            Self::KeepExisting => "keep-existing",
        }
    }

    pub fn should_overwrite(self) -> bool {
        matches!(self, Self::Overwrite)
    }
}
