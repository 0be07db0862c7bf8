use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, params_from_iter};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cli::ReportFormat;
use crate::consistency::ConsistencyCoordinator;
use crate::error::{IngestionError, NormalizationError, SchemaError, StoreError};
use crate::model::{FileOutcome, IngestionReport, NormalizedRow, RawRecord, TableContract};
use crate::normalize::coerce;
use crate::store::{CONFLICT_HOOK, Store, quote_identifier, quote_literal};

mod dataset;
mod engine;
mod upsert;

pub use engine::IngestionEngine;

pub const DATASET_EXTENSION: &str = "json";

use dataset::*;
use upsert::*;
