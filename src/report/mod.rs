use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use regex::Regex;
use rusqlite::Connection;
use rusqlite::types::ValueRef;
use serde_json::{Map, Number, Value};
use tracing::{info, warn};

use crate::cli::ReportFormat;
use crate::consistency::ConsistencyCoordinator;
use crate::error::{ReportError, StoreError};
use crate::model::ReportDefinition;
use crate::store::Store;
use crate::util::{
    ensure_directory, read_sql_definitions, unique_path, utc_artifact_stamp, write_json_pretty,
};

mod generator;
mod rows;
mod xml;

pub use generator::{GenerateOutcome, ReportGenerator};

use rows::*;
use xml::*;
