pub mod ingest;
pub mod report;
pub mod session;
pub mod setup;
pub mod status;

use std::io;

use tracing::{error, info, warn};

use crate::error::{NormalizationError, StoreError};

/// How a failed operation is logged, decided from its error chain.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FailureKind {
    Connection,
    Value,
    File,
    Unknown,
}

impl FailureKind {
    pub fn classify(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if let Some(StoreError::Connectivity { .. }) = cause.downcast_ref::<StoreError>() {
                return Self::Connection;
            }
            if cause.downcast_ref::<NormalizationError>().is_some() {
                return Self::Value;
            }
            if cause
                .downcast_ref::<io::Error>()
                .is_some_and(|io_err| io_err.kind() == io::ErrorKind::NotFound)
            {
                return Self::File;
            }
        }
        Self::Unknown
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Value => "value",
            Self::File => "file",
            Self::Unknown => "unknown",
        }
    }
}

/// Runs one labelled operation, printing `<label>: done` or
/// `<label>: FAILED -> <reason>`. Returns whether it succeeded.
pub fn run_step(label: &str, step: impl FnOnce() -> anyhow::Result<()>) -> bool {
    info!(step = %label, "step started");
    match step() {
        Ok(()) => {
            info!(step = %label, "step finished");
            println!("{label}: done");
            true
        }
        Err(err) => {
            let kind = FailureKind::classify(&err);
            let reason = format!("{err:#}");
            let tag = kind.as_str();
            match kind {
                FailureKind::Connection | FailureKind::Value => {
                    warn!(step = %label, kind = tag, error = %reason, "step failed");
                }
                FailureKind::File => info!(step = %label, kind = tag, error = %reason, "step failed"),
                FailureKind::Unknown => {
                    error!(step = %label, kind = tag, error = %reason, "step failed");
                }
            }
            println!("{label}: FAILED -> {reason}");
            false
        }
    }
}
