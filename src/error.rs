//! Run-level errors and their exit codes.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::query::QueryError;

pub const EXIT_USAGE: i32 = 2;
pub const EXIT_CONFIG: i32 = 3;
pub const EXIT_IO: i32 = 4;
pub const EXIT_QUERY: i32 = 5;

/// Errors that end a report run. Per-field query failures only appear here
/// when the run is configured to fail fast.
///
/// Messages name the failing step; the cause is kept as the error source so
/// callers can render the whole chain.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Error opening schema file {}", path.display())]
    OpenSchema {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error creating report file {}", path.display())]
    CreateOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error reading schema file")]
    ReadSchema(#[source] std::io::Error),

    #[error("Error writing report")]
    Write(#[from] csv::Error),

    #[error("Error flushing report")]
    Flush(#[source] std::io::Error),

    #[error("Could not build HTTP client")]
    Client(#[source] QueryError),

    #[error("Query for field '{field}' failed")]
    Query {
        field: String,
        #[source]
        source: QueryError,
    },
}

impl ReportError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => EXIT_CONFIG,
            Self::OpenSchema { .. }
            | Self::CreateOutput { .. }
            | Self::ReadSchema(_)
            | Self::Write(_)
            | Self::Flush(_) => EXIT_IO,
            Self::Client(_) | Self::Query { .. } => EXIT_QUERY,
        }
    }

    /// Stable category name for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::OpenSchema { .. } => "open-schema",
            Self::CreateOutput { .. } => "create-output",
            Self::ReadSchema(_) => "read-schema",
            Self::Write(_) | Self::Flush(_) => "write",
            Self::Client(_) => "client",
            Self::Query { .. } => "query",
        }
    }
}
