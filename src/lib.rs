//! Per-field document counts for the attribute fields of a search schema.
//!
//! The pipeline is single pass and synchronous: [`scanner`] discovers each
//! attribute field, a [`FieldCounter`] resolves it to a count, and
//! [`report`] appends one CSV row per declaration in discovery order.

pub mod config;
pub mod error;
pub mod logging;
pub mod query;
pub mod report;
pub mod scanner;

use std::ffi::OsString;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use clap::{ArgAction, Parser};
use tracing::{info, warn};

use crate::config::{ConfigOverrides, ReportConfig};
pub use crate::error::ReportError;
use crate::query::{AggregationQueryClient, QueryError};
use crate::report::ReportWriter;
use crate::scanner::SchemaScanner;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "field-counts",
    version,
    about = "Count documents per attribute field of a search schema and write a CSV report",
    long_about = "Count documents per attribute field of a search schema and write a CSV report.\n\n\
The three positional arguments are all a basic run needs. The optional flags \
override the endpoint, timeout and failure policy that otherwise come from \
the config file, FIELD_COUNTS_* environment variables, or built-in defaults."
)]
pub struct Cli {
    /// Schema definition file to scan
    pub schema_file: PathBuf,

    /// CSV report to create (overwritten if present)
    pub output: PathBuf,

    /// Schema (document type) name used in the queries
    pub schema_name: String,

    /// TOML configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Search endpoint [default: http://localhost:8080/search]
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Per-request timeout in seconds [default: 10]
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Stop at the first failed field query
    #[arg(long)]
    pub fail_fast: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            config_path: self.config.clone(),
            endpoint: self.endpoint.clone(),
            timeout_secs: self.timeout_secs,
            fail_fast: self.fail_fast,
        }
    }
}

pub fn parse_cli<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Cli::try_parse_from(args)
}

/// Resolves a field name to a document count.
pub trait FieldCounter {
    fn count(&self, schema: &str, field: &str) -> Result<i64, QueryError>;
}

impl FieldCounter for AggregationQueryClient {
    fn count(&self, schema: &str, field: &str) -> Result<i64, QueryError> {
        AggregationQueryClient::count(self, schema, field)
    }
}

/// Outcome counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportSummary {
    /// Data rows written.
    pub rows: usize,
    /// Fields resolved to a count.
    pub counted: usize,
    /// Fields whose query failed; written with the failure sentinel.
    pub failed: usize,
    /// Declarations without a `field <name>` pair; written with an empty name.
    pub unresolved: usize,
    /// Marker lines with a blank preceding line that produced no row.
    pub skipped: usize,
}

/// Scan `schema`, count each field and write the rows.
///
/// The header is written first. Per-field failures are logged and recorded
/// with `config.failure_sentinel` unless `config.fail_fast` is set, in which
/// case the report is flushed and the failure returned.
pub fn generate_report<R, W, C>(
    config: &ReportConfig,
    schema: R,
    schema_name: &str,
    counter: &C,
    writer: &mut ReportWriter<W>,
) -> Result<ReportSummary, ReportError>
where
    R: BufRead,
    W: Write,
    C: FieldCounter + ?Sized,
{
    let scanner = SchemaScanner::from_config(config);
    let mut summary = ReportSummary::default();

    writer.write_header()?;

    for declaration in scanner.scan(schema) {
        let declaration = declaration.map_err(ReportError::ReadSchema)?;

        if declaration.is_blank() && !config.report_blank_declarations {
            warn!(
                line = declaration.marker_line,
                "attribute marker has no declaration line; skipping"
            );
            summary.skipped += 1;
            continue;
        }

        if !declaration.is_resolved() {
            warn!(
                line = declaration.marker_line,
                declaration = %declaration.raw_line,
                "no field name before attribute marker"
            );
            writer.write_row("", config.failure_sentinel)?;
            summary.unresolved += 1;
            continue;
        }

        let field = declaration.field_name.as_str();
        match counter.count(schema_name, field) {
            Ok(count) => {
                writer.write_row(field, count)?;
                summary.counted += 1;
            }
            Err(err) => {
                warn!(field, kind = err.kind(), error = %err, "field query failed");
                writer.write_row(field, config.failure_sentinel)?;
                summary.failed += 1;
                if config.fail_fast {
                    writer.flush().map_err(ReportError::Flush)?;
                    return Err(ReportError::Query {
                        field: field.to_string(),
                        source: err,
                    });
                }
            }
        }
    }

    writer.flush().map_err(ReportError::Flush)?;
    summary.rows = writer.rows_written();
    Ok(summary)
}

/// Run a full report for parsed arguments.
pub fn run(cli: &Cli) -> Result<ReportSummary, ReportError> {
    logging::init(cli.verbose);

    let config = ReportConfig::resolve(&cli.overrides())?;
    let client = AggregationQueryClient::new(&config).map_err(ReportError::Client)?;

    let schema = File::open(&cli.schema_file).map_err(|source| ReportError::OpenSchema {
        path: cli.schema_file.clone(),
        source,
    })?;
    let mut writer = ReportWriter::open(&cli.output).map_err(|source| ReportError::CreateOutput {
        path: cli.output.clone(),
        source,
    })?;

    info!(
        schema = %cli.schema_file.display(),
        output = %cli.output.display(),
        endpoint = client.endpoint(),
        "generating field count report"
    );

    let summary = generate_report(
        &config,
        BufReader::new(schema),
        &cli.schema_name,
        &client,
        &mut writer,
    )?;

    info!(
        rows = summary.rows,
        counted = summary.counted,
        failed = summary.failed,
        unresolved = summary.unresolved,
        skipped = summary.skipped,
        "report complete"
    );
    if summary.failed > 0 {
        warn!(
            failed = summary.failed,
            sentinel = config.failure_sentinel,
            "some fields could not be counted"
        );
    }

    Ok(summary)
}
