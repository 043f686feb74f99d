//! CSV output of `(field, count)` rows.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub const HEADER: [&str; 2] = ["Field", "Count"];

/// One report line, written in discovery order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    #[serde(rename = "Field")]
    pub field: String,
    #[serde(rename = "Count")]
    pub count: i64,
}

/// Sequential CSV writer. The underlying csv writer flushes when dropped,
/// so rows written before an early return still reach the file.
pub struct ReportWriter<W: Write> {
    inner: csv::Writer<W>,
    rows: usize,
}

impl ReportWriter<File> {
    /// Create (or truncate) the report file.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        Ok(Self::new(File::create(path)?))
    }
}

impl<W: Write> ReportWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(writer),
            rows: 0,
        }
    }

    pub fn write_header(&mut self) -> csv::Result<()> {
        self.inner.write_record(HEADER)
    }

    pub fn write_row(&mut self, field: &str, count: i64) -> csv::Result<()> {
        self.inner
            .write_record([field, count.to_string().as_str()])?;
        self.rows += 1;
        Ok(())
    }

    /// Data rows written so far, header excluded.
    pub fn rows_written(&self) -> usize {
        self.rows
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(self) -> std::io::Result<W> {
        self.inner.into_inner().map_err(|e| e.into_error())
    }
}

/// Read a report back, header included.
pub fn read_report<R: std::io::Read>(reader: R) -> csv::Result<Vec<ReportRow>> {
    let mut reader = csv::Reader::from_reader(reader);
    reader.deserialize().collect()
}
