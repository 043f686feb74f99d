//! Attribute field discovery in schema definition files.
//!
//! A field is declared on one line and flagged as an attribute on the next:
//!
//! ```text
//! field customer type string {
//!     indexing: summary | attribute
//! }
//! ```
//!
//! The scanner walks the file once, keeping only the previous line. Whenever
//! the current line contains the marker, the previous line is parsed as the
//! declaration. The field name is the token immediately following the first
//! `field` token, where tokens are maximal runs of non-whitespace characters
//! (spaces, tabs and any other Unicode whitespace separate tokens).
//!
//! Lines are read as raw bytes. Bytes that are not valid UTF-8 are replaced
//! with U+FFFD, so a stray Latin-1 comment does not end the scan.

use std::io::{self, BufRead};

use crate::config::ReportConfig;

/// A declaration reconstructed from a marker line and its predecessor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDeclaration {
    /// Extracted field name; empty when the declaration line has no
    /// `field <name>` pair.
    pub field_name: String,
    /// The declaration line as read, without the line terminator.
    pub raw_line: String,
    /// 1-based line number of the marker line.
    pub marker_line: usize,
}

impl AttributeDeclaration {
    /// Whether a usable field name was found.
    pub fn is_resolved(&self) -> bool {
        !self.field_name.is_empty()
    }

    /// Whether the line before the marker was empty or whitespace only,
    /// including the case of a marker on the first line.
    pub fn is_blank(&self) -> bool {
        self.raw_line.trim().is_empty()
    }
}

/// Extract the field name from a declaration line.
///
/// Returns the token following the first occurrence of `field_token`, or
/// `None` when there is no such token or it is the last one on the line.
pub fn parse_field_name<'a>(line: &'a str, field_token: &str) -> Option<&'a str> {
    let mut tokens = line.split_whitespace();
    tokens.by_ref().find(|t| *t == field_token)?;
    tokens.next()
}

/// Stateless matcher parameterized by marker and field token.
#[derive(Debug, Clone)]
pub struct SchemaScanner {
    marker: String,
    field_token: String,
}

impl SchemaScanner {
    pub fn new(marker: impl Into<String>, field_token: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            field_token: field_token.into(),
        }
    }

    pub fn from_config(config: &ReportConfig) -> Self {
        Self::new(config.marker.clone(), config.field_token.clone())
    }

    pub fn is_marker(&self, line: &str) -> bool {
        line.contains(self.marker.as_str())
    }

    /// Build the declaration for a marker line given its predecessor.
    pub fn declaration(&self, previous: &str, marker_line: usize) -> AttributeDeclaration {
        AttributeDeclaration {
            field_name: parse_field_name(previous, &self.field_token)
                .map(str::to_string)
                .unwrap_or_default(),
            raw_line: previous.to_string(),
            marker_line,
        }
    }

    /// Lazily scan a reader, consuming it once.
    pub fn scan<R: BufRead>(&self, reader: R) -> Declarations<'_, R> {
        Declarations {
            scanner: self,
            reader,
            buf: Vec::new(),
            previous: String::new(),
            line_number: 0,
        }
    }
}

impl Default for SchemaScanner {
    fn default() -> Self {
        Self::from_config(&ReportConfig::default())
    }
}

/// Iterator over the declarations of one schema source.
pub struct Declarations<'s, R> {
    scanner: &'s SchemaScanner,
    reader: R,
    buf: Vec<u8>,
    previous: String,
    line_number: usize,
}

impl<R: BufRead> Declarations<'_, R> {
    /// Next line without its terminator, or `None` at end of input.
    fn next_line(&mut self) -> Option<io::Result<String>> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                if self.buf.last() == Some(&b'\n') {
                    self.buf.pop();
                    if self.buf.last() == Some(&b'\r') {
                        self.buf.pop();
                    }
                }
                Some(Ok(String::from_utf8_lossy(&self.buf).into_owned()))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

impl<R: BufRead> Iterator for Declarations<'_, R> {
    type Item = io::Result<AttributeDeclaration>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let current = match self.next_line()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e)),
            };
            self.line_number += 1;

            let found = self
                .scanner
                .is_marker(&current)
                .then(|| self.scanner.declaration(&self.previous, self.line_number));
            self.previous = current;

            if let Some(declaration) = found {
                return Some(Ok(declaration));
            }
        }
    }
}
