//! Grouped count queries against the search backend.
//!
//! For each field we post a grouping query asking for zero hits and one
//! `count()` per distinct value of the field, then sum the counts of the
//! buckets found under `root.children[0].children[0].children`.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::ReportConfig;

/// Maximum number of body bytes kept in a status error.
const ERROR_BODY_LIMIT: usize = 512;

/// Errors from a single field query. None of these abort a report on their
/// own; the caller decides whether to continue.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("request to search backend failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("search backend returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("could not decode search response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("search backend reported error {code}: {message}")]
    Backend { code: i64, message: String },

    #[error("grouping result has no entries at {path}")]
    Extraction { path: &'static str },
}

impl QueryError {
    /// Short machine-friendly label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Status { .. } => "status",
            Self::Decode(_) => "decode",
            Self::Backend { .. } => "backend",
            Self::Extraction { .. } => "extraction",
        }
    }
}

// ============================================================================
// Response tree
// ============================================================================

/// Top-level search response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub timing: Option<Timing>,
    #[serde(default)]
    pub root: ResultRoot,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    #[serde(default, rename = "querytime")]
    pub query_time: f64,
    #[serde(default, rename = "summaryfetchtime")]
    pub summary_fetch_time: f64,
    #[serde(default, rename = "searchtime")]
    pub search_time: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultRoot {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub relevance: f64,
    #[serde(default)]
    pub fields: RootFields,
    #[serde(default)]
    pub coverage: Option<Coverage>,
    #[serde(default)]
    pub errors: Vec<BackendMessage>,
    #[serde(default)]
    pub children: Vec<GroupNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RootFields {
    #[serde(default, rename = "totalCount")]
    pub total_count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Coverage {
    #[serde(default)]
    pub coverage: i64,
    #[serde(default)]
    pub documents: i64,
    #[serde(default)]
    pub full: bool,
    #[serde(default)]
    pub nodes: i64,
    #[serde(default)]
    pub results: i64,
    #[serde(default, rename = "resultsFull")]
    pub results_full: i64,
}

/// An error entry in `root.errors`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendMessage {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub message: String,
}

/// One node of the grouping hierarchy: a group list, a group, or a bucket.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupNode {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub relevance: f64,
    #[serde(default)]
    pub label: Option<String>,
    /// Group value; strings for string fields, numbers for numeric ones.
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub fields: GroupFields,
    #[serde(default)]
    pub children: Vec<GroupNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupFields {
    #[serde(default, rename = "count()")]
    pub count: i64,
}

impl QueryResponse {
    /// First error reported by the backend, if any.
    pub fn first_error(&self) -> Option<&BackendMessage> {
        self.root.errors.first()
    }

    /// Sum the bucket counts one level below the first group.
    pub fn aggregate_count(&self) -> Result<i64, QueryError> {
        let group_list = self.root.children.first().ok_or(QueryError::Extraction {
            path: "root.children",
        })?;
        let group = group_list
            .children
            .first()
            .ok_or(QueryError::Extraction {
                path: "root.children[0].children",
            })?;
        Ok(group
            .children
            .iter()
            .fold(0i64, |acc, bucket| acc.saturating_add(bucket.fields.count)))
    }
}

impl From<&BackendMessage> for QueryError {
    fn from(msg: &BackendMessage) -> Self {
        let message = if msg.message.is_empty() {
            msg.summary.clone()
        } else {
            msg.message.clone()
        };
        QueryError::Backend {
            code: msg.code,
            message,
        }
    }
}

/// Decode a response body and extract the aggregate count.
pub fn extract_count(body: &str) -> Result<i64, QueryError> {
    let response: QueryResponse = serde_json::from_str(body)?;
    if let Some(err) = response.first_error() {
        return Err(err.into());
    }
    response.aggregate_count()
}

// ============================================================================
// Query construction
// ============================================================================

/// Fill the query template for one schema and field.
///
/// Placeholders are substituted in a single pass over the template, so a
/// schema or field name containing `{field}` or `{schema}` is inserted as is.
pub fn build_query(template: &str, schema: &str, field: &str) -> String {
    let mut out = String::with_capacity(template.len() + schema.len() + field.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix("{schema}") {
            out.push_str(schema);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{field}") {
            out.push_str(field);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

/// JSON request body for the search endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest<'a> {
    pub hits: u32,
    pub yql: &'a str,
}

// ============================================================================
// Client
// ============================================================================

/// Blocking client bound to one endpoint and query dialect.
#[derive(Debug, Clone)]
pub struct AggregationQueryClient {
    client: Client,
    endpoint: String,
    query_template: String,
    hits: u32,
}

impl AggregationQueryClient {
    pub fn new(config: &ReportConfig) -> Result<Self, QueryError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.timeout().min(Duration::from_secs(5)))
            .user_agent(concat!("field-counts/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            query_template: config.query_template.clone(),
            hits: config.hits,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn query_for(&self, schema: &str, field: &str) -> String {
        build_query(&self.query_template, schema, field)
    }

    /// Number of documents grouped under `field` in `schema`.
    pub fn count(&self, schema: &str, field: &str) -> Result<i64, QueryError> {
        let yql = self.query_for(schema, field);
        debug!(endpoint = %self.endpoint, %yql, "posting grouping query");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&SearchRequest {
                hits: self.hits,
                yql: &yql,
            })
            .send()?;

        let status = response.status();
        let body = response.text()?;

        if !status.is_success() {
            // Backends usually describe rejected queries in `root.errors`.
            if let Ok(decoded) = serde_json::from_str::<QueryResponse>(&body)
                && let Some(err) = decoded.first_error()
            {
                return Err(err.into());
            }
            return Err(QueryError::Status {
                status,
                body: truncate(&body, ERROR_BODY_LIMIT),
            });
        }

        let count = extract_count(&body)?;
        debug!(field, count, "grouping query resolved");
        Ok(count)
    }
}

fn truncate(body: &str, limit: usize) -> String {
    if body.len() <= limit {
        return body.to_string();
    }
    let mut end = limit;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
