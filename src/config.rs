//! Runtime configuration for a report run.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! environment variables, then command-line flags. The resolved
//! [`ReportConfig`] is immutable and handed by reference to the scanner and
//! the query client.
//!
//! # Example Configuration
//!
//! ```toml
//! endpoint = "http://search.internal:8080/search"
//! timeout_secs = 30
//! query_template = "select * from {schema} where true | all( group({field}) each(output(count())))"
//! fail_fast = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Environment variable naming a TOML config file.
pub const CONFIG_PATH_ENV: &str = "FIELD_COUNTS_CONFIG";
/// Environment variable overriding the search endpoint.
pub const ENDPOINT_ENV: &str = "FIELD_COUNTS_ENDPOINT";
/// Environment variable overriding the request timeout, in seconds.
pub const TIMEOUT_ENV: &str = "FIELD_COUNTS_TIMEOUT_SECS";

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8080/search";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MARKER: &str = "attribute";
pub const DEFAULT_FIELD_TOKEN: &str = "field";
pub const DEFAULT_QUERY_TEMPLATE: &str =
    "select * from {schema} where true | all( group({field}) each(output(count())))";
pub const DEFAULT_FAILURE_SENTINEL: i64 = -1;

/// Errors that can occur when loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    /// Search endpoint receiving the grouping query.
    pub endpoint: String,
    /// Upper bound on a single request, connect through body.
    pub timeout_secs: u64,
    /// Substring marking a line as an attribute line.
    pub marker: String,
    /// Token introducing a field name on the declaration line.
    pub field_token: String,
    /// YQL template with `{schema}` and `{field}` placeholders.
    pub query_template: String,
    /// Number of hits requested alongside the grouping result.
    pub hits: u32,
    /// Count written for fields that could not be resolved.
    pub failure_sentinel: i64,
    /// Write a row for marker lines with a blank preceding line instead of
    /// skipping them.
    pub report_blank_declarations: bool,
    /// Abort the run on the first failed field query.
    pub fail_fast: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            marker: DEFAULT_MARKER.to_string(),
            field_token: DEFAULT_FIELD_TOKEN.to_string(),
            query_template: DEFAULT_QUERY_TEMPLATE.to_string(),
            hits: 0,
            failure_sentinel: DEFAULT_FAILURE_SENTINEL,
            report_blank_declarations: false,
            fail_fast: false,
        }
    }
}

/// Command-line values that take precedence over every other layer.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub endpoint: Option<String>,
    pub timeout_secs: Option<u64>,
    pub fail_fast: bool,
}

impl ReportConfig {
    /// Load configuration from a specific TOML file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the full layering for a run.
    pub fn resolve(overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let file = overrides
            .config_path
            .clone()
            .or_else(|| dotenvy::var(CONFIG_PATH_ENV).ok().map(PathBuf::from));

        let mut config = match file {
            Some(path) => Self::load_from(&path)?,
            None => Self::default(),
        };

        config.apply_env()?;

        if let Some(endpoint) = &overrides.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(secs) = overrides.timeout_secs {
            config.timeout_secs = secs;
        }
        if overrides.fail_fast {
            config.fail_fast = true;
        }

        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(endpoint) = dotenvy::var(ENDPOINT_ENV) {
            self.endpoint = endpoint;
        }
        if let Ok(raw) = dotenvy::var(TIMEOUT_ENV) {
            self.timeout_secs = raw.trim().parse().map_err(|_| {
                ConfigError::Validation(format!("{TIMEOUT_ENV} must be an integer, got '{raw}'"))
            })?;
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.endpoint).map_err(|e| {
            ConfigError::Validation(format!("Invalid endpoint '{}': {e}", self.endpoint))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation(format!(
                "Endpoint must use http or https, got '{}'",
                url.scheme()
            )));
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "timeout_secs must be greater than zero".into(),
            ));
        }

        if self.marker.is_empty() {
            return Err(ConfigError::Validation("marker cannot be empty".into()));
        }

        if self.field_token.trim().is_empty() || self.field_token.contains(char::is_whitespace) {
            return Err(ConfigError::Validation(
                "field_token must be a single non-empty token".into(),
            ));
        }

        for placeholder in ["{schema}", "{field}"] {
            if !self.query_template.contains(placeholder) {
                return Err(ConfigError::Validation(format!(
                    "query_template is missing the {placeholder} placeholder"
                )));
            }
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
