//! Query executors.
//!
//! The pipeline hands the generated query, unmodified, to a
//! [`QueryExecutor`] and gets back column-ordered rows.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::Row;
use crate::error::KgError;

/// Runs a query against a knowledge base.
pub trait QueryExecutor {
    /// Executes `query` and returns its rows in result order.
    ///
    /// # Errors
    ///
    /// Returns [`KgError`] if the query cannot be run or its rows decoded.
    fn execute(&self, query: &str) -> Result<Vec<Row>, KgError>;
}

/// Connection settings for a Neo4j HTTP endpoint.
#[derive(Clone)]
pub struct Neo4jConfig {
    /// Base URI, e.g. `http://localhost:7474`.
    pub uri: String,
    /// Basic-auth user.
    pub user: String,
    /// Basic-auth password.
    pub password: String,
    /// Database name.
    pub database: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl Neo4jConfig {
    /// Transactional commit endpoint for the configured database.
    #[must_use]
    pub fn commit_url(&self) -> String {
        format!(
            "{}/db/{}/tx/commit",
            self.uri.trim_end_matches('/'),
            self.database
        )
    }
}

impl std::fmt::Debug for Neo4jConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Neo4jConfig")
            .field("uri", &self.uri)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Executes queries through the Neo4j transactional HTTP API.
#[derive(Debug)]
pub struct Neo4jHttpExecutor {
    config: Neo4jConfig,
    client: Client,
}

impl Neo4jHttpExecutor {
    /// Creates an executor.
    ///
    /// # Errors
    ///
    /// Returns [`KgError::Connection`] if the HTTP client cannot be built.
    pub fn new(config: Neo4jConfig) -> Result<Self, KgError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| KgError::Connection(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }
}

impl QueryExecutor for Neo4jHttpExecutor {
    fn execute(&self, query: &str) -> Result<Vec<Row>, KgError> {
        let url = self.config.commit_url();
        info!(url = %url, query_bytes = query.len(), "Executing query");

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.user, Some(&self.config.password))
            .json(&json!({"statements": [{"statement": query}]}))
            .send()
            .map_err(|e| KgError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(KgError::Http {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }

        let body: Value = response
            .json()
            .map_err(|e| KgError::InvalidRows(format!("response is not JSON: {e}")))?;
        let rows = rows_from_response(&body)?;
        debug!(rows = rows.len(), "Query returned");
        Ok(rows)
    }
}

/// Maps a transactional-API response onto rows.
///
/// Only the first statement result is read. A non-empty `errors` array
/// becomes [`KgError::Query`] carrying the first error.
///
/// # Errors
///
/// Returns [`KgError::Query`] for database errors and
/// [`KgError::InvalidRows`] when the result shape is unexpected.
pub fn rows_from_response(body: &Value) -> Result<Vec<Row>, KgError> {
    if let Some(first) = body
        .get("errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first())
    {
        let field = |name: &str| {
            first
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        return Err(KgError::Query {
            code: field("code"),
            message: field("message"),
        });
    }

    let Some(result) = body
        .get("results")
        .and_then(Value::as_array)
        .and_then(|results| results.first())
    else {
        return Ok(Vec::new());
    };

    let columns: Vec<&str> = result
        .get("columns")
        .and_then(Value::as_array)
        .ok_or_else(|| KgError::InvalidRows("result has no columns".to_string()))?
        .iter()
        .map(|c| c.as_str().unwrap_or_default())
        .collect();

    let data = result
        .get("data")
        .and_then(Value::as_array)
        .map_or(&[][..], Vec::as_slice);

    data.iter()
        .map(|entry| {
            let values = entry
                .get("row")
                .and_then(Value::as_array)
                .ok_or_else(|| KgError::InvalidRows("data entry has no row".to_string()))?;
            if values.len() != columns.len() {
                return Err(KgError::InvalidRows(format!(
                    "row has {} values for {} columns",
                    values.len(),
                    columns.len()
                )));
            }
            Ok(columns
                .iter()
                .zip(values)
                .map(|(column, value)| ((*column).to_string(), value.clone()))
                .collect())
        })
        .collect()
}

/// Serves rows from a JSON array file instead of a live database.
///
/// The query is ignored. Useful for offline runs and replaying a previous
/// `kg_results.json`.
#[derive(Debug, Clone)]
pub struct RowsFileExecutor {
    path: PathBuf,
}

impl RowsFileExecutor {
    /// Creates an executor reading `path` on every call.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File the rows are read from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl QueryExecutor for RowsFileExecutor {
    fn execute(&self, query: &str) -> Result<Vec<Row>, KgError> {
        debug!(path = %self.path.display(), query_bytes = query.len(), "Reading rows from file");
        let text = std::fs::read_to_string(&self.path).map_err(|source| KgError::Io {
            path: self.path.display().to_string(),
            source,
        })?;
        parse_rows(&text)
    }
}

/// Parses a JSON array of objects into rows.
///
/// # Errors
///
/// Returns [`KgError::InvalidRows`] if `text` is not an array of objects.
pub fn parse_rows(text: &str) -> Result<Vec<Row>, KgError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| KgError::InvalidRows(e.to_string()))?;
    let Value::Array(items) = value else {
        return Err(KgError::InvalidRows("expected a JSON array".to_string()));
    };
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(row) => Ok(row),
            _ => Err(KgError::InvalidRows(format!("element {i} is not an object"))),
        })
        .collect()
}
