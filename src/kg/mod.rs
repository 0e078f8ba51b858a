//! Knowledge-base boundary.
//!
//! Formatting of schema-side context for the retrieval prompt, formatting
//! of result rows as evidence for the generation prompt, and the
//! executors that run generated queries.

pub mod executor;
pub mod format;

use std::path::Path;

use serde_json::{Map, Value};

use crate::error::KgError;

pub use executor::{
    Neo4jConfig, Neo4jHttpExecutor, QueryExecutor, RowsFileExecutor, parse_rows,
    rows_from_response,
};
pub use format::{FOCUS_KEYS, format_evidence, format_value_dict};

/// One result row: column name → value, in column order.
pub type Row = Map<String, Value>;

/// Reads a value dictionary (a JSON object keyed by dotted property path).
///
/// # Errors
///
/// Returns [`KgError::Io`] if the file cannot be read, or
/// [`KgError::InvalidRows`] if it is not a JSON object.
pub fn load_value_dict(path: &Path) -> Result<Map<String, Value>, KgError> {
    let text = std::fs::read_to_string(path).map_err(|source| KgError::Io {
        path: path.display().to_string(),
        source,
    })?;
    match serde_json::from_str(&text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(KgError::InvalidRows(format!(
            "{}: value dictionary must be a JSON object",
            path.display()
        ))),
        Err(e) => Err(KgError::InvalidRows(format!("{}: {e}", path.display()))),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_load_value_dict() {
        let dir = TempDir::new().unwrap_or_else(|_| unreachable!());
        let path = dir.path().join("values.json");
        std::fs::write(&path, r#"{"component.chemistry": {"type": "str"}}"#)
            .unwrap_or_else(|_| unreachable!());
        let dict = load_value_dict(&path).unwrap_or_else(|_| unreachable!());
        assert!(dict.contains_key("component.chemistry"));

        std::fs::write(&path, "[]").unwrap_or_else(|_| unreachable!());
        assert!(matches!(load_value_dict(&path), Err(KgError::InvalidRows(_))));
    }
}
