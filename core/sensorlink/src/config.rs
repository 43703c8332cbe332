//! Strict, typed access to raw configuration maps.
//!
//! Configuration is consumed as a [`toml::Table`]. Validation is strict:
//! a missing or mistyped required key fails fast with an error naming the
//! offending key, and nothing partial is ever applied.

use thiserror::Error;

/// A structural configuration error. Always fatal for the operation
/// (configuration or assembly) that detected it.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("missing required key '{path}'")]
    MissingKey { path: String },
    #[error("unexpected type for '{path}': expected {expected}, got {actual}")]
    BadType {
        path: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("invalid value for '{path}': {reason}")]
    InvalidValue { path: String, reason: String },
}

impl ConfigurationError {
    pub fn bad_type(path: String, expected: &'static str, actual: &toml::Value) -> Self {
        Self::BadType {
            path,
            expected,
            actual: actual.type_str(),
        }
    }

    /// The full path of the offending key.
    pub fn path(&self) -> &str {
        match self {
            ConfigurationError::MissingKey { path } => path,
            ConfigurationError::BadType { path, .. } => path,
            ConfigurationError::InvalidValue { path, .. } => path,
        }
    }
}

fn join_path(scope: &str, key: &str) -> String {
    if scope.is_empty() {
        key.to_owned()
    } else {
        format!("{scope}.{key}")
    }
}

/// Extracts a required string value.
pub fn require_str(table: &toml::Table, key: &str, scope: &str) -> Result<String, ConfigurationError> {
    let value = table.get(key).ok_or_else(|| ConfigurationError::MissingKey {
        path: join_path(scope, key),
    })?;
    value
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| ConfigurationError::bad_type(join_path(scope, key), "string", value))
}

/// Extracts a required integer value.
pub fn require_int(table: &toml::Table, key: &str, scope: &str) -> Result<i64, ConfigurationError> {
    let value = table.get(key).ok_or_else(|| ConfigurationError::MissingKey {
        path: join_path(scope, key),
    })?;
    value
        .as_integer()
        .ok_or_else(|| ConfigurationError::bad_type(join_path(scope, key), "integer", value))
}

/// Extracts a required list of strings.
///
/// Every element must be a string; a scalar value (even a single string)
/// is rejected.
pub fn require_str_array(table: &toml::Table, key: &str, scope: &str) -> Result<Vec<String>, ConfigurationError> {
    let value = table.get(key).ok_or_else(|| ConfigurationError::MissingKey {
        path: join_path(scope, key),
    })?;
    let array = value
        .as_array()
        .ok_or_else(|| ConfigurationError::bad_type(join_path(scope, key), "array of strings", value))?;
    let mut res = Vec::with_capacity(array.len());
    for item in array {
        let s = item
            .as_str()
            .ok_or_else(|| ConfigurationError::bad_type(join_path(scope, key), "array of strings", item))?;
        res.push(s.to_owned());
    }
    Ok(res)
}

/// Extracts a required sub-table.
pub fn require_table<'a>(
    table: &'a toml::Table,
    key: &str,
    scope: &str,
) -> Result<&'a toml::Table, ConfigurationError> {
    let value = table.get(key).ok_or_else(|| ConfigurationError::MissingKey {
        path: join_path(scope, key),
    })?;
    value
        .as_table()
        .ok_or_else(|| ConfigurationError::bad_type(join_path(scope, key), "table", value))
}

/// Extracts an optional sub-table. Present but mistyped is an error.
pub fn optional_table<'a>(
    table: &'a toml::Table,
    key: &str,
    scope: &str,
) -> Result<Option<&'a toml::Table>, ConfigurationError> {
    match table.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_table()
            .map(Some)
            .ok_or_else(|| ConfigurationError::bad_type(join_path(scope, key), "table", value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn table(s: &str) -> toml::Table {
        toml::Table::from_str(s).unwrap()
    }

    #[test]
    fn require_str_ok() {
        let t = table(r#"queue = "q1""#);
        assert_eq!(require_str(&t, "queue", "").unwrap(), "q1");
    }

    #[test]
    fn require_str_missing_names_key() {
        let t = table("");
        let err = require_str(&t, "send_queue", "sensor").unwrap_err();
        assert_eq!(err.path(), "sensor.send_queue");
        assert!(matches!(err, ConfigurationError::MissingKey { .. }));
    }

    #[test]
    fn require_str_bad_type() {
        let t = table("queue = 42");
        let err = require_str(&t, "queue", "").unwrap_err();
        match err {
            ConfigurationError::BadType { path, expected, actual } => {
                assert_eq!(path, "queue");
                assert_eq!(expected, "string");
                assert_eq!(actual, "integer");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn require_str_array_rejects_scalar() {
        let t = table(r#"fields = "a""#);
        let err = require_str_array(&t, "fields", "spouts.s1").unwrap_err();
        assert_eq!(err.path(), "spouts.s1.fields");
    }

    #[test]
    fn require_str_array_rejects_mixed() {
        let t = table("fields = [\"a\", 1]");
        assert!(require_str_array(&t, "fields", "").is_err());
    }

    #[test]
    fn require_str_array_ok() {
        let t = table("fields = [\"a\", \"b\"]");
        assert_eq!(require_str_array(&t, "fields", "").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn optional_table_absent_is_none() {
        let t = table("");
        assert!(optional_table(&t, "properties", "").unwrap().is_none());
    }

    #[test]
    fn optional_table_mistyped_is_error() {
        let t = table("properties = 3");
        assert!(optional_table(&t, "properties", "").is_err());
    }
}
