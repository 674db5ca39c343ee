use serde_json::{Map, Value};

use crate::error::{QueryError, Result};

pub mod connection;
pub use connection::*;

pub mod facade;

pub mod pagination;
pub use pagination::*;

#[cfg(test)]
pub mod _tests;

/// One result row: column name to value, in select order.
pub type Record = Map<String, Value>;

/// Runs compiled statements against a database.
///
/// The builder never talks to a driver directly; it hands SQL text and the
/// flattened bindings to an implementation of this trait.
pub trait StatementExecutor: Send + Sync {
    fn query(&self, sql: &str, bindings: &[Value]) -> Result<Vec<Record>>;

    /// The first row of `sql`.
    fn query_map(&self, sql: &str, bindings: &[Value]) -> Result<Record> {
        self.query(sql, bindings)?.into_iter().next().ok_or(QueryError::RecordNotFound)
    }

    /// Runs a write and returns the affected row count.
    fn update(&self, sql: &str, bindings: &[Value]) -> Result<u64>;

    /// Runs an insert and returns the generated value of `key_column`.
    fn insert_get_id(&self, sql: &str, bindings: &[Value], key_column: &str) -> Result<i64>;
}

/// Reads a JSON value the way SQL drivers hand back numbers: integers, floats or numeric strings.
pub(crate) fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok().or_else(|| s.trim().parse::<f64>().ok().map(|f| f as i64)),
        Value::Bool(b) => Some(*b as i64),
        _ => None,
    }
}

pub(crate) fn as_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::String(s) => !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false")),
        other => as_i64(other).is_some_and(|n| n != 0),
    }
}

/// String form of a key column value, used to match rows across queries.
pub(crate) fn key_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// The field a selected column comes back under: the alias, or the last name segment.
pub(crate) fn result_key(column: &str) -> &str {
    let lower = column.to_ascii_lowercase();
    if let Some(position) = lower.rfind(" as ") {
        return column[position + 4..].trim();
    }
    column.rsplit('.').next().unwrap_or(column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(as_i64(&json!(3)), Some(3));
        assert_eq!(as_i64(&json!("42")), Some(42));
        assert_eq!(as_i64(&json!(2.0)), Some(2));
        assert_eq!(as_i64(&json!(null)), None);
        assert!(as_bool(&json!(1)));
        assert!(!as_bool(&json!("0")));
        assert!(as_bool(&json!(true)));
    }

    #[test]
    fn test_key_string_ignores_json_type() {
        assert_eq!(key_string(&json!(1)), Some("1".to_string()));
        assert_eq!(key_string(&json!("1")), Some("1".to_string()));
        assert_eq!(key_string(&json!(null)), None);
    }

    #[test]
    fn test_result_key() {
        assert_eq!(result_key("users.name"), "name");
        assert_eq!(result_key("name"), "name");
        assert_eq!(result_key("users.id as user_id"), "user_id");
        assert_eq!(result_key("id AS Key"), "Key");
    }
}
