use serde::{Deserialize, Serialize};

/// Conventions shared by every builder created from one [`crate::Connection`].
///
/// - `primary_key` is the column used by `find`, `delete_by_id` and `chunk_by_id`.
/// - `page_size` is the default window for pagination helpers.
/// - `chunk_size` is the default window for `each`/`each_by_id`.
/// - `created_column`/`updated_column` back `latest`, `oldest` and repository timestamps.
/// - `pivot_key` is the field that many-to-many loading attaches pivot rows under.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub primary_key: String,
    pub page_size: u64,
    pub chunk_size: u64,
    pub created_column: String,
    pub updated_column: String,
    pub pivot_key: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            primary_key: "id".to_string(),
            page_size: 15,
            chunk_size: 1000,
            created_column: "created_at".to_string(),
            updated_column: "updated_at".to_string(),
            pivot_key: "pivot_table".to_string(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default configuration keyed on a different primary key column.
    pub fn with_primary_key(primary_key: &str) -> Self {
        Self {
            primary_key: primary_key.to_string(),
            ..Self::default()
        }
    }

    pub fn page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn timestamps(mut self, created_column: &str, updated_column: &str) -> Self {
        self.created_column = created_column.to_string();
        self.updated_column = updated_column.to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::Config;

    #[test]
    fn test_defaults() {
        let config = Config::new();
        assert_eq!(config.primary_key, "id");
        assert_eq!(config.page_size, 15);
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.pivot_key, "pivot_table");
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let config: Config = serde_json::from_value(serde_json::json!({ "primary_key": "uid", "page_size": 50 })).unwrap();
        assert_eq!(config.primary_key, "uid");
        assert_eq!(config.page_size, 50);
        assert_eq!(config.created_column, "created_at");
    }

    #[test]
    fn test_sizes_never_zero() {
        let config = Config::with_primary_key("code").page_size(0).chunk_size(0);
        assert_eq!(config.primary_key, "code");
        assert_eq!(config.page_size, 1);
        assert_eq!(config.chunk_size, 1);
    }
}
