//! Query construction
//!
//! Builds the SQL-like query sent to the store, either from a raw `query`
//! string or generated from the declarative `select`/`from`/`sort`/`limit`
//! parameters. Incremental runs resume from the stored `lastFetchedRow`
//! value with a `>=` predicate, so the boundary row is read again rather
//! than risking a gap.

use crate::config::{SourceConfig, StrataConfig};
use crate::extractor::state::InputState;
use serde_json::Value;

/// Builds the query for one extraction run
pub struct QueryFactory<'a> {
    source: &'a SourceConfig,
    input_state: &'a InputState,
}

impl<'a> QueryFactory<'a> {
    pub fn new(config: &'a StrataConfig, input_state: &'a InputState) -> Self {
        Self {
            source: &config.source,
            input_state,
        }
    }

    /// The query to execute: the configured raw query, or a generated one.
    pub fn create(&self) -> String {
        match &self.source.query {
            Some(query) => query.clone(),
            None => self.generate(),
        }
    }

    fn generate(&self) -> String {
        let mut sql = Vec::new();
        sql.push(format!("SELECT {}", self.select_clause()));
        sql.push(format!("FROM {}", self.from_clause()));

        if let Some(key) = &self.source.incremental_fetching_key {
            // The key is a document field path; qualify it with the FROM
            // alias for the SQL side.
            let qualified = format!("{}.{key}", self.from_alias());
            if let Some(last_fetched_row) = &self.input_state.last_fetched_row {
                sql.push(format!(
                    "WHERE {qualified} >= {}",
                    Self::literal(last_fetched_row)
                ));
            }
            sql.push(format!("ORDER BY {qualified}"));
        } else if let Some(sort) = &self.source.sort {
            sql.push(format!("ORDER BY {sort}"));
        }

        if let Some(limit) = self.source.limit {
            sql.push(format!("OFFSET 0 LIMIT {limit}"));
        }

        sql.join(" ")
    }

    fn select_clause(&self) -> &str {
        self.source.select.as_deref().unwrap_or("*")
    }

    fn from_clause(&self) -> &str {
        self.source.from.as_deref().unwrap_or("c")
    }

    fn from_alias(&self) -> &str {
        self.from_clause().split_whitespace().last().unwrap_or("c")
    }

    // String values are quoted, everything else is rendered as JSON.
    fn literal(value: &Value) -> String {
        match value {
            Value::String(s) => format!("\"{s}\""),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrataConfig;
    use serde_json::json;

    fn config() -> StrataConfig {
        toml::from_str(
            r#"
            data_dir = "/data"

            [db]
            endpoint = "https://account.documents.example.com:443/"
            key = "c2VjcmV0"
            database_id = "db"

            [source]
            container_id = "users"

            [output]
            table = "users"
            "#,
        )
        .unwrap()
    }

    fn empty_state() -> InputState {
        InputState::default()
    }

    #[test]
    fn test_default_query() {
        let config = config();
        let state = empty_state();
        assert_eq!(QueryFactory::new(&config, &state).create(), "SELECT * FROM c");
    }

    #[test]
    fn test_custom_query_wins() {
        let mut config = config();
        config.source.query = Some("SELECT c.id FROM c WHERE c.x > 1".to_string());
        let state = empty_state();
        assert_eq!(
            QueryFactory::new(&config, &state).create(),
            "SELECT c.id FROM c WHERE c.x > 1"
        );
    }

    #[test]
    fn test_declarative_parameters() {
        let mut config = config();
        config.source.select = Some("c.id, c.name".to_string());
        config.source.from = Some("users u".to_string());
        config.source.sort = Some("u.name".to_string());
        config.source.limit = Some(100);
        let state = empty_state();
        assert_eq!(
            QueryFactory::new(&config, &state).create(),
            "SELECT c.id, c.name FROM users u ORDER BY u.name OFFSET 0 LIMIT 100"
        );
    }

    #[test]
    fn test_incremental_first_run_only_orders() {
        let mut config = config();
        config.source.incremental_fetching_key = Some("ts".to_string());
        let state = empty_state();
        assert_eq!(
            QueryFactory::new(&config, &state).create(),
            "SELECT * FROM c ORDER BY c.ts"
        );
    }

    #[test]
    fn test_incremental_resume_with_numeric_value() {
        let mut config = config();
        config.source.incremental_fetching_key = Some("ts".to_string());
        let state = InputState {
            last_fetched_row: Some(json!(12345)),
        };
        assert_eq!(
            QueryFactory::new(&config, &state).create(),
            "SELECT * FROM c WHERE c.ts >= 12345 ORDER BY c.ts"
        );
    }

    #[test]
    fn test_incremental_resume_with_string_value_is_quoted() {
        let mut config = config();
        config.source.incremental_fetching_key = Some("id".to_string());
        let state = InputState {
            last_fetched_row: Some(json!("abc")),
        };
        assert_eq!(
            QueryFactory::new(&config, &state).create(),
            "SELECT * FROM c WHERE c.id >= \"abc\" ORDER BY c.id"
        );
    }

    #[test]
    fn test_incremental_key_uses_from_alias() {
        let mut config = config();
        config.source.from = Some("users u".to_string());
        config.source.incremental_fetching_key = Some("created.at".to_string());
        let state = empty_state();
        assert_eq!(
            QueryFactory::new(&config, &state).create(),
            "SELECT * FROM users u ORDER BY u.created.at"
        );
    }
}
