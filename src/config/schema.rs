//! Configuration schema
//!
//! The configuration is a TOML file with three sections: `[db]` (connection
//! parameters), `[source]` (container and query parameters) and `[output]`
//! (destination table and write mode). Validation enforces the same
//! exclusivity rules the declarative query builder depends on: a raw
//! `query` cannot be combined with the declarative parameters, and an
//! incremental fetching key cannot be combined with `select` or `sort`
//! (the generated projection must include the key, and ordering is owned
//! by the key).

use crate::config::secret::SecretString;
use crate::domain::{Result, StrataError};
use serde::Deserialize;

/// Default retry budget for a single page fetch.
pub const DEFAULT_MAX_TRIES: u32 = 5;

/// Default page size requested from the store.
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// Store-generated metadata keys removed from documents by default.
pub const DEFAULT_IGNORED_KEYS: [&str; 5] = ["_rid", "_self", "_etag", "_attachments", "_ts"];

/// Top-level Strata configuration
#[derive(Debug, Deserialize)]
pub struct StrataConfig {
    /// Working directory: state files are read from `<data_dir>/in/` and
    /// tables written to `<data_dir>/out/tables/`
    pub data_dir: String,

    /// Connection parameters
    pub db: DbConfig,

    /// Container and query parameters
    pub source: SourceConfig,

    /// Destination table and write mode
    pub output: OutputConfig,
}

/// Connection parameters for the document store
#[derive(Debug, Deserialize)]
pub struct DbConfig {
    /// Account endpoint URL
    pub endpoint: String,

    /// Account master key
    pub key: SecretString,

    /// Database id
    pub database_id: String,
}

/// Container and query parameters
#[derive(Debug, Deserialize)]
pub struct SourceConfig {
    /// Container to query
    pub container_id: String,

    /// Raw SQL query; mutually exclusive with the declarative parameters
    pub query: Option<String>,

    /// SELECT clause of the generated query (defaults to `*`)
    pub select: Option<String>,

    /// FROM clause of the generated query (defaults to `c`)
    pub from: Option<String>,

    /// ORDER BY clause of the generated query
    pub sort: Option<String>,

    /// LIMIT clause of the generated query
    pub limit: Option<u64>,

    /// Field path used for incremental fetching
    pub incremental_fetching_key: Option<String>,

    /// Total attempt budget for one page fetch
    #[serde(default = "default_max_tries")]
    pub max_tries: u32,

    /// Maximum number of documents requested per page
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

/// Destination table parameters
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Output table name (without the `.csv` suffix)
    pub table: String,

    /// Write mode
    #[serde(default)]
    pub mode: OutputMode,

    /// Path-to-column projection; required in mapping mode
    #[serde(default)]
    pub mapping: Vec<MappingColumn>,

    /// Whether the destination table is loaded incrementally
    #[serde(default)]
    pub incremental: bool,

    /// Top-level keys removed from every document before writing
    #[serde(default = "default_ignored_keys")]
    pub ignored_keys: Vec<String>,
}

/// How documents are projected into CSV columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Two columns: `id` and the full document as JSON in `data`
    #[default]
    Raw,
    /// One column per configured mapping entry
    Mapping,
}

/// One column of the mapping-mode projection
#[derive(Debug, Clone, Deserialize)]
pub struct MappingColumn {
    /// Dot-separated field path in the document
    pub path: String,
    /// Destination CSV column name
    pub column: String,
}

fn default_max_tries() -> u32 {
    DEFAULT_MAX_TRIES
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_ignored_keys() -> Vec<String> {
    DEFAULT_IGNORED_KEYS.iter().map(|k| k.to_string()).collect()
}

impl StrataConfig {
    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the first violated rule.
    pub fn validate(&self) -> Result<()> {
        if self.db.endpoint.trim().is_empty() {
            return Err(StrataError::Configuration(
                "\"db.endpoint\" cannot be empty.".to_string(),
            ));
        }
        if secrecy::ExposeSecret::expose_secret(&self.db.key).is_empty() {
            return Err(StrataError::Configuration(
                "\"db.key\" cannot be empty.".to_string(),
            ));
        }
        if self.db.database_id.trim().is_empty() {
            return Err(StrataError::Configuration(
                "\"db.database_id\" cannot be empty.".to_string(),
            ));
        }
        if self.source.container_id.trim().is_empty() {
            return Err(StrataError::Configuration(
                "\"source.container_id\" cannot be empty.".to_string(),
            ));
        }
        if self.output.table.trim().is_empty() {
            return Err(StrataError::Configuration(
                "\"output.table\" cannot be empty.".to_string(),
            ));
        }
        if self.source.max_tries < 1 {
            return Err(StrataError::Configuration(
                "\"source.max_tries\" must be at least 1.".to_string(),
            ));
        }

        if self.source.query.is_some() {
            let incompatible: &[(&str, bool)] = &[
                ("select", self.source.select.is_some()),
                ("from", self.source.from.is_some()),
                ("sort", self.source.sort.is_some()),
                ("limit", self.source.limit.is_some()),
                (
                    "incremental_fetching_key",
                    self.source.incremental_fetching_key.is_some(),
                ),
            ];
            for (name, set) in incompatible {
                if *set {
                    return Err(StrataError::Configuration(format!(
                        "Invalid configuration, \"{name}\" cannot be combined with a custom \"query\"."
                    )));
                }
            }
        }

        if self.source.incremental_fetching_key.is_some() {
            if self.source.select.is_some() {
                return Err(StrataError::Configuration(
                    "Invalid configuration, \"select\" cannot be combined with \
                     \"incremental_fetching_key\"."
                        .to_string(),
                ));
            }
            if self.source.sort.is_some() {
                return Err(StrataError::Configuration(
                    "Invalid configuration, \"sort\" cannot be combined with \
                     \"incremental_fetching_key\"."
                        .to_string(),
                ));
            }
        }

        match self.output.mode {
            OutputMode::Raw => {
                if !self.output.mapping.is_empty() {
                    return Err(StrataError::Configuration(
                        "Invalid configuration, \"mapping\" is configured, but mode is set to \
                         \"raw\"."
                            .to_string(),
                    ));
                }
            }
            OutputMode::Mapping => {
                if self.output.mapping.is_empty() {
                    return Err(StrataError::Configuration(
                        "Invalid configuration, missing \"mapping\" key, mode is set to \
                         \"mapping\"."
                            .to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> String {
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
        "#
        .to_string()
    }

    fn parse(extra: &str) -> StrataConfig {
        let toml = minimal_toml() + extra;
        toml::from_str(&toml).unwrap()
    }

    #[test]
    fn test_minimal_config_is_valid() {
        let config = parse("");
        config.validate().unwrap();
        assert_eq!(config.source.max_tries, DEFAULT_MAX_TRIES);
        assert_eq!(config.source.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.output.mode, OutputMode::Raw);
        assert!(!config.output.incremental);
        assert_eq!(config.output.ignored_keys.len(), 5);
    }

    #[test]
    fn test_query_excludes_declarative_params() {
        let mut config = parse("");
        config.source.query = Some("SELECT * FROM c".to_string());
        config.source.limit = Some(10);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("\"limit\""));
    }

    #[test]
    fn test_incremental_key_excludes_select() {
        let mut config = parse("");
        config.source.incremental_fetching_key = Some("id".to_string());
        config.source.select = Some("c.id".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("\"select\""));
    }

    #[test]
    fn test_raw_mode_rejects_mapping() {
        let config = parse(
            r#"
            [[output.mapping]]
            path = "id"
            column = "id"
            "#,
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("mode is set to \"raw\""));
    }

    #[test]
    fn test_mapping_mode_requires_mapping() {
        let mut config = parse("");
        config.output.mode = OutputMode::Mapping;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("missing \"mapping\""));
    }

    #[test]
    fn test_mapping_mode_with_mapping_is_valid() {
        let mut config = parse(
            r#"
            [[output.mapping]]
            path = "user.name"
            column = "name"
            "#,
        );
        config.output.mode = OutputMode::Mapping;
        config.validate().unwrap();
    }

    #[test]
    fn test_zero_max_tries_rejected() {
        let mut config = parse("");
        config.source.max_tries = 0;
        assert!(config.validate().is_err());
    }
}
