//! Configuration management
//!
//! TOML configuration with `${VAR}` environment substitution and validation.

pub mod loader;
pub mod schema;
pub mod secret;

pub use loader::load_config;
pub use schema::{
    DbConfig, MappingColumn, OutputConfig, OutputMode, SourceConfig, StrataConfig,
    DEFAULT_IGNORED_KEYS, DEFAULT_MAX_TRIES, DEFAULT_PAGE_SIZE,
};
pub use secret::{SecretString, SecretValue};
