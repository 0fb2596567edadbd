//! Producer role
//!
//! The producer is this same binary re-invoked as a child process. It reads
//! its whole configuration from environment variables set by the consumer,
//! fetches documents from the store, and emits them as delimited frames on
//! the data channel. Its exit code is the contract with the supervisor:
//! 0 for success, 1 for a user-actionable failure, 2 for anything else.

pub mod channel;
pub mod fetcher;
pub mod retry;
pub mod store;

use crate::config::{DEFAULT_MAX_TRIES, DEFAULT_PAGE_SIZE};
use crate::domain::{Result, StrataError};
use crate::extractor::codec::DEFAULT_DELIMITER;
use channel::open_data_channel;
use fetcher::{Fetcher, FrameWriter};
use retry::RetryPolicy;
use secrecy::Secret;
use store::{CosmosRestStore, DocumentStore, StoreSettings};

/// Environment variable names making up the producer's configuration
pub mod env {
    pub const ENDPOINT: &str = "ENDPOINT";
    pub const KEY: &str = "KEY";
    pub const DATABASE_ID: &str = "DATABASE_ID";
    pub const CONTAINER_ID: &str = "CONTAINER_ID";
    pub const QUERY: &str = "QUERY";
    pub const MAX_TRIES: &str = "MAX_TRIES";
    pub const PAGE_SIZE: &str = "PAGE_SIZE";
    pub const DELIMITER: &str = "JSON_STREAM_DELIMITER";
}

/// Execute the configured query and stream every document out.
/// Returns the number of documents emitted.
pub async fn run() -> Result<u64> {
    let query = required(env::QUERY)?;
    let max_tries = parse_u32(env::MAX_TRIES, optional(env::MAX_TRIES), DEFAULT_MAX_TRIES)?;
    let delimiter = optional(env::DELIMITER).unwrap_or_else(|| DEFAULT_DELIMITER.to_string());

    let store = CosmosRestStore::new(store_settings()?)?;
    let channel = open_data_channel()?;
    let writer = FrameWriter::new(channel, delimiter);

    Fetcher::new(store, RetryPolicy::new(max_tries))
        .run(&query, writer)
        .await
}

/// Verify that the store is reachable with the configured credentials.
pub async fn probe() -> Result<()> {
    let store = CosmosRestStore::new(store_settings()?)?;
    store.connect().await?;
    Ok(())
}

fn store_settings() -> Result<StoreSettings> {
    Ok(StoreSettings {
        endpoint: required(env::ENDPOINT)?,
        key: Secret::new(required(env::KEY)?),
        database_id: required(env::DATABASE_ID)?,
        container_id: required(env::CONTAINER_ID)?,
        page_size: parse_u32(env::PAGE_SIZE, optional(env::PAGE_SIZE), DEFAULT_PAGE_SIZE)?,
    })
}

// The consumer always sets these; a missing one is a supervision bug,
// not something the operator can fix.
fn required(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| {
        StrataError::Internal(format!(
            "Missing required environment variable {name} for the producer"
        ))
    })
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_u32(name: &str, raw: Option<String>, default: u32) -> Result<u32> {
    match raw {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| {
            StrataError::Configuration(format!(
                "Environment variable {name} must be a positive integer, got {raw:?}"
            ))
        }),
    }
}
