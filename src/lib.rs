// Strata - Streaming Document Store Extractor
// Copyright (c) 2026 Strata Contributors
// Licensed under the MIT License

//! # Strata - Streaming Document Store Extractor
//!
//! Strata exports documents from a Cosmos DB container into CSV tables. The
//! extraction runs as two cooperating processes: a producer child fetches
//! query pages from the store and streams them out as delimited JSON
//! frames, while the consumer parent decodes the stream and writes rows as
//! they arrive, so output begins before the query finishes.
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`extractor`] - Consumer side: process supervision, stream decoding,
//!   query construction, CSV output, resume state
//! - [`producer`] - Producer side: store client, paged fetching with
//!   retries, the outgoing data channel
//! - [`domain`] - Error taxonomy and document helpers
//! - [`config`] - Configuration loading and validation
//! - [`logging`] - Structured logging for both process roles
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use strata::config::load_config;
//! use strata::extractor::Extractor;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("strata.toml")?;
//!     let runtime = tokio::runtime::Builder::new_current_thread()
//!         .enable_all()
//!         .build()?;
//!     let written = runtime.block_on(Extractor::new(config).extract())?;
//!     println!("wrote {written} documents");
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod domain;
pub mod extractor;
pub mod logging;
pub mod producer;

pub use domain::{Result, StrataError};
