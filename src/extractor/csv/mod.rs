//! CSV output writers
//!
//! The pipeline hands every decoded document to an [`ItemWriter`] in arrival
//! order and calls [`finalize`](ItemWriter::finalize) exactly once after a
//! clean completion. A failed run never finalizes: a partial CSV may remain
//! on disk, but no manifest marks it as a complete table.

pub mod mapping;
pub mod raw;

use crate::config::{OutputMode, StrataConfig};
use crate::domain::document::value_at_path;
use crate::domain::Result;
use crate::extractor::state::InputState;
use serde_json::Value;
use std::path::{Path, PathBuf};

pub use mapping::MappingCsvWriter;
pub use raw::RawCsvWriter;

/// Destination for decoded documents
///
/// Implementations own the output file and its manifest. Documents arrive
/// exactly once each, in stream order.
pub trait ItemWriter {
    /// Write a single decoded document.
    fn write_item(&mut self, document: Value) -> Result<()>;

    /// Called once after all items have been written successfully.
    ///
    /// Flushes the CSV, writes the manifest, and removes an empty output
    /// file (no rows means no table).
    fn finalize(&mut self) -> Result<()>;

    /// Compute the state to persist for the next incremental run.
    ///
    /// Returns `None` when no incremental fetching key is configured. With a
    /// key, the value is extracted from the last written row, or the prior
    /// state is carried through when this run wrote nothing.
    fn write_last_state(&mut self, prior_state: &InputState) -> Result<Option<InputState>>;
}

/// Create the writer configured by the output mode.
pub fn create_writer(config: &StrataConfig) -> Result<Box<dyn ItemWriter>> {
    let csv_path = table_path(&config.data_dir, &config.output.table);
    match config.output.mode {
        OutputMode::Raw => Ok(Box::new(RawCsvWriter::new(csv_path, config)?)),
        OutputMode::Mapping => Ok(Box::new(MappingCsvWriter::new(csv_path, config)?)),
    }
}

/// `<data_dir>/out/tables/<table>.csv`
pub fn table_path(data_dir: &str, table: &str) -> PathBuf {
    Path::new(data_dir)
        .join("out")
        .join("tables")
        .join(format!("{table}.csv"))
}

pub(crate) fn next_state(
    incremental_key: Option<&str>,
    last_row: Option<&Value>,
    prior_state: &InputState,
) -> Result<Option<InputState>> {
    let Some(key) = incremental_key else {
        return Ok(None);
    };
    match last_row {
        Some(row) => Ok(Some(InputState {
            last_fetched_row: Some(value_at_path(row, key)?.clone()),
        })),
        None => Ok(Some(prior_state.clone())),
    }
}
