//! Raw CSV writer
//!
//! Two columns: the document `id` and the whole document serialized as JSON
//! in `data`. Ignored keys are stripped before serialization.

use crate::config::StrataConfig;
use crate::domain::document::strip_ignored_keys;
use crate::domain::{Result, StrataError};
use crate::extractor::csv::{next_state, ItemWriter};
use crate::extractor::state::InputState;
use serde_json::Value;
use std::fs;
use std::fs::File;
use std::path::PathBuf;

const ITEM_ID_KEY: &str = "id";
const ID_COLUMN: &str = "id";
const DATA_COLUMN: &str = "data";

pub struct RawCsvWriter {
    csv_path: PathBuf,
    writer: csv::Writer<File>,
    rows: u64,
    last_row: Option<Value>,
    ignored_keys: Vec<String>,
    select_configured: bool,
    incremental: bool,
    incremental_key: Option<String>,
}

impl RawCsvWriter {
    pub fn new(csv_path: PathBuf, config: &StrataConfig) -> Result<Self> {
        if let Some(parent) = csv_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&csv_path)?;
        Ok(Self {
            csv_path,
            writer: csv::Writer::from_writer(file),
            rows: 0,
            last_row: None,
            ignored_keys: config.output.ignored_keys.clone(),
            select_configured: config.source.select.is_some(),
            incremental: config.output.incremental,
            incremental_key: config.source.incremental_fetching_key.clone(),
        })
    }

    // Every store document carries an "id" unless the projection dropped it.
    // A dropped id is the operator's doing; anything else is unexpected.
    fn item_id(&self, document: &Value) -> Result<String> {
        let id = document.get(ITEM_ID_KEY).and_then(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

        match id {
            Some(id) => Ok(id),
            None if self.select_configured => Err(StrataError::Configuration(
                "Missing \"id\" key in the query results. Please modify the \"select\" value \
                 in the configuration or use the \"mapping\" mode instead of the \"raw\"."
                    .to_string(),
            )),
            None => Err(StrataError::Internal(
                "Missing \"id\" key in the query results.".to_string(),
            )),
        }
    }
}

impl ItemWriter for RawCsvWriter {
    fn write_item(&mut self, document: Value) -> Result<()> {
        let id = self.item_id(&document)?;
        let document = strip_ignored_keys(document, &self.ignored_keys);

        self.writer
            .write_record([id.as_str(), &serde_json::to_string(&document)?])
            .map_err(|e| StrataError::Io(format!("Failed to write CSV row: {e}")))?;

        self.last_row = Some(document);
        self.rows += 1;
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| StrataError::Io(format!("Failed to flush CSV: {e}")))?;

        // No rows -> no CSV file, no manifest
        if self.rows == 0 {
            fs::remove_file(&self.csv_path)?;
            return Ok(());
        }

        let manifest = serde_json::json!({
            "incremental": self.incremental,
            "primary_key": [ID_COLUMN],
            "columns": [ID_COLUMN, DATA_COLUMN],
        });
        let manifest_path = format!("{}.manifest", self.csv_path.display());
        fs::write(manifest_path, serde_json::to_vec_pretty(&manifest)?)?;
        Ok(())
    }

    fn write_last_state(&mut self, prior_state: &InputState) -> Result<Option<InputState>> {
        next_state(
            self.incremental_key.as_deref(),
            self.last_row.as_ref(),
            prior_state,
        )
    }
}
