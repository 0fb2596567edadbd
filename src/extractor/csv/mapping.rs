//! Mapping CSV writer
//!
//! One CSV column per configured `{path, column}` entry. A path that does
//! not resolve in a document yields an empty cell; scalars are rendered
//! bare, nested structures as JSON.

use crate::config::{MappingColumn, StrataConfig};
use crate::domain::document::value_at_path;
use crate::domain::{Result, StrataError};
use crate::extractor::csv::{next_state, ItemWriter};
use crate::extractor::state::InputState;
use serde_json::Value;
use std::fs;
use std::fs::File;
use std::path::PathBuf;

pub struct MappingCsvWriter {
    csv_path: PathBuf,
    writer: csv::Writer<File>,
    mapping: Vec<MappingColumn>,
    rows: u64,
    last_row: Option<Value>,
    incremental: bool,
    incremental_key: Option<String>,
}

impl MappingCsvWriter {
    pub fn new(csv_path: PathBuf, config: &StrataConfig) -> Result<Self> {
        if let Some(parent) = csv_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&csv_path)?;
        let mut writer = csv::Writer::from_writer(file);

        let header: Vec<&str> = config
            .output
            .mapping
            .iter()
            .map(|m| m.column.as_str())
            .collect();
        writer
            .write_record(&header)
            .map_err(|e| StrataError::Io(format!("Failed to write CSV header: {e}")))?;

        Ok(Self {
            csv_path,
            writer,
            mapping: config.output.mapping.clone(),
            rows: 0,
            last_row: None,
            incremental: config.output.incremental,
            incremental_key: config.source.incremental_fetching_key.clone(),
        })
    }

    fn cell(document: &Value, path: &str) -> String {
        match value_at_path(document, path) {
            Err(_) => String::new(),
            Ok(Value::Null) => String::new(),
            Ok(Value::String(s)) => s.clone(),
            Ok(other) => other.to_string(),
        }
    }
}

impl ItemWriter for MappingCsvWriter {
    fn write_item(&mut self, document: Value) -> Result<()> {
        let record: Vec<String> = self
            .mapping
            .iter()
            .map(|m| Self::cell(&document, &m.path))
            .collect();
        self.writer
            .write_record(&record)
            .map_err(|e| StrataError::Io(format!("Failed to write CSV row: {e}")))?;

        self.last_row = Some(document);
        self.rows += 1;
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| StrataError::Io(format!("Failed to flush CSV: {e}")))?;

        // Header-only file -> no table
        if self.rows == 0 {
            fs::remove_file(&self.csv_path)?;
            return Ok(());
        }

        let columns: Vec<&str> = self.mapping.iter().map(|m| m.column.as_str()).collect();
        let manifest = serde_json::json!({
            "incremental": self.incremental,
            "columns": columns,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::csv::table_path;
    use serde_json::json;
    use tempfile::TempDir;

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
            mode = "mapping"

            [[output.mapping]]
            path = "id"
            column = "id"

            [[output.mapping]]
            path = "user.name"
            column = "name"

            [[output.mapping]]
            path = "tags"
            column = "tags"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_header_and_projected_rows() {
        let dir = TempDir::new().unwrap();
        let cfg = config();
        let path = table_path(dir.path().to_str().unwrap(), "users");
        let mut writer = MappingCsvWriter::new(path, &cfg).unwrap();

        writer
            .write_item(json!({
                "id": "1",
                "user": {"name": "alice"},
                "tags": ["a", "b"],
            }))
            .unwrap();
        writer.write_item(json!({"id": "2"})).unwrap();
        writer.finalize().unwrap();

        let csv = fs::read_to_string(dir.path().join("out/tables/users.csv")).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), "id,name,tags");
        assert_eq!(lines.next().unwrap(), r#"1,alice,"[""a"",""b""]""#);
        assert_eq!(lines.next().unwrap(), "2,,");
    }

    #[test]
    fn test_no_rows_removes_header_only_file() {
        let dir = TempDir::new().unwrap();
        let cfg = config();
        let path = table_path(dir.path().to_str().unwrap(), "users");
        let mut writer = MappingCsvWriter::new(path, &cfg).unwrap();
        writer.finalize().unwrap();
        assert!(!dir.path().join("out/tables/users.csv").exists());
    }
}
