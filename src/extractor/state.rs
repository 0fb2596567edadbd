//! Incremental fetching state
//!
//! The previous run's position is read from `<data_dir>/in/state.json` and
//! the new position written to `<data_dir>/out/state.json`. The only tracked
//! value is `lastFetchedRow`: the incremental-fetching-key value of the last
//! row written in this run.

use crate::domain::{Result, StrataError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// State handed to a run from the previous one
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct InputState {
    /// Incremental-fetching-key value of the last previously written row
    #[serde(rename = "lastFetchedRow", skip_serializing_if = "Option::is_none")]
    pub last_fetched_row: Option<Value>,
}

/// Reads and writes the state files under the data directory
pub struct StateStore {
    in_path: PathBuf,
    out_path: PathBuf,
}

impl StateStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            in_path: data_dir.join("in").join("state.json"),
            out_path: data_dir.join("out").join("state.json"),
        }
    }

    /// Load the input state; a missing file means a fresh full run.
    pub fn load(&self) -> Result<InputState> {
        if !self.in_path.exists() {
            return Ok(InputState::default());
        }
        let contents = fs::read_to_string(&self.in_path)?;
        serde_json::from_str(&contents).map_err(|e| {
            StrataError::Internal(format!(
                "Failed to parse state file {}: {e}",
                self.in_path.display()
            ))
        })
    }

    /// Persist the state for the next run.
    pub fn save(&self, state: &InputState) -> Result<()> {
        if let Some(parent) = self.out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.out_path, serde_json::to_vec(state)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_missing_input_state_is_fresh_run() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());
        assert!(store.load().unwrap().last_fetched_row.is_none());
    }

    #[test]
    fn test_state_round_trip() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("in")).unwrap();
        fs::write(
            dir.path().join("in/state.json"),
            r#"{"lastFetchedRow": "row-42"}"#,
        )
        .unwrap();

        let store = StateStore::new(dir.path());
        let state = store.load().unwrap();
        assert_eq!(state.last_fetched_row, Some(json!("row-42")));

        store.save(&state).unwrap();
        let written = fs::read_to_string(dir.path().join("out/state.json")).unwrap();
        assert_eq!(written, r#"{"lastFetchedRow":"row-42"}"#);
    }

    #[test]
    fn test_empty_state_serializes_without_key() {
        let state = InputState::default();
        assert_eq!(serde_json::to_string(&state).unwrap(), "{}");
    }

    #[test]
    fn test_corrupt_state_is_internal_error() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("in")).unwrap();
        fs::write(dir.path().join("in/state.json"), "{not json").unwrap();
        let err = StateStore::new(dir.path()).load().unwrap_err();
        assert!(!err.is_user_error());
    }
}
