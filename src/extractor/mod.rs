//! Extraction orchestration
//!
//! One extraction run: spawn the producer child process, decode the framed
//! document stream as it arrives, hand every document to the CSV writer in
//! order, and finalize the writer exactly once after the producer reports
//! success. Everything runs on a single-threaded cooperative scheduler; the
//! only suspension points are data-pipe reads, log-stream reads, the
//! progress timer and the child-exit event.

pub mod codec;
pub mod csv;
pub mod process;
pub mod query;
pub mod state;

use crate::config::StrataConfig;
use crate::domain::{Result, StrataError};
use crate::producer::env as producer_env;
use codec::{JsonDecoder, DEFAULT_DELIMITER};
use csv::ItemWriter;
use process::{spawn_producer, DiagnosticMode, ProducerHandle};
use query::QueryFactory;
use secrecy::ExposeSecret;
use state::StateStore;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// How often the running document count is logged.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(30);

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Drives one extraction or connection-probe run
pub struct Extractor {
    config: StrataConfig,
}

impl Extractor {
    pub fn new(config: StrataConfig) -> Self {
        Self { config }
    }

    /// Execute the extraction and return the number of documents written.
    ///
    /// On producer failure every document decoded before the failure has
    /// already been delivered to the writer, but the writer is not
    /// finalized: no manifest or state file marks the partial output as a
    /// completed table.
    pub async fn extract(&self) -> Result<u64> {
        let state_store = StateStore::new(&self.config.data_dir);
        let input_state = state_store.load()?;
        let query = QueryFactory::new(&self.config, &input_state).create();

        tracing::info!(query = %query, "Starting extraction");

        let mut writer = csv::create_writer(&self.config)?;
        let command = self.producer_command("produce", Some(&query));
        let handle = spawn_producer(command, DiagnosticMode::Forward)?;

        let processed = run_pipeline(handle, writer.as_mut()).await?;

        writer.finalize()?;
        if let Some(new_state) = writer.write_last_state(&input_state)? {
            state_store.save(&new_state)?;
        }

        tracing::info!(processed, "Extraction completed");
        Ok(processed)
    }

    /// Probe the store connection through the producer.
    ///
    /// The probe child's diagnostics are captured silently and surface only
    /// in the returned error, so a successful probe produces no log noise.
    pub async fn test_connection(&self) -> Result<()> {
        let command = self.producer_command("probe", None);
        let handle = spawn_producer(command, DiagnosticMode::Quiet)?;

        // A probe emits no documents; drain the pipe so the child never
        // blocks on it.
        let mut data = handle.data;
        let mut sink = Vec::new();
        data.read_to_end(&mut sink)
            .await
            .map_err(|e| StrataError::Process(format!("Failed to read data stream: {e}")))?;

        handle.completion.wait().await
    }

    fn producer_command(&self, action: &str, query: Option<&str>) -> Command {
        let exe = std::env::current_exe().unwrap_or_else(|_| "strata".into());
        let mut command = Command::new(exe);
        command
            .arg(action)
            .env(producer_env::ENDPOINT, &self.config.db.endpoint)
            .env(producer_env::KEY, self.config.db.key.expose_secret().as_ref())
            .env(producer_env::DATABASE_ID, &self.config.db.database_id)
            .env(producer_env::CONTAINER_ID, &self.config.source.container_id)
            .env(producer_env::MAX_TRIES, self.config.source.max_tries.to_string())
            .env(producer_env::PAGE_SIZE, self.config.source.page_size.to_string())
            .env(producer_env::DELIMITER, DEFAULT_DELIMITER);
        if let Some(query) = query {
            command.env(producer_env::QUERY, query);
        }
        command
    }
}

/// Decode the data stream into the writer and await the producer outcome.
///
/// Documents are written synchronously in arrival order. The data stream is
/// always drained to EOF and flushed through the decoder before the
/// completion signal is inspected, so a failure observed on exit never
/// drops documents that were already on the wire.
pub async fn run_pipeline(handle: ProducerHandle, writer: &mut dyn ItemWriter) -> Result<u64> {
    let mut decoder = JsonDecoder::new(DEFAULT_DELIMITER);
    let mut processed: u64 = 0;
    let mut data = handle.data;
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    let mut progress = tokio::time::interval(PROGRESS_INTERVAL);
    progress.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    progress.tick().await; // the first tick fires immediately

    loop {
        tokio::select! {
            read = data.read(&mut buffer) => {
                let n = read.map_err(|e| {
                    StrataError::Process(format!("Failed to read data stream: {e}"))
                })?;
                if n == 0 {
                    break;
                }
                decoder.decode_chunk(&buffer[..n], &mut |document| {
                    writer.write_item(document)?;
                    processed += 1;
                    Ok(())
                })?;
            }
            _ = progress.tick() => {
                tracing::info!("Processed {processed} document(s)");
            }
        }
    }

    decoder.finalize(&mut |document| {
        writer.write_item(document)?;
        processed += 1;
        Ok(())
    })?;

    handle.completion.wait().await?;
    Ok(processed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::state::InputState;
    use serde_json::{json, Value};

    #[derive(Default)]
    struct RecordingWriter {
        items: Vec<Value>,
        finalized: u32,
    }

    impl ItemWriter for RecordingWriter {
        fn write_item(&mut self, document: Value) -> Result<()> {
            self.items.push(document);
            Ok(())
        }

        fn finalize(&mut self) -> Result<()> {
            self.finalized += 1;
            Ok(())
        }

        fn write_last_state(&mut self, _prior: &InputState) -> Result<Option<InputState>> {
            Ok(None)
        }
    }

    fn shell(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script);
        command
    }

    #[tokio::test]
    async fn test_pipeline_delivers_documents_in_order() {
        let script = r#"
            printf '{"id":1}\n---\n' >&3
            printf '{"id":2}\n---\n' >&3
            printf '{"id":3}\n---\n' >&3
        "#;
        let handle = spawn_producer(shell(script), DiagnosticMode::Forward).unwrap();
        let mut writer = RecordingWriter::default();

        let processed = run_pipeline(handle, &mut writer).await.unwrap();

        assert_eq!(processed, 3);
        assert_eq!(
            writer.items,
            vec![json!({"id": 1}), json!({"id": 2}), json!({"id": 3})]
        );
    }

    #[tokio::test]
    async fn test_pipeline_decodes_unterminated_last_frame() {
        let handle = spawn_producer(
            shell(r#"printf '{"id":1}\n---\n{"id":2}' >&3"#),
            DiagnosticMode::Forward,
        )
        .unwrap();
        let mut writer = RecordingWriter::default();
        let processed = run_pipeline(handle, &mut writer).await.unwrap();
        assert_eq!(processed, 2);
    }

    #[tokio::test]
    async fn test_pipeline_empty_stream_yields_zero() {
        let handle = spawn_producer(shell("exit 0"), DiagnosticMode::Forward).unwrap();
        let mut writer = RecordingWriter::default();
        let processed = run_pipeline(handle, &mut writer).await.unwrap();
        assert_eq!(processed, 0);
        assert!(writer.items.is_empty());
    }

    #[tokio::test]
    async fn test_pipeline_delivers_documents_before_failure() {
        // Documents on the wire before the child fails must still reach the
        // writer, and the failure must carry the diagnostics.
        let script = r#"
            printf '{"id":1}\n---\n{"id":2}\n---\n' >&3
            echo 'bad query' >&2
            exit 1
        "#;
        let handle = spawn_producer(shell(script), DiagnosticMode::Forward).unwrap();
        let mut writer = RecordingWriter::default();

        let err = run_pipeline(handle, &mut writer).await.unwrap_err();

        assert!(err.is_user_error());
        assert!(err.to_string().contains("bad query"));
        assert_eq!(writer.items, vec![json!({"id": 1}), json!({"id": 2})]);
        assert_eq!(writer.finalized, 0);
    }

    #[tokio::test]
    async fn test_pipeline_corrupt_frame_aborts() {
        let handle = spawn_producer(
            shell(r#"printf '{"id":1}\n---\nnot json\n---\n' >&3"#),
            DiagnosticMode::Forward,
        )
        .unwrap();
        let mut writer = RecordingWriter::default();
        let err = run_pipeline(handle, &mut writer).await.unwrap_err();
        assert!(matches!(err, StrataError::Decode(_)));
        assert_eq!(writer.items, vec![json!({"id": 1})]);
    }
}
