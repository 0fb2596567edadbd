//! Pipelined page fetching
//!
//! The fetch loop overlaps network and output work: every fetched page is
//! handed to an emit task immediately, and the next page is requested while
//! that task is still writing. Pages are emitted strictly in fetch order
//! because at most one emit task is ever in flight. On a fetch failure the
//! in-flight emit is awaited before the error propagates, so every page
//! that was fetched successfully reaches the stream.

use crate::domain::{Result, StrataError};
use crate::extractor::codec::encode_frame;
use crate::producer::channel::DataChannel;
use crate::producer::retry::{with_retry, RetryPolicy};
use crate::producer::store::DocumentStore;
use serde_json::Value;
use tokio::task::JoinHandle;

/// Writes documents to the data channel as delimited frames
pub struct FrameWriter {
    channel: DataChannel,
    delimiter: Vec<u8>,
}

impl FrameWriter {
    pub fn new(channel: DataChannel, delimiter: impl Into<Vec<u8>>) -> Self {
        Self {
            channel,
            delimiter: delimiter.into(),
        }
    }

    async fn emit_page(&mut self, documents: Vec<Value>) -> Result<u64> {
        let mut emitted = 0;
        for document in &documents {
            let frame = encode_frame(document, &self.delimiter)?;
            self.channel.write_all(&frame).await?;
            emitted += 1;
        }
        self.channel.flush().await?;
        Ok(emitted)
    }
}

/// Runs one query to completion against a store
pub struct Fetcher<S> {
    store: S,
    policy: RetryPolicy,
}

impl<S: DocumentStore + Send + Sync> Fetcher<S> {
    pub fn new(store: S, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Fetch every page of `query` and emit the documents through `writer`.
    /// Returns the number of documents emitted.
    pub async fn run(&self, query: &str, writer: FrameWriter) -> Result<u64> {
        let mut total: u64 = 0;
        let mut continuation: Option<String> = None;
        let mut page_number: u64 = 0;
        let mut slot = EmitSlot::Ready(writer);

        loop {
            let store = &self.store;
            let fetched = with_retry(&self.policy, "Page fetch", || {
                store.fetch_page(query, continuation.as_deref())
            })
            .await;

            let page = match fetched {
                Ok(page) => page,
                Err(e) => {
                    // Settle the emit that is still running; its page was
                    // fetched successfully and belongs on the stream.
                    slot.settle(&mut total).await?;
                    return Err(e.into());
                }
            };

            page_number += 1;
            tracing::info!(
                "Fetched page {page_number} ({} document(s))",
                page.documents.len()
            );

            // Reclaim the writer from the previous page's emit before
            // starting the next one, keeping emission ordered.
            let mut writer = slot.settle(&mut total).await?;

            let is_last = page.continuation.is_none();
            continuation = page.continuation;

            slot = EmitSlot::InFlight(tokio::spawn(async move {
                let emitted = writer.emit_page(page.documents).await?;
                Ok((writer, emitted))
            }));

            if is_last {
                break;
            }
        }

        slot.settle(&mut total).await?;

        tracing::info!("Fetched {total} document(s) in {page_number} page(s)");
        Ok(total)
    }
}

/// Either holds the writer, or the emit task that will give it back
enum EmitSlot {
    Ready(FrameWriter),
    InFlight(JoinHandle<Result<(FrameWriter, u64)>>),
}

impl EmitSlot {
    /// Wait out an in-flight emit, add its count to `total`, and return
    /// the writer.
    async fn settle(self, total: &mut u64) -> Result<FrameWriter> {
        match self {
            EmitSlot::Ready(writer) => Ok(writer),
            EmitSlot::InFlight(handle) => {
                let (writer, emitted) = handle
                    .await
                    .map_err(|e| StrataError::Internal(format!("Emit task failed: {e}")))??;
                *total += emitted;
                Ok(writer)
            }
        }
    }
}
