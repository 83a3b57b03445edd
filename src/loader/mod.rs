//! Batch loader.
//!
//! Writes canonical records in chunks of at most 25. Each chunk goes
//! through two retry layers driven by one [`RetryPolicy`]:
//!
//! 1. A failed batch-write call that is transient is retried as a whole
//!    ([`retry_transient`]).
//! 2. Items the store reports as unprocessed are resubmitted, waiting out
//!    the policy's delay schedule between rounds.
//!
//! A chunk that still has unwritten items afterwards is recorded in the
//! report and the load carries on with the next chunk. Only configuration
//! errors abort the load.

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::LoaderConfig;
use crate::record::{Record, RecordKey};
use crate::storage::{StoreError, TransactionStore, MAX_BATCH_WRITE_ITEMS};
use crate::utils::cancel::CancellationSignal;
use crate::utils::retry::{retry_transient, RetryPolicy};

/// Errors that abort a load.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Configuration error while writing chunk {chunk_index}: {source}")]
    Configuration {
        chunk_index: usize,
        #[source]
        source: StoreError,
    },
}

/// Why a chunk's records were not all written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureCause {
    /// The store kept returning these items as unprocessed.
    Unprocessed { resubmissions: usize },
    /// A batch-write call failed and retrying did not help.
    Store { message: String },
}

/// Records of one chunk that never made it into the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedChunk {
    pub chunk_index: usize,
    pub keys: Vec<RecordKey>,
    pub cause: FailureCause,
}

/// Outcome of a load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Records confirmed written.
    pub written: usize,
    /// Chunks with unwritten records, ordered by chunk index.
    pub failures: Vec<FailedChunk>,
    /// Input records dropped because a later record had the same key.
    pub duplicates_skipped: usize,
    pub chunks_total: usize,
    pub chunks_issued: usize,
    /// The load stopped early on a cancellation signal.
    pub cancelled: bool,
}

impl LoadReport {
    /// Number of records that failed to write.
    pub fn failed(&self) -> usize {
        self.failures.iter().map(|f| f.keys.len()).sum()
    }

    pub fn failed_keys(&self) -> impl Iterator<Item = &RecordKey> {
        self.failures.iter().flat_map(|f| f.keys.iter())
    }
}

struct ChunkResult {
    written: usize,
    failure: Option<FailedChunk>,
}

/// Chunked, retrying writer over a [`TransactionStore`].
pub struct BatchLoader {
    store: Arc<dyn TransactionStore>,
    batch_size: usize,
    concurrency: usize,
    retry: RetryPolicy,
    cancel: CancellationSignal,
}

impl BatchLoader {
    pub fn new(store: Arc<dyn TransactionStore>, config: &LoaderConfig, retry: RetryPolicy) -> Self {
        Self {
            store,
            batch_size: config.effective_batch_size(),
            concurrency: config.concurrency.max(1),
            retry,
            cancel: CancellationSignal::never(),
        }
    }

    /// Stop issuing new chunks once `signal` is raised.
    pub fn with_cancellation(mut self, signal: CancellationSignal) -> Self {
        self.cancel = signal;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Write a single record, retrying transient failures.
    pub async fn write_one(&self, record: &Record) -> Result<(), StoreError> {
        retry_transient(&self.retry, "put_item", || self.store.put_item(record)).await
    }

    /// Write `records`.
    ///
    /// Records sharing a key are collapsed first (the last one wins, kept at
    /// the position of the first), so every chunk has distinct keys and
    /// re-running the same load leaves the store unchanged.
    pub async fn load(&self, records: Vec<Record>) -> Result<LoadReport, LoadError> {
        let input = records.len();
        let unique = dedup_last_wins(records);
        let duplicates_skipped = input - unique.len();

        let chunks: Vec<Vec<Record>> = unique
            .chunks(self.batch_size)
            .map(<[Record]>::to_vec)
            .collect();
        let chunks_total = chunks.len();

        info!(
            records = unique.len(),
            duplicates_skipped,
            chunks = chunks_total,
            batch_size = self.batch_size,
            concurrency = self.concurrency,
            "Starting batch load"
        );

        let cancel = self.cancel.clone();
        let results: Vec<ChunkResult> = stream::iter(chunks.into_iter().enumerate())
            .take_while(move |_| futures::future::ready(!cancel.is_cancelled()))
            .map(|(chunk_index, chunk)| self.write_chunk(chunk_index, chunk))
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;

        let chunks_issued = results.len();
        let mut report = LoadReport {
            duplicates_skipped,
            chunks_total,
            chunks_issued,
            cancelled: chunks_issued < chunks_total,
            ..LoadReport::default()
        };
        for result in results {
            report.written += result.written;
            report.failures.extend(result.failure);
        }
        report.failures.sort_by_key(|f| f.chunk_index);

        if report.cancelled {
            warn!(
                chunks_issued,
                chunks_total,
                written = report.written,
                "Batch load cancelled"
            );
        }
        info!(
            written = report.written,
            failed = report.failed(),
            "Batch load finished"
        );
        Ok(report)
    }

    async fn write_chunk(
        &self,
        chunk_index: usize,
        chunk: Vec<Record>,
    ) -> Result<ChunkResult, LoadError> {
        debug_assert!(chunk.len() <= MAX_BATCH_WRITE_ITEMS);
        let total = chunk.len();
        let mut pending = chunk;
        let mut delays = self.retry.delays();
        let mut resubmissions = 0;

        loop {
            let batch = pending.as_slice();
            let result =
                retry_transient(&self.retry, "batch_write", || self.store.batch_write(batch)).await;

            let unprocessed = match result {
                Ok(unprocessed) => unprocessed,
                Err(source @ StoreError::Configuration(_)) => {
                    return Err(LoadError::Configuration {
                        chunk_index,
                        source,
                    });
                }
                Err(e) => {
                    warn!(chunk_index, error = %e, records = pending.len(), "Chunk write failed");
                    return Ok(Self::partial(
                        chunk_index,
                        total,
                        &pending,
                        FailureCause::Store {
                            message: e.to_string(),
                        },
                    ));
                }
            };

            if unprocessed.is_empty() {
                debug!(chunk_index, records = total, resubmissions, "Chunk written");
                return Ok(ChunkResult {
                    written: total,
                    failure: None,
                });
            }

            match delays.next() {
                Some(delay) => {
                    resubmissions += 1;
                    debug!(
                        chunk_index,
                        unprocessed = unprocessed.len(),
                        delay = ?delay,
                        "Resubmitting unprocessed items"
                    );
                    tokio::time::sleep(delay).await;
                    pending = unprocessed;
                }
                None => {
                    warn!(
                        chunk_index,
                        unprocessed = unprocessed.len(),
                        resubmissions,
                        "Unprocessed items remain after retries"
                    );
                    return Ok(Self::partial(
                        chunk_index,
                        total,
                        &unprocessed,
                        FailureCause::Unprocessed { resubmissions },
                    ));
                }
            }
        }
    }

    fn partial(
        chunk_index: usize,
        total: usize,
        unwritten: &[Record],
        cause: FailureCause,
    ) -> ChunkResult {
        ChunkResult {
            written: total - unwritten.len(),
            failure: Some(FailedChunk {
                chunk_index,
                keys: unwritten.iter().map(Record::key).collect(),
                cause,
            }),
        }
    }
}

/// Keep one record per key: the last occurrence's value at the first
/// occurrence's position.
fn dedup_last_wins(records: Vec<Record>) -> Vec<Record> {
    let mut positions: HashMap<RecordKey, usize> = HashMap::with_capacity(records.len());
    let mut unique: Vec<Record> = Vec::with_capacity(records.len());
    for record in records {
        match positions.get(&record.key()) {
            Some(&at) => unique[at] = record,
            None => {
                positions.insert(record.key(), unique.len());
                unique.push(record);
            }
        }
    }
    unique
}
