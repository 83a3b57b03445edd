//! In-memory TransactionStore for testing.
//!
//! Behaves like the real table where the pipeline depends on it: keyed
//! overwrite, the 25-item batch limit, index order by `invoice_date`,
//! page-size truncation with continuation tokens, and scan limits applied
//! before the filter. Faults are injected per call number (1-based).

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::schema::attr;
use super::{
    Page, PageToken, QueryRequest, Result, ScanRequest, SecondaryIndex, StoreError,
    TransactionStore, MAX_BATCH_WRITE_ITEMS,
};
use crate::record::{Record, RecordKey};

/// Default items per page when the request sets no smaller limit.
pub const DEFAULT_MOCK_PAGE_SIZE: usize = 100;

/// Callback invoked with the call number before a call is served.
pub type CallHook = Arc<dyn Fn(usize) + Send + Sync>;

#[derive(Default)]
struct Faults {
    failing_batch_calls: HashSet<usize>,
    failing_read_calls: HashSet<usize>,
    unprocessed_on_call: BTreeMap<usize, usize>,
    stuck_keys: HashSet<RecordKey>,
    missing_indexes: HashSet<SecondaryIndex>,
    table_missing: bool,
    batch_hook: Option<CallHook>,
    read_hook: Option<CallHook>,
}

/// Mock transaction store that keeps records in memory.
pub struct MockTransactionStore {
    records: RwLock<BTreeMap<RecordKey, Record>>,
    faults: RwLock<Faults>,
    page_size: usize,
    batch_sizes: RwLock<Vec<usize>>,
    query_log: RwLock<Vec<QueryRequest>>,
    batch_calls: AtomicUsize,
    read_calls: AtomicUsize,
    query_calls: AtomicUsize,
    scan_calls: AtomicUsize,
    put_calls: AtomicUsize,
}

impl Default for MockTransactionStore {
    fn default() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            faults: RwLock::new(Faults::default()),
            page_size: DEFAULT_MOCK_PAGE_SIZE,
            batch_sizes: RwLock::new(Vec::new()),
            query_log: RwLock::new(Vec::new()),
            batch_calls: AtomicUsize::new(0),
            read_calls: AtomicUsize::new(0),
            query_calls: AtomicUsize::new(0),
            scan_calls: AtomicUsize::new(0),
            put_calls: AtomicUsize::new(0),
        }
    }
}

impl MockTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap every page at `page_size` items, like the store's response size cap.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Store pre-populated with `records` (later duplicates overwrite).
    pub fn seeded(records: impl IntoIterator<Item = Record>) -> Self {
        let map = records.into_iter().map(|r| (r.key(), r)).collect();
        Self {
            records: RwLock::new(map),
            ..Self::default()
        }
    }

    // ------------------------------------------------------------------
    // Fault injection
    // ------------------------------------------------------------------

    /// Batch-write calls with these numbers fail with a transient error.
    pub async fn fail_batch_write_calls(&self, calls: RangeInclusive<usize>) {
        self.faults.write().await.failing_batch_calls.extend(calls);
    }

    /// Query and scan calls (counted together) with these numbers fail
    /// with a transient error.
    pub async fn fail_query_calls(&self, calls: RangeInclusive<usize>) {
        self.faults.write().await.failing_read_calls.extend(calls);
    }

    /// On batch-write call `call`, leave the last `count` items unprocessed.
    pub async fn leave_unprocessed_on_call(&self, call: usize, count: usize) {
        self.faults.write().await.unprocessed_on_call.insert(call, count);
    }

    /// These keys are returned unprocessed by every batch write.
    pub async fn stuck_keys(&self, keys: impl IntoIterator<Item = RecordKey>) {
        self.faults.write().await.stuck_keys.extend(keys);
    }

    /// Queries against `index` fail as if it were not provisioned.
    pub async fn missing_index(&self, index: SecondaryIndex) {
        self.faults.write().await.missing_indexes.insert(index);
    }

    /// Every call fails as if the table did not exist.
    pub async fn set_table_missing(&self, missing: bool) {
        self.faults.write().await.table_missing = missing;
    }

    /// Run `hook` with the call number before each batch write is served.
    pub async fn on_batch_write(&self, hook: impl Fn(usize) + Send + Sync + 'static) {
        self.faults.write().await.batch_hook = Some(Arc::new(hook));
    }

    /// Run `hook` with the call number before each query or scan is served.
    pub async fn on_read(&self, hook: impl Fn(usize) + Send + Sync + 'static) {
        self.faults.write().await.read_hook = Some(Arc::new(hook));
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    pub async fn get(&self, key: &RecordKey) -> Option<Record> {
        self.records.read().await.get(key).cloned()
    }

    /// All stored records in key order.
    pub async fn records(&self) -> Vec<Record> {
        self.records.read().await.values().cloned().collect()
    }

    /// Item count of every batch-write call, in call order.
    pub async fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.read().await.clone()
    }

    /// Every query request received, in call order.
    pub async fn query_log(&self) -> Vec<QueryRequest> {
        self.query_log.read().await.clone()
    }

    pub fn batch_write_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    pub fn scan_calls(&self) -> usize {
        self.scan_calls.load(Ordering::SeqCst)
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------

    fn table_missing_error() -> StoreError {
        StoreError::Configuration("Requested resource not found: table does not exist".into())
    }

    /// Count a read call and apply read faults.
    async fn begin_read(&self, operation: &'static str) -> Result<()> {
        let call = self.read_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let faults = self.faults.read().await;
        if let Some(ref hook) = faults.read_hook {
            hook(call);
        }
        if faults.table_missing {
            return Err(Self::table_missing_error());
        }
        if faults.failing_read_calls.contains(&call) {
            return Err(StoreError::Transient {
                operation,
                message: format!("injected throttle on read call {}", call),
            });
        }
        Ok(())
    }

    fn page_limit(&self, limit: Option<usize>) -> usize {
        limit.unwrap_or(self.page_size).min(self.page_size).max(1)
    }
}

/// Position of a record within an index partition.
fn index_position(record: &Record) -> (String, String, String) {
    (
        record.invoice_date.clone(),
        record.invoice_id.clone(),
        record.stock_code.clone(),
    )
}

fn index_token(index: SecondaryIndex, partition_value: &str, record: &Record) -> PageToken {
    let descriptor = index.descriptor();
    let mut key = BTreeMap::new();
    key.insert(descriptor.partition_attribute.to_string(), partition_value.to_string());
    key.insert(attr::INVOICE_DATE.to_string(), record.invoice_date.clone());
    key.insert(attr::INVOICE_ID.to_string(), record.invoice_id.clone());
    key.insert(attr::STOCK_CODE.to_string(), record.stock_code.clone());
    PageToken::from_key(&key)
}

fn table_token(key: &RecordKey) -> PageToken {
    let mut plain = BTreeMap::new();
    plain.insert(attr::INVOICE_ID.to_string(), key.invoice_id.clone());
    plain.insert(attr::STOCK_CODE.to_string(), key.stock_code.clone());
    PageToken::from_key(&plain)
}

fn table_key_from_token(token: &PageToken) -> Result<RecordKey> {
    Ok(RecordKey {
        invoice_id: token.attribute(attr::INVOICE_ID)?,
        stock_code: token.attribute(attr::STOCK_CODE)?,
    })
}

#[async_trait]
impl TransactionStore for MockTransactionStore {
    async fn put_item(&self, record: &Record) -> Result<()> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        if self.faults.read().await.table_missing {
            return Err(Self::table_missing_error());
        }
        self.records
            .write()
            .await
            .insert(record.key(), record.clone());
        Ok(())
    }

    async fn batch_write(&self, records: &[Record]) -> Result<Vec<Record>> {
        let call = self.batch_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.batch_sizes.write().await.push(records.len());

        let faults = self.faults.read().await;
        if let Some(ref hook) = faults.batch_hook {
            hook(call);
        }
        if faults.table_missing {
            return Err(Self::table_missing_error());
        }
        if records.len() > MAX_BATCH_WRITE_ITEMS {
            return Err(StoreError::Configuration(format!(
                "batch of {} exceeds the {} item limit",
                records.len(),
                MAX_BATCH_WRITE_ITEMS
            )));
        }
        let mut seen = BTreeSet::new();
        if !records.iter().all(|r| seen.insert(r.key())) {
            return Err(StoreError::Configuration(
                "Provided list of item keys contains duplicates".into(),
            ));
        }
        if faults.failing_batch_calls.contains(&call) {
            return Err(StoreError::Transient {
                operation: "batch_write_item",
                message: format!("injected throttle on batch call {}", call),
            });
        }

        let withheld = faults.unprocessed_on_call.get(&call).copied().unwrap_or(0);
        let cutoff = records.len().saturating_sub(withheld);

        let mut unprocessed = Vec::new();
        let mut table = self.records.write().await;
        for (position, record) in records.iter().enumerate() {
            if position >= cutoff || faults.stuck_keys.contains(&record.key()) {
                unprocessed.push(record.clone());
            } else {
                table.insert(record.key(), record.clone());
            }
        }
        Ok(unprocessed)
    }

    async fn query(&self, request: &QueryRequest) -> Result<Page> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        self.query_log.write().await.push(request.clone());
        self.begin_read("query").await?;

        if self
            .faults
            .read()
            .await
            .missing_indexes
            .contains(&request.index)
        {
            return Err(StoreError::Configuration(format!(
                "The table does not have the specified index: {}",
                request.index
            )));
        }
        if request.partition_value.is_empty() {
            return Err(StoreError::Configuration(format!(
                "empty partition value for index {}",
                request.index
            )));
        }

        let resume_after = match request.start {
            Some(ref token) => Some((
                token.attribute(attr::INVOICE_DATE)?,
                token.attribute(attr::INVOICE_ID)?,
                token.attribute(attr::STOCK_CODE)?,
            )),
            None => None,
        };

        let table = self.records.read().await;
        let mut matching: Vec<&Record> = table
            .values()
            .filter(|r| request.index.partition_value(r) == Some(request.partition_value.as_str()))
            .filter(|r| {
                request
                    .sort_filter
                    .as_ref()
                    .map_or(true, |f| f.matches(&r.invoice_date))
            })
            .filter(|r| {
                resume_after
                    .as_ref()
                    .map_or(true, |after| index_position(r) > *after)
            })
            .collect();
        matching.sort_by_key(|r| index_position(r));

        let limit = self.page_limit(request.limit);
        let more = matching.len() > limit;
        matching.truncate(limit);

        let next_token = match matching.last() {
            Some(last) if more => Some(index_token(request.index, &request.partition_value, last)),
            _ => None,
        };
        Ok(Page {
            items: matching.into_iter().cloned().collect(),
            next_token,
        })
    }

    async fn scan(&self, request: &ScanRequest) -> Result<Page> {
        self.scan_calls.fetch_add(1, Ordering::SeqCst);
        self.begin_read("scan").await?;

        let resume_after = request.start.as_ref().map(table_key_from_token).transpose()?;

        let table = self.records.read().await;
        let limit = self.page_limit(request.limit);
        let mut window = table
            .iter()
            .filter(|(key, _)| resume_after.as_ref().map_or(true, |after| *key > after));

        let evaluated: Vec<(&RecordKey, &Record)> = window.by_ref().take(limit).collect();
        let more = window.next().is_some();

        let next_token = match evaluated.last() {
            Some((key, _)) if more => Some(table_token(key)),
            _ => None,
        };
        let items = evaluated
            .into_iter()
            .map(|(_, record)| record)
            .filter(|r| {
                request
                    .date_filter
                    .as_ref()
                    .map_or(true, |f| f.matches(&r.invoice_date))
            })
            .cloned()
            .collect();

        Ok(Page { items, next_token })
    }
}
