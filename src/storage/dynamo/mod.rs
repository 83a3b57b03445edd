//! DynamoDB TransactionStore implementation.
//!
//! Table schema (provisioned externally):
//! - PK: `invoice_id` (String), SK: `stock_code` (String)
//! - GSI `by-country`: `country` / `invoice_date`, projection ALL
//! - GSI `by-customer`: `customer_id` / `invoice_date`, projection ALL
//!
//! Items carry every record field plus a derived `total_amount` (Number).

mod error;
mod expression;
mod item;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{PutRequest, WriteRequest};
use aws_sdk_dynamodb::Client;
use tracing::{debug, info};

use crate::config::AwsConfig;
use crate::record::Record;
use crate::storage::schema::attr;
use crate::storage::{
    Page, QueryRequest, Result, ScanRequest, StoreError, TransactionStore, MAX_BATCH_WRITE_ITEMS,
};

use error::classify;
use expression::Expression;
use item::{from_item, key_to_token, to_item, token_to_key, Item};

/// DynamoDB implementation of TransactionStore.
pub struct DynamoTransactionStore {
    client: Client,
    table_name: String,
}

impl DynamoTransactionStore {
    /// Create a new DynamoDB transaction store.
    pub async fn new(aws: &AwsConfig, table_name: impl Into<String>) -> Result<Self> {
        let sdk_config = crate::aws::load_sdk_config(aws).await;
        let store = Self::with_client(Client::new(&sdk_config), table_name)?;
        info!(table = %store.table_name, "Connected to DynamoDB for transactions");
        Ok(store)
    }

    /// Wrap an existing client.
    pub fn with_client(client: Client, table_name: impl Into<String>) -> Result<Self> {
        let table_name = table_name.into();
        if table_name.trim().is_empty() {
            return Err(StoreError::Configuration(
                "table name must not be empty".to_string(),
            ));
        }
        Ok(Self { client, table_name })
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    fn limit(limit: Option<usize>) -> Option<i32> {
        limit.map(|n| i32::try_from(n).unwrap_or(i32::MAX))
    }

    fn page(items: Option<Vec<Item>>, last_evaluated_key: Option<Item>) -> Result<Page> {
        let items = items
            .unwrap_or_default()
            .iter()
            .map(from_item)
            .collect::<Result<Vec<_>>>()?;
        let next_token = match last_evaluated_key {
            Some(ref key) if !key.is_empty() => Some(key_to_token(key)?),
            _ => None,
        };
        Ok(Page { items, next_token })
    }
}

#[async_trait]
impl TransactionStore for DynamoTransactionStore {
    async fn put_item(&self, record: &Record) -> Result<()> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(to_item(record)))
            .send()
            .await
            .map_err(|e| classify("put_item", e))?;

        debug!(key = %record.key(), "Stored record in DynamoDB");
        Ok(())
    }

    async fn batch_write(&self, records: &[Record]) -> Result<Vec<Record>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        if records.len() > MAX_BATCH_WRITE_ITEMS {
            return Err(StoreError::Configuration(format!(
                "batch of {} exceeds the {} item limit",
                records.len(),
                MAX_BATCH_WRITE_ITEMS
            )));
        }

        let requests = records
            .iter()
            .map(|record| {
                let put = PutRequest::builder()
                    .set_item(Some(to_item(record)))
                    .build()
                    .map_err(|e| StoreError::Configuration(e.to_string()))?;
                Ok(WriteRequest::builder().put_request(put).build())
            })
            .collect::<Result<Vec<_>>>()?;

        let output = self
            .client
            .batch_write_item()
            .request_items(&self.table_name, requests)
            .send()
            .await
            .map_err(|e| classify("batch_write_item", e))?;

        let unprocessed = output
            .unprocessed_items
            .and_then(|mut tables| tables.remove(&self.table_name))
            .unwrap_or_default()
            .into_iter()
            .filter_map(|request| request.put_request)
            .map(|put| from_item(&put.item))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            submitted = records.len(),
            unprocessed = unprocessed.len(),
            "DynamoDB batch write"
        );
        Ok(unprocessed)
    }

    async fn query(&self, request: &QueryRequest) -> Result<Page> {
        if request.partition_value.is_empty() {
            return Err(StoreError::Configuration(format!(
                "empty partition value for index {}",
                request.index
            )));
        }

        let descriptor = request.index.descriptor();
        let condition = Expression::key_condition(
            descriptor,
            &request.partition_value,
            request.sort_filter.as_ref(),
        );
        let exclusive_start_key = request.start.as_ref().map(token_to_key).transpose()?;

        let output = self
            .client
            .query()
            .table_name(&self.table_name)
            .index_name(descriptor.index_name)
            .key_condition_expression(condition.expression)
            .set_expression_attribute_names(Some(condition.names))
            .set_expression_attribute_values(Some(condition.values))
            .scan_index_forward(true)
            .set_limit(Self::limit(request.limit))
            .set_exclusive_start_key(exclusive_start_key)
            .send()
            .await
            .map_err(|e| classify("query", e))?;

        let page = Self::page(output.items, output.last_evaluated_key)?;
        debug!(
            index = %request.index,
            partition = %request.partition_value,
            items = page.items.len(),
            more = page.next_token.is_some(),
            "DynamoDB query page"
        );
        Ok(page)
    }

    async fn scan(&self, request: &ScanRequest) -> Result<Page> {
        let exclusive_start_key = request.start.as_ref().map(token_to_key).transpose()?;

        let mut builder = self
            .client
            .scan()
            .table_name(&self.table_name)
            .set_limit(Self::limit(request.limit))
            .set_exclusive_start_key(exclusive_start_key);

        if let Some(ref filter) = request.date_filter {
            let filter = Expression::filter(attr::INVOICE_DATE, filter);
            builder = builder
                .filter_expression(filter.expression)
                .set_expression_attribute_names(Some(filter.names))
                .set_expression_attribute_values(Some(filter.values));
        }

        let output = builder.send().await.map_err(|e| classify("scan", e))?;

        let page = Self::page(output.items, output.last_evaluated_key)?;
        debug!(
            items = page.items.len(),
            more = page.next_token.is_some(),
            "DynamoDB scan page"
        );
        Ok(page)
    }
}
