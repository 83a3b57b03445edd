//! Record <-> DynamoDB item mapping.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use aws_sdk_dynamodb::types::AttributeValue;

use crate::record::Record;
use crate::storage::schema::attr;
use crate::storage::{PageToken, Result, StoreError};

pub(crate) type Item = HashMap<String, AttributeValue>;

/// Encode a record. `customer_id` is omitted for guest orders so they stay
/// out of the sparse `by-customer` index.
pub(crate) fn to_item(record: &Record) -> Item {
    let mut item = HashMap::with_capacity(9);
    item.insert(attr::INVOICE_ID.to_string(), AttributeValue::S(record.invoice_id.clone()));
    item.insert(attr::STOCK_CODE.to_string(), AttributeValue::S(record.stock_code.clone()));
    item.insert(attr::DESCRIPTION.to_string(), AttributeValue::S(record.description.clone()));
    item.insert(attr::QUANTITY.to_string(), AttributeValue::N(record.quantity.to_string()));
    item.insert(attr::UNIT_PRICE.to_string(), AttributeValue::N(record.unit_price.to_string()));
    item.insert(attr::INVOICE_DATE.to_string(), AttributeValue::S(record.invoice_date.clone()));
    item.insert(attr::COUNTRY.to_string(), AttributeValue::S(record.country.clone()));
    item.insert(
        attr::TOTAL_AMOUNT.to_string(),
        AttributeValue::N(record.total_amount().to_string()),
    );
    if let Some(ref customer_id) = record.customer_id {
        item.insert(attr::CUSTOMER_ID.to_string(), AttributeValue::S(customer_id.clone()));
    }
    item
}

pub(crate) fn from_item(item: &Item) -> Result<Record> {
    Ok(Record {
        invoice_id: string(item, attr::INVOICE_ID)?,
        stock_code: string(item, attr::STOCK_CODE)?,
        description: optional_string(item, attr::DESCRIPTION)?.unwrap_or_default(),
        quantity: number(item, attr::QUANTITY)?,
        unit_price: number(item, attr::UNIT_PRICE)?,
        invoice_date: string(item, attr::INVOICE_DATE)?,
        customer_id: optional_string(item, attr::CUSTOMER_ID)?,
        country: string(item, attr::COUNTRY)?,
    })
}

fn optional_string(item: &Item, name: &str) -> Result<Option<String>> {
    match item.get(name) {
        None | Some(AttributeValue::Null(_)) => Ok(None),
        Some(AttributeValue::S(value)) => Ok(Some(value.clone())),
        Some(other) => Err(StoreError::Malformed(format!(
            "attribute {} is not a string: {:?}",
            name, other
        ))),
    }
}

fn string(item: &Item, name: &str) -> Result<String> {
    optional_string(item, name)?
        .ok_or_else(|| StoreError::Malformed(format!("missing attribute {}", name)))
}

fn number<T: FromStr>(item: &Item, name: &str) -> Result<T> {
    match item.get(name) {
        Some(AttributeValue::N(raw)) => raw.parse().map_err(|_| {
            StoreError::Malformed(format!("attribute {} is not a valid number: {}", name, raw))
        }),
        Some(other) => Err(StoreError::Malformed(format!(
            "attribute {} is not a number: {:?}",
            name, other
        ))),
        None => Err(StoreError::Malformed(format!("missing attribute {}", name))),
    }
}

/// Wrap a last-evaluated key as an opaque token.
pub(crate) fn key_to_token(key: &Item) -> Result<PageToken> {
    let mut plain = BTreeMap::new();
    for (name, value) in key {
        match value {
            AttributeValue::S(s) => {
                plain.insert(name.clone(), s.clone());
            }
            other => {
                return Err(StoreError::Malformed(format!(
                    "last evaluated key attribute {} is not a string: {:?}",
                    name, other
                )))
            }
        }
    }
    Ok(PageToken::from_key(&plain))
}

pub(crate) fn token_to_key(token: &PageToken) -> Result<Item> {
    Ok(token
        .key()?
        .into_iter()
        .map(|(name, value)| (name, AttributeValue::S(value)))
        .collect())
}
