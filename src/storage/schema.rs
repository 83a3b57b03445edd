//! Table schema contract.
//!
//! The table is provisioned outside this crate. These constants describe it
//! and must match the provisioned definition exactly:
//!
//! ```text
//! table        invoice_id  HASH   stock_code    RANGE
//! by-country   country     HASH   invoice_date  RANGE   projection ALL
//! by-customer  customer_id HASH   invoice_date  RANGE   projection ALL
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::StoreError;
use crate::record::Record;

/// Default table name.
pub const DEFAULT_TABLE_NAME: &str = "Ecommerce_eu";

/// Maximum items accepted by a single batch-write call.
pub const MAX_BATCH_WRITE_ITEMS: usize = 25;

/// Attribute names as stored.
pub mod attr {
    pub const INVOICE_ID: &str = "invoice_id";
    pub const STOCK_CODE: &str = "stock_code";
    pub const DESCRIPTION: &str = "description";
    pub const QUANTITY: &str = "quantity";
    pub const UNIT_PRICE: &str = "unit_price";
    pub const INVOICE_DATE: &str = "invoice_date";
    pub const CUSTOMER_ID: &str = "customer_id";
    pub const COUNTRY: &str = "country";
    pub const TOTAL_AMOUNT: &str = "total_amount";
}

/// Table partition key.
pub const PARTITION_KEY: &str = attr::INVOICE_ID;
/// Table sort key.
pub const SORT_KEY: &str = attr::STOCK_CODE;

/// Index projection type. Only `ALL` is provisioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    All,
}

/// Static description of a secondary index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexDescriptor {
    pub index_name: &'static str,
    pub partition_attribute: &'static str,
    pub sort_attribute: &'static str,
    pub projection: Projection,
}

const BY_COUNTRY: IndexDescriptor = IndexDescriptor {
    index_name: "by-country",
    partition_attribute: attr::COUNTRY,
    sort_attribute: attr::INVOICE_DATE,
    projection: Projection::All,
};

const BY_CUSTOMER: IndexDescriptor = IndexDescriptor {
    index_name: "by-customer",
    partition_attribute: attr::CUSTOMER_ID,
    sort_attribute: attr::INVOICE_DATE,
    projection: Projection::All,
};

/// Secondary index selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecondaryIndex {
    #[serde(rename = "by-country")]
    ByCountry,
    #[serde(rename = "by-customer")]
    ByCustomer,
}

impl SecondaryIndex {
    pub const ALL: [SecondaryIndex; 2] = [SecondaryIndex::ByCountry, SecondaryIndex::ByCustomer];

    pub fn descriptor(self) -> &'static IndexDescriptor {
        match self {
            SecondaryIndex::ByCountry => &BY_COUNTRY,
            SecondaryIndex::ByCustomer => &BY_CUSTOMER,
        }
    }

    pub fn name(self) -> &'static str {
        self.descriptor().index_name
    }

    /// Value of this index's partition attribute on `record`.
    ///
    /// `None` means the record is not visible through this index (a guest
    /// order has no customer).
    pub fn partition_value(self, record: &Record) -> Option<&str> {
        match self {
            SecondaryIndex::ByCountry => Some(record.country.as_str()),
            SecondaryIndex::ByCustomer => record.customer_id.as_deref(),
        }
    }
}

impl fmt::Display for SecondaryIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SecondaryIndex {
    type Err = StoreError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        SecondaryIndex::ALL
            .into_iter()
            .find(|index| index.name() == name)
            .ok_or_else(|| StoreError::Configuration(format!("Unknown secondary index: {}", name)))
    }
}
