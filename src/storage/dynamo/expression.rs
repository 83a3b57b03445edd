//! Key-condition and filter expression building.
//!
//! DynamoDB rejects requests whose placeholder maps contain names or values
//! the expression does not reference, so placeholders are only registered
//! alongside the clause that uses them.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;

use crate::storage::schema::IndexDescriptor;
use crate::storage::SortKeyFilter;

/// An expression plus the placeholder maps it references.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Expression {
    pub expression: String,
    pub names: HashMap<String, String>,
    pub values: HashMap<String, AttributeValue>,
}

impl Expression {
    /// `#pk = :pk [AND <sort clause>]` for an index query.
    pub fn key_condition(
        index: &IndexDescriptor,
        partition_value: &str,
        sort_filter: Option<&SortKeyFilter>,
    ) -> Self {
        let mut expr = Expression::default();
        expr.names
            .insert("#pk".to_string(), index.partition_attribute.to_string());
        expr.values.insert(
            ":pk".to_string(),
            AttributeValue::S(partition_value.to_string()),
        );
        expr.expression = "#pk = :pk".to_string();

        if let Some(filter) = sort_filter {
            let clause = expr.sort_clause("#sk", index.sort_attribute, filter);
            expr.expression = format!("{} AND {}", expr.expression, clause);
        }
        expr
    }

    /// Filter on a plain attribute, for scans.
    pub fn filter(attribute: &str, filter: &SortKeyFilter) -> Self {
        let mut expr = Expression::default();
        expr.expression = expr.sort_clause("#f", attribute, filter);
        expr
    }

    fn sort_clause(&mut self, name: &str, attribute: &str, filter: &SortKeyFilter) -> String {
        self.names.insert(name.to_string(), attribute.to_string());
        match filter {
            SortKeyFilter::Between { start, end } => {
                self.value(":lo", start);
                self.value(":hi", end);
                format!("{} BETWEEN :lo AND :hi", name)
            }
            SortKeyFilter::BeginsWith(prefix) => {
                self.value(":prefix", prefix);
                format!("begins_with({}, :prefix)", name)
            }
            SortKeyFilter::AtOrAfter(start) => {
                self.value(":lo", start);
                format!("{} >= :lo", name)
            }
            SortKeyFilter::AtOrBefore(end) => {
                self.value(":hi", end);
                format!("{} <= :hi", name)
            }
        }
    }

    fn value(&mut self, placeholder: &str, value: &str) {
        self.values
            .insert(placeholder.to_string(), AttributeValue::S(value.to_string()));
    }
}
