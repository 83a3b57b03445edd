//! Opaque continuation cursor.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use super::StoreError;

/// Marks where a truncated query or scan left off.
///
/// The wrapped string is the store's last-evaluated key encoded as a JSON
/// object of attribute name to string value (every key attribute in the
/// schema is a string). It is safe to persist and hand back later to resume.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageToken(String);

impl PageToken {
    /// Encode a last-evaluated key.
    pub fn from_key(key: &BTreeMap<String, String>) -> Self {
        let object = key
            .iter()
            .map(|(name, value)| (name.clone(), Value::String(value.clone())))
            .collect();
        Self(Value::Object(object).to_string())
    }

    /// Decode back into the last-evaluated key.
    pub fn key(&self) -> Result<BTreeMap<String, String>, StoreError> {
        serde_json::from_str(&self.0)
            .map_err(|e| StoreError::Configuration(format!("Invalid page token: {}", e)))
    }

    /// Key attribute from the decoded token.
    pub fn attribute(&self, name: &str) -> Result<String, StoreError> {
        self.key()?.remove(name).ok_or_else(|| {
            StoreError::Configuration(format!("Page token is missing attribute {}", name))
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for PageToken {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
