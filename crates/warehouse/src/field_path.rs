//! Dotted field paths into ledger records.
//!
//! The first segment names a top-level JSON payload of the record (see
//! [`PathSource`]); the remaining segments walk nested JSON objects. Shape
//! mismatches never fail: they simply yield no value.

use std::str::FromStr;

use ledger_types::{
    JsonObject,
    transaction::{Transaction, TransactionInput, TransactionOutput},
};
use serde::Serialize;
use serde_json::Value;

use crate::{ResultWarehouse, WarehouseError};

/// Ordered path segments, e.g. `reference_data.account.id`.
///
/// The empty path denotes the whole record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn new(segments: Vec<String>) -> ResultWarehouse<Self> {
        if segments.iter().any(|s| s.trim().is_empty()) {
            return Err(WarehouseError::InvalidPath(format!(
                "empty segment in {}",
                segments.join(".")
            )));
        }
        Ok(Self(segments))
    }

    /// Parse a dotted path. The empty string is the empty path.
    pub fn parse(raw: &str) -> ResultWarehouse<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Self::default());
        }
        Self::new(raw.split('.').map(str::to_string).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Dotted form; parses back to the same path.
    pub fn canonical(&self) -> String {
        self.0.join(".")
    }
}

impl core::fmt::Display for FieldPath {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl FromStr for FieldPath {
    type Err = WarehouseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A record that custom column values can be extracted from.
pub trait PathSource: Serialize {
    /// Resolve the first path segment to one of the record's JSON payloads.
    fn field(&self, name: &str) -> Option<&JsonObject>;
}

impl PathSource for Transaction {
    fn field(&self, name: &str) -> Option<&JsonObject> {
        match name {
            "reference_data" | "referenceData" => Some(&self.reference_data),
            _ => None,
        }
    }
}

impl PathSource for TransactionInput {
    fn field(&self, name: &str) -> Option<&JsonObject> {
        match name {
            "reference_data" | "referenceData" => Some(&self.reference_data),
            "account_tags" | "accountTags" => Some(&self.account_tags),
            "asset_definition" | "assetDefinition" => Some(&self.asset_definition),
            "asset_tags" | "assetTags" => Some(&self.asset_tags),
            _ => None,
        }
    }
}

impl PathSource for TransactionOutput {
    fn field(&self, name: &str) -> Option<&JsonObject> {
        match name {
            "reference_data" | "referenceData" => Some(&self.reference_data),
            "account_tags" | "accountTags" => Some(&self.account_tags),
            "asset_definition" | "assetDefinition" => Some(&self.asset_definition),
            "asset_tags" | "assetTags" => Some(&self.asset_tags),
            _ => None,
        }
    }
}

/// Extract the value at `path`, or `None` when anything along the way is
/// absent, `null` or not an object.
pub fn extract<R: PathSource>(record: &R, path: &FieldPath) -> Option<Value> {
    let Some((head, rest)) = path.segments().split_first() else {
        return serde_json::to_value(record).ok();
    };
    let root = record.field(head)?;
    let Some((last, middle)) = rest.split_last() else {
        return Some(Value::Object(root.clone()));
    };

    let mut current = root;
    for segment in middle {
        current = current.get(segment)?.as_object()?;
    }
    current.get(last).filter(|value| !value.is_null()).cloned()
}
