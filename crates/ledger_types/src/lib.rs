//! Wire types exchanged with the ledger's transaction feed API.
//!
//! Field names follow the ledger's JSON (snake_case). Nested payloads such as
//! `reference_data` or `account_tags` are free-form JSON objects; a missing or
//! `null` payload deserializes to an empty object.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Free-form JSON object carried by ledger records.
pub type JsonObject = Map<String, Value>;

pub mod transaction {
    use chrono::{DateTime, Utc};

    use super::*;

    /// A ledger transaction as returned by `list-transactions`.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct Transaction {
        pub id: String,
        pub block_height: i64,
        pub timestamp: DateTime<Utc>,
        pub position: i64,
        #[serde(default, deserialize_with = "flag")]
        pub is_local: bool,
        #[serde(default, deserialize_with = "object")]
        pub reference_data: JsonObject,
        #[serde(default)]
        pub inputs: Vec<TransactionInput>,
        #[serde(default)]
        pub outputs: Vec<TransactionOutput>,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct TransactionInput {
        /// `issue` or `spend`.
        #[serde(rename = "type")]
        pub kind: String,
        pub asset_id: String,
        #[serde(default)]
        pub asset_alias: Option<String>,
        #[serde(default, deserialize_with = "object")]
        pub asset_definition: JsonObject,
        #[serde(default, deserialize_with = "object")]
        pub asset_tags: JsonObject,
        #[serde(default, deserialize_with = "flag")]
        pub asset_is_local: bool,
        pub amount: i64,
        #[serde(default)]
        pub account_id: Option<String>,
        #[serde(default)]
        pub account_alias: Option<String>,
        #[serde(default, deserialize_with = "object")]
        pub account_tags: JsonObject,
        /// Hex encoded, only present on issuances.
        #[serde(default)]
        pub issuance_program: Option<String>,
        #[serde(default, deserialize_with = "object")]
        pub reference_data: JsonObject,
        #[serde(default, deserialize_with = "flag")]
        pub is_local: bool,
        /// Output consumed by this input, only present on spends.
        #[serde(default)]
        pub spent_output_id: Option<String>,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct TransactionOutput {
        pub id: String,
        /// `control` or `retire`.
        #[serde(rename = "type")]
        pub kind: String,
        /// `receive` or `change`, only known for local accounts.
        #[serde(default)]
        pub purpose: Option<String>,
        pub asset_id: String,
        #[serde(default)]
        pub asset_alias: Option<String>,
        #[serde(default, deserialize_with = "object")]
        pub asset_definition: JsonObject,
        #[serde(default, deserialize_with = "object")]
        pub asset_tags: JsonObject,
        #[serde(default, deserialize_with = "flag")]
        pub asset_is_local: bool,
        pub amount: i64,
        #[serde(default)]
        pub account_id: Option<String>,
        #[serde(default)]
        pub account_alias: Option<String>,
        #[serde(default, deserialize_with = "object")]
        pub account_tags: JsonObject,
        /// Hex encoded.
        #[serde(default)]
        pub control_program: String,
        #[serde(default, deserialize_with = "object")]
        pub reference_data: JsonObject,
        #[serde(default, deserialize_with = "flag")]
        pub is_local: bool,
    }
}

pub mod feed {
    use uuid::Uuid;

    use super::*;
    use crate::transaction::Transaction;

    /// A transaction feed: a filter plus the cursor of the last acknowledged page.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Feed {
        pub id: String,
        #[serde(default)]
        pub alias: String,
        #[serde(default)]
        pub filter: String,
        #[serde(default)]
        pub after: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct FeedCreate {
        pub alias: String,
        pub filter: String,
        /// Makes retried create requests idempotent on the ledger side.
        pub client_token: Uuid,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct FeedGet {
        pub alias: String,
    }

    /// Cursor advance. The ledger rejects it unless `previous_after` still
    /// matches the stored cursor.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct FeedUpdate {
        pub id: String,
        pub previous_after: String,
        pub after: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionQuery {
        pub filter: String,
        pub after: String,
        /// Long-poll wait in milliseconds.
        pub timeout: u64,
        pub ascending_with_long_poll: bool,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct TransactionPage {
        #[serde(default)]
        pub items: Vec<Transaction>,
        pub next: PageNext,
        #[serde(default)]
        pub last_page: bool,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct PageNext {
        #[serde(default)]
        pub after: String,
    }

    /// Error body returned by the ledger on non-2xx responses.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct ErrorBody {
        #[serde(default)]
        pub code: String,
        #[serde(default)]
        pub message: String,
    }
}

/// The ledger reports booleans either as JSON booleans or as `"yes"`/`"no"`.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(value)) => Ok(value),
        Some(Value::String(value)) => match value.as_str() {
            "yes" | "true" => Ok(true),
            "no" | "false" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!("invalid flag: {other}"))),
        },
        Some(other) => Err(serde::de::Error::custom(format!("invalid flag: {other}"))),
    }
}

fn object<'de, D>(deserializer: D) -> Result<JsonObject, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<JsonObject>::deserialize(deserializer)?.unwrap_or_default())
}
