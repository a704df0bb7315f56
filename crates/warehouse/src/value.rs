//! Conversion of extracted JSON values into bind parameters.
//!
//! Coercion follows the column's [`NativeType`], so a `bigint` column always
//! receives an integer parameter and a `boolean` column a `'1'`/`'0'` char.
//! Missing values bind as a typed `NULL`.

use chrono::{DateTime, Utc};
use ledger_types::JsonObject;
use sea_orm::Value;
use serde_json::Value as Json;

use crate::{NativeType, ResultWarehouse, SqlType, WarehouseError};

/// Stored form of `true` in a `CHAR(1)` boolean column.
pub const TRUE_FLAG: &str = "1";
/// Stored form of `false` in a `CHAR(1)` boolean column.
pub const FALSE_FLAG: &str = "0";

/// Bind parameter for a boolean column.
pub fn flag(value: bool) -> Value {
    Value::from(if value { TRUE_FLAG } else { FALSE_FLAG })
}

/// Bind parameter for a JSON payload stored in a `BLOB` column.
pub fn json_blob(object: &JsonObject) -> ResultWarehouse<Value> {
    Ok(Value::from(serde_json::to_vec(object)?))
}

/// Coerce an extracted value into a parameter for `column` of type `sql_type`.
pub fn coerce(column: &str, sql_type: SqlType, value: Option<&Json>) -> ResultWarehouse<Value> {
    let native = sql_type.native_type();
    let value = match value {
        None | Some(Json::Null) => return Ok(native.null_value()),
        Some(value) => value,
    };

    match native {
        NativeType::Number => number(column, value),
        NativeType::Char => boolean(column, value),
        NativeType::Timestamp => timestamp(column, value),
        NativeType::Blob => Ok(match value {
            Json::String(text) => Value::from(text.clone().into_bytes()),
            other => Value::from(serde_json::to_vec(other)?),
        }),
        NativeType::Clob => Ok(Value::from(text(value)?)),
        NativeType::Varchar => {
            let text = text(value)?;
            if let SqlType::Varchar(width) = sql_type {
                let len = text.chars().count();
                if len > usize::from(width) {
                    return Err(WarehouseError::bind(
                        column,
                        format!("{len} characters exceed varchar({width})"),
                    ));
                }
            }
            Ok(Value::from(text))
        }
    }
}

fn text(value: &Json) -> ResultWarehouse<String> {
    Ok(match value {
        Json::String(text) => text.clone(),
        Json::Bool(_) | Json::Number(_) => value.to_string(),
        other => serde_json::to_string(other)?,
    })
}

fn number(column: &str, value: &Json) -> ResultWarehouse<Value> {
    let parsed = match value {
        Json::Number(number) => number.as_i64(),
        Json::String(text) => text.trim().parse::<i64>().ok(),
        Json::Bool(flag) => Some(i64::from(*flag)),
        _ => None,
    };
    parsed
        .map(Value::from)
        .ok_or_else(|| WarehouseError::bind(column, format!("{value} is not a 64-bit integer")))
}

fn boolean(column: &str, value: &Json) -> ResultWarehouse<Value> {
    let parsed = match value {
        Json::Bool(flag) => Some(*flag),
        Json::Number(number) => match number.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Json::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    };
    parsed
        .map(flag)
        .ok_or_else(|| WarehouseError::bind(column, format!("{value} is not a boolean")))
}

fn timestamp(column: &str, value: &Json) -> ResultWarehouse<Value> {
    let parsed = match value {
        Json::String(text) => DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|ts| ts.with_timezone(&Utc)),
        Json::Number(number) => number
            .as_i64()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
        _ => None,
    };
    parsed
        .map(Value::from)
        .ok_or_else(|| WarehouseError::bind(column, format!("{value} is not a timestamp")))
}
