//! SQL type catalog.
//!
//! Custom columns declare their type with a small grammar: a lowercase head
//! token with an optional single parenthesized argument. Only `varchar` takes
//! (and requires) an argument, its width.
//!
//! | grammar        | DDL            | native tag  |
//! |----------------|----------------|-------------|
//! | `bigint`       | `NUMBER(20)`   | `Number`    |
//! | `blob`         | `BLOB`         | `Blob`      |
//! | `boolean`      | `CHAR(1)`      | `Char`      |
//! | `clob`         | `CLOB`         | `Clob`      |
//! | `timestamp`    | `TIMESTAMP`    | `Timestamp` |
//! | `varchar(n)`   | `VARCHAR2(n)`  | `Varchar`   |

use std::str::FromStr;

use sea_orm::Value;

use crate::{ResultWarehouse, WarehouseError};

/// Largest width accepted by `varchar(n)`.
pub const MAX_VARCHAR_WIDTH: u16 = 4000;

/// Column type of a warehouse column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SqlType {
    BigInteger,
    Blob,
    Boolean,
    Clob,
    Timestamp,
    /// Width is always in `1..=MAX_VARCHAR_WIDTH`.
    Varchar(u16),
}

/// Driver-level type tag used when binding parameters, so the value handed
/// to the driver has the same shape as the column DDL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NativeType {
    Number,
    Blob,
    Char,
    Clob,
    Timestamp,
    Varchar,
}

impl NativeType {
    /// A typed SQL `NULL` for this tag.
    pub fn null_value(self) -> Value {
        match self {
            Self::Number => Value::BigInt(None),
            Self::Blob => Value::Bytes(None),
            Self::Char | Self::Clob | Self::Varchar => Value::String(None),
            Self::Timestamp => Value::ChronoDateTimeUtc(None),
        }
    }
}

impl SqlType {
    /// Parse a type string. Head token and argument are normalized, so
    /// `VARCHAR( 020 )` parses as `varchar(20)`.
    pub fn parse(raw: &str) -> ResultWarehouse<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        let invalid = || WarehouseError::InvalidType(raw.to_string());

        let (head, argument) = match normalized.split_once('(') {
            None => (normalized.as_str(), None),
            Some((head, rest)) => {
                let inner = rest.strip_suffix(')').ok_or_else(invalid)?;
                if inner.contains(['(', ')']) {
                    return Err(invalid());
                }
                (head.trim_end(), Some(inner.trim()))
            }
        };

        match (head, argument) {
            ("bigint", None) => Ok(Self::BigInteger),
            ("blob", None) => Ok(Self::Blob),
            ("boolean", None) => Ok(Self::Boolean),
            ("clob", None) => Ok(Self::Clob),
            ("timestamp", None) => Ok(Self::Timestamp),
            ("varchar", Some(width)) => {
                if width.is_empty() || !width.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }
                let width: u16 = width.parse().map_err(|_| invalid())?;
                Self::varchar(width).map_err(|_| invalid())
            }
            _ => Err(invalid()),
        }
    }

    /// Build a `varchar(width)`, checking the width bounds.
    pub fn varchar(width: u16) -> ResultWarehouse<Self> {
        if width == 0 || width > MAX_VARCHAR_WIDTH {
            return Err(WarehouseError::InvalidType(format!(
                "varchar width must be in 1..={MAX_VARCHAR_WIDTH}, got {width}"
            )));
        }
        Ok(Self::Varchar(width))
    }

    /// Canonical grammar form; `parse(t.canonical())` returns `t`.
    pub fn canonical(self) -> String {
        match self {
            Self::BigInteger => "bigint".to_string(),
            Self::Blob => "blob".to_string(),
            Self::Boolean => "boolean".to_string(),
            Self::Clob => "clob".to_string(),
            Self::Timestamp => "timestamp".to_string(),
            Self::Varchar(width) => format!("varchar({width})"),
        }
    }

    /// Column type fragment used in `CREATE TABLE` and `ALTER TABLE ... ADD`.
    pub fn ddl(self) -> String {
        match self {
            Self::BigInteger => "NUMBER(20)".to_string(),
            Self::Blob => "BLOB".to_string(),
            Self::Boolean => "CHAR(1)".to_string(),
            Self::Clob => "CLOB".to_string(),
            Self::Timestamp => "TIMESTAMP".to_string(),
            Self::Varchar(width) => format!("VARCHAR2({width})"),
        }
    }

    pub fn native_type(self) -> NativeType {
        match self {
            Self::BigInteger => NativeType::Number,
            Self::Blob => NativeType::Blob,
            Self::Boolean => NativeType::Char,
            Self::Clob => NativeType::Clob,
            Self::Timestamp => NativeType::Timestamp,
            Self::Varchar(_) => NativeType::Varchar,
        }
    }
}

impl core::fmt::Display for SqlType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl FromStr for SqlType {
    type Err = WarehouseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_round_trips() {
        for raw in [
            "bigint",
            "blob",
            "boolean",
            "clob",
            "timestamp",
            "varchar(1)",
            "varchar(64)",
            "varchar(4000)",
        ] {
            let parsed = SqlType::parse(raw).unwrap();
            assert_eq!(parsed.canonical(), raw);
            assert_eq!(SqlType::parse(&parsed.canonical()).unwrap(), parsed);
        }
    }

    #[test]
    fn parse_normalizes_case_and_argument() {
        assert_eq!(SqlType::parse("BIGINT").unwrap(), SqlType::BigInteger);
        assert_eq!(
            SqlType::parse(" VarChar( 020 ) ").unwrap(),
            SqlType::Varchar(20)
        );
        assert_eq!("clob".parse::<SqlType>().unwrap(), SqlType::Clob);
    }

    #[test]
    fn parse_rejects_invalid_strings() {
        for raw in [
            "",
            "int",
            "bigint(10)",
            "boolean()",
            "varchar",
            "varchar()",
            "varchar(0)",
            "varchar(4001)",
            "varchar(-1)",
            "varchar(+5)",
            "varchar(ten)",
            "varchar(10",
            "varchar((10))",
            "varchar(10)(20)",
            "varchar(10) x",
            "varchar(99999999)",
        ] {
            assert!(SqlType::parse(raw).is_err(), "{raw} should not parse");
        }
    }

    #[test]
    fn ddl_fragments() {
        assert_eq!(SqlType::BigInteger.ddl(), "NUMBER(20)");
        assert_eq!(SqlType::Boolean.ddl(), "CHAR(1)");
        assert_eq!(SqlType::Varchar(50).ddl(), "VARCHAR2(50)");
        assert_eq!(SqlType::Timestamp.ddl(), "TIMESTAMP");
    }

    #[test]
    fn native_tags_follow_ddl() {
        assert_eq!(SqlType::Boolean.native_type(), NativeType::Char);
        assert_eq!(SqlType::Varchar(8).native_type(), NativeType::Varchar);
        assert_eq!(NativeType::Number.null_value(), Value::BigInt(None));
    }

    #[test]
    fn varchar_width_bounds() {
        assert!(SqlType::varchar(0).is_err());
        assert!(SqlType::varchar(MAX_VARCHAR_WIDTH + 1).is_err());
        assert_eq!(SqlType::varchar(4000).unwrap(), SqlType::Varchar(4000));
    }
}
