//! The module contains the errors the warehouse can throw.
//!
//! Everything except [`Database`] and [`Bind`] is a configuration problem and
//! is fatal at startup: the importer refuses to run with a schema it does not
//! fully understand.
//!
//!  [`Database`]: WarehouseError::Database
//!  [`Bind`]: WarehouseError::Bind
use sea_orm::DbErr;
use thiserror::Error;

/// Warehouse custom errors.
#[derive(Error, Debug)]
pub enum WarehouseError {
    #[error("Invalid SQL type: {0}")]
    InvalidType(String),
    #[error("Invalid field path: {0}")]
    InvalidPath(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Cannot bind column \"{column}\": {reason}")]
    Bind { column: String, reason: String },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl WarehouseError {
    pub(crate) fn bind(column: &str, reason: impl Into<String>) -> Self {
        Self::Bind {
            column: column.to_string(),
            reason: reason.into(),
        }
    }
}

impl PartialEq for WarehouseError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidType(a), Self::InvalidType(b)) => a == b,
            (Self::InvalidPath(a), Self::InvalidPath(b)) => a == b,
            (Self::InvalidConfig(a), Self::InvalidConfig(b)) => a == b,
            (
                Self::Bind {
                    column: a,
                    reason: ra,
                },
                Self::Bind {
                    column: b,
                    reason: rb,
                },
            ) => a == b && ra == rb,
            (Self::Json(a), Self::Json(b)) => a.to_string() == b.to_string(),
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
