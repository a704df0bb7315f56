//! The module contains the errors the importer can throw.
use sea_orm::DbErr;
use thiserror::Error;
use warehouse::WarehouseError;

/// Errors returned by the ledger's feed API.
#[derive(Error, Debug)]
pub enum FeedError {
    /// The long-poll wait expired without a matching transaction.
    #[error("Request timed out")]
    Timeout,
    #[error("Feed already exists: {0}")]
    AlreadyExists(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Request rejected: {0}")]
    Rejected(String),
    #[error("Server error {status} {code}: {message}")]
    Server {
        status: u16,
        code: String,
        message: String,
    },
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Importer custom errors.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error(transparent)]
    Warehouse(#[from] WarehouseError),
    #[error(transparent)]
    Database(#[from] DbErr),
}
