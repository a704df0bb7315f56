//! Warehouse side of the ledger importer.
//!
//! The warehouse owns three data tables (`transactions`, `transaction_inputs`
//! and `transaction_outputs`) plus a control table listing operator-declared
//! custom columns. This crate parses and validates that configuration, renders
//! the SQL for the tables it describes, and migrates the live tables when the
//! configuration changes.

pub use config::{ColumnDeclaration, Config, CustomColumn, MAX_COLUMN_NAME, Migration, Table};
pub use error::WarehouseError;
pub use field_path::{FieldPath, PathSource, extract};
pub use reconciler::{Catalog, Warehouse};
pub use schema::{Column, Row, Schema, SchemaBuilder, Schemas};
pub use sql_type::{MAX_VARCHAR_WIDTH, NativeType, SqlType};

mod config;
mod custom_columns;
mod error;
mod field_path;
mod reconciler;
mod schema;
mod sql_type;
pub mod store;
pub mod value;

pub type ResultWarehouse<T> = Result<T, WarehouseError>;
