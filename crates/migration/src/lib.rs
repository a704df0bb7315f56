pub use sea_orm_migration::prelude::*;

mod m20260105_000000_custom_columns;

/// Name of the control table created by the migrator.
pub const CUSTOM_COLUMNS_TABLE: &str = "custom_columns";

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20260105_000000_custom_columns::Migration)]
    }
}
