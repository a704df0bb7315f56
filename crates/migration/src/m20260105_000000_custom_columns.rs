//! Control table holding the operator-declared custom columns.
//!
//! One row per column: the target data table, the column name, the canonical
//! SQL type string and the dotted field path its values are extracted from.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum CustomColumns {
    Table,
    #[iden = "table"]
    TableName,
    Name,
    #[iden = "type"]
    ColumnType,
    Path,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CustomColumns::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CustomColumns::TableName)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(CustomColumns::Name).string_len(64).not_null())
                    .col(
                        ColumnDef::new(CustomColumns::ColumnType)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CustomColumns::Path)
                            .string_len(4000)
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(CustomColumns::TableName)
                            .col(CustomColumns::Name),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CustomColumns::Table).to_owned())
            .await
    }
}
