//! Rows of the `custom_columns` control table.

use sea_orm::entity::{ActiveValue, prelude::*};

use crate::{CustomColumn, ResultWarehouse, Table, config::ColumnDeclaration};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "custom_columns")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_name = "table")]
    pub data_table: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub name: String,
    #[sea_orm(column_name = "type")]
    pub column_type: String,
    pub path: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&CustomColumn> for ActiveModel {
    fn from(value: &CustomColumn) -> Self {
        Self {
            data_table: ActiveValue::Set(value.table().as_str().to_string()),
            name: ActiveValue::Set(value.name().to_string()),
            column_type: ActiveValue::Set(value.sql_type().canonical()),
            path: ActiveValue::Set(value.path().canonical()),
        }
    }
}

impl TryFrom<Model> for CustomColumn {
    type Error = crate::WarehouseError;

    fn try_from(model: Model) -> ResultWarehouse<Self> {
        CustomColumn::try_from(&ColumnDeclaration {
            table: model.data_table,
            name: model.name,
            sql_type: model.column_type,
            path: model.path,
        })
    }
}

/// Primary key of the control row of `column`.
pub(crate) fn key(table: Table, name: &str) -> (String, String) {
    (table.as_str().to_string(), name.to_string())
}
