//! Persistence of the custom column configuration in the control table.

use migration::{CUSTOM_COLUMNS_TABLE, SchemaManager};
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryOrder,
    sea_query::Expr,
};
use tracing::debug;

use crate::{Config, CustomColumn, ResultWarehouse, WarehouseError, custom_columns};

/// Read the configuration stored in the control table.
///
/// `None` when the control table does not exist yet. Rows come back in
/// insertion order, which is the order the columns were appended to the live
/// tables; a row that does not parse is an `InvalidConfig`.
pub async fn load(db: &DatabaseConnection) -> ResultWarehouse<Option<Config>> {
    if !SchemaManager::new(db).has_table(CUSTOM_COLUMNS_TABLE).await? {
        return Ok(None);
    }

    let models = custom_columns::Entity::find()
        .order_by_asc(Expr::cust("rowid"))
        .all(db)
        .await?;
    debug!(rows = models.len(), "loaded custom column configuration");

    let columns = models
        .into_iter()
        .map(|model| {
            let key = format!("{}.{}", model.data_table, model.name);
            CustomColumn::try_from(model).map_err(|err| {
                WarehouseError::InvalidConfig(format!("control row {key}: {err}"))
            })
        })
        .collect::<ResultWarehouse<Vec<_>>>()?;
    Config::new(columns).map(Some)
}

pub(crate) async fn insert<C: ConnectionTrait>(db: &C, column: &CustomColumn) -> ResultWarehouse<()> {
    custom_columns::Entity::insert(custom_columns::ActiveModel::from(column))
        .exec(db)
        .await?;
    Ok(())
}

pub(crate) async fn delete<C: ConnectionTrait>(db: &C, column: &CustomColumn) -> ResultWarehouse<()> {
    custom_columns::Entity::delete_by_id(custom_columns::key(column.table(), column.name()))
        .exec(db)
        .await?;
    Ok(())
}

/// Rewrite the stored type and path of an existing column.
pub(crate) async fn update<C: ConnectionTrait>(db: &C, column: &CustomColumn) -> ResultWarehouse<()> {
    custom_columns::ActiveModel::from(column).update(db).await?;
    Ok(())
}
