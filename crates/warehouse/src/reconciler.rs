//! Keeps the live tables in step with the custom column configuration.

use std::sync::Arc;

use migration::{Migrator, MigratorTrait, SchemaManager};
use sea_orm::{ConnectionTrait, DatabaseConnection};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::{
    Config, CustomColumn, Migration, ResultWarehouse, Schema, Schemas, Table, WarehouseError,
    schema::Column, store,
};

/// A configuration together with the schemas built from it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Catalog {
    pub config: Config,
    pub schemas: Schemas,
}

impl Catalog {
    pub fn new(config: Config) -> ResultWarehouse<Self> {
        let schemas = Schemas::build(&config)?;
        Ok(Self { config, schemas })
    }

    pub fn schema(&self, table: Table) -> &Schema {
        self.schemas.get(table)
    }
}

/// Owner of the data tables and of the catalog describing them.
///
/// Importers take [`Arc<Catalog>`] snapshots; a reconciliation swaps in a
/// new catalog only once every statement of the migration succeeded.
#[derive(Debug)]
pub struct Warehouse {
    db: DatabaseConnection,
    catalog: RwLock<Arc<Catalog>>,
}

impl Warehouse {
    /// Create the control table and any missing data table, then load the
    /// persisted configuration.
    ///
    /// Data tables that already exist are left untouched.
    pub async fn bootstrap(db: DatabaseConnection) -> ResultWarehouse<Self> {
        Migrator::up(&db, None).await?;

        let config = store::load(&db).await?.unwrap_or_default();
        let catalog = Catalog::new(config)?;

        let manager = SchemaManager::new(&db);
        for table in Table::ALL {
            let schema = catalog.schema(table);
            if manager.has_table(schema.sql_name()).await? {
                debug!(table = %table, "data table already exists");
                continue;
            }
            info!(table = %table, "creating data table");
            db.execute_unprepared(&schema.ddl_statement()).await?;
        }

        info!(
            columns = catalog.config.iter().count(),
            "warehouse ready"
        );
        Ok(Self {
            db,
            catalog: RwLock::new(Arc::new(catalog)),
        })
    }

    pub fn database(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Snapshot of the current catalog.
    pub async fn catalog(&self) -> Arc<Catalog> {
        self.catalog.read().await.clone()
    }

    /// Alter the data tables and the control table to match `desired`.
    ///
    /// Returns the applied migration. A column whose type changed is rejected
    /// before any statement runs. On failure mid-way the catalog is reloaded
    /// from the control table, which reflects the columns actually migrated.
    pub async fn reconcile(&self, desired: Config) -> ResultWarehouse<Migration> {
        let mut catalog = self.catalog.write().await;
        let current = catalog.clone();

        for column in desired.iter() {
            if let Some(old) = current.config.find(column.table(), column.name())
                && old.sql_type() != column.sql_type()
            {
                return Err(WarehouseError::InvalidConfig(format!(
                    "{}.{} cannot change type from {} to {}; drop the column first",
                    column.table(),
                    column.name(),
                    old.sql_type(),
                    column.sql_type()
                )));
            }
        }

        let next = Catalog::new(desired)?;
        let migration = current.config.diff(&next.config);

        match self.apply(&current, &next, &migration).await {
            Ok(()) => {
                info!(
                    added = migration.added.values().map(Vec::len).sum::<usize>(),
                    removed = migration.removed.values().map(Vec::len).sum::<usize>(),
                    "reconciliation complete"
                );
                *catalog = Arc::new(next);
                Ok(migration)
            }
            Err(err) => {
                error!(error = %err, "reconciliation failed, schema may be partially migrated");
                match self.reload().await {
                    Ok(reloaded) => *catalog = Arc::new(reloaded),
                    Err(reload_err) => error!(
                        error = %reload_err,
                        "reloading the stored configuration failed, keeping the previous catalog"
                    ),
                }
                Err(err)
            }
        }
    }

    /// Catalog of the configuration currently in the control table.
    async fn reload(&self) -> ResultWarehouse<Catalog> {
        let config = store::load(&self.db).await?.unwrap_or_default();
        Catalog::new(config)
    }

    async fn apply(
        &self,
        current: &Catalog,
        next: &Catalog,
        migration: &Migration,
    ) -> ResultWarehouse<()> {
        for table in Table::ALL {
            let old_schema = current.schema(table);
            for column in migration.removed(table) {
                info!(table = %table, column = column.name(), "dropping column");
                self.db
                    .execute_unprepared(&old_schema.drop_column_statement(column.name()))
                    .await?;
                store::delete(&self.db, column).await?;
            }

            let new_schema = next.schema(table);
            for column in migration.added(table) {
                info!(
                    table = %table,
                    column = column.name(),
                    sql_type = %column.sql_type(),
                    "adding column"
                );
                self.db
                    .execute_unprepared(&new_schema.add_column_statement(&definition(column)))
                    .await?;
                store::insert(&self.db, column).await?;
            }
        }

        for column in next.config.iter() {
            if let Some(old) = current.config.find(column.table(), column.name())
                && old.path() != column.path()
            {
                info!(
                    table = %column.table(),
                    column = column.name(),
                    path = %column.path(),
                    "updating column path"
                );
                store::update(&self.db, column).await?;
            }
        }
        Ok(())
    }
}

fn definition(column: &CustomColumn) -> Column {
    Column {
        name: column.name().to_string(),
        sql_type: column.sql_type(),
    }
}
