use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use migration::SchemaManager;
use warehouse::{Config, SqlType, Table, Warehouse, WarehouseError, store};

async fn warehouse() -> (Warehouse, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    let warehouse = Warehouse::bootstrap(db.clone()).await.unwrap();
    (warehouse, db)
}

fn config(raw: &str) -> Config {
    Config::from_json(raw).unwrap()
}

async fn control_rows(db: &DatabaseConnection) -> Vec<(String, String, String, String)> {
    let rows = db
        .query_all(Statement::from_string(
            db.get_database_backend(),
            r#"SELECT "table", "name", "type", "path" FROM custom_columns ORDER BY "table", "name""#,
        ))
        .await
        .unwrap();
    rows.iter()
        .map(|row| {
            (
                row.try_get("", "table").unwrap(),
                row.try_get("", "name").unwrap(),
                row.try_get("", "type").unwrap(),
                row.try_get("", "path").unwrap(),
            )
        })
        .collect()
}

/// `(name, notnull)` of every column of `table`.
async fn live_columns(db: &DatabaseConnection, table: &str) -> Vec<(String, i32)> {
    let rows = db
        .query_all(Statement::from_string(
            db.get_database_backend(),
            format!("SELECT name, \"notnull\" FROM pragma_table_info('{table}')"),
        ))
        .await
        .unwrap();
    rows.iter()
        .map(|row| {
            (
                row.try_get("", "name").unwrap(),
                row.try_get("", "notnull").unwrap(),
            )
        })
        .collect()
}

#[tokio::test]
async fn bootstrap_creates_control_and_data_tables() {
    let (warehouse, db) = warehouse().await;
    let manager = SchemaManager::new(&db);

    assert!(manager.has_table("custom_columns").await.unwrap());
    for table in ["TRANSACTIONS", "TRANSACTION_INPUTS", "TRANSACTION_OUTPUTS"] {
        assert!(manager.has_table(table).await.unwrap(), "{table} missing");
    }
    assert!(warehouse.catalog().await.config.is_empty());

    let outputs = live_columns(&db, "TRANSACTION_OUTPUTS").await;
    assert_eq!(outputs.len(), 18);
    assert_eq!(outputs[2].0, "OUTPUT_ID");
}

#[tokio::test]
async fn load_without_control_table_is_none() {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    assert_eq!(store::load(&db).await.unwrap(), None);
}

#[tokio::test]
async fn added_column_is_recorded_and_nullable() {
    let (warehouse, db) = warehouse().await;

    let migration = warehouse
        .reconcile(config(
            r#"[{"table": "transaction_outputs", "name": "note", "type": "clob", "path": "reference_data.note"}]"#,
        ))
        .await
        .unwrap();
    assert_eq!(migration.added(Table::TransactionOutputs)[0].name(), "note");

    assert_eq!(
        control_rows(&db).await,
        vec![(
            "transaction_outputs".to_string(),
            "note".to_string(),
            "clob".to_string(),
            "reference_data.note".to_string()
        )]
    );
    let columns = live_columns(&db, "TRANSACTION_OUTPUTS").await;
    assert_eq!(columns.last().unwrap(), &("NOTE".to_string(), 0));

    let catalog = warehouse.catalog().await;
    let schema = catalog.schema(Table::TransactionOutputs);
    assert_eq!(schema.columns().last().unwrap().sql_type, SqlType::Clob);
}

#[tokio::test]
async fn removed_column_is_dropped() {
    let (warehouse, db) = warehouse().await;
    warehouse
        .reconcile(config(
            r#"[
                {"table": "transactions", "name": "internal_ref", "type": "varchar(50)", "path": "reference_data.tx_id"},
                {"table": "transactions", "name": "batch", "type": "bigint", "path": "reference_data.batch"}
            ]"#,
        ))
        .await
        .unwrap();

    let migration = warehouse
        .reconcile(config(
            r#"[{"table": "transactions", "name": "internal_ref", "type": "varchar(50)", "path": "reference_data.tx_id"}]"#,
        ))
        .await
        .unwrap();
    assert_eq!(migration.removed(Table::Transactions)[0].name(), "batch");
    assert!(migration.added.is_empty());

    let names: Vec<String> = live_columns(&db, "TRANSACTIONS")
        .await
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert!(names.contains(&"INTERNAL_REF".to_string()));
    assert!(!names.contains(&"BATCH".to_string()));
    assert_eq!(control_rows(&db).await.len(), 1);
}

#[tokio::test]
async fn retyped_column_is_rejected_before_any_change() {
    let (warehouse, db) = warehouse().await;
    warehouse
        .reconcile(config(
            r#"[{"table": "transactions", "name": "ref", "type": "clob", "path": "reference_data.r"}]"#,
        ))
        .await
        .unwrap();

    let err = warehouse
        .reconcile(config(
            r#"[
                {"table": "transactions", "name": "ref", "type": "bigint", "path": "reference_data.r"},
                {"table": "transactions", "name": "other", "type": "clob", "path": ""}
            ]"#,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, WarehouseError::InvalidConfig(_)));

    assert_eq!(control_rows(&db).await.len(), 1);
    let catalog = warehouse.catalog().await;
    assert_eq!(
        catalog.config.find(Table::Transactions, "ref").unwrap().sql_type(),
        SqlType::Clob
    );
    assert!(catalog.config.find(Table::Transactions, "other").is_none());
}

#[tokio::test]
async fn path_change_rewrites_control_row_only() {
    let (warehouse, db) = warehouse().await;
    warehouse
        .reconcile(config(
            r#"[{"table": "transaction_inputs", "name": "region", "type": "varchar(8)", "path": "account_tags.region"}]"#,
        ))
        .await
        .unwrap();
    let before = live_columns(&db, "TRANSACTION_INPUTS").await;

    let migration = warehouse
        .reconcile(config(
            r#"[{"table": "transaction_inputs", "name": "region", "type": "varchar(8)", "path": "reference_data.region"}]"#,
        ))
        .await
        .unwrap();
    assert!(migration.is_empty());
    assert_eq!(live_columns(&db, "TRANSACTION_INPUTS").await, before);
    assert_eq!(control_rows(&db).await[0].3, "reference_data.region");
}

#[tokio::test]
async fn bootstrap_reloads_persisted_configuration() {
    let (warehouse, db) = warehouse().await;
    let desired = config(
        r#"[{"table": "transaction_outputs", "name": "note", "type": "clob", "path": "reference_data.note"}]"#,
    );
    warehouse.reconcile(desired.clone()).await.unwrap();

    let reopened = Warehouse::bootstrap(db.clone()).await.unwrap();
    let catalog = reopened.catalog().await;
    assert_eq!(catalog.config, desired);
    assert_eq!(
        catalog.schema(Table::TransactionOutputs),
        warehouse.catalog().await.schema(Table::TransactionOutputs)
    );
}

fn names(catalog: &warehouse::Catalog, table: Table) -> Vec<String> {
    catalog
        .config
        .columns(table)
        .iter()
        .map(|c| c.name().to_string())
        .collect()
}

#[tokio::test]
async fn failed_add_keeps_catalog_at_applied_columns() {
    let (warehouse, db) = warehouse().await;
    db.execute_unprepared(r#"ALTER TABLE TRANSACTIONS ADD COLUMN "B" CLOB"#)
        .await
        .unwrap();

    let result = warehouse
        .reconcile(config(
            r#"[
                {"table": "transactions", "name": "a", "type": "clob", "path": "reference_data.a"},
                {"table": "transactions", "name": "b", "type": "clob", "path": "reference_data.b"},
                {"table": "transactions", "name": "c", "type": "clob", "path": "reference_data.c"}
            ]"#,
        ))
        .await;
    assert!(matches!(result, Err(WarehouseError::Database(_))));

    let catalog = warehouse.catalog().await;
    assert_eq!(names(&catalog, Table::Transactions), vec!["a"]);
    let stored: Vec<String> = control_rows(&db)
        .await
        .into_iter()
        .map(|(_, name, _, _)| name)
        .collect();
    assert_eq!(stored, vec!["a"]);

    let live: Vec<String> = live_columns(&db, "TRANSACTIONS")
        .await
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert!(live.contains(&"A".to_string()));
    assert!(!live.contains(&"C".to_string()));
}

#[tokio::test]
async fn reload_keeps_configuration_order() {
    let (warehouse, db) = warehouse().await;
    let desired = config(
        r#"[
            {"table": "transactions", "name": "zeta", "type": "clob", "path": "reference_data.z"},
            {"table": "transactions", "name": "alpha", "type": "clob", "path": "reference_data.a"}
        ]"#,
    );
    warehouse.reconcile(desired.clone()).await.unwrap();

    let reopened = Warehouse::bootstrap(db.clone()).await.unwrap();
    let catalog = reopened.catalog().await;
    assert_eq!(catalog.config, desired);
    assert_eq!(names(&catalog, Table::Transactions), vec!["zeta", "alpha"]);
    assert_eq!(
        catalog.schema(Table::Transactions).insert_statement(),
        warehouse
            .catalog()
            .await
            .schema(Table::Transactions)
            .insert_statement()
    );
}

#[tokio::test]
async fn malformed_control_row_is_invalid_config() {
    let (_warehouse, db) = warehouse().await;
    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"INSERT INTO custom_columns ("table", "name", "type", "path") VALUES ('transactions', 'x', 'int', '')"#,
    ))
    .await
    .unwrap();

    assert!(matches!(
        store::load(&db).await,
        Err(WarehouseError::InvalidConfig(_))
    ));
    assert!(matches!(
        Warehouse::bootstrap(db.clone()).await,
        Err(WarehouseError::InvalidConfig(_))
    ));
}
