//! Insert parameters for the three data tables.
//!
//! Every builder fills the fixed columns from the ledger record, then each
//! custom column of the table with the value found at its path, coerced to
//! the column's declared type.

use ledger_types::transaction::{Transaction, TransactionInput, TransactionOutput};
use sea_orm::Value;
use warehouse::{
    Catalog, PathSource, Row, Table, extract,
    value::{coerce, flag, json_blob},
};

use crate::ResultImport;

pub(crate) fn transaction(catalog: &Catalog, tx: &Transaction) -> ResultImport<Vec<Value>> {
    let mut row = catalog.schema(Table::Transactions).row();
    row.set("id", tx.id.as_str())?
        .set("block_height", tx.block_height)?
        .set("timestamp", tx.timestamp)?
        .set("position", tx.position)?
        .set("local", flag(tx.is_local))?
        .set("reference_data", json_blob(&tx.reference_data)?)?
        .set("data", serde_json::to_vec(tx).map_err(warehouse::WarehouseError::from)?)?;
    custom_columns(&mut row, catalog, Table::Transactions, tx)?;
    Ok(row.into_values())
}

pub(crate) fn input(
    catalog: &Catalog,
    tx: &Transaction,
    index: usize,
    input: &TransactionInput,
) -> ResultImport<Vec<Value>> {
    let mut row = catalog.schema(Table::TransactionInputs).row();
    row.set("transaction_id", tx.id.as_str())?
        .set("index", index as i64)?
        .set("type", input.kind.as_str())?
        .set("asset_id", input.asset_id.as_str())?
        .set("asset_alias", input.asset_alias.clone())?
        .set("asset_definition", json_blob(&input.asset_definition)?)?
        .set("asset_tags", json_blob(&input.asset_tags)?)?
        .set("asset_local", flag(input.asset_is_local))?
        .set("amount", input.amount)?
        .set("account_id", input.account_id.clone())?
        .set("account_alias", input.account_alias.clone())?
        .set("account_tags", json_blob(&input.account_tags)?)?
        .set("issuance_program", input.issuance_program.clone())?
        .set("reference_data", json_blob(&input.reference_data)?)?
        .set("local", flag(input.is_local))?
        .set("spent_output_id", input.spent_output_id.clone())?;
    custom_columns(&mut row, catalog, Table::TransactionInputs, input)?;
    Ok(row.into_values())
}

pub(crate) fn output(
    catalog: &Catalog,
    tx: &Transaction,
    index: usize,
    output: &TransactionOutput,
) -> ResultImport<Vec<Value>> {
    let mut row = catalog.schema(Table::TransactionOutputs).row();
    row.set("transaction_id", tx.id.as_str())?
        .set("index", index as i64)?
        .set("output_id", output.id.as_str())?
        .set("type", output.kind.as_str())?
        .set("purpose", output.purpose.clone())?
        .set("asset_id", output.asset_id.as_str())?
        .set("asset_alias", output.asset_alias.clone())?
        .set("asset_definition", json_blob(&output.asset_definition)?)?
        .set("asset_tags", json_blob(&output.asset_tags)?)?
        .set("asset_local", flag(output.asset_is_local))?
        .set("amount", output.amount)?
        .set("account_id", output.account_id.clone())?
        .set("account_alias", output.account_alias.clone())?
        .set("account_tags", json_blob(&output.account_tags)?)?
        .set("control_program", output.control_program.as_str())?
        .set("reference_data", json_blob(&output.reference_data)?)?
        .set("local", flag(output.is_local))?
        .set("spent", flag(false))?;
    custom_columns(&mut row, catalog, Table::TransactionOutputs, output)?;
    Ok(row.into_values())
}

fn custom_columns<R: PathSource>(
    row: &mut Row<'_>,
    catalog: &Catalog,
    table: Table,
    record: &R,
) -> ResultImport<()> {
    for column in catalog.config.columns(table) {
        let value = extract(record, column.path());
        row.set(
            column.name(),
            coerce(column.name(), column.sql_type(), value.as_ref())?,
        )?;
    }
    Ok(())
}
