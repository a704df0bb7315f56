//! Custom column configuration.
//!
//! A [`Config`] is an immutable value: every load or operator update builds a
//! new one, and [`Config::diff`] computes the [`Migration`] between two of them.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{FieldPath, ResultWarehouse, SqlType, WarehouseError, schema};

/// Longest accepted custom column name.
pub const MAX_COLUMN_NAME: usize = 30;

/// One of the three data tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Table {
    Transactions,
    TransactionInputs,
    TransactionOutputs,
}

impl Table {
    pub const ALL: [Table; 3] = [
        Table::Transactions,
        Table::TransactionInputs,
        Table::TransactionOutputs,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transactions => "transactions",
            Self::TransactionInputs => "transaction_inputs",
            Self::TransactionOutputs => "transaction_outputs",
        }
    }
}

impl core::fmt::Display for Table {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Table {
    type Error = WarehouseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "transactions" => Ok(Self::Transactions),
            "transaction_inputs" => Ok(Self::TransactionInputs),
            "transaction_outputs" => Ok(Self::TransactionOutputs),
            other => Err(WarehouseError::InvalidConfig(format!(
                "unknown table: {other}"
            ))),
        }
    }
}

/// An operator-declared column. Identity is `(table, name)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CustomColumn {
    table: Table,
    name: String,
    sql_type: SqlType,
    path: FieldPath,
}

impl CustomColumn {
    /// Build a column; the name is validated and lowercased.
    pub fn new(table: Table, name: &str, sql_type: SqlType, path: FieldPath) -> ResultWarehouse<Self> {
        let name = name.trim();
        let mut chars = name.chars();
        let valid_head = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        if !valid_head
            || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            || name.len() > MAX_COLUMN_NAME
        {
            return Err(WarehouseError::InvalidConfig(format!(
                "invalid column name for {table}: \"{name}\""
            )));
        }
        Ok(Self {
            table,
            name: name.to_ascii_lowercase(),
            sql_type,
            path,
        })
    }

    pub fn table(&self) -> Table {
        self.table
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sql_type(&self) -> SqlType {
        self.sql_type
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }
}

/// Serialized form of a custom column, as found in operator documents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDeclaration {
    pub table: String,
    pub name: String,
    #[serde(rename = "type")]
    pub sql_type: String,
    #[serde(default)]
    pub path: String,
}

impl TryFrom<&ColumnDeclaration> for CustomColumn {
    type Error = WarehouseError;

    fn try_from(decl: &ColumnDeclaration) -> Result<Self, Self::Error> {
        let table = Table::try_from(decl.table.as_str())?;
        let sql_type = SqlType::parse(&decl.sql_type)?;
        let path = FieldPath::parse(&decl.path)?;
        CustomColumn::new(table, &decl.name, sql_type, path)
    }
}

impl From<&CustomColumn> for ColumnDeclaration {
    fn from(column: &CustomColumn) -> Self {
        Self {
            table: column.table.as_str().to_string(),
            name: column.name.clone(),
            sql_type: column.sql_type.canonical(),
            path: column.path.canonical(),
        }
    }
}

/// The custom columns of the three data tables, in configuration order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    transactions: Vec<CustomColumn>,
    inputs: Vec<CustomColumn>,
    outputs: Vec<CustomColumn>,
}

impl Config {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Group `columns` per table, rejecting duplicates and names that shadow
    /// a fixed column.
    pub fn new(columns: impl IntoIterator<Item = CustomColumn>) -> ResultWarehouse<Self> {
        let mut config = Self::default();
        let mut seen: HashSet<(Table, String)> = HashSet::new();

        for column in columns {
            if schema::is_fixed_column(column.table, &column.name) {
                return Err(WarehouseError::InvalidConfig(format!(
                    "{}.{} shadows a built-in column",
                    column.table, column.name
                )));
            }
            if !seen.insert((column.table, column.name.clone())) {
                return Err(WarehouseError::InvalidConfig(format!(
                    "{}.{} is declared twice",
                    column.table, column.name
                )));
            }
            config.list_mut(column.table).push(column);
        }

        Ok(config)
    }

    pub fn from_declarations(declarations: &[ColumnDeclaration]) -> ResultWarehouse<Self> {
        let columns = declarations
            .iter()
            .map(CustomColumn::try_from)
            .collect::<ResultWarehouse<Vec<_>>>()?;
        Self::new(columns)
    }

    /// Parse a JSON array of `{table, name, type, path}` declarations.
    pub fn from_json(raw: &str) -> ResultWarehouse<Self> {
        let declarations: Vec<ColumnDeclaration> = serde_json::from_str(raw)?;
        Self::from_declarations(&declarations)
    }

    pub fn to_declarations(&self) -> Vec<ColumnDeclaration> {
        self.iter().map(ColumnDeclaration::from).collect()
    }

    pub fn columns(&self, table: Table) -> &[CustomColumn] {
        match table {
            Table::Transactions => &self.transactions,
            Table::TransactionInputs => &self.inputs,
            Table::TransactionOutputs => &self.outputs,
        }
    }

    fn list_mut(&mut self, table: Table) -> &mut Vec<CustomColumn> {
        match table {
            Table::Transactions => &mut self.transactions,
            Table::TransactionInputs => &mut self.inputs,
            Table::TransactionOutputs => &mut self.outputs,
        }
    }

    pub fn find(&self, table: Table, name: &str) -> Option<&CustomColumn> {
        self.columns(table).iter().find(|c| c.name == name)
    }

    /// All columns, table by table.
    pub fn iter(&self) -> impl Iterator<Item = &CustomColumn> {
        Table::ALL.into_iter().flat_map(|t| self.columns(t).iter())
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Columns added and removed going from `self` to `next`, keyed by name.
    ///
    /// A column whose name survives but whose type or path changed is in
    /// neither list.
    pub fn diff(&self, next: &Config) -> Migration {
        let mut migration = Migration::default();
        for table in Table::ALL {
            let old = self.columns(table);
            let new = next.columns(table);

            let added: Vec<CustomColumn> = new
                .iter()
                .filter(|c| !old.iter().any(|o| o.name == c.name))
                .cloned()
                .collect();
            let removed: Vec<CustomColumn> = old
                .iter()
                .filter(|c| !new.iter().any(|n| n.name == c.name))
                .cloned()
                .collect();

            if !added.is_empty() {
                migration.added.insert(table, added);
            }
            if !removed.is_empty() {
                migration.removed.insert(table, removed);
            }
        }
        migration
    }
}

/// Per-table column delta between two configurations. Tables without changes
/// have no entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Migration {
    pub added: BTreeMap<Table, Vec<CustomColumn>>,
    pub removed: BTreeMap<Table, Vec<CustomColumn>>,
}

impl Migration {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    pub fn added(&self, table: Table) -> &[CustomColumn] {
        self.added.get(&table).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn removed(&self, table: Table) -> &[CustomColumn] {
        self.removed.get(&table).map(Vec::as_slice).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(table: Table, name: &str, ty: &str, path: &str) -> CustomColumn {
        CustomColumn::new(
            table,
            name,
            SqlType::parse(ty).unwrap(),
            FieldPath::parse(path).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn table_names_are_case_insensitive() {
        assert_eq!(Table::try_from("TRANSACTIONS").unwrap(), Table::Transactions);
        assert_eq!(
            Table::try_from(" Transaction_Outputs ").unwrap(),
            Table::TransactionOutputs
        );
        assert!(Table::try_from("ledger").is_err());
    }

    #[test]
    fn column_names_must_be_identifiers() {
        let path = FieldPath::default();
        assert!(CustomColumn::new(Table::Transactions, "note", SqlType::Clob, path.clone()).is_ok());
        assert!(CustomColumn::new(Table::Transactions, "_n2", SqlType::Clob, path.clone()).is_ok());
        for bad in ["", "2x", "a-b", "a b", "x\"; DROP", "a_very_long_column_name_over_30"] {
            assert!(
                CustomColumn::new(Table::Transactions, bad, SqlType::Clob, path.clone()).is_err(),
                "{bad} should be rejected"
            );
        }
        let upper = CustomColumn::new(Table::Transactions, "Internal_Ref", SqlType::Clob, path).unwrap();
        assert_eq!(upper.name(), "internal_ref");
    }

    #[test]
    fn config_rejects_duplicates_and_builtin_names() {
        let dup = Config::new([
            column(Table::Transactions, "a", "clob", ""),
            column(Table::Transactions, "A", "bigint", ""),
        ]);
        assert!(matches!(dup, Err(WarehouseError::InvalidConfig(_))));

        let shadow = Config::new([column(Table::TransactionOutputs, "spent", "boolean", "")]);
        assert!(matches!(shadow, Err(WarehouseError::InvalidConfig(_))));

        let same_name_other_table = Config::new([
            column(Table::Transactions, "note", "clob", ""),
            column(Table::TransactionOutputs, "note", "clob", ""),
        ]);
        assert!(same_name_other_table.is_ok());
    }

    #[test]
    fn json_declarations_round_trip() {
        let raw = r#"[
            {"table": "transactions", "name": "internal_ref", "type": "varchar(50)", "path": "reference_data.tx_id"},
            {"table": "TRANSACTION_OUTPUTS", "name": "note", "type": "CLOB", "path": "reference_data.note"}
        ]"#;
        let config = Config::from_json(raw).unwrap();
        assert_eq!(config.columns(Table::Transactions).len(), 1);
        assert_eq!(config.columns(Table::TransactionOutputs)[0].sql_type(), SqlType::Clob);

        let declarations = config.to_declarations();
        assert_eq!(declarations[1].table, "transaction_outputs");
        assert_eq!(declarations[1].sql_type, "clob");
        assert_eq!(Config::from_declarations(&declarations).unwrap(), config);
    }

    #[test]
    fn json_declarations_reject_bad_types() {
        let raw = r#"[{"table": "transactions", "name": "x", "type": "varchar(5000)", "path": ""}]"#;
        assert!(matches!(Config::from_json(raw), Err(WarehouseError::InvalidType(_))));
    }

    #[test]
    fn diff_of_identical_configs_is_empty() {
        let config = Config::new([
            column(Table::Transactions, "a", "clob", "reference_data.a"),
            column(Table::TransactionInputs, "b", "bigint", "reference_data.b"),
        ])
        .unwrap();
        assert_eq!(config.diff(&config), Migration::default());
        assert!(Config::empty().diff(&Config::empty()).is_empty());
    }

    #[test]
    fn diff_reports_added_and_removed_per_table() {
        let old = Config::new([
            column(Table::Transactions, "keep", "clob", ""),
            column(Table::Transactions, "gone", "clob", ""),
        ])
        .unwrap();
        let new = Config::new([
            column(Table::Transactions, "keep", "clob", ""),
            column(Table::TransactionOutputs, "note", "clob", "reference_data.note"),
        ])
        .unwrap();

        let migration = old.diff(&new);
        assert_eq!(migration.removed(Table::Transactions)[0].name(), "gone");
        assert_eq!(migration.added(Table::TransactionOutputs)[0].name(), "note");
        assert!(migration.added(Table::Transactions).is_empty());
        assert!(!migration.added.contains_key(&Table::TransactionInputs));
    }

    #[test]
    fn diff_ignores_type_changes() {
        let old = Config::new([column(Table::Transactions, "x", "clob", "")]).unwrap();
        let new = Config::new([column(Table::Transactions, "x", "bigint", "")]).unwrap();
        assert!(old.diff(&new).is_empty());
    }
}
