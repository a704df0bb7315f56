//! Data table schemas and the SQL rendered from them.
//!
//! A [`Schema`] is built once per [`Config`]: the fixed columns of the table,
//! then the configured custom columns in configuration order. Identifiers are
//! uppercased; column names are also double-quoted since several of them
//! (`INDEX`, `TYPE`, `TIMESTAMP`) are reserved words.

use sea_orm::Value;

use crate::{Config, CustomColumn, ResultWarehouse, SqlType, Table, WarehouseError};

const ID: SqlType = SqlType::Varchar(64);
const ALIAS: SqlType = SqlType::Varchar(255);

const TRANSACTION_COLUMNS: &[(&str, SqlType)] = &[
    ("id", ID),
    ("block_height", SqlType::BigInteger),
    ("timestamp", SqlType::Timestamp),
    ("position", SqlType::BigInteger),
    ("local", SqlType::Boolean),
    ("reference_data", SqlType::Blob),
    ("data", SqlType::Blob),
];

const INPUT_COLUMNS: &[(&str, SqlType)] = &[
    ("transaction_id", ID),
    ("index", SqlType::BigInteger),
    ("type", ID),
    ("asset_id", ID),
    ("asset_alias", ALIAS),
    ("asset_definition", SqlType::Blob),
    ("asset_tags", SqlType::Blob),
    ("asset_local", SqlType::Boolean),
    ("amount", SqlType::BigInteger),
    ("account_id", ID),
    ("account_alias", ALIAS),
    ("account_tags", SqlType::Blob),
    ("issuance_program", SqlType::Clob),
    ("reference_data", SqlType::Blob),
    ("local", SqlType::Boolean),
    ("spent_output_id", ID),
];

const OUTPUT_COLUMNS: &[(&str, SqlType)] = &[
    ("transaction_id", ID),
    ("index", SqlType::BigInteger),
    ("output_id", ID),
    ("type", ID),
    ("purpose", ID),
    ("asset_id", ID),
    ("asset_alias", ALIAS),
    ("asset_definition", SqlType::Blob),
    ("asset_tags", SqlType::Blob),
    ("asset_local", SqlType::Boolean),
    ("amount", SqlType::BigInteger),
    ("account_id", ID),
    ("account_alias", ALIAS),
    ("account_tags", SqlType::Blob),
    ("control_program", SqlType::Clob),
    ("reference_data", SqlType::Blob),
    ("local", SqlType::Boolean),
    ("spent", SqlType::Boolean),
];

fn fixed_columns(table: Table) -> &'static [(&'static str, SqlType)] {
    match table {
        Table::Transactions => TRANSACTION_COLUMNS,
        Table::TransactionInputs => INPUT_COLUMNS,
        Table::TransactionOutputs => OUTPUT_COLUMNS,
    }
}

/// Whether `name` is one of the built-in columns of `table`.
pub(crate) fn is_fixed_column(table: Table, name: &str) -> bool {
    fixed_columns(table)
        .iter()
        .any(|(fixed, _)| fixed.eq_ignore_ascii_case(name))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub sql_type: SqlType,
}

impl Column {
    /// `"NAME" TYPE`, as used in `CREATE TABLE` and `ADD COLUMN`.
    pub fn definition(&self) -> String {
        format!("{} {}", quote(&self.name), self.sql_type.ddl())
    }
}

fn quote(name: &str) -> String {
    format!("\"{}\"", name.to_ascii_uppercase())
}

fn quote_all(names: &[String]) -> String {
    names.iter().map(|n| quote(n)).collect::<Vec<_>>().join(", ")
}

/// Immutable definition of one table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schema {
    name: String,
    columns: Vec<Column>,
    primary_key: Vec<String>,
    unique: Vec<Vec<String>>,
}

impl Schema {
    pub fn builder(name: &str) -> SchemaBuilder {
        SchemaBuilder {
            name: name.to_ascii_lowercase(),
            ..SchemaBuilder::default()
        }
    }

    /// Schema of a data table: fixed columns plus the custom ones of `config`.
    pub fn for_table(table: Table, config: &Config) -> ResultWarehouse<Schema> {
        let mut builder = Schema::builder(table.as_str());
        for (name, sql_type) in fixed_columns(table) {
            builder = builder.column(name, *sql_type);
        }
        builder = match table {
            Table::Transactions => builder.primary_key(&["id"]),
            Table::TransactionInputs => builder.primary_key(&["transaction_id", "index"]),
            Table::TransactionOutputs => builder
                .primary_key(&["output_id"])
                .unique(&["transaction_id", "index"]),
        };
        builder.custom_columns(config.columns(table)).build()
    }

    /// Lowercase table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Table name as it appears in SQL.
    pub fn sql_name(&self) -> String {
        self.name.to_ascii_uppercase()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    pub fn unique_constraints(&self) -> &[Vec<String>] {
        &self.unique
    }

    /// `CREATE TABLE` with column definitions, unique constraints and the
    /// primary key constraint, in that order.
    pub fn ddl_statement(&self) -> String {
        let mut parts: Vec<String> = self.columns.iter().map(Column::definition).collect();
        for unique in &self.unique {
            parts.push(format!(
                "CONSTRAINT {}_u UNIQUE ({})",
                unique.join("_"),
                quote_all(unique)
            ));
        }
        if !self.primary_key.is_empty() {
            parts.push(format!(
                "CONSTRAINT {}_pk PRIMARY KEY ({})",
                self.name,
                quote_all(&self.primary_key)
            ));
        }
        format!("CREATE TABLE {} (\n  {})", self.sql_name(), parts.join(",\n  "))
    }

    /// Parameterized insert with one placeholder per column, in column order.
    pub fn insert_statement(&self) -> String {
        let names: Vec<String> = self.columns.iter().map(|c| c.name.clone()).collect();
        let placeholders = vec!["?"; names.len()].join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.sql_name(),
            quote_all(&names),
            placeholders
        )
    }

    /// `UPDATE ... SET "<set>" = ? WHERE "<key>" = ?`; bind the new value first.
    pub fn update_statement(&self, set: &str, key: &str) -> String {
        format!(
            "UPDATE {} SET {} = ? WHERE {} = ?",
            self.sql_name(),
            quote(set),
            quote(key)
        )
    }

    /// One-column `ALTER TABLE ... ADD COLUMN` in the form SQLite accepts; the
    /// type names stay those of [`ddl_statement`](Self::ddl_statement) and
    /// resolve through SQLite type affinity.
    pub fn add_column_statement(&self, column: &Column) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.sql_name(),
            column.definition()
        )
    }

    /// SQLite `ALTER TABLE ... DROP COLUMN`, one column per statement.
    pub fn drop_column_statement(&self, name: &str) -> String {
        format!("ALTER TABLE {} DROP COLUMN {}", self.sql_name(), quote(name))
    }

    /// A parameter row for [`insert_statement`](Self::insert_statement); unset
    /// columns bind as typed `NULL`s.
    pub fn row(&self) -> Row<'_> {
        Row {
            schema: self,
            values: self
                .columns
                .iter()
                .map(|c| c.sql_type.native_type().null_value())
                .collect(),
        }
    }
}

#[derive(Default)]
pub struct SchemaBuilder {
    name: String,
    columns: Vec<Column>,
    primary_key: Vec<String>,
    unique: Vec<Vec<String>>,
}

impl SchemaBuilder {
    pub fn column(mut self, name: &str, sql_type: SqlType) -> SchemaBuilder {
        self.columns.push(Column {
            name: name.to_ascii_lowercase(),
            sql_type,
        });
        self
    }

    pub fn custom_columns(mut self, columns: &[CustomColumn]) -> SchemaBuilder {
        for column in columns {
            self = self.column(column.name(), column.sql_type());
        }
        self
    }

    pub fn primary_key(mut self, columns: &[&str]) -> SchemaBuilder {
        self.primary_key = columns.iter().map(|c| c.to_ascii_lowercase()).collect();
        self
    }

    pub fn unique(mut self, columns: &[&str]) -> SchemaBuilder {
        self.unique
            .push(columns.iter().map(|c| c.to_ascii_lowercase()).collect());
        self
    }

    /// Construct `Schema`, checking that constraints only name known columns.
    pub fn build(self) -> ResultWarehouse<Schema> {
        if self.columns.is_empty() {
            return Err(WarehouseError::InvalidConfig(format!(
                "table {} has no columns",
                self.name
            )));
        }
        for (i, column) in self.columns.iter().enumerate() {
            if self.columns[..i].iter().any(|c| c.name == column.name) {
                return Err(WarehouseError::InvalidConfig(format!(
                    "duplicate column {}.{}",
                    self.name, column.name
                )));
            }
        }
        let constrained = self.primary_key.iter().chain(self.unique.iter().flatten());
        for name in constrained {
            if !self.columns.iter().any(|c| &c.name == name) {
                return Err(WarehouseError::InvalidConfig(format!(
                    "constraint on unknown column {}.{name}",
                    self.name
                )));
            }
        }
        Ok(Schema {
            name: self.name,
            columns: self.columns,
            primary_key: self.primary_key,
            unique: self.unique,
        })
    }
}

/// Positional parameters of one insert, always in schema column order.
#[derive(Debug)]
pub struct Row<'a> {
    schema: &'a Schema,
    values: Vec<Value>,
}

impl Row<'_> {
    /// Set the parameter of column `name`.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> ResultWarehouse<&mut Self> {
        let index = self
            .schema
            .columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| {
                WarehouseError::bind(name, format!("no such column in {}", self.schema.name))
            })?;
        self.values[index] = value.into();
        Ok(self)
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// The three data table schemas of one configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schemas {
    transactions: Schema,
    inputs: Schema,
    outputs: Schema,
}

impl Schemas {
    pub fn build(config: &Config) -> ResultWarehouse<Self> {
        Ok(Self {
            transactions: Schema::for_table(Table::Transactions, config)?,
            inputs: Schema::for_table(Table::TransactionInputs, config)?,
            outputs: Schema::for_table(Table::TransactionOutputs, config)?,
        })
    }

    pub fn get(&self, table: Table) -> &Schema {
        match table {
            Table::Transactions => &self.transactions,
            Table::TransactionInputs => &self.inputs,
            Table::TransactionOutputs => &self.outputs,
        }
    }
}
