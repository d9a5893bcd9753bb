//! Database schema types.
//!
//! Introspected table structure, rendered as the schema text handed to the
//! query planner.

use serde::{Deserialize, Serialize};

/// Represents the introspected schema of a database.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    /// All tables in the schema.
    pub tables: Vec<Table>,
}

impl Schema {
    /// Returns true if no tables were found.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Formats the schema for inclusion in an agent's instructions.
    ///
    /// Produces one line per table: `name(col type [PK] [NOT NULL], ...)`.
    pub fn format_for_llm(&self) -> String {
        self.tables
            .iter()
            .map(Table::format_for_llm)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Represents a database table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Table {
    /// Table name.
    pub name: String,

    /// Columns in the table.
    pub columns: Vec<Column>,

    /// Column names that form the primary key.
    pub primary_key: Vec<String>,
}

impl Table {
    /// Creates a new table with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
        }
    }

    /// Adds a column.
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    fn format_for_llm(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|column| {
                let mut line = format!("{} {}", column.name, column.data_type);
                if self.primary_key.contains(&column.name) {
                    line.push_str(" PK");
                }
                if !column.is_nullable {
                    line.push_str(" NOT NULL");
                }
                line
            })
            .collect::<Vec<_>>()
            .join(", ");

        format!("{}({})", self.name, columns)
    }
}

/// Represents a column in a table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Data type (e.g., "integer", "TEXT").
    pub data_type: String,

    /// Whether the column allows NULL values.
    pub is_nullable: bool,
}

impl Column {
    /// Creates a new nullable column with the given name and data type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            is_nullable: true,
        }
    }

    /// Sets whether the column is nullable.
    pub fn nullable(self, nullable: bool) -> Self {
        Self {
            is_nullable: nullable,
            ..self
        }
    }
}
