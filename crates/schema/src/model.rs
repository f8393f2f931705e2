// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Schema model
//!
//! [`Column`] and [`Table`] are the one structural vocabulary every engine is
//! mapped onto. For schema-less or non-relational engines the `data_type` label
//! carries whatever the engine can tell us (an inferred type union for
//! documents, `"Measure (Decimal)"` for cube measures, and so on).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One column (or field, dimension, measure) of a [`Table`]
///
/// `is_foreign_key` is true exactly when `foreign_key_reference` is non-empty.
/// The pair is private and only changes through [`Column::with_foreign_key`]
/// and [`Column::clear_foreign_key`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ColumnRecord")]
pub struct Column {
    /// Column name, unique within its table
    pub name: String,
    /// Engine-native type name or derived label
    pub data_type: String,
    /// Whether the column may hold null
    pub is_nullable: bool,
    /// Whether the column is part of the primary key
    pub is_primary_key: bool,
    is_foreign_key: bool,
    foreign_key_reference: String,
    /// Free-text comment
    pub comments: String,
}

impl Column {
    /// Create a non-nullable, unkeyed column
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            is_nullable: false,
            is_primary_key: false,
            is_foreign_key: false,
            foreign_key_reference: String::new(),
            comments: String::new(),
        }
    }

    /// Builder method: set nullable
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.is_nullable = nullable;
        self
    }

    /// Builder method: mark as primary key
    pub fn with_primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    /// Builder method: set comment
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comments = comment.into();
        self
    }

    /// Builder method: reference `table.column`
    ///
    /// An empty table or column leaves the column unkeyed.
    pub fn with_foreign_key(mut self, table: &str, column: &str) -> Self {
        self.set_foreign_key(table, column);
        self
    }

    /// Point this column at `table.column`
    pub fn set_foreign_key(&mut self, table: &str, column: &str) {
        if table.is_empty() || column.is_empty() {
            self.clear_foreign_key();
            return;
        }
        self.is_foreign_key = true;
        self.foreign_key_reference = format!("{table}.{column}");
    }

    /// Drop any foreign key reference
    pub fn clear_foreign_key(&mut self) {
        self.is_foreign_key = false;
        self.foreign_key_reference.clear();
    }

    /// Whether this column references another table
    pub fn is_foreign_key(&self) -> bool {
        self.is_foreign_key
    }

    /// The `"table.column"` reference, or an empty string
    pub fn foreign_key_reference(&self) -> &str {
        &self.foreign_key_reference
    }
}

/// Persisted column shape, checked before it becomes a [`Column`]
#[derive(Deserialize)]
struct ColumnRecord {
    name: String,
    data_type: String,
    is_nullable: bool,
    is_primary_key: bool,
    is_foreign_key: bool,
    #[serde(default)]
    foreign_key_reference: String,
    #[serde(default)]
    comments: String,
}

impl TryFrom<ColumnRecord> for Column {
    type Error = String;

    fn try_from(record: ColumnRecord) -> Result<Self, Self::Error> {
        if record.is_foreign_key == record.foreign_key_reference.is_empty() {
            return Err(format!(
                "column '{}': is_foreign_key={} disagrees with foreign_key_reference '{}'",
                record.name, record.is_foreign_key, record.foreign_key_reference
            ));
        }

        Ok(Self {
            name: record.name,
            data_type: record.data_type,
            is_nullable: record.is_nullable,
            is_primary_key: record.is_primary_key,
            is_foreign_key: record.is_foreign_key,
            foreign_key_reference: record.foreign_key_reference,
            comments: record.comments,
        })
    }
}

/// A relational table, document collection, measurement, search index or cube
///
/// Columns keep insertion order so serialized output is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TableRecord")]
pub struct Table {
    /// Table name
    pub name: String,
    columns: IndexMap<String, Column>,
}

impl Table {
    /// Create a table without columns
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: IndexMap::new(),
        }
    }

    /// Builder method: add columns in order
    pub fn with_columns(mut self, columns: impl IntoIterator<Item = Column>) -> Self {
        for column in columns {
            self.insert_column(column);
        }
        self
    }

    /// Insert a column, replacing a same-named one in place
    ///
    /// Returns the replaced column, if any.
    pub fn insert_column(&mut self, column: Column) -> Option<Column> {
        self.columns.insert(column.name.clone(), column)
    }

    /// Get column by name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Get a mutable column by name
    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.get_mut(name)
    }

    /// Columns in insertion order
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.values()
    }

    /// Column names in insertion order
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Primary key columns
    pub fn primary_keys(&self) -> Vec<&Column> {
        self.columns().filter(|c| c.is_primary_key).collect()
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the table has no columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[derive(Deserialize)]
struct TableRecord {
    name: String,
    #[serde(default)]
    columns: IndexMap<String, Column>,
}

impl TryFrom<TableRecord> for Table {
    type Error = String;

    fn try_from(record: TableRecord) -> Result<Self, Self::Error> {
        if let Some((key, column)) = record.columns.iter().find(|(key, c)| **key != c.name) {
            return Err(format!(
                "table '{}': column key '{}' does not match column name '{}'",
                record.name, key, column.name
            ));
        }

        Ok(Self {
            name: record.name,
            columns: record.columns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_foreign_key_flag_tracks_reference() {
        let col = Column::new("user_id", "bigint").with_foreign_key("users", "id");
        assert!(col.is_foreign_key());
        assert_eq!(col.foreign_key_reference(), "users.id");

        let mut col = col;
        col.clear_foreign_key();
        assert!(!col.is_foreign_key());
        assert_eq!(col.foreign_key_reference(), "");
    }

    #[test]
    fn test_empty_reference_leaves_column_unkeyed() {
        let col = Column::new("user_id", "bigint").with_foreign_key("", "");
        assert!(!col.is_foreign_key());
        assert!(col.foreign_key_reference().is_empty());
    }

    #[test]
    fn test_insert_column_replaces_in_place() {
        let mut table = Table::new("users").with_columns([
            Column::new("id", "int").with_primary_key(),
            Column::new("email", "varchar(255)"),
        ]);

        let replaced = table.insert_column(Column::new("id", "bigint").with_primary_key());
        assert_eq!(replaced.map(|c| c.data_type), Some("int".to_string()));
        assert_eq!(table.column_names().collect::<Vec<_>>(), vec!["id", "email"]);
        assert_eq!(table.column("id").unwrap().data_type, "bigint");
        assert_eq!(table.primary_keys().len(), 1);
    }

    #[test]
    fn test_deserialize_rejects_inconsistent_foreign_key() {
        let json = r#"{
            "name": "user_id",
            "data_type": "bigint",
            "is_nullable": false,
            "is_primary_key": false,
            "is_foreign_key": true,
            "foreign_key_reference": "",
            "comments": ""
        }"#;

        let result: Result<Column, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_rejects_mismatched_column_key() {
        let json = r#"{
            "name": "users",
            "columns": {
                "id": {
                    "name": "uid",
                    "data_type": "int",
                    "is_nullable": false,
                    "is_primary_key": true,
                    "is_foreign_key": false,
                    "foreign_key_reference": "",
                    "comments": ""
                }
            }
        }"#;

        let result: Result<Table, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_serialized_field_order() {
        let col = Column::new("id", "int").with_primary_key();
        let json = serde_json::to_string(&col).unwrap();
        assert_eq!(
            json,
            r#"{"name":"id","data_type":"int","is_nullable":false,"is_primary_key":true,"is_foreign_key":false,"foreign_key_reference":"","comments":""}"#
        );
    }
}
