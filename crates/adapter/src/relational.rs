// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Table assembly shared by the relational engines
//!
//! Each relational adapter gathers raw catalog facts with its own queries and
//! hands them to [`assemble_table`].

use data_analyst_schema::{Column, Table};
use std::collections::HashSet;

use crate::statement::leading_keyword;

/// One column as reported by an engine catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnFacts {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub comment: String,
}

impl ColumnFacts {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, is_nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            is_nullable,
            comment: String::new(),
        }
    }

    pub fn with_comment(mut self, comment: Option<String>) -> Self {
        self.comment = comment.unwrap_or_default();
        self
    }
}

/// A foreign key edge from a local column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyFacts {
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

impl ForeignKeyFacts {
    pub fn new(
        column: impl Into<String>,
        referenced_table: impl Into<String>,
        referenced_column: impl Into<String>,
    ) -> Self {
        Self {
            column: column.into(),
            referenced_table: referenced_table.into(),
            referenced_column: referenced_column.into(),
        }
    }
}

/// Build a [`Table`] from catalog facts
///
/// Columns keep catalog order. Key facts naming unknown columns are ignored;
/// when a column has several foreign keys the last one wins.
pub fn assemble_table(
    name: &str,
    columns: impl IntoIterator<Item = ColumnFacts>,
    primary_keys: &[String],
    foreign_keys: &[ForeignKeyFacts],
) -> Table {
    let primary_keys: HashSet<&str> = primary_keys.iter().map(String::as_str).collect();

    let mut table = Table::new(name).with_columns(columns.into_iter().map(|facts| {
        let column = Column::new(facts.name, facts.data_type)
            .with_nullable(facts.is_nullable)
            .with_comment(facts.comment);
        if primary_keys.contains(column.name.as_str()) {
            column.with_primary_key()
        } else {
            column
        }
    }));

    for fk in foreign_keys {
        if let Some(column) = table.column_mut(&fk.column) {
            column.set_foreign_key(&fk.referenced_table, &fk.referenced_column);
        }
    }

    table
}

/// Quote an identifier by doubling embedded quote characters
pub fn quote_identifier(name: &str, quote: char) -> String {
    let doubled: String = [quote, quote].iter().collect();
    format!("{quote}{}{quote}", name.replace(quote, &doubled))
}

/// Whether a T-SQL statement produces a result set
///
/// Decided from the leading keyword; statements that cannot be classified are
/// run for their affected-row count.
pub fn returns_rows(query: &str) -> bool {
    matches!(
        leading_keyword(query).as_deref(),
        Some("SELECT" | "WITH" | "EXEC" | "EXECUTE" | "VALUES" | "SHOW" | "DESCRIBE" | "EXPLAIN")
    )
}

/// Interpret the common `YES`/`NO` nullability flag
pub fn is_yes(flag: &str) -> bool {
    flag.eq_ignore_ascii_case("YES")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_marks_keys() {
        let table = assemble_table(
            "orders",
            vec![
                ColumnFacts::new("id", "int", false),
                ColumnFacts::new("user_id", "int", true).with_comment(Some("owner".to_string())),
                ColumnFacts::new("total", "decimal(10,2)", true),
            ],
            &["id".to_string()],
            &[ForeignKeyFacts::new("user_id", "users", "id")],
        );

        assert_eq!(table.column_names().collect::<Vec<_>>(), vec!["id", "user_id", "total"]);
        assert!(table.column("id").unwrap().is_primary_key);
        let user_id = table.column("user_id").unwrap();
        assert!(user_id.is_foreign_key());
        assert_eq!(user_id.foreign_key_reference(), "users.id");
        assert_eq!(user_id.comments, "owner");
        assert!(!table.column("total").unwrap().is_foreign_key());
    }

    #[test]
    fn test_assemble_composite_primary_key() {
        let table = assemble_table(
            "order_items",
            vec![
                ColumnFacts::new("order_id", "int", false),
                ColumnFacts::new("line", "int", false),
            ],
            &["order_id".to_string(), "line".to_string()],
            &[],
        );
        assert_eq!(table.primary_keys().len(), 2);
    }

    #[test]
    fn test_assemble_ignores_unknown_key_columns() {
        let table = assemble_table(
            "t",
            vec![ColumnFacts::new("a", "text", true)],
            &["ghost".to_string()],
            &[ForeignKeyFacts::new("ghost", "other", "id")],
        );
        assert!(table.primary_keys().is_empty());
        assert!(!table.column("a").unwrap().is_foreign_key());
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("users", '"'), "\"users\"");
        assert_eq!(quote_identifier("we\"ird", '"'), "\"we\"\"ird\"");
        assert_eq!(quote_identifier("it's", '\''), "'it''s'");
    }

    #[test]
    fn test_returns_rows() {
        assert!(returns_rows("SELECT 1"));
        assert!(returns_rows("-- top\nwith x as (select 1) select * from x"));
        assert!(!returns_rows("UPDATE t SET a = 1"));
        assert!(!returns_rows("INSERT INTO t VALUES (1)"));
    }
}
