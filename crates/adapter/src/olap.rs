// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Cube metadata for OLAP engines
//!
//! A cube is presented as a table whose columns are its dimensions followed by
//! its measures. The schema rowset queries are plain MDX/DMV text.

use data_analyst_schema::{Column, Table};

use crate::value::Value;

/// Lists the cubes of the current catalog
pub const CUBES_QUERY: &str = "SELECT CUBE_NAME FROM $SYSTEM.MDSCHEMA_CUBES WHERE CUBE_SOURCE = 1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CubeDimension {
    pub name: String,
    pub unique_name: String,
    pub dimension_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CubeMeasure {
    pub name: String,
    pub unique_name: String,
    pub data_type: Option<String>,
}

/// Escape a value for a single-quoted rowset restriction
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Dimensions of `cube`
pub fn dimensions_query(cube: &str) -> String {
    format!(
        "SELECT DIMENSION_NAME, DIMENSION_UNIQUE_NAME, DIMENSION_TYPE \
         FROM $SYSTEM.MDSCHEMA_DIMENSIONS WHERE CUBE_NAME = '{}'",
        escape_literal(cube)
    )
}

/// Measures of `cube`
pub fn measures_query(cube: &str) -> String {
    format!(
        "SELECT MEASURE_NAME, MEASURE_UNIQUE_NAME, DATA_TYPE \
         FROM $SYSTEM.MDSCHEMA_MEASURES WHERE CUBE_NAME = '{}'",
        escape_literal(cube)
    )
}

/// How a text cell from a rowset is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Integer,
    Float,
    Bool,
    Text,
}

/// Interpret a text-buffered cell; unparsable numbers stay text
pub fn cell_value(kind: CellKind, cell: Option<&[u8]>) -> Value {
    let Some(bytes) = cell else {
        return Value::Null;
    };
    let text = String::from_utf8_lossy(bytes);
    let parsed = match kind {
        CellKind::Integer => text.trim().parse::<i64>().ok().map(Value::Integer),
        CellKind::Float => text.trim().parse::<f64>().ok().map(Value::Float),
        CellKind::Bool => match text.trim() {
            "1" => Some(Value::Bool(true)),
            "0" => Some(Value::Bool(false)),
            _ => None,
        },
        CellKind::Text => None,
    };
    parsed.unwrap_or_else(|| Value::Text(text.into_owned()))
}

/// ODBC connection string for an OLAP server
///
/// Values are brace-quoted so `;` and `}` inside them survive.
pub fn connection_string(
    driver: &str,
    host: &str,
    port: u16,
    database: &str,
    user: &str,
    password: &str,
) -> String {
    let quote = |value: &str| format!("{{{}}}", value.replace('}', "}}"));
    let mut parts = vec![
        format!("Driver={}", quote(driver)),
        format!("Server={}", quote(&format!("{host}:{port}"))),
        format!("Database={}", quote(database)),
    ];
    if !user.is_empty() {
        parts.push(format!("UID={}", quote(user)));
        parts.push(format!("PWD={}", quote(password)));
    }
    parts.join(";") + ";"
}

/// Build the table for one cube
///
/// A measure sharing a dimension's name replaces that column.
pub fn assemble_cube(name: &str, dimensions: &[CubeDimension], measures: &[CubeMeasure]) -> Table {
    let dimension_columns = dimensions.iter().map(|d| {
        let kind = d.dimension_type.as_deref().unwrap_or("Standard");
        Column::new(d.name.as_str(), format!("Dimension ({kind})"))
            .with_nullable(true)
            .with_comment(format!("Dimension: {}", d.unique_name))
    });
    let measure_columns = measures.iter().map(|m| {
        let kind = m.data_type.as_deref().unwrap_or("Decimal");
        Column::new(m.name.as_str(), format!("Measure ({kind})"))
            .with_nullable(true)
            .with_comment(format!("Measure: {}", m.unique_name))
    });

    Table::new(name).with_columns(dimension_columns.chain(measure_columns))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_cube_labels() {
        let table = assemble_cube(
            "Sales",
            &[CubeDimension {
                name: "Date".to_string(),
                unique_name: "[Date]".to_string(),
                dimension_type: Some("Time".to_string()),
            }],
            &[CubeMeasure {
                name: "Amount".to_string(),
                unique_name: "[Measures].[Amount]".to_string(),
                data_type: None,
            }],
        );

        assert_eq!(table.name, "Sales");
        let date = table.column("Date").unwrap();
        assert_eq!(date.data_type, "Dimension (Time)");
        assert_eq!(date.comments, "Dimension: [Date]");
        assert!(date.is_nullable);
        let amount = table.column("Amount").unwrap();
        assert_eq!(amount.data_type, "Measure (Decimal)");
        assert_eq!(amount.comments, "Measure: [Measures].[Amount]");
        assert!(!amount.is_primary_key);
    }

    #[test]
    fn test_dimension_type_defaults_to_standard() {
        let table = assemble_cube(
            "c",
            &[CubeDimension {
                name: "Product".to_string(),
                unique_name: "[Product]".to_string(),
                dimension_type: None,
            }],
            &[],
        );
        assert_eq!(table.column("Product").unwrap().data_type, "Dimension (Standard)");
    }

    #[test]
    fn test_cell_values() {
        assert_eq!(cell_value(CellKind::Integer, Some(b"42")), Value::Integer(42));
        assert_eq!(cell_value(CellKind::Float, Some(b"1.25")), Value::Float(1.25));
        assert_eq!(cell_value(CellKind::Bool, Some(b"1")), Value::Bool(true));
        assert_eq!(cell_value(CellKind::Text, Some(b"007")), Value::Text("007".to_string()));
        assert_eq!(cell_value(CellKind::Integer, Some(b"n/a")), Value::Text("n/a".to_string()));
        assert_eq!(cell_value(CellKind::Float, None), Value::Null);
    }

    #[test]
    fn test_connection_string() {
        let with_user = connection_string("MSOLAP", "olap", 2383, "Sales", "me", "p;w}d");
        assert_eq!(
            with_user,
            "Driver={MSOLAP};Server={olap:2383};Database={Sales};UID={me};PWD={p;w}}d};"
        );
        let integrated = connection_string("MSOLAP", "olap", 2383, "Sales", "", "");
        assert!(!integrated.contains("UID"));
    }

    #[test]
    fn test_cube_name_is_escaped() {
        let query = dimensions_query("O'Brien Sales");
        assert!(query.ends_with("CUBE_NAME = 'O''Brien Sales'"));
        assert!(measures_query("x").contains("MDSCHEMA_MEASURES"));
    }
}
