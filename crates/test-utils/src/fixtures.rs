// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Test fixtures: sample tables, rows and queries

use data_analyst_adapter::{Row, Value};
use data_analyst_schema::{Column, Table};

/// Sample schemas shaped like each engine family produces them
pub struct SchemaFixtures;

impl SchemaFixtures {
    /// Relational table with a primary key and a commented column
    pub fn customers() -> Table {
        Table::new("customers").with_columns([
            Column::new("id", "int").with_primary_key(),
            Column::new("email", "varchar(255)"),
            Column::new("name", "varchar(100)")
                .with_nullable(true)
                .with_comment("Display name"),
            Column::new("created_at", "timestamp").with_nullable(true),
        ])
    }

    /// Relational table referencing `customers`
    pub fn orders() -> Table {
        Table::new("orders").with_columns([
            Column::new("id", "int").with_primary_key(),
            Column::new("customer_id", "int").with_foreign_key("customers", "id"),
            Column::new("total", "decimal(10,2)").with_nullable(true),
            Column::new("status", "varchar(20)").with_nullable(true),
        ])
    }

    /// `customers` and `orders`
    pub fn shop() -> Vec<Table> {
        vec![Self::customers(), Self::orders()]
    }

    /// Collection as inferred from sampled documents
    pub fn events_collection() -> Table {
        Table::new("events").with_columns([
            Column::new("_id", "objectId")
                .with_primary_key()
                .with_comment("Inferred from 100 sample documents"),
            Column::new("kind", "string").with_comment("Inferred from 100 sample documents"),
            Column::new("payload", "object, string")
                .with_nullable(true)
                .with_comment("Inferred from 100 sample documents"),
        ])
    }

    /// Cube with one dimension and one measure
    pub fn sales_cube() -> Table {
        Table::new("Sales").with_columns([
            Column::new("Date", "Dimension (Time)").with_comment("Dimension: [Date]"),
            Column::new("Sales Amount", "Measure (Currency)")
                .with_comment("Measure: [Measures].[Sales Amount]"),
        ])
    }
}

/// Build a row from `(column, value)` pairs
pub fn row<I, K, V>(pairs: I) -> Row
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Sample queries for testing
pub struct QueryFixtures;

impl QueryFixtures {
    /// Retrieval over the shop schema
    pub const fn top_customers() -> &'static str {
        "SELECT c.name, SUM(o.total) AS spent FROM customers c JOIN orders o ON o.customer_id = c.id GROUP BY c.name ORDER BY spent DESC LIMIT 5"
    }

    /// Generator answer wrapped in a tagged fence
    pub const fn fenced_top_customers() -> &'static str {
        "```sql\nSELECT c.name, SUM(o.total) AS spent FROM customers c JOIN orders o ON o.customer_id = c.id GROUP BY c.name ORDER BY spent DESC LIMIT 5\n```"
    }

    /// Common table expression
    pub const fn cte() -> &'static str {
        "WITH big AS (SELECT id FROM orders WHERE total > 100) SELECT count(*) FROM big"
    }

    /// Mutation the gate must reject
    pub const fn drop_table() -> &'static str {
        "DROP TABLE customers"
    }

    /// Retrieval followed by a second statement
    pub const fn piggybacked_delete() -> &'static str {
        "SELECT id FROM orders; DELETE FROM orders"
    }

    /// Document-store operation
    pub const fn mongo_find() -> &'static str {
        r#"events.find({"kind": "login"})"#
    }
}
