// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Full flow against a real SQLite file: introspect, persist, generate, run

use data_analyst::{AdapterHolder, DataAnalyst, QueryPipeline, ValidationPolicy};
use data_analyst_adapter::{ConnectionConfig, EngineKind, QueryLanguage};
use data_analyst_schema::SchemaStore;
use data_analyst_test_utils::ScriptedGenerator;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_sqlite_end_to_end() {
    let dir = TempDir::new().unwrap();
    let holder = AdapterHolder::from_config(
        ConnectionConfig::new(EngineKind::Sqlite).with_path(dir.path().join("shop.db")),
    );

    let adapter = holder.get().await.unwrap();
    for statement in [
        "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
        "CREATE TABLE orders (id INTEGER PRIMARY KEY, customer_id INTEGER REFERENCES customers(id), total REAL)",
        "INSERT INTO customers (id, name) VALUES (1, 'Ada'), (2, 'Grace')",
        "INSERT INTO orders (id, customer_id, total) VALUES (10, 1, 12.5)",
    ] {
        adapter.execute(statement).await.unwrap();
    }

    let generator = Arc::new(
        ScriptedGenerator::new()
            .then_answer("```sql\nSELECT name FROM customers ORDER BY id\n```")
            .then_answer("DELETE FROM customers"),
    );
    let pipeline = QueryPipeline::new(
        Arc::clone(&generator) as _,
        QueryLanguage::Sqlite,
        ValidationPolicy::default(),
    );
    let analyst = DataAnalyst::from_parts(holder, SchemaStore::new(dir.path().join("schema")), pipeline);

    let report = analyst.rebuild().await.unwrap();
    assert_eq!(report.tables, vec!["customers", "orders"]);

    let schema = analyst.schema().await.data.unwrap();
    assert_eq!(schema["customers"]["columns"]["id"]["is_primary_key"], true);
    assert_eq!(schema["orders"]["columns"]["customer_id"]["is_foreign_key"], true);
    assert_eq!(
        schema["orders"]["columns"]["customer_id"]["foreign_key_reference"],
        "customers.id"
    );

    let envelope = analyst.query_with_prompt("list customer names").await;
    assert!(envelope.success, "{envelope:?}");
    assert_eq!(envelope.data, Some(json!([{"name": "Ada"}, {"name": "Grace"}])));

    let envelope = analyst.query_with_prompt("delete every customer").await;
    assert!(!envelope.success);

    // SQLite strings have no backslash escapes, so the DROP is a second statement
    let smuggled = r"SELECT 'a\'; DROP TABLE customers; --'";
    assert!(analyst.run_query(smuggled).await.is_err());
    let envelope = analyst.execute_query(smuggled).await;
    assert!(!envelope.success);
    assert_eq!(envelope.query.as_deref(), Some(smuggled));

    let envelope = analyst.execute_query("SELECT count(*) AS n FROM customers").await;
    assert_eq!(envelope.data, Some(json!([{"n": 2}])));

    analyst.shutdown().await.unwrap();
}
