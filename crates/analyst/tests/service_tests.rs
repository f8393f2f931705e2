// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Service-level behavior against a mock adapter and a scripted generator

use data_analyst::{AdapterHolder, DataAnalyst, QueryPipeline, ValidationPolicy};
use data_analyst_adapter::{AdapterError, DataStoreAdapter, EngineKind, Value};
use data_analyst_schema::SchemaStore;
use data_analyst_test_utils::{
    MockAdapter, MockAdapterBuilder, QueryFixtures, SchemaFixtures, ScriptedGenerator, row,
};
use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn analyst_with_policy(
    adapter: &Arc<MockAdapter>,
    generator: &Arc<ScriptedGenerator>,
    dir: &TempDir,
    policy: ValidationPolicy,
) -> DataAnalyst {
    let pipeline = QueryPipeline::new(
        Arc::clone(generator) as _,
        adapter.engine().query_language(),
        policy,
    );
    DataAnalyst::from_parts(
        AdapterHolder::with_adapter(Arc::clone(adapter) as _),
        SchemaStore::new(dir.path().join("schema")),
        pipeline,
    )
}

fn analyst(
    adapter: &Arc<MockAdapter>,
    generator: &Arc<ScriptedGenerator>,
    dir: &TempDir,
) -> DataAnalyst {
    analyst_with_policy(adapter, generator, dir, ValidationPolicy::default())
}

/// Persisted units as (file name, contents), sorted by name
fn persisted(root: &Path) -> Vec<(String, String)> {
    let mut units: Vec<(String, String)> = fs::read_dir(root)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .map(|path| {
            (
                path.file_name().unwrap().to_string_lossy().into_owned(),
                fs::read_to_string(&path).unwrap(),
            )
        })
        .collect();
    units.sort();
    units
}

#[tokio::test]
async fn test_rebuild_with_zero_tables_is_an_empty_success() {
    let dir = TempDir::new().unwrap();
    let adapter = Arc::new(MockAdapter::new(EngineKind::PostgreSql));
    let generator = Arc::new(ScriptedGenerator::new());
    let analyst = analyst(&adapter, &generator, &dir);

    let envelope = analyst.rebuild_schema().await;
    assert!(envelope.success, "{envelope:?}");
    assert_eq!(
        envelope.data,
        Some(json!({
            "message": "Successfully loaded schema for 0 tables",
            "tables": [],
            "skipped": []
        }))
    );
    assert!(persisted(&dir.path().join("schema")).is_empty());

    let schema = analyst.schema().await;
    assert!(schema.success);
    assert_eq!(schema.data, Some(json!({})));
}

#[tokio::test]
async fn test_schema_before_rebuild_is_an_error() {
    let dir = TempDir::new().unwrap();
    let adapter = Arc::new(MockAdapter::default());
    let generator = Arc::new(ScriptedGenerator::new());
    let analyst = analyst(&adapter, &generator, &dir);

    let envelope = analyst.schema().await;
    assert!(!envelope.success);
    assert!(envelope.error.unwrap().contains("Schema not loaded"));
    assert_eq!(adapter.introspect_count(), 0);
}

#[tokio::test]
async fn test_repeated_rebuild_is_byte_identical() {
    let dir = TempDir::new().unwrap();
    let adapter = Arc::new(MockAdapterBuilder::new(EngineKind::MySql).with_standard_schema().build());
    let generator = Arc::new(ScriptedGenerator::new());
    let analyst = analyst(&adapter, &generator, &dir);
    let root = dir.path().join("schema");

    analyst.rebuild().await.unwrap();
    let first = persisted(&root);
    analyst.rebuild().await.unwrap();
    let second = persisted(&root);

    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
    assert_eq!(adapter.introspect_count(), 2);
}

#[tokio::test]
async fn test_rebuild_drops_tables_missing_from_introspection() {
    let dir = TempDir::new().unwrap();
    let adapter = Arc::new(MockAdapterBuilder::default().with_standard_schema().build());
    let generator = Arc::new(ScriptedGenerator::new());
    let analyst = analyst(&adapter, &generator, &dir);

    let report = analyst.rebuild().await.unwrap();
    assert_eq!(report.tables, vec!["customers", "orders"]);

    adapter.set_tables([SchemaFixtures::customers()]);
    let report = analyst.rebuild().await.unwrap();
    assert_eq!(report.tables, vec!["customers"]);

    let names: Vec<String> = persisted(&dir.path().join("schema"))
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(names, vec!["customers.json"]);

    let snapshot = analyst.cache().snapshot().await;
    assert!(snapshot.table("orders").is_none());
    assert_eq!(snapshot.generation(), 2);
}

#[tokio::test]
async fn test_rebuild_reports_skipped_units() {
    let dir = TempDir::new().unwrap();
    let adapter = Arc::new(
        MockAdapterBuilder::default()
            .with_table(SchemaFixtures::orders())
            .with_failing_unit("audit_log", "permission denied")
            .build(),
    );
    let generator = Arc::new(ScriptedGenerator::new());
    let analyst = analyst(&adapter, &generator, &dir);

    let envelope = analyst.rebuild_schema().await;
    let data = envelope.data.unwrap();
    assert_eq!(data["tables"], json!(["orders"]));
    let skipped = data["skipped"][0].as_str().unwrap();
    assert!(skipped.contains("audit_log"));
    assert!(skipped.contains("permission denied"));
}

#[tokio::test]
async fn test_failed_rebuild_keeps_previous_schema() {
    let dir = TempDir::new().unwrap();
    let adapter = Arc::new(MockAdapterBuilder::default().with_standard_schema().build());
    let generator = Arc::new(ScriptedGenerator::new());
    let analyst = analyst(&adapter, &generator, &dir);
    analyst.rebuild().await.unwrap();

    adapter.fail_introspection(AdapterError::schema_build("*", "catalog unavailable"));
    let envelope = analyst.rebuild_schema().await;

    assert!(!envelope.success);
    assert!(envelope.error.unwrap().contains("catalog unavailable"));
    assert_eq!(analyst.cache().snapshot().await.len(), 2);
}

#[tokio::test]
async fn test_query_with_prompt_runs_sanitized_query() {
    let dir = TempDir::new().unwrap();
    let rows = vec![
        row([("name", Value::from("Ada")), ("spent", Value::Float(120.5))]),
        row([("name", Value::from("Grace")), ("spent", Value::Float(99.0))]),
    ];
    let adapter = Arc::new(
        MockAdapterBuilder::new(EngineKind::MySql)
            .with_standard_schema()
            .with_rows(QueryFixtures::top_customers(), rows)
            .build(),
    );
    let generator = Arc::new(ScriptedGenerator::answering(QueryFixtures::fenced_top_customers()));
    let analyst = analyst(&adapter, &generator, &dir);
    analyst.rebuild().await.unwrap();

    let envelope = analyst.query_with_prompt("who spent the most?").await;

    assert!(envelope.success, "{envelope:?}");
    assert_eq!(envelope.query.as_deref(), Some(QueryFixtures::top_customers()));
    assert_eq!(
        envelope.data,
        Some(json!([
            {"name": "Ada", "spent": 120.5},
            {"name": "Grace", "spent": 99.0}
        ]))
    );
    assert_eq!(adapter.executed_queries(), vec![QueryFixtures::top_customers()]);

    let requests = generator.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].prompt, "who spent the most?");
    assert!(requests[0].instructions.contains("MySQL SQL"));
    assert!(requests[0].instructions.contains("\"customers.id\""));
    assert!((requests[0].temperature - 0.1).abs() < f32::EPSILON);
}

#[tokio::test]
async fn test_rejected_generation_is_never_executed() {
    let dir = TempDir::new().unwrap();
    let adapter = Arc::new(MockAdapterBuilder::default().with_standard_schema().build());
    let generator = Arc::new(ScriptedGenerator::answering(QueryFixtures::drop_table()));
    let analyst = analyst(&adapter, &generator, &dir);

    let envelope = analyst.query_with_prompt("clean up").await;

    assert!(!envelope.success);
    assert_eq!(envelope.query.as_deref(), Some(QueryFixtures::drop_table()));
    assert!(envelope.error.unwrap().starts_with("Query rejected"));
    assert!(envelope.data.is_none());
    assert_eq!(adapter.execute_count(), 0);
}

#[tokio::test]
async fn test_generation_failure_becomes_envelope() {
    let dir = TempDir::new().unwrap();
    let adapter = Arc::new(MockAdapter::default());
    let generator = Arc::new(ScriptedGenerator::new().then_fail("rate limited"));
    let analyst = analyst(&adapter, &generator, &dir);

    let envelope = analyst.query_with_prompt("anything").await;

    assert!(!envelope.success);
    assert!(envelope.query.is_none());
    assert_eq!(
        envelope.error.as_deref(),
        Some("Query generation failed: rate limited")
    );
}

#[tokio::test]
async fn test_execute_query_goes_through_the_gate() {
    let dir = TempDir::new().unwrap();
    let adapter = Arc::new(MockAdapter::new(EngineKind::PostgreSql));
    let generator = Arc::new(ScriptedGenerator::new());
    let analyst = analyst(&adapter, &generator, &dir);

    for query in [
        "UPDATE customers SET name = 'x'",
        QueryFixtures::piggybacked_delete(),
        QueryFixtures::drop_table(),
    ] {
        let envelope = analyst.execute_query(query).await;
        assert!(!envelope.success, "{query} should be rejected");
        assert_eq!(envelope.query.as_deref(), Some(query));
    }
    assert_eq!(adapter.execute_count(), 0);

    let envelope = analyst.execute_query(QueryFixtures::cte()).await;
    assert!(envelope.success);
    assert_eq!(envelope.data, Some(json!([])));
}

#[tokio::test]
async fn test_strict_policy_rejects_cte() {
    let dir = TempDir::new().unwrap();
    let adapter = Arc::new(MockAdapter::new(EngineKind::PostgreSql));
    let generator = Arc::new(ScriptedGenerator::new());
    let analyst = analyst_with_policy(&adapter, &generator, &dir, ValidationPolicy::strict());

    assert!(!analyst.execute_query(QueryFixtures::cte()).await.success);
    assert!(analyst.execute_query("SELECT 1").await.success);
}

#[tokio::test]
async fn test_engine_error_carries_query() {
    let dir = TempDir::new().unwrap();
    let adapter = Arc::new(
        MockAdapterBuilder::default()
            .with_error(
                "SELECT missing FROM customers",
                AdapterError::Execution("no such column: missing".to_string()),
            )
            .build(),
    );
    let generator = Arc::new(ScriptedGenerator::new());
    let analyst = analyst(&adapter, &generator, &dir);

    let envelope = analyst.execute_query("SELECT missing FROM customers").await;

    assert!(!envelope.success);
    assert_eq!(envelope.query.as_deref(), Some("SELECT missing FROM customers"));
    assert_eq!(
        envelope.error.as_deref(),
        Some("Query execution failed: no such column: missing")
    );
}

#[tokio::test]
async fn test_affected_rows_shape() {
    let dir = TempDir::new().unwrap();
    let adapter = Arc::new(
        MockAdapterBuilder::default()
            .with_affected("SELECT pg_sleep(0)", 0)
            .build(),
    );
    let generator = Arc::new(ScriptedGenerator::new());
    let analyst = analyst(&adapter, &generator, &dir);

    let envelope = analyst.execute_query("SELECT pg_sleep(0)").await;
    assert_eq!(envelope.data, Some(json!({"affected_rows": 0})));
}

#[tokio::test]
async fn test_document_store_operations_pass_the_gate() {
    let dir = TempDir::new().unwrap();
    let adapter = Arc::new(
        MockAdapterBuilder::new(EngineKind::MongoDb)
            .with_table(SchemaFixtures::events_collection())
            .with_rows(
                QueryFixtures::mongo_find(),
                vec![row([("_id", "65f0c1"), ("kind", "login")])],
            )
            .build(),
    );
    let generator = Arc::new(
        ScriptedGenerator::new()
            .then_answer(format!("```javascript\n{}\n```", QueryFixtures::mongo_find()))
            .then_answer("events.deleteMany({})"),
    );
    let analyst = analyst(&adapter, &generator, &dir);
    analyst.rebuild().await.unwrap();

    let envelope = analyst.query_with_prompt("logins").await;
    assert!(envelope.success, "{envelope:?}");
    assert_eq!(envelope.data, Some(json!([{"_id": "65f0c1", "kind": "login"}])));
    assert!(generator.requests()[0].instructions.contains("MongoDB query"));

    let envelope = analyst.query_with_prompt("remove everything").await;
    assert!(!envelope.success);
    assert!(envelope.error.unwrap().contains("deleteMany"));
    assert_eq!(adapter.execute_count(), 1);
}

#[tokio::test]
async fn test_shutdown_closes_adapter() {
    let dir = TempDir::new().unwrap();
    let adapter = Arc::new(MockAdapter::default());
    let generator = Arc::new(ScriptedGenerator::new());
    let analyst = analyst(&adapter, &generator, &dir);

    analyst.shutdown().await.unwrap();
    assert_eq!(adapter.close_count(), 1);

    let envelope = analyst.execute_query("SELECT 1").await;
    assert!(!envelope.success);
    assert!(envelope.error.unwrap().contains("closed"));
}
