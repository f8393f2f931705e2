// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Live SQLite adapter
//!
//! Opens the configured database file. SQLite has no catalog views, so
//! introspection walks `sqlite_master` and the per-table pragmas.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{ConnectOptions, Connection, Executor, Row as _, Statement, TypeInfo as _, ValueRef as _};
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, info};

use data_analyst_schema::Table;

use crate::config::ConnectionConfig;
use crate::engine::EngineKind;
use crate::error::{AdapterError, AdapterResult};
use crate::r#trait::{DataStoreAdapter, Introspection};
use crate::relational::{ColumnFacts, ForeignKeyFacts, assemble_table, quote_identifier};
use crate::sql_support::{decode_error, execution_error, get_unchecked, normalize_rows, unsupported};
use crate::value::{QueryOutput, Value};

const TABLES_QUERY: &str =
    "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name";

/// Live SQLite adapter
pub struct LiveSqliteAdapter {
    path: PathBuf,
    conn: Mutex<Option<SqliteConnection>>,
}

impl LiveSqliteAdapter {
    /// Open the database file named by `config.path`
    ///
    /// The file is created if it does not exist.
    pub async fn connect(config: &ConnectionConfig) -> AdapterResult<Self> {
        let path = config
            .path
            .clone()
            .ok_or_else(|| AdapterError::Config("sqlite requires a database file path".to_string()))?;

        let conn = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .connect()
            .await
            .map_err(|e| {
                AdapterError::Connection(format!(
                    "Failed to open SQLite database {}: {}",
                    path.display(),
                    e
                ))
            })?;
        info!(path = %path.display(), "Opened SQLite database");

        Ok(Self {
            path,
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Database file path
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

async fn describe_table(conn: &mut SqliteConnection, table: &str) -> AdapterResult<Table> {
    let quoted = quote_identifier(table, '"');
    let schema_error = |e: sqlx::Error| AdapterError::schema_build(table, e);

    let column_rows = sqlx::query(&format!("PRAGMA table_info({quoted})"))
        .fetch_all(&mut *conn)
        .await
        .map_err(schema_error)?;

    let mut columns = Vec::with_capacity(column_rows.len());
    let mut primary_keys = Vec::new();
    for row in &column_rows {
        let name: String = row.try_get("name").map_err(schema_error)?;
        let data_type: String = row.try_get("type").map_err(schema_error)?;
        let not_null: i64 = row.try_get("notnull").map_err(schema_error)?;
        let pk: i64 = row.try_get("pk").map_err(schema_error)?;
        if pk > 0 {
            primary_keys.push(name.clone());
        }
        columns.push(ColumnFacts::new(name, data_type, not_null == 0));
    }

    let fk_rows = sqlx::query(&format!("PRAGMA foreign_key_list({quoted})"))
        .fetch_all(&mut *conn)
        .await
        .map_err(schema_error)?;

    let mut foreign_keys = Vec::with_capacity(fk_rows.len());
    for row in &fk_rows {
        let from: String = row.try_get("from").map_err(schema_error)?;
        let referenced_table: String = row.try_get("table").map_err(schema_error)?;
        // "to" is null when the reference targets the parent's primary key implicitly
        let to: Option<String> = row.try_get("to").map_err(schema_error)?;
        if let Some(to) = to {
            foreign_keys.push(ForeignKeyFacts::new(from, referenced_table, to));
        }
    }

    Ok(assemble_table(table, columns, &primary_keys, &foreign_keys))
}

/// Decode by the value's storage class rather than the declared type
fn decode_value(row: &SqliteRow, ordinal: usize, _declared: &str) -> AdapterResult<Value> {
    let storage = row
        .try_get_raw(ordinal)
        .map_err(|e| decode_error(&ordinal.to_string(), e))?
        .type_info()
        .name()
        .to_string();

    let value = match storage.as_str() {
        "INTEGER" => Value::Integer(get_unchecked(row, ordinal)?),
        "REAL" => Value::Float(get_unchecked(row, ordinal)?),
        "TEXT" => Value::Text(get_unchecked(row, ordinal)?),
        "BLOB" => Value::lossy_text(&get_unchecked::<_, Vec<u8>>(row, ordinal)?),
        other => unsupported(other),
    };
    Ok(value)
}

#[async_trait]
impl DataStoreAdapter for LiveSqliteAdapter {
    fn engine(&self) -> EngineKind {
        EngineKind::Sqlite
    }

    async fn execute(&self, query: &str) -> AdapterResult<QueryOutput> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(|| AdapterError::closed(EngineKind::Sqlite))?;

        let returns_rows = !(&mut *conn)
            .prepare(query)
            .await
            .map_err(execution_error)?
            .columns()
            .is_empty();

        if !returns_rows {
            let done = sqlx::query(query)
                .execute(&mut *conn)
                .await
                .map_err(execution_error)?;
            return Ok(QueryOutput::Affected(done.rows_affected()));
        }

        let rows = sqlx::query(query)
            .fetch_all(&mut *conn)
            .await
            .map_err(execution_error)?;
        debug!(rows = rows.len(), "SQLite query returned rows");
        normalize_rows(&rows, decode_value).map(QueryOutput::Rows)
    }

    async fn introspect(&self) -> AdapterResult<Introspection> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(|| AdapterError::closed(EngineKind::Sqlite))?;

        let tables = sqlx::query_scalar::<_, String>(TABLES_QUERY)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| AdapterError::schema_build(self.path.display().to_string(), e))?;

        let mut introspection = Introspection::new();
        for table in tables {
            let result = describe_table(conn, &table).await;
            introspection.record(&table, result);
        }
        Ok(introspection)
    }

    async fn close(&self) -> AdapterResult<()> {
        if let Some(conn) = self.conn.lock().await.take() {
            conn.close().await.map_err(|e| {
                AdapterError::Connection(format!("Failed to close SQLite database: {e}"))
            })?;
            info!(path = %self.path.display(), "Closed SQLite database");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open(dir: &TempDir) -> LiveSqliteAdapter {
        let config = ConnectionConfig::new(EngineKind::Sqlite).with_path(dir.path().join("shop.db"));
        LiveSqliteAdapter::connect(&config).await.unwrap()
    }

    async fn seed(adapter: &LiveSqliteAdapter) {
        for statement in [
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, email TEXT)",
            "CREATE TABLE \"order items\" (id INTEGER PRIMARY KEY, user_id INTEGER REFERENCES users(id), price REAL, note BLOB)",
            "INSERT INTO users (name, email) VALUES ('Ada', 'ada@example.com'), ('Linus', NULL)",
            "INSERT INTO \"order items\" (user_id, price, note) VALUES (1, 9.5, X'6869')",
        ] {
            adapter.execute(statement).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_execute_select_and_mutation() {
        let dir = TempDir::new().unwrap();
        let adapter = open(&dir).await;
        seed(&adapter).await;

        let output = adapter
            .execute("SELECT id, name, email FROM users ORDER BY id")
            .await
            .unwrap();
        let rows = output.rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], Value::Text("Ada".to_string()));
        assert_eq!(rows[1]["email"], Value::Null);
        assert_eq!(rows[0].keys().collect::<Vec<_>>(), vec!["id", "name", "email"]);

        let updated = adapter
            .execute("UPDATE users SET email = 'x@example.com'")
            .await
            .unwrap();
        assert_eq!(updated, QueryOutput::Affected(2));
    }

    #[tokio::test]
    async fn test_empty_result_is_rows() {
        let dir = TempDir::new().unwrap();
        let adapter = open(&dir).await;
        seed(&adapter).await;

        let output = adapter.execute("SELECT * FROM users WHERE id < 0").await.unwrap();
        assert_eq!(output, QueryOutput::Rows(vec![]));
    }

    #[tokio::test]
    async fn test_value_normalization() {
        let dir = TempDir::new().unwrap();
        let adapter = open(&dir).await;
        seed(&adapter).await;

        let output = adapter
            .execute("SELECT price, note, user_id FROM \"order items\"")
            .await
            .unwrap();
        let row = &output.rows().unwrap()[0];
        assert_eq!(row["price"], Value::Float(9.5));
        assert_eq!(row["note"], Value::Text("hi".to_string()));
        assert_eq!(row["user_id"], Value::Integer(1));
    }

    #[tokio::test]
    async fn test_introspect_keys() {
        let dir = TempDir::new().unwrap();
        let adapter = open(&dir).await;
        seed(&adapter).await;

        let introspection = adapter.introspect().await.unwrap();
        assert!(introspection.skipped.is_empty());
        let names: Vec<_> = introspection.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["order items", "users"]);

        let users = &introspection.tables[1];
        assert!(users.column("id").unwrap().is_primary_key);
        assert!(!users.column("name").unwrap().is_nullable);
        assert!(users.column("email").unwrap().is_nullable);

        let items = &introspection.tables[0];
        let user_id = items.column("user_id").unwrap();
        assert_eq!(user_id.foreign_key_reference(), "users.id");
        assert_eq!(user_id.data_type, "INTEGER");
    }

    #[tokio::test]
    async fn test_introspect_empty_database() {
        let dir = TempDir::new().unwrap();
        let adapter = open(&dir).await;
        let introspection = adapter.introspect().await.unwrap();
        assert!(introspection.tables.is_empty());
    }

    #[tokio::test]
    async fn test_execute_error_and_close() {
        let dir = TempDir::new().unwrap();
        let adapter = open(&dir).await;

        let err = adapter.execute("SELECT * FROM missing").await.unwrap_err();
        assert!(matches!(err, AdapterError::Execution(_)));

        adapter.close().await.unwrap();
        adapter.close().await.unwrap();
        let err = adapter.execute("SELECT 1").await.unwrap_err();
        assert!(matches!(err, AdapterError::Connection(_)));
    }
}
