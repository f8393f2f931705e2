// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Live PostgreSQL adapter
//!
//! Holds one PostgreSQL session. Introspection covers the base tables of the
//! configured schema (`public` unless overridden); primary keys come from
//! `pg_index` and column comments from `col_description`.

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::{Decimal, JsonValue, Uuid};
use sqlx::{ConnectOptions, Connection, Executor, Row as _, Statement};
use tokio::sync::Mutex;
use tracing::{debug, info};

use data_analyst_schema::Table;

use crate::config::ConnectionConfig;
use crate::engine::EngineKind;
use crate::error::{AdapterError, AdapterResult};
use crate::r#trait::{DataStoreAdapter, Introspection};
use crate::relational::{ColumnFacts, ForeignKeyFacts, assemble_table, is_yes};
use crate::sql_support::{execution_error, get, normalize_rows, unsupported};
use crate::value::{QueryOutput, Value};

const TABLES_QUERY: &str = r#"
    SELECT table_name::text
    FROM information_schema.tables
    WHERE table_schema = $1
      AND table_type = 'BASE TABLE'
    ORDER BY table_name
"#;

const COLUMNS_QUERY: &str = r#"
    SELECT
        c.column_name::text,
        c.data_type::text,
        c.is_nullable::text,
        col_description(format('%I.%I', c.table_schema, c.table_name)::regclass, c.ordinal_position::int)
    FROM information_schema.columns c
    WHERE c.table_schema = $1
      AND c.table_name = $2
    ORDER BY c.ordinal_position
"#;

const PRIMARY_KEYS_QUERY: &str = r#"
    SELECT a.attname::text
    FROM pg_index i
    JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey)
    WHERE i.indrelid = format('%I.%I', $1::text, $2::text)::regclass
      AND i.indisprimary
"#;

const FOREIGN_KEYS_QUERY: &str = r#"
    SELECT
        kcu.column_name::text,
        ccu.table_name::text,
        ccu.column_name::text
    FROM information_schema.table_constraints AS tc
    JOIN information_schema.key_column_usage AS kcu
      ON tc.constraint_name = kcu.constraint_name
     AND tc.table_schema = kcu.table_schema
    JOIN information_schema.constraint_column_usage AS ccu
      ON ccu.constraint_name = tc.constraint_name
     AND ccu.table_schema = tc.table_schema
    WHERE tc.constraint_type = 'FOREIGN KEY'
      AND tc.table_schema = $1
      AND tc.table_name = $2
"#;

/// Live PostgreSQL adapter
pub struct LivePostgresAdapter {
    schema: String,
    conn: Mutex<Option<PgConnection>>,
}

impl LivePostgresAdapter {
    /// Open a session using `config`
    pub async fn connect(config: &ConnectionConfig) -> AdapterResult<Self> {
        let port = config.port_or_default();
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database);

        let conn = options.connect().await.map_err(|e| {
            AdapterError::Connection(format!(
                "Failed to connect to PostgreSQL at {}:{}: {}",
                config.host, port, e
            ))
        })?;
        info!(
            host = %config.host,
            port,
            database = %config.database,
            schema = %config.schema,
            "Connected to PostgreSQL"
        );

        Ok(Self {
            schema: config.schema.clone(),
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Schema whose tables are introspected
    pub fn schema(&self) -> &str {
        &self.schema
    }
}

async fn describe_table(conn: &mut PgConnection, schema: &str, table: &str) -> AdapterResult<Table> {
    let columns = sqlx::query_as::<_, (String, String, String, Option<String>)>(COLUMNS_QUERY)
        .bind(schema)
        .bind(table)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| AdapterError::schema_build(table, e))?;

    let primary_keys = sqlx::query_scalar::<_, String>(PRIMARY_KEYS_QUERY)
        .bind(schema)
        .bind(table)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| AdapterError::schema_build(table, e))?;

    let foreign_keys: Vec<ForeignKeyFacts> =
        sqlx::query_as::<_, (String, String, String)>(FOREIGN_KEYS_QUERY)
            .bind(schema)
            .bind(table)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| AdapterError::schema_build(table, e))?
            .into_iter()
            .map(|(column, table, referenced)| ForeignKeyFacts::new(column, table, referenced))
            .collect();

    let facts = columns
        .into_iter()
        .map(|(name, data_type, nullable, comment)| {
            ColumnFacts::new(name, data_type, is_yes(&nullable)).with_comment(comment)
        });

    Ok(assemble_table(table, facts, &primary_keys, &foreign_keys))
}

fn decode_value(row: &PgRow, ordinal: usize, type_name: &str) -> AdapterResult<Value> {
    let value = match type_name {
        "BOOL" => Value::Bool(get(row, ordinal)?),
        "INT2" => Value::Integer(get::<_, i16>(row, ordinal)?.into()),
        "INT4" => Value::Integer(get::<_, i32>(row, ordinal)?.into()),
        "INT8" => Value::Integer(get(row, ordinal)?),
        "FLOAT4" => Value::Float(get::<_, f32>(row, ordinal)?.into()),
        "FLOAT8" => Value::Float(get(row, ordinal)?),
        "NUMERIC" => match row.try_get::<Decimal, _>(ordinal) {
            Ok(decimal) => Value::Text(decimal.to_string()),
            Err(_) => unsupported(type_name),
        },
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "UNKNOWN" => Value::Text(get(row, ordinal)?),
        "UUID" => Value::Text(get::<_, Uuid>(row, ordinal)?.to_string()),
        "DATE" => Value::Text(get::<_, NaiveDate>(row, ordinal)?.to_string()),
        "TIME" => Value::Text(get::<_, NaiveTime>(row, ordinal)?.to_string()),
        "TIMESTAMP" => Value::Text(
            get::<_, NaiveDateTime>(row, ordinal)?
                .format("%Y-%m-%dT%H:%M:%S%.f")
                .to_string(),
        ),
        "TIMESTAMPTZ" => Value::Text(get::<_, DateTime<Utc>>(row, ordinal)?.to_rfc3339()),
        "JSON" | "JSONB" => Value::from(get::<_, JsonValue>(row, ordinal)?),
        "BYTEA" => Value::lossy_text(&get::<_, Vec<u8>>(row, ordinal)?),
        "BOOL[]" => list(get::<_, Vec<Option<bool>>>(row, ordinal)?),
        "INT2[]" => list(get::<_, Vec<Option<i16>>>(row, ordinal)?.into_iter().map(|v| v.map(i64::from))),
        "INT4[]" => list(get::<_, Vec<Option<i32>>>(row, ordinal)?.into_iter().map(|v| v.map(i64::from))),
        "INT8[]" => list(get::<_, Vec<Option<i64>>>(row, ordinal)?),
        "FLOAT8[]" => list(get::<_, Vec<Option<f64>>>(row, ordinal)?),
        "TEXT[]" | "VARCHAR[]" => list(get::<_, Vec<Option<String>>>(row, ordinal)?),
        other => unsupported(other),
    };
    Ok(value)
}

fn list<T: Into<Value>>(items: impl IntoIterator<Item = Option<T>>) -> Value {
    Value::List(items.into_iter().map(Value::from).collect())
}

#[async_trait]
impl DataStoreAdapter for LivePostgresAdapter {
    fn engine(&self) -> EngineKind {
        EngineKind::PostgreSql
    }

    async fn execute(&self, query: &str) -> AdapterResult<QueryOutput> {
        let mut guard = self.conn.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| AdapterError::closed(EngineKind::PostgreSql))?;

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
        debug!(rows = rows.len(), "PostgreSQL query returned rows");
        normalize_rows(&rows, decode_value).map(QueryOutput::Rows)
    }

    async fn introspect(&self) -> AdapterResult<Introspection> {
        let mut guard = self.conn.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| AdapterError::closed(EngineKind::PostgreSql))?;

        let tables = sqlx::query_scalar::<_, String>(TABLES_QUERY)
            .bind(&self.schema)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| AdapterError::schema_build(&self.schema, e))?;

        let mut introspection = Introspection::new();
        for table in tables {
            let result = describe_table(conn, &self.schema, &table).await;
            introspection.record(&table, result);
        }
        Ok(introspection)
    }

    async fn close(&self) -> AdapterResult<()> {
        if let Some(conn) = self.conn.lock().await.take() {
            conn.close().await.map_err(|e| {
                AdapterError::Connection(format!("Failed to close PostgreSQL session: {e}"))
            })?;
            info!("Closed PostgreSQL session");
        }
        Ok(())
    }
}
