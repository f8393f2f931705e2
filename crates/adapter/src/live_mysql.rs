// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Live MySQL adapter
//!
//! Holds one MySQL session and reads schema information from
//! `information_schema`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use data_analyst_adapter::{ConnectionConfig, DataStoreAdapter, EngineKind};
//! use data_analyst_adapter::live_mysql::LiveMySqlAdapter;
//!
//! let config = ConnectionConfig::new(EngineKind::MySql)
//!     .with_credentials("root", "secret")
//!     .with_database("shop");
//! let adapter = LiveMySqlAdapter::connect(&config).await?;
//! let introspection = adapter.introspect().await?;
//! ```

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::{Decimal, JsonValue};
use sqlx::{ConnectOptions, Connection, Executor, Statement};
use tokio::sync::Mutex;
use tracing::{debug, info};

use data_analyst_schema::Table;

use crate::config::ConnectionConfig;
use crate::engine::EngineKind;
use crate::error::{AdapterError, AdapterResult};
use crate::r#trait::{DataStoreAdapter, Introspection};
use crate::relational::{ColumnFacts, ForeignKeyFacts, assemble_table, is_yes};
use crate::sql_support::{execution_error, get, get_unchecked, normalize_rows, unsupported};
use crate::value::{QueryOutput, Value};

const TABLES_QUERY: &str = r#"
    SELECT CAST(TABLE_NAME AS CHAR)
    FROM information_schema.TABLES
    WHERE TABLE_SCHEMA = DATABASE()
      AND TABLE_TYPE IN ('BASE TABLE', 'VIEW')
    ORDER BY TABLE_NAME
"#;

const COLUMNS_QUERY: &str = r#"
    SELECT
        CAST(COLUMN_NAME AS CHAR),
        CAST(COLUMN_TYPE AS CHAR),
        CAST(IS_NULLABLE AS CHAR),
        CAST(COLUMN_KEY AS CHAR),
        CAST(COLUMN_COMMENT AS CHAR)
    FROM information_schema.COLUMNS
    WHERE TABLE_SCHEMA = DATABASE()
      AND TABLE_NAME = ?
    ORDER BY ORDINAL_POSITION
"#;

const FOREIGN_KEYS_QUERY: &str = r#"
    SELECT
        CAST(COLUMN_NAME AS CHAR),
        CAST(REFERENCED_TABLE_NAME AS CHAR),
        CAST(REFERENCED_COLUMN_NAME AS CHAR)
    FROM information_schema.KEY_COLUMN_USAGE
    WHERE TABLE_SCHEMA = DATABASE()
      AND TABLE_NAME = ?
      AND REFERENCED_TABLE_NAME IS NOT NULL
    ORDER BY ORDINAL_POSITION
"#;

/// Live MySQL adapter
pub struct LiveMySqlAdapter {
    database: String,
    conn: Mutex<Option<MySqlConnection>>,
}

impl LiveMySqlAdapter {
    /// Open a session using `config`
    pub async fn connect(config: &ConnectionConfig) -> AdapterResult<Self> {
        let port = config.port_or_default();
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database);

        let conn = options.connect().await.map_err(|e| {
            AdapterError::Connection(format!(
                "Failed to connect to MySQL at {}:{}: {}",
                config.host, port, e
            ))
        })?;
        info!(host = %config.host, port, database = %config.database, "Connected to MySQL");

        Ok(Self {
            database: config.database.clone(),
            conn: Mutex::new(Some(conn)),
        })
    }
}

async fn describe_table(conn: &mut MySqlConnection, table: &str) -> AdapterResult<Table> {
    let columns = sqlx::query_as::<_, (String, String, String, String, Option<String>)>(COLUMNS_QUERY)
        .bind(table)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| AdapterError::schema_build(table, e))?;

    let foreign_keys = sqlx::query_as::<_, (String, String, String)>(FOREIGN_KEYS_QUERY)
        .bind(table)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| AdapterError::schema_build(table, e))?;

    let primary_keys: Vec<String> = columns
        .iter()
        .filter(|(_, _, _, key, _)| key == "PRI")
        .map(|(name, ..)| name.clone())
        .collect();

    let facts = columns
        .into_iter()
        .map(|(name, data_type, nullable, _, comment)| {
            ColumnFacts::new(name, data_type, is_yes(&nullable)).with_comment(comment)
        });
    let foreign_keys: Vec<ForeignKeyFacts> = foreign_keys
        .into_iter()
        .map(|(column, table, referenced)| ForeignKeyFacts::new(column, table, referenced))
        .collect();

    Ok(assemble_table(table, facts, &primary_keys, &foreign_keys))
}

fn decode_value(row: &MySqlRow, ordinal: usize, type_name: &str) -> AdapterResult<Value> {
    let value = match type_name {
        "BOOLEAN" => Value::Bool(get(row, ordinal)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            Value::Integer(get::<_, i64>(row, ordinal)?)
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => {
            let n = get::<_, u64>(row, ordinal)?;
            i64::try_from(n).map_or(Value::Text(n.to_string()), Value::Integer)
        }
        "YEAR" => Value::Integer(get_unchecked::<_, u16>(row, ordinal)?.into()),
        "FLOAT" => Value::Float(get::<_, f32>(row, ordinal)?.into()),
        "DOUBLE" => Value::Float(get(row, ordinal)?),
        "DECIMAL" => Value::Text(get::<_, Decimal>(row, ordinal)?.to_string()),
        "DATE" => Value::Text(get::<_, NaiveDate>(row, ordinal)?.to_string()),
        "TIME" => Value::Text(get::<_, NaiveTime>(row, ordinal)?.to_string()),
        "DATETIME" => Value::Text(
            get::<_, NaiveDateTime>(row, ordinal)?
                .format("%Y-%m-%dT%H:%M:%S%.f")
                .to_string(),
        ),
        "TIMESTAMP" => Value::Text(get::<_, DateTime<Utc>>(row, ordinal)?.to_rfc3339()),
        "JSON" => Value::from(get::<_, JsonValue>(row, ordinal)?),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT" => {
            Value::lossy_text(&get_unchecked::<_, Vec<u8>>(row, ordinal)?)
        }
        "CHAR" | "VARCHAR" | "TINYTEXT" | "TEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" | "SET" => {
            Value::Text(get(row, ordinal)?)
        }
        other => unsupported(other),
    };
    Ok(value)
}

#[async_trait]
impl DataStoreAdapter for LiveMySqlAdapter {
    fn engine(&self) -> EngineKind {
        EngineKind::MySql
    }

    async fn execute(&self, query: &str) -> AdapterResult<QueryOutput> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(|| AdapterError::closed(EngineKind::MySql))?;

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
        debug!(rows = rows.len(), "MySQL query returned rows");
        normalize_rows(&rows, decode_value).map(QueryOutput::Rows)
    }

    async fn introspect(&self) -> AdapterResult<Introspection> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(|| AdapterError::closed(EngineKind::MySql))?;

        let tables = sqlx::query_scalar::<_, String>(TABLES_QUERY)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| AdapterError::schema_build(&self.database, e))?;

        let mut introspection = Introspection::new();
        for table in tables {
            let result = describe_table(conn, &table).await;
            introspection.record(&table, result);
        }
        Ok(introspection)
    }

    async fn close(&self) -> AdapterResult<()> {
        if let Some(conn) = self.conn.lock().await.take() {
            conn.close()
                .await
                .map_err(|e| AdapterError::Connection(format!("Failed to close MySQL session: {e}")))?;
            info!("Closed MySQL session");
        }
        Ok(())
    }
}
