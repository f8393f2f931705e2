// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Live SQL Server adapter
//!
//! Speaks TDS through `tiberius` over a tokio TCP stream. The server
//! certificate is trusted as presented, matching typical on-premises setups.

use async_trait::async_trait;
use tiberius::time::chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use tiberius::{AuthMethod, Client, ColumnData, Config, FromSql};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info, warn};

use data_analyst_schema::Table;

use crate::config::ConnectionConfig;
use crate::engine::EngineKind;
use crate::error::{AdapterError, AdapterResult};
use crate::r#trait::{DataStoreAdapter, Introspection};
use crate::relational::{ColumnFacts, ForeignKeyFacts, assemble_table, is_yes, returns_rows};
use crate::value::{QueryOutput, Row, Value};

type TdsClient = Client<Compat<TcpStream>>;

const TABLES_QUERY: &str = "\
    SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES \
    WHERE TABLE_TYPE = 'BASE TABLE' AND TABLE_CATALOG = @P1 \
    ORDER BY TABLE_NAME";

const COLUMNS_QUERY: &str = "\
    SELECT COLUMN_NAME, DATA_TYPE, IS_NULLABLE \
    FROM INFORMATION_SCHEMA.COLUMNS \
    WHERE TABLE_NAME = @P1 \
    ORDER BY ORDINAL_POSITION";

const PRIMARY_KEYS_QUERY: &str = "\
    SELECT COLUMN_NAME FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE \
    WHERE OBJECTPROPERTY(OBJECT_ID(CONSTRAINT_SCHEMA + '.' + QUOTENAME(CONSTRAINT_NAME)), 'IsPrimaryKey') = 1 \
      AND TABLE_NAME = @P1";

const FOREIGN_KEYS_QUERY: &str = "\
    SELECT KCU.COLUMN_NAME, KCU2.TABLE_NAME, KCU2.COLUMN_NAME \
    FROM INFORMATION_SCHEMA.REFERENTIAL_CONSTRAINTS AS RC \
    INNER JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE AS KCU \
        ON KCU.CONSTRAINT_NAME = RC.CONSTRAINT_NAME \
    INNER JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE AS KCU2 \
        ON KCU2.CONSTRAINT_NAME = RC.UNIQUE_CONSTRAINT_NAME \
       AND KCU2.ORDINAL_POSITION = KCU.ORDINAL_POSITION \
    WHERE KCU.TABLE_NAME = @P1";

/// Live SQL Server adapter
pub struct LiveMsSqlAdapter {
    database: String,
    client: Mutex<Option<TdsClient>>,
}

impl LiveMsSqlAdapter {
    /// Open a session using `config`
    pub async fn connect(config: &ConnectionConfig) -> AdapterResult<Self> {
        let port = config.port_or_default();
        let connection_error = |e: &dyn std::fmt::Display| {
            AdapterError::Connection(format!(
                "Failed to connect to SQL Server at {}:{}: {}",
                config.host, port, e
            ))
        };

        let mut tds = Config::new();
        tds.host(&config.host);
        tds.port(port);
        tds.database(&config.database);
        tds.authentication(AuthMethod::sql_server(&config.user, &config.password));
        tds.trust_cert();

        let tcp = TcpStream::connect(tds.get_addr())
            .await
            .map_err(|e| connection_error(&e))?;
        tcp.set_nodelay(true).map_err(|e| connection_error(&e))?;

        let client = Client::connect(tds, tcp.compat_write())
            .await
            .map_err(|e| connection_error(&e))?;
        info!(host = %config.host, port, database = %config.database, "Connected to SQL Server");

        Ok(Self {
            database: config.database.clone(),
            client: Mutex::new(Some(client)),
        })
    }
}

fn text_at(row: &tiberius::Row, index: usize) -> AdapterResult<String> {
    row.try_get::<&str, _>(index)
        .map(|value| value.unwrap_or_default().to_string())
        .map_err(|e| AdapterError::Execution(format!("Failed to read catalog column {index}: {e}")))
}

async fn catalog_rows(
    client: &mut TdsClient,
    sql: &str,
    param: &str,
) -> Result<Vec<tiberius::Row>, tiberius::error::Error> {
    client.query(sql, &[&param]).await?.into_first_result().await
}

async fn describe_table(client: &mut TdsClient, table: &str) -> AdapterResult<Table> {
    let schema_error = |e: tiberius::error::Error| AdapterError::schema_build(table, e);

    let columns = catalog_rows(client, COLUMNS_QUERY, table)
        .await
        .map_err(schema_error)?
        .iter()
        .map(|row| {
            Ok(ColumnFacts::new(
                text_at(row, 0)?,
                text_at(row, 1)?,
                is_yes(&text_at(row, 2)?),
            ))
        })
        .collect::<AdapterResult<Vec<_>>>()?;

    let primary_keys = catalog_rows(client, PRIMARY_KEYS_QUERY, table)
        .await
        .map_err(schema_error)?
        .iter()
        .map(|row| text_at(row, 0))
        .collect::<AdapterResult<Vec<_>>>()?;

    let foreign_keys = catalog_rows(client, FOREIGN_KEYS_QUERY, table)
        .await
        .map_err(schema_error)?
        .iter()
        .map(|row| {
            Ok(ForeignKeyFacts::new(
                text_at(row, 0)?,
                text_at(row, 1)?,
                text_at(row, 2)?,
            ))
        })
        .collect::<AdapterResult<Vec<_>>>()?;

    Ok(assemble_table(table, columns, &primary_keys, &foreign_keys))
}

/// Convert one TDS cell into a [`Value`]
pub(crate) fn column_value(data: ColumnData<'static>) -> Value {
    let value = match data {
        ColumnData::U8(v) => v.map(|n| Value::Integer(n.into())),
        ColumnData::I16(v) => v.map(|n| Value::Integer(n.into())),
        ColumnData::I32(v) => v.map(|n| Value::Integer(n.into())),
        ColumnData::I64(v) => v.map(Value::Integer),
        ColumnData::F32(v) => v.map(|n| Value::Float(n.into())),
        ColumnData::F64(v) => v.map(Value::Float),
        ColumnData::Bit(v) => v.map(Value::Bool),
        ColumnData::String(v) => v.map(|s| Value::Text(s.into_owned())),
        ColumnData::Guid(v) => v.map(|g| Value::Text(g.to_string())),
        ColumnData::Numeric(v) => v.map(|n| Value::Text(n.to_string())),
        ColumnData::Binary(v) => v.map(|b| Value::lossy_text(&b)),
        ColumnData::Xml(v) => v.map(|x| Value::Text(x.into_owned().into_string())),
        ref temporal @ (ColumnData::DateTime(_)
        | ColumnData::SmallDateTime(_)
        | ColumnData::DateTime2(_)) => decode_temporal::<NaiveDateTime>(temporal)
            .map(|dt| Value::Text(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        ref temporal @ ColumnData::Date(_) => {
            decode_temporal::<NaiveDate>(temporal).map(|d| Value::Text(d.to_string()))
        }
        ref temporal @ ColumnData::Time(_) => {
            decode_temporal::<NaiveTime>(temporal).map(|t| Value::Text(t.to_string()))
        }
        ref temporal @ ColumnData::DateTimeOffset(_) => {
            decode_temporal::<DateTime<FixedOffset>>(temporal).map(|dt| Value::Text(dt.to_rfc3339()))
        }
        #[allow(unreachable_patterns)]
        _ => {
            warn!("Unsupported SQL Server column type rendered as null");
            None
        }
    };
    value.unwrap_or(Value::Null)
}

fn decode_temporal<T>(data: &ColumnData<'static>) -> Option<T>
where
    T: for<'a> FromSql<'a>,
{
    match T::from_sql(data) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Unsupported temporal value rendered as null");
            None
        }
    }
}

fn normalize_row(row: tiberius::Row) -> Row {
    let names: Vec<String> = row.columns().iter().map(|c| c.name().to_string()).collect();
    names
        .into_iter()
        .zip(row.into_iter().map(column_value))
        .collect()
}

#[async_trait]
impl DataStoreAdapter for LiveMsSqlAdapter {
    fn engine(&self) -> EngineKind {
        EngineKind::MsSql
    }

    async fn execute(&self, query: &str) -> AdapterResult<QueryOutput> {
        let mut guard = self.client.lock().await;
        let client = guard.as_mut().ok_or_else(|| AdapterError::closed(EngineKind::MsSql))?;
        let execution_error = |e: tiberius::error::Error| AdapterError::Execution(e.to_string());

        if !returns_rows(query) {
            let result = client.execute(query, &[]).await.map_err(execution_error)?;
            return Ok(QueryOutput::Affected(result.total()));
        }

        let rows = client
            .simple_query(query)
            .await
            .map_err(execution_error)?
            .into_first_result()
            .await
            .map_err(execution_error)?;
        debug!(rows = rows.len(), "SQL Server query returned rows");
        Ok(QueryOutput::Rows(rows.into_iter().map(normalize_row).collect()))
    }

    async fn introspect(&self) -> AdapterResult<Introspection> {
        let mut guard = self.client.lock().await;
        let client = guard.as_mut().ok_or_else(|| AdapterError::closed(EngineKind::MsSql))?;

        let tables = catalog_rows(client, TABLES_QUERY, &self.database)
            .await
            .map_err(|e| AdapterError::schema_build(&self.database, e))?
            .iter()
            .map(|row| text_at(row, 0))
            .collect::<AdapterResult<Vec<_>>>()
            .map_err(|e| AdapterError::schema_build(&self.database, e))?;

        let mut introspection = Introspection::new();
        for table in tables {
            let result = describe_table(client, &table).await;
            introspection.record(&table, result);
        }
        Ok(introspection)
    }

    async fn close(&self) -> AdapterResult<()> {
        if let Some(client) = self.client.lock().await.take() {
            client.close().await.map_err(|e| {
                AdapterError::Connection(format!("Failed to close SQL Server session: {e}"))
            })?;
            info!("Closed SQL Server session");
        }
        Ok(())
    }
}
