// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Live SSAS adapter
//!
//! Talks to Analysis Services through the system ODBC driver manager. ODBC
//! calls block, so every call runs on tokio's blocking pool while holding the
//! session lock.

use async_trait::async_trait;
use odbc_api::buffers::TextRowSet;
use odbc_api::{Connection, ConnectionOptions, Cursor, DataType, Environment, ResultSetMetadata};
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::engine::EngineKind;
use crate::error::{AdapterError, AdapterResult};
use crate::olap::{
    CUBES_QUERY, CellKind, CubeDimension, CubeMeasure, assemble_cube, cell_value,
    connection_string, dimensions_query, measures_query,
};
use crate::r#trait::{DataStoreAdapter, Introspection};
use crate::value::{QueryOutput, Row, Value};

const BATCH_SIZE: usize = 256;
const MAX_TEXT_LEN: usize = 4096;

static ENVIRONMENT: OnceLock<Environment> = OnceLock::new();

fn environment() -> AdapterResult<&'static Environment> {
    if let Some(environment) = ENVIRONMENT.get() {
        return Ok(environment);
    }
    let environment = Environment::new().map_err(|e| {
        AdapterError::Connection(format!("Failed to initialize ODBC environment: {e}"))
    })?;
    Ok(ENVIRONMENT.get_or_init(|| environment))
}

type Session = Arc<Mutex<Option<Connection<'static>>>>;

/// Live SSAS adapter
pub struct LiveSsasAdapter {
    session: Session,
}

impl LiveSsasAdapter {
    /// Open an ODBC session using `config`
    pub async fn connect(config: &ConnectionConfig) -> AdapterResult<Self> {
        let port = config.port_or_default();
        let connection_string = connection_string(
            &config.odbc_driver,
            &config.host,
            port,
            &config.database,
            &config.user,
            &config.password,
        );
        let host = config.host.clone();

        let connection = tokio::task::spawn_blocking(move || {
            environment()?
                .connect_with_connection_string(&connection_string, ConnectionOptions::default())
                .map_err(|e| {
                    AdapterError::Connection(format!(
                        "Failed to connect to SSAS at {host}:{port}: {e}"
                    ))
                })
        })
        .await
        .map_err(|e| AdapterError::Connection(format!("ODBC worker failed: {e}")))??;
        info!(host = %config.host, port, database = %config.database, "Connected to SSAS");

        Ok(Self {
            session: Arc::new(Mutex::new(Some(connection))),
        })
    }

    async fn with_connection<T, F>(&self, f: F) -> AdapterResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection<'static>) -> AdapterResult<T> + Send + 'static,
    {
        let session = Arc::clone(&self.session);
        tokio::task::spawn_blocking(move || {
            let guard = session
                .lock()
                .map_err(|_| AdapterError::Connection("SSAS session lock poisoned".to_string()))?;
            let connection = guard.as_ref().ok_or_else(|| AdapterError::closed(EngineKind::Ssas))?;
            f(connection)
        })
        .await
        .map_err(|e| AdapterError::Execution(format!("ODBC worker failed: {e}")))?
    }
}

fn cell_kind(data_type: DataType) -> CellKind {
    match data_type {
        DataType::TinyInt | DataType::SmallInt | DataType::Integer | DataType::BigInt => {
            CellKind::Integer
        }
        DataType::Real | DataType::Float { .. } | DataType::Double => CellKind::Float,
        DataType::Bit => CellKind::Bool,
        _ => CellKind::Text,
    }
}

/// Run `query`, returning `None` when it produced no result set
fn fetch_rows(connection: &Connection<'_>, query: &str) -> Result<Option<Vec<Row>>, odbc_api::Error> {
    let Some(mut cursor) = connection.execute(query, (), None)? else {
        return Ok(None);
    };

    let names: Vec<String> = cursor.column_names()?.collect::<Result<_, _>>()?;
    let mut kinds = Vec::with_capacity(names.len());
    for column in 1..=names.len() {
        let column = u16::try_from(column).unwrap_or(u16::MAX);
        kinds.push(cell_kind(cursor.col_data_type(column)?));
    }

    let mut buffers = TextRowSet::for_cursor(BATCH_SIZE, &mut cursor, Some(MAX_TEXT_LEN))?;
    let mut bound = cursor.bind_buffer(&mut buffers)?;
    let mut rows = Vec::new();
    while let Some(batch) = bound.fetch()? {
        for row_index in 0..batch.num_rows() {
            let row = names
                .iter()
                .enumerate()
                .map(|(col, name)| (name.clone(), cell_value(kinds[col], batch.at(col, row_index))))
                .collect();
            rows.push(row);
        }
    }
    Ok(Some(rows))
}

fn text_cells(row: &Row) -> Vec<Option<String>> {
    row.values()
        .map(|value| match value {
            Value::Null => None,
            Value::Text(text) => Some(text.clone()),
            other => serde_json::to_string(other).ok(),
        })
        .collect()
}

fn catalog_rows(connection: &Connection<'_>, unit: &str, query: &str) -> AdapterResult<Vec<Vec<Option<String>>>> {
    let rows = fetch_rows(connection, query)
        .map_err(|e| AdapterError::schema_build(unit, e))?
        .unwrap_or_default();
    Ok(rows.iter().map(text_cells).collect())
}

fn describe_cube(connection: &Connection<'_>, cube: &str) -> AdapterResult<data_analyst_schema::Table> {
    let dimensions: Vec<CubeDimension> = catalog_rows(connection, cube, &dimensions_query(cube))?
        .into_iter()
        .filter_map(|mut cells| {
            cells.resize(3, None);
            let dimension_type = cells[2].take();
            let unique_name = cells[1].take().unwrap_or_default();
            let name = cells[0].take()?;
            Some(CubeDimension { name, unique_name, dimension_type })
        })
        .collect();

    let measures: Vec<CubeMeasure> = catalog_rows(connection, cube, &measures_query(cube))?
        .into_iter()
        .filter_map(|mut cells| {
            cells.resize(3, None);
            let data_type = cells[2].take();
            let unique_name = cells[1].take().unwrap_or_default();
            let name = cells[0].take()?;
            Some(CubeMeasure { name, unique_name, data_type })
        })
        .collect();

    debug!(cube, dimensions = dimensions.len(), measures = measures.len(), "Described cube");
    Ok(assemble_cube(cube, &dimensions, &measures))
}

#[async_trait]
impl DataStoreAdapter for LiveSsasAdapter {
    fn engine(&self) -> EngineKind {
        EngineKind::Ssas
    }

    async fn execute(&self, query: &str) -> AdapterResult<QueryOutput> {
        let query = query.to_string();
        self.with_connection(move |connection| {
            let rows = fetch_rows(connection, &query)
                .map_err(|e| AdapterError::Execution(e.to_string()))?;
            Ok(match rows {
                Some(rows) => QueryOutput::Rows(rows),
                None => QueryOutput::Affected(0),
            })
        })
        .await
    }

    async fn introspect(&self) -> AdapterResult<Introspection> {
        self.with_connection(|connection| {
            let mut cubes: Vec<String> = catalog_rows(connection, "MDSCHEMA_CUBES", CUBES_QUERY)?
                .into_iter()
                .filter_map(|cells| cells.into_iter().next().flatten())
                .collect();
            cubes.sort();
            cubes.dedup();

            let mut introspection = Introspection::new();
            for cube in cubes {
                let result = describe_cube(connection, &cube);
                introspection.record(&cube, result);
            }
            Ok(introspection)
        })
        .await
    }

    async fn close(&self) -> AdapterResult<()> {
        let session = Arc::clone(&self.session);
        let closed = tokio::task::spawn_blocking(move || {
            let connection = session
                .lock()
                .map_err(|_| AdapterError::Connection("SSAS session lock poisoned".to_string()))?
                .take();
            Ok::<_, AdapterError>(connection.is_some())
        })
        .await
        .map_err(|e| AdapterError::Connection(format!("ODBC worker failed: {e}")))??;

        if closed {
            info!("Closed SSAS session");
        }
        Ok(())
    }
}
