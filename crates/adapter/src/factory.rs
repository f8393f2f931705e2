// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Adapter construction from configuration

use std::sync::Arc;
use tracing::info;

use crate::config::ConnectionConfig;
use crate::error::{AdapterError, AdapterResult};
use crate::r#trait::DataStoreAdapter;

/// Open an adapter for the configured engine
///
/// # Errors
///
/// Returns `AdapterError::Config` for invalid settings or an engine this build
/// was compiled without, and `AdapterError::Connection` when the engine cannot
/// be reached.
pub async fn connect(config: &ConnectionConfig) -> AdapterResult<Arc<dyn DataStoreAdapter>> {
    config.validate()?;
    info!(engine = %config.engine, host = %config.host, "Opening data store adapter");

    use crate::engine::EngineKind;
    let adapter: Arc<dyn DataStoreAdapter> = match config.engine {
        #[cfg(feature = "mysql")]
        EngineKind::MySql => Arc::new(crate::live_mysql::LiveMySqlAdapter::connect(config).await?),
        #[cfg(feature = "postgresql")]
        EngineKind::PostgreSql => {
            Arc::new(crate::live_postgres::LivePostgresAdapter::connect(config).await?)
        }
        #[cfg(feature = "mssql")]
        EngineKind::MsSql => Arc::new(crate::live_mssql::LiveMsSqlAdapter::connect(config).await?),
        #[cfg(feature = "sqlite")]
        EngineKind::Sqlite => {
            Arc::new(crate::live_sqlite::LiveSqliteAdapter::connect(config).await?)
        }
        #[cfg(feature = "mongodb")]
        EngineKind::MongoDb => {
            Arc::new(crate::live_mongodb::LiveMongoAdapter::connect(config).await?)
        }
        #[cfg(feature = "elasticsearch")]
        EngineKind::Elasticsearch => {
            Arc::new(crate::live_elasticsearch::LiveElasticsearchAdapter::connect(config).await?)
        }
        #[cfg(feature = "influxdb")]
        EngineKind::InfluxDb => {
            Arc::new(crate::live_influxdb::LiveInfluxAdapter::connect(config).await?)
        }
        #[cfg(feature = "ssas")]
        EngineKind::Ssas => Arc::new(crate::live_ssas::LiveSsasAdapter::connect(config).await?),
        #[allow(unreachable_patterns)]
        other => {
            return Err(AdapterError::Config(format!(
                "engine '{other}' is not enabled in this build"
            )));
        }
    };

    Ok(adapter)
}
