// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Engine descriptors
//!
//! [`EngineKind`] is the closed set of supported data stores. Each engine
//! names the [`QueryLanguage`] the generator must produce for it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AdapterError;
use crate::statement::LexicalRules;

/// Supported data store engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// MySQL / MariaDB
    MySql,
    /// PostgreSQL
    #[serde(alias = "postgres")]
    PostgreSql,
    /// Microsoft SQL Server
    #[serde(alias = "sqlserver")]
    MsSql,
    /// SQLite file database
    Sqlite,
    /// MongoDB document store
    #[serde(alias = "mongo")]
    MongoDb,
    /// Elasticsearch search indices
    #[serde(alias = "es")]
    Elasticsearch,
    /// InfluxDB 1.x time series
    #[serde(alias = "influx")]
    InfluxDb,
    /// SQL Server Analysis Services cubes
    Ssas,
}

impl EngineKind {
    /// Every supported engine
    pub const ALL: [EngineKind; 8] = [
        EngineKind::MySql,
        EngineKind::PostgreSql,
        EngineKind::MsSql,
        EngineKind::Sqlite,
        EngineKind::MongoDb,
        EngineKind::Elasticsearch,
        EngineKind::InfluxDb,
        EngineKind::Ssas,
    ];

    /// Canonical configuration name
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::MySql => "mysql",
            EngineKind::PostgreSql => "postgresql",
            EngineKind::MsSql => "mssql",
            EngineKind::Sqlite => "sqlite",
            EngineKind::MongoDb => "mongodb",
            EngineKind::Elasticsearch => "elasticsearch",
            EngineKind::InfluxDb => "influxdb",
            EngineKind::Ssas => "ssas",
        }
    }

    /// Port used when the configuration does not name one
    pub fn default_port(&self) -> Option<u16> {
        match self {
            EngineKind::MySql => Some(3306),
            EngineKind::PostgreSql => Some(5432),
            EngineKind::MsSql => Some(1433),
            EngineKind::Sqlite => None,
            EngineKind::MongoDb => Some(27017),
            EngineKind::Elasticsearch => Some(9200),
            EngineKind::InfluxDb => Some(8086),
            EngineKind::Ssas => Some(2383),
        }
    }

    /// Whether a database/catalog name is mandatory
    pub fn requires_database(&self) -> bool {
        !matches!(self, EngineKind::Sqlite | EngineKind::Elasticsearch)
    }

    /// Whether the engine is reached over HTTP
    pub fn is_http(&self) -> bool {
        matches!(self, EngineKind::Elasticsearch | EngineKind::InfluxDb)
    }

    /// Query language accepted by `execute`
    pub fn query_language(&self) -> QueryLanguage {
        match self {
            EngineKind::MySql => QueryLanguage::MySql,
            EngineKind::PostgreSql => QueryLanguage::PostgreSql,
            EngineKind::MsSql => QueryLanguage::TSql,
            EngineKind::Sqlite => QueryLanguage::Sqlite,
            EngineKind::MongoDb => QueryLanguage::MongoShell,
            EngineKind::Elasticsearch => QueryLanguage::ElasticsearchSql,
            EngineKind::InfluxDb => QueryLanguage::InfluxQl,
            EngineKind::Ssas => QueryLanguage::Mdx,
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" => Ok(EngineKind::MySql),
            "postgresql" | "postgres" => Ok(EngineKind::PostgreSql),
            "mssql" | "sqlserver" => Ok(EngineKind::MsSql),
            "sqlite" => Ok(EngineKind::Sqlite),
            "mongodb" | "mongo" => Ok(EngineKind::MongoDb),
            "elasticsearch" | "es" => Ok(EngineKind::Elasticsearch),
            "influxdb" | "influx" => Ok(EngineKind::InfluxDb),
            "ssas" => Ok(EngineKind::Ssas),
            other => Err(AdapterError::Config(format!(
                "unknown engine '{other}', expected one of: {}",
                EngineKind::ALL.map(|e| e.as_str()).join(", ")
            ))),
        }
    }
}

/// Query language an engine executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryLanguage {
    MySql,
    PostgreSql,
    TSql,
    Sqlite,
    /// `collection.operation(argument)` surface syntax
    MongoShell,
    ElasticsearchSql,
    InfluxQl,
    Mdx,
}

impl QueryLanguage {
    /// Human-readable name used in grounding instructions
    pub fn display_name(&self) -> &'static str {
        match self {
            QueryLanguage::MySql => "MySQL SQL",
            QueryLanguage::PostgreSql => "PostgreSQL SQL",
            QueryLanguage::TSql => "Microsoft SQL Server T-SQL",
            QueryLanguage::Sqlite => "SQLite SQL",
            QueryLanguage::MongoShell => "MongoDB query",
            QueryLanguage::ElasticsearchSql => "Elasticsearch SQL",
            QueryLanguage::InfluxQl => "InfluxQL",
            QueryLanguage::Mdx => "MDX",
        }
    }

    /// Keyword every retrieval statement starts with
    ///
    /// `None` for the MongoDB syntax, whose statements are checked by the
    /// operation parser instead.
    pub fn retrieval_keyword(&self) -> Option<&'static str> {
        match self {
            QueryLanguage::MongoShell => None,
            _ => Some("SELECT"),
        }
    }

    /// How literals, quoted identifiers and comments are written
    pub fn lexical_rules(&self) -> LexicalRules {
        match self {
            QueryLanguage::MySql => LexicalRules::mysql(),
            QueryLanguage::PostgreSql => LexicalRules::postgres(),
            QueryLanguage::TSql => LexicalRules::tsql(),
            QueryLanguage::InfluxQl => LexicalRules::influxql(),
            _ => LexicalRules::default(),
        }
    }

    /// Whether `WITH` introduces common table expressions in this language
    pub fn supports_cte(&self) -> bool {
        matches!(
            self,
            QueryLanguage::MySql | QueryLanguage::PostgreSql | QueryLanguage::TSql | QueryLanguage::Sqlite
        )
    }
}

impl fmt::Display for QueryLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_engine_aliases() {
        assert_eq!("postgres".parse::<EngineKind>().unwrap(), EngineKind::PostgreSql);
        assert_eq!(" MongoDB ".parse::<EngineKind>().unwrap(), EngineKind::MongoDb);
        assert_eq!("es".parse::<EngineKind>().unwrap(), EngineKind::Elasticsearch);
        assert_eq!("sqlserver".parse::<EngineKind>().unwrap(), EngineKind::MsSql);
    }

    #[test]
    fn test_parse_unknown_engine() {
        let err = "oracle".parse::<EngineKind>().unwrap_err();
        assert!(matches!(err, AdapterError::Config(_)));
        assert!(err.to_string().contains("oracle"));
    }

    #[test]
    fn test_display_round_trips() {
        for engine in EngineKind::ALL {
            assert_eq!(engine.to_string().parse::<EngineKind>().unwrap(), engine);
        }
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&EngineKind::InfluxDb).unwrap();
        assert_eq!(json, "\"influxdb\"");
        let parsed: EngineKind = serde_json::from_str("\"postgres\"").unwrap();
        assert_eq!(parsed, EngineKind::PostgreSql);
    }

    #[test]
    fn test_retrieval_keywords() {
        assert_eq!(EngineKind::Ssas.query_language().retrieval_keyword(), Some("SELECT"));
        assert_eq!(EngineKind::MongoDb.query_language().retrieval_keyword(), None);
        assert!(!QueryLanguage::Mdx.supports_cte());
    }
}
