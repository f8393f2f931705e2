// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Live MongoDB adapter
//!
//! Executes the operation syntax parsed by [`crate::mongo_query`] and infers
//! collection schemas from sampled documents.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{Bson, Document, doc};
use mongodb::options::{ClientOptions, Credential};
use mongodb::{Client, Database};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use data_analyst_schema::Table;

use crate::config::ConnectionConfig;
use crate::document::{DocumentSchemaBuilder, SamplingPolicy};
use crate::engine::EngineKind;
use crate::error::{AdapterError, AdapterResult};
use crate::mongo_query::{JsonObject, MongoCommand, MongoOperation};
use crate::r#trait::{DataStoreAdapter, Introspection};
use crate::value::{QueryOutput, Row, Value};

struct MongoSession {
    client: Client,
    database: Database,
}

/// Live MongoDB adapter
pub struct LiveMongoAdapter {
    database_name: String,
    sampling: SamplingPolicy,
    session: Mutex<Option<MongoSession>>,
}

impl LiveMongoAdapter {
    /// Connect and verify the deployment answers a ping
    pub async fn connect(config: &ConnectionConfig) -> AdapterResult<Self> {
        let port = config.port_or_default();
        let connection_error = |e: mongodb::error::Error| {
            AdapterError::Connection(format!(
                "Failed to connect to MongoDB at {}:{}: {}",
                config.host, port, e
            ))
        };

        let mut options = ClientOptions::parse(format!("mongodb://{}:{}", config.host, port))
            .await
            .map_err(connection_error)?;
        if config.has_credentials() {
            options.credential = Some(
                Credential::builder()
                    .username(config.user.clone())
                    .password(config.password.clone())
                    .source(config.database.clone())
                    .build(),
            );
        }
        options.app_name = Some("data-analyst".to_string());

        let client = Client::with_options(options).map_err(connection_error)?;
        let database = client.database(&config.database);
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(connection_error)?;
        info!(host = %config.host, port, database = %config.database, "Connected to MongoDB");

        Ok(Self {
            database_name: config.database.clone(),
            sampling: config.sampling,
            session: Mutex::new(Some(MongoSession { client, database })),
        })
    }
}

/// MongoDB `$type` alias of a value; `None` for null
pub(crate) fn bson_type_label(value: &Bson) -> Option<&'static str> {
    let label = match value {
        Bson::Null | Bson::Undefined => return None,
        Bson::Double(_) => "double",
        Bson::String(_) => "string",
        Bson::Document(_) => "object",
        Bson::Array(_) => "array",
        Bson::Binary(_) => "binData",
        Bson::ObjectId(_) => "objectId",
        Bson::Boolean(_) => "bool",
        Bson::DateTime(_) => "date",
        Bson::RegularExpression(_) => "regex",
        Bson::JavaScriptCode(_) => "javascript",
        Bson::JavaScriptCodeWithScope(_) => "javascriptWithScope",
        Bson::Int32(_) => "int",
        Bson::Timestamp(_) => "timestamp",
        Bson::Int64(_) => "long",
        Bson::Decimal128(_) => "decimal",
        Bson::MinKey => "minKey",
        Bson::MaxKey => "maxKey",
        Bson::Symbol(_) => "symbol",
        Bson::DbPointer(_) => "dbPointer",
    };
    Some(label)
}

/// Convert a BSON value into a JSON-compatible [`Value`]
pub(crate) fn bson_to_value(value: Bson) -> Value {
    match value {
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(b) => Value::Bool(b),
        Bson::Int32(n) => Value::Integer(n.into()),
        Bson::Int64(n) => Value::Integer(n),
        Bson::Double(f) => Value::Float(f),
        Bson::String(s) | Bson::Symbol(s) | Bson::JavaScriptCode(s) => Value::Text(s),
        Bson::ObjectId(oid) => Value::Text(oid.to_hex()),
        Bson::DateTime(dt) => Value::Text(
            dt.try_to_rfc3339_string()
                .unwrap_or_else(|_| dt.timestamp_millis().to_string()),
        ),
        Bson::Decimal128(d) => Value::Text(d.to_string()),
        Bson::Binary(binary) => Value::lossy_text(&binary.bytes),
        Bson::Timestamp(ts) => Value::Text(format!("{}:{}", ts.time, ts.increment)),
        Bson::RegularExpression(regex) => {
            Value::Text(format!("/{}/{}", regex.pattern, regex.options))
        }
        Bson::Array(items) => Value::List(items.into_iter().map(bson_to_value).collect()),
        Bson::Document(document) => Value::Object(document_to_row(document)),
        other => {
            warn!(bson_type = ?other.element_type(), "Unsupported BSON value rendered as null");
            Value::Null
        }
    }
}

pub(crate) fn document_to_row(document: Document) -> Row {
    document
        .into_iter()
        .map(|(key, value)| (key, bson_to_value(value)))
        .collect()
}

/// Convert a parsed filter or stage, honoring extended JSON such as `{"$oid": ...}`
fn to_document(object: JsonObject) -> AdapterResult<Document> {
    match Bson::try_from(serde_json::Value::Object(object)) {
        Ok(Bson::Document(document)) => Ok(document),
        Ok(other) => Err(AdapterError::Parse(format!(
            "expected a document, got {:?}",
            other.element_type()
        ))),
        Err(e) => Err(AdapterError::Parse(format!("invalid extended JSON: {e}"))),
    }
}

/// Infer a collection's table from sampled documents
pub(crate) fn infer_collection(
    name: &str,
    documents: &[Document],
    policy: SamplingPolicy,
) -> Option<Table> {
    let mut builder = DocumentSchemaBuilder::new(policy);
    for document in documents {
        builder.observe(
            document
                .iter()
                .map(|(field, value)| (field.as_str(), bson_type_label(value))),
        );
    }
    builder.build(name)
}

fn single(key: &str, value: Value) -> Row {
    let mut row = Row::with_capacity(1);
    row.insert(key.to_string(), value);
    row
}

async fn sample_collection(
    database: &Database,
    name: &str,
    policy: SamplingPolicy,
) -> AdapterResult<Option<Table>> {
    let documents: Vec<Document> = database
        .collection::<Document>(name)
        .find(doc! {})
        .limit(i64::from(policy.sample_size))
        .await
        .map_err(|e| AdapterError::schema_build(name, e))?
        .try_collect()
        .await
        .map_err(|e| AdapterError::schema_build(name, e))?;
    Ok(infer_collection(name, &documents, policy))
}

#[async_trait]
impl DataStoreAdapter for LiveMongoAdapter {
    fn engine(&self) -> EngineKind {
        EngineKind::MongoDb
    }

    async fn execute(&self, query: &str) -> AdapterResult<QueryOutput> {
        let command = MongoCommand::parse(query)?;
        debug!(
            collection = %command.collection,
            operation = command.operation.name(),
            "Executing MongoDB operation"
        );

        let guard = self.session.lock().await;
        let session = guard.as_ref().ok_or_else(|| AdapterError::closed(EngineKind::MongoDb))?;
        let collection = session.database.collection::<Document>(&command.collection);
        let execution_error = |e: mongodb::error::Error| AdapterError::Execution(e.to_string());

        let rows = match command.operation {
            MongoOperation::Find { filter } => {
                let documents: Vec<Document> = collection
                    .find(to_document(filter)?)
                    .await
                    .map_err(execution_error)?
                    .try_collect()
                    .await
                    .map_err(execution_error)?;
                documents.into_iter().map(document_to_row).collect()
            }
            MongoOperation::FindOne { filter } => collection
                .find_one(to_document(filter)?)
                .await
                .map_err(execution_error)?
                .into_iter()
                .map(document_to_row)
                .collect(),
            MongoOperation::CountDocuments { filter } => {
                let count = collection
                    .count_documents(to_document(filter)?)
                    .await
                    .map_err(execution_error)?;
                vec![single("count", Value::Integer(i64::try_from(count).unwrap_or(i64::MAX)))]
            }
            MongoOperation::Aggregate { pipeline } => {
                let stages = pipeline
                    .into_iter()
                    .map(to_document)
                    .collect::<AdapterResult<Vec<_>>>()?;
                let documents: Vec<Document> = collection
                    .aggregate(stages)
                    .await
                    .map_err(execution_error)?
                    .try_collect()
                    .await
                    .map_err(execution_error)?;
                documents.into_iter().map(document_to_row).collect()
            }
            MongoOperation::Distinct { field, filter } => {
                let values = collection
                    .distinct(&field, to_document(filter)?)
                    .await
                    .map_err(execution_error)?;
                vec![single(
                    "values",
                    Value::List(values.into_iter().map(bson_to_value).collect()),
                )]
            }
        };

        Ok(QueryOutput::Rows(rows))
    }

    async fn introspect(&self) -> AdapterResult<Introspection> {
        let guard = self.session.lock().await;
        let session = guard.as_ref().ok_or_else(|| AdapterError::closed(EngineKind::MongoDb))?;

        let mut names = session
            .database
            .list_collection_names()
            .await
            .map_err(|e| AdapterError::schema_build(&self.database_name, e))?;
        names.sort();

        let mut introspection = Introspection::new();
        for name in names {
            match sample_collection(&session.database, &name, self.sampling).await {
                Ok(Some(table)) => introspection.push(table),
                Ok(None) => debug!(collection = %name, "Skipping empty collection"),
                Err(e) => introspection.record(&name, Err(e)),
            }
        }
        Ok(introspection)
    }

    async fn close(&self) -> AdapterResult<()> {
        if let Some(session) = self.session.lock().await.take() {
            session.client.shutdown().await;
            info!("Closed MongoDB client");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::oid::ObjectId;

    #[test]
    fn test_object_id_becomes_hex() {
        let oid = ObjectId::parse_str("65a1f0c2e4b0a1b2c3d4e5f6").unwrap();
        assert_eq!(
            bson_to_value(Bson::ObjectId(oid)),
            Value::Text("65a1f0c2e4b0a1b2c3d4e5f6".to_string())
        );
    }

    #[test]
    fn test_nested_document_conversion() {
        let row = document_to_row(doc! {
            "name": "Ada",
            "age": 36_i32,
            "tags": ["math", "engines"],
            "address": { "city": "London" },
            "deleted": Bson::Null,
        });
        assert_eq!(row["age"], Value::Integer(36));
        assert_eq!(
            row["tags"],
            Value::List(vec!["math".into(), "engines".into()])
        );
        let Value::Object(address) = &row["address"] else {
            panic!("expected nested object");
        };
        assert_eq!(address["city"], Value::Text("London".to_string()));
        assert_eq!(row["deleted"], Value::Null);
    }

    #[test]
    fn test_type_labels() {
        assert_eq!(bson_type_label(&Bson::Int32(1)), Some("int"));
        assert_eq!(bson_type_label(&Bson::Int64(1)), Some("long"));
        assert_eq!(bson_type_label(&Bson::ObjectId(ObjectId::new())), Some("objectId"));
        assert_eq!(bson_type_label(&Bson::Null), None);
    }

    #[test]
    fn test_infer_collection() {
        let documents = vec![
            doc! { "_id": ObjectId::new(), "age": "unknown", "email": "a@example.com" },
            doc! { "_id": ObjectId::new(), "age": 41_i32, "nickname": Bson::Null },
        ];
        let table = infer_collection("people", &documents, SamplingPolicy::default()).unwrap();

        assert!(table.column("_id").unwrap().is_primary_key);
        assert_eq!(table.column("age").unwrap().data_type, "int, string");
        assert!(table.column("email").unwrap().is_nullable);
        let nickname = table.column("nickname").unwrap();
        assert_eq!(nickname.data_type, "mixed");
        assert!(nickname.is_nullable);
        assert_eq!(nickname.comments, "Inferred from 2 sample documents");
    }

    #[test]
    fn test_infer_empty_collection() {
        assert!(infer_collection("empty", &[], SamplingPolicy::default()).is_none());
    }

    #[test]
    fn test_extended_json_filter() {
        let filter = match serde_json::json!({"_id": {"$oid": "65a1f0c2e4b0a1b2c3d4e5f6"}}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        let document = to_document(filter).unwrap();
        assert!(matches!(document.get("_id"), Some(Bson::ObjectId(_))));
    }
}
