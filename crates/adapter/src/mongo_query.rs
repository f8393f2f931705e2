// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Document-store operation syntax
//!
//! Queries for the document store are written as
//! `[db.]collection.operation(<json arguments>)`. Parsing is strict: only the
//! operations in [`MongoOperation`] are recognized, arguments must be JSON of
//! the expected shape, and nothing but whitespace or `;` may follow the
//! closing parenthesis.
//!
//! ```text
//! users.find({"age": {"$gt": 30}})
//! db.orders.aggregate([{"$group": {"_id": "$status", "n": {"$sum": 1}}}])
//! products.distinct({"field": "category", "filter": {"active": true}})
//! ```

use serde_json::{Map, Value as JsonValue};

use crate::error::{AdapterError, AdapterResult};

/// JSON object used as a filter or pipeline stage
pub type JsonObject = Map<String, JsonValue>;

/// A read-only document-store operation
#[derive(Debug, Clone, PartialEq)]
pub enum MongoOperation {
    Find { filter: JsonObject },
    FindOne { filter: JsonObject },
    CountDocuments { filter: JsonObject },
    Aggregate { pipeline: Vec<JsonObject> },
    Distinct { field: String, filter: JsonObject },
}

impl MongoOperation {
    pub fn name(&self) -> &'static str {
        match self {
            MongoOperation::Find { .. } => "find",
            MongoOperation::FindOne { .. } => "find_one",
            MongoOperation::CountDocuments { .. } => "count_documents",
            MongoOperation::Aggregate { .. } => "aggregate",
            MongoOperation::Distinct { .. } => "distinct",
        }
    }
}

/// A parsed operation against one collection
#[derive(Debug, Clone, PartialEq)]
pub struct MongoCommand {
    pub collection: String,
    pub operation: MongoOperation,
}

impl MongoCommand {
    /// Parse operation syntax into a command
    pub fn parse(text: &str) -> AdapterResult<Self> {
        let text = text.trim();
        let open = text
            .find('(')
            .ok_or_else(|| parse_error("expected collection.operation(...)"))?;

        let head = text[..open].trim();
        let head = head.strip_prefix("db.").unwrap_or(head);
        let (collection, operation) = head
            .rsplit_once('.')
            .ok_or_else(|| parse_error("expected collection.operation(...)"))?;
        let (collection, operation) = (collection.trim(), operation.trim());

        if collection.is_empty() || collection.chars().any(char::is_whitespace) {
            return Err(parse_error(format!("invalid collection name '{collection}'")));
        }

        let close = matching_paren(text, open)?;
        let rest = &text[close + 1..];
        if let Some(extra) = rest.chars().find(|c| !c.is_whitespace() && *c != ';') {
            return Err(parse_error(format!(
                "unexpected '{extra}' after closing parenthesis"
            )));
        }

        let args = parse_arguments(&text[open + 1..close])?;
        let operation = build_operation(operation, args)?;

        Ok(Self {
            collection: collection.to_string(),
            operation,
        })
    }
}

fn parse_error(message: impl Into<String>) -> AdapterError {
    AdapterError::Parse(message.into())
}

/// Byte index of the parenthesis closing the one at `open`
fn matching_paren(text: &str, open: usize) -> AdapterResult<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text[open..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(open + i);
                }
            }
            _ => {}
        }
    }

    Err(parse_error("unbalanced parentheses"))
}

/// Comma-separated JSON arguments
fn parse_arguments(raw: &str) -> AdapterResult<Vec<JsonValue>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str::<Vec<JsonValue>>(&format!("[{raw}]"))
        .map_err(|e| parse_error(format!("arguments are not valid JSON: {e}")))
}

fn build_operation(name: &str, args: Vec<JsonValue>) -> AdapterResult<MongoOperation> {
    let operation = match name {
        "find" => MongoOperation::Find {
            filter: optional_filter(name, args)?,
        },
        "find_one" | "findOne" => MongoOperation::FindOne {
            filter: optional_filter(name, args)?,
        },
        "count_documents" | "countDocuments" => MongoOperation::CountDocuments {
            filter: optional_filter(name, args)?,
        },
        "aggregate" => MongoOperation::Aggregate {
            pipeline: pipeline(args)?,
        },
        "distinct" => distinct(args)?,
        other => {
            return Err(parse_error(format!(
                "unsupported operation '{other}', expected one of: find, find_one, count_documents, aggregate, distinct"
            )));
        }
    };
    Ok(operation)
}

fn optional_filter(operation: &str, args: Vec<JsonValue>) -> AdapterResult<JsonObject> {
    let mut args = args.into_iter();
    let filter = match args.next() {
        None => JsonObject::new(),
        Some(JsonValue::Object(filter)) => filter,
        Some(other) => {
            return Err(parse_error(format!(
                "{operation} expects a filter object, got {}",
                json_kind(&other)
            )));
        }
    };
    if args.next().is_some() {
        return Err(parse_error(format!("{operation} takes at most one argument")));
    }
    Ok(filter)
}

fn pipeline(args: Vec<JsonValue>) -> AdapterResult<Vec<JsonObject>> {
    let [JsonValue::Array(stages)] = <[JsonValue; 1]>::try_from(args)
        .map_err(|_| parse_error("aggregate expects exactly one pipeline array"))?
    else {
        return Err(parse_error("aggregate expects a pipeline array"));
    };

    stages
        .into_iter()
        .enumerate()
        .map(|(i, stage)| match stage {
            JsonValue::Object(stage) => Ok(stage),
            other => Err(parse_error(format!(
                "pipeline stage {i} must be an object, got {}",
                json_kind(&other)
            ))),
        })
        .collect()
}

fn distinct(args: Vec<JsonValue>) -> AdapterResult<MongoOperation> {
    let mut args = args.into_iter();
    let (field, filter) = match (args.next(), args.next(), args.next()) {
        (Some(JsonValue::String(field)), None, None) => (field, JsonObject::new()),
        (Some(JsonValue::String(field)), Some(JsonValue::Object(filter)), None) => (field, filter),
        (Some(JsonValue::Object(mut options)), None, None) => {
            let field = match options.remove("field") {
                Some(JsonValue::String(field)) => field,
                _ => return Err(parse_error("distinct expects a string \"field\"")),
            };
            let filter = match options.remove("filter") {
                None | Some(JsonValue::Null) => JsonObject::new(),
                Some(JsonValue::Object(filter)) => filter,
                Some(other) => {
                    return Err(parse_error(format!(
                        "distinct \"filter\" must be an object, got {}",
                        json_kind(&other)
                    )));
                }
            };
            if let Some(key) = options.keys().next() {
                return Err(parse_error(format!("distinct does not accept \"{key}\"")));
            }
            (field, filter)
        }
        _ => {
            return Err(parse_error(
                "distinct expects a field name or {\"field\": ..., \"filter\": {...}}",
            ));
        }
    };

    if field.is_empty() {
        return Err(parse_error("distinct field name is empty"));
    }
    Ok(MongoOperation::Distinct { field, filter })
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: JsonValue) -> JsonObject {
        match value {
            JsonValue::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_find_with_filter() {
        let command = MongoCommand::parse(r#"users.find({"age": {"$gt": 30}})"#).unwrap();
        assert_eq!(command.collection, "users");
        assert_eq!(
            command.operation,
            MongoOperation::Find {
                filter: object(json!({"age": {"$gt": 30}}))
            }
        );
    }

    #[test]
    fn test_db_prefix_and_empty_arguments() {
        let command = MongoCommand::parse("db.users.find()").unwrap();
        assert_eq!(command.collection, "users");
        assert_eq!(
            command.operation,
            MongoOperation::Find {
                filter: JsonObject::new()
            }
        );
    }

    #[test]
    fn test_count_documents_with_empty_filter() {
        let command = MongoCommand::parse("orders.count_documents({})").unwrap();
        assert_eq!(command.operation.name(), "count_documents");
    }

    #[test]
    fn test_aggregate_pipeline() {
        let command =
            MongoCommand::parse(r#"orders.aggregate([{"$match": {"status": "paid"}}, {"$limit": 5}]);"#)
                .unwrap();
        let MongoOperation::Aggregate { pipeline } = command.operation else {
            panic!("expected aggregate");
        };
        assert_eq!(pipeline.len(), 2);
        assert!(pipeline[1].contains_key("$limit"));
    }

    #[test]
    fn test_distinct_forms() {
        let plain = MongoCommand::parse(r#"products.distinct("category")"#).unwrap();
        assert_eq!(
            plain.operation,
            MongoOperation::Distinct {
                field: "category".to_string(),
                filter: JsonObject::new()
            }
        );

        let command = MongoCommand::parse(
            r#"products.distinct({"field": "category", "filter": {"active": true}})"#,
        )
        .unwrap();
        assert_eq!(
            command.operation,
            MongoOperation::Distinct {
                field: "category".to_string(),
                filter: object(json!({"active": true}))
            }
        );
    }

    #[test]
    fn test_parentheses_inside_strings() {
        let command = MongoCommand::parse(r#"notes.find({"text": "a (b) \" ) c"})"#).unwrap();
        assert_eq!(command.collection, "notes");
    }

    #[test]
    fn test_rejects_unsupported_operation() {
        let err = MongoCommand::parse("users.drop()").unwrap_err();
        assert!(matches!(err, AdapterError::Parse(_)));
        assert!(err.to_string().contains("drop"));
    }

    #[test]
    fn test_rejects_missing_parentheses() {
        assert!(matches!(
            MongoCommand::parse("users.find"),
            Err(AdapterError::Parse(_))
        ));
        assert!(matches!(
            MongoCommand::parse("find({})"),
            Err(AdapterError::Parse(_))
        ));
    }

    #[test]
    fn test_rejects_trailing_content() {
        assert!(MongoCommand::parse("users.find({}) ; users.drop()").is_err());
        assert!(MongoCommand::parse("users.find({}).limit(5)").is_err());
    }

    #[test]
    fn test_rejects_bad_argument_shapes() {
        assert!(MongoCommand::parse("users.find([1, 2])").is_err());
        assert!(MongoCommand::parse("users.find({}, {})").is_err());
        assert!(MongoCommand::parse("orders.aggregate({})").is_err());
        assert!(MongoCommand::parse("orders.aggregate([1])").is_err());
        assert!(MongoCommand::parse(r#"p.distinct({"filter": {}})"#).is_err());
        assert!(MongoCommand::parse("users.find({age: 3})").is_err());
        assert!(MongoCommand::parse("users.find({\"a\": 1}").is_err());
    }
}
