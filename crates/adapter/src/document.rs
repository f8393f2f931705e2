// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Document schema inference
//!
//! Schemaless collections get a schema inferred from a bounded sample of
//! their documents. The inferrer only sees field names and type labels, so
//! it is independent of any driver's document representation.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use data_analyst_schema::{Column, Table};

/// Field treated as the primary key of every document
pub const IDENTITY_FIELD: &str = "_id";

/// Label used for fields that were only ever observed as null
pub const MIXED_TYPE: &str = "mixed";

/// How documents are sampled for inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingPolicy {
    /// Documents read per collection
    pub sample_size: u32,
    /// Mark a field nullable when some sampled document lacks it
    pub absent_is_nullable: bool,
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self {
            sample_size: 100,
            absent_is_nullable: true,
        }
    }
}

#[derive(Debug, Default)]
struct FieldStats {
    types: BTreeSet<String>,
    seen_null: bool,
    present_in: usize,
}

/// Accumulates field observations for one collection
#[derive(Debug)]
pub struct DocumentSchemaBuilder {
    policy: SamplingPolicy,
    sampled: usize,
    fields: IndexMap<String, FieldStats>,
}

impl DocumentSchemaBuilder {
    pub fn new(policy: SamplingPolicy) -> Self {
        Self {
            policy,
            sampled: 0,
            fields: IndexMap::new(),
        }
    }

    /// Record one document as `(field, type label)` pairs
    ///
    /// A `None` label means the field was present with a null value.
    pub fn observe<'a, I>(&mut self, fields: I)
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        self.sampled += 1;
        for (name, label) in fields {
            let stats = self.fields.entry(name.to_string()).or_default();
            stats.present_in += 1;
            match label {
                Some(label) => {
                    stats.types.insert(label.to_string());
                }
                None => stats.seen_null = true,
            }
        }
    }

    /// Number of documents observed so far
    pub fn sampled(&self) -> usize {
        self.sampled
    }

    /// Build the inferred table, or `None` when nothing was sampled
    pub fn build(self, collection: &str) -> Option<Table> {
        if self.sampled == 0 {
            return None;
        }

        let comment = format!("Inferred from {} sample documents", self.sampled);
        let sampled = self.sampled;
        let absent_is_nullable = self.policy.absent_is_nullable;

        let columns = self.fields.into_iter().map(|(name, stats)| {
            let data_type = if stats.types.is_empty() {
                MIXED_TYPE.to_string()
            } else {
                stats.types.into_iter().collect::<Vec<_>>().join(", ")
            };
            let nullable = stats.seen_null || (absent_is_nullable && stats.present_in < sampled);

            let column = Column::new(name.as_str(), data_type)
                .with_nullable(nullable)
                .with_comment(comment.as_str());
            if name == IDENTITY_FIELD {
                column.with_primary_key()
            } else {
                column
            }
        });

        Some(Table::new(collection).with_columns(columns))
    }
}
