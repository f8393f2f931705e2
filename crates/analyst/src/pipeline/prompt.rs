// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Grounding instruction construction

use data_analyst_adapter::QueryLanguage;

use crate::cache::SchemaSnapshot;

const SQL_RULES: &[&str] = &[
    "Generate only read-only retrieval statements; never modify data or schema",
    "Return exactly one statement",
    "Name the columns you need instead of using a * projection",
    "Include WHERE clauses to filter rows when the request implies it",
    "Limit the number of rows returned when appropriate",
    "Use ORDER BY when sorting is implied",
    "Prefer JOIN clauses over subqueries when combining tables",
    "Use table aliases for clarity",
];

const MONGO_RULES: &[&str] = &[
    "Write exactly one operation as collection.operation(arguments)",
    "Use only find, find_one, count_documents, aggregate or distinct",
    "Arguments must be strict JSON: quote every key and string",
    "Add a $limit stage to aggregate pipelines when appropriate",
    "Never modify data",
];

const MDX_RULES: &[&str] = &[
    "Generate only SELECT statements, optionally preceded by WITH MEMBER or WITH SET",
    "Return exactly one statement",
    "Place measures on COLUMNS and dimension members on ROWS",
    "Use NON EMPTY to skip empty cells when appropriate",
    "Use fully qualified unique names in square brackets",
];

/// Rules appended to every instruction for `language`
pub fn rules_for(language: QueryLanguage) -> &'static [&'static str] {
    match language {
        QueryLanguage::MongoShell => MONGO_RULES,
        QueryLanguage::Mdx => MDX_RULES,
        _ => SQL_RULES,
    }
}

/// Build the system instruction grounding generation in `schema`
pub fn build_instructions(language: QueryLanguage, schema: &SchemaSnapshot) -> String {
    let name = language.display_name();
    let schema_json =
        serde_json::to_string_pretty(&schema.to_json()).unwrap_or_else(|_| "{}".to_string());

    let mut text = format!(
        "You are a query generator for a data store that speaks {name}.\n\n\
         Given the following schema, write one {name} query answering the user's request.\n\n\
         IMPORTANT: Return ONLY the query, without markdown formatting, explanations or any other text.\n\n\
         Available tables and columns:\n{schema_json}\n\nRules:\n"
    );

    for rule in rules_for(language) {
        text.push_str("- ");
        text.push_str(rule);
        text.push('\n');
    }
    text.push_str(&format!("- Use valid {name} syntax\n"));
    text
}
