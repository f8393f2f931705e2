// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Read-only query gate
//!
//! Decides whether a statement may be executed. Only retrieval statements
//! pass; nothing is repaired or partially executed.
//!
//! SQL-like languages are tokenized with the lexical rules of the target
//! language, so comments, string literals and quoted identifiers cannot hide a
//! keyword or a statement separator. The MongoDB
//! operation syntax is checked by parsing it, since every operation the parser
//! accepts is read-only.
//!
//! | Input | Accepted |
//! |-------|----------|
//! | `SELECT * FROM t` | yes |
//! | `-- top ten\nSELECT ...` | yes |
//! | `WITH c AS (SELECT 1) SELECT * FROM c` | when `allow_cte` is set |
//! | `SELECT 1; DROP TABLE t` | no |
//! | `SELECT 1 DROP TABLE t` (T-SQL) | no |
//! | `SELECT * INTO copy FROM t` | no |
//! | `UPDATE t SET x = 1` | no |

use data_analyst_adapter::QueryLanguage;
use data_analyst_adapter::mongo_query::MongoCommand;
use data_analyst_adapter::statement::{Token, TokenKind, tokenize};
use serde::{Deserialize, Serialize};

use crate::error::{AnalystError, AnalystResult};

/// Validation settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationPolicy {
    /// Accept `WITH` clauses whose bodies and main statement are retrievals
    ///
    /// When unset only statements that literally begin with the retrieval
    /// keyword pass.
    pub allow_cte: bool,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self { allow_cte: true }
    }
}

impl ValidationPolicy {
    /// Literal keyword-prefix checking
    pub fn strict() -> Self {
        Self { allow_cte: false }
    }
}

/// Validator for one query language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryValidator {
    language: QueryLanguage,
    policy: ValidationPolicy,
}

impl QueryValidator {
    pub fn new(language: QueryLanguage, policy: ValidationPolicy) -> Self {
        Self { language, policy }
    }

    pub fn language(&self) -> QueryLanguage {
        self.language
    }

    pub fn policy(&self) -> ValidationPolicy {
        self.policy
    }

    /// Accept `query` or explain why it is rejected
    ///
    /// # Errors
    ///
    /// Returns `AnalystError::QueryPolicyViolation` carrying the query.
    pub fn validate(&self, query: &str) -> AnalystResult<()> {
        let result = match self.language.retrieval_keyword() {
            Some(keyword) => self.check_statement(query, keyword),
            None => MongoCommand::parse(query)
                .map(|_| ())
                .map_err(|e| e.to_string()),
        };
        result.map_err(|reason| AnalystError::policy(query, reason))
    }

    fn check_statement(&self, query: &str, keyword: &str) -> Result<(), String> {
        let tokens = tokenize(query, self.language.lexical_rules()).map_err(|e| e.to_string())?;
        let body = single_statement(&tokens)?;

        let Some(first) = body.first() else {
            return Err("query is empty".to_string());
        };

        if first.is_keyword("WITH") && self.policy.allow_cte {
            match self.language {
                QueryLanguage::Mdx => check_mdx_with(body, keyword)?,
                language if language.supports_cte() => check_cte(body, keyword)?,
                language => {
                    return Err(format!(
                        "{} does not support WITH clauses",
                        language.display_name()
                    ));
                }
            }
        } else if !first.is_keyword(keyword) {
            return Err(format!(
                "only {keyword} statements are allowed, found '{}'",
                first.text
            ));
        }

        match body.iter().find(|t| self.has_side_effects(t)) {
            Some(token) if token.is_keyword("INTO") => {
                Err(format!("{keyword} ... INTO writes data"))
            }
            Some(token) => Err(format!(
                "'{}' starts another statement in the {} batch",
                token.text,
                self.language.display_name()
            )),
            None => Ok(()),
        }
    }

    fn has_side_effects(&self, token: &Token<'_>) -> bool {
        if token.is_keyword("INTO") {
            return true;
        }
        self.language == QueryLanguage::TSql
            && TSQL_STATEMENT_KEYWORDS.iter().any(|k| token.is_keyword(k))
    }
}

/// Keywords that begin a non-retrieval statement in a T-SQL batch
///
/// T-SQL needs no separator between the statements of a batch, so these are
/// rejected anywhere in the text.
const TSQL_STATEMENT_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "MERGE", "DROP", "CREATE", "ALTER", "TRUNCATE", "EXEC",
    "EXECUTE", "DECLARE", "SET", "USE", "GRANT", "REVOKE", "DENY", "BACKUP", "RESTORE", "DBCC",
    "KILL", "SHUTDOWN", "WAITFOR", "BEGIN", "COMMIT", "ROLLBACK", "SAVE", "BULK", "RECONFIGURE",
    "CHECKPOINT", "IF", "WHILE", "GOTO", "WRITETEXT", "UPDATETEXT",
];

/// Tokens of the only statement, without its terminator
fn single_statement<'a, 't>(tokens: &'t [Token<'a>]) -> Result<&'t [Token<'a>], String> {
    let Some(end) = tokens.iter().position(|t| t.kind == TokenKind::Semicolon) else {
        return Ok(tokens);
    };

    if tokens[end..].iter().any(|t| t.kind != TokenKind::Semicolon) {
        return Err("multiple statements are not allowed".to_string());
    }
    Ok(&tokens[..end])
}

/// `WITH name [(cols)] AS (SELECT ...) [, ...] SELECT ...`
///
/// Every CTE body and the main statement must start with `keyword`.
fn check_cte(body: &[Token<'_>], keyword: &str) -> Result<(), String> {
    // One entry per open parenthesis: whether it opened a CTE body
    let mut open: Vec<bool> = Vec::new();
    let mut last_top_level: Option<&Token<'_>> = None;
    let mut expect_body_start = false;
    let mut after_body = false;

    for token in &body[1..] {
        if expect_body_start {
            if !token.is_keyword(keyword) {
                return Err(format!(
                    "common table expressions must be {keyword} statements, found '{}'",
                    token.text
                ));
            }
            expect_body_start = false;
        }

        if open.is_empty() && after_body {
            if token.is_punct(',') {
                after_body = false;
                continue;
            }
            return if token.is_keyword(keyword) {
                Ok(())
            } else {
                Err(format!(
                    "WITH must be followed by a {keyword} statement, found '{}'",
                    token.text
                ))
            };
        }

        if token.is_punct('(') {
            let is_body = open.is_empty()
                && last_top_level
                    .is_some_and(|t| t.is_keyword("AS") || t.is_keyword("MATERIALIZED"));
            expect_body_start = is_body;
            open.push(is_body);
        } else if token.is_punct(')') {
            let closed_body = open
                .pop()
                .ok_or_else(|| "unbalanced parentheses".to_string())?;
            after_body = closed_body && open.is_empty();
        } else if open.is_empty() {
            last_top_level = Some(token);
        }
    }

    Err(format!("WITH clause is not followed by a {keyword} statement"))
}

/// `WITH MEMBER ... SET ... SELECT ...`
fn check_mdx_with(body: &[Token<'_>], keyword: &str) -> Result<(), String> {
    let mut depth = 0usize;
    for token in &body[1..] {
        if token.is_punct('(') {
            depth += 1;
        } else if token.is_punct(')') {
            depth = depth
                .checked_sub(1)
                .ok_or_else(|| "unbalanced parentheses".to_string())?;
        } else if depth == 0 && token.is_keyword(keyword) {
            return Ok(());
        }
    }
    Err(format!("WITH clause is not followed by a {keyword} statement"))
}
