// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Statement lexer
//!
//! A small dialect-tolerant lexer for SQL-like text (SQL dialects, InfluxQL,
//! MDX). It understands comments, string literals and quoted identifiers well
//! enough to find keywords and statement separators; it does not parse.

use thiserror::Error;

/// Token category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Keyword or bare identifier
    Word,
    Number,
    /// `'...'` literal
    StringLiteral,
    /// `"..."`, `` `...` `` or `[...]`
    QuotedIdentifier,
    /// `;`
    Semicolon,
    /// Any other single character
    Punct,
}

/// A lexed token borrowing from the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// Byte offset in the source
    pub offset: usize,
}

impl Token<'_> {
    /// Case-insensitive keyword comparison
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(keyword)
    }

    pub fn is_punct(&self, ch: char) -> bool {
        self.kind == TokenKind::Punct && self.text.starts_with(ch)
    }
}

/// Lexing failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{what} starting at offset {offset} is not terminated")]
pub struct LexError {
    pub what: &'static str,
    pub offset: usize,
}

/// Lexical rules that differ between query languages
///
/// The defaults are ANSI-like: doubled quotes escape, and `"..."`,
/// `` `...` `` and `[...]` all quote identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexicalRules {
    /// A backslash escapes the next byte inside `'...'` and `"..."`
    pub backslash_escapes: bool,
    /// `"..."` is a string literal rather than an identifier
    pub double_quoted_strings: bool,
    /// `E'...'` literals take backslash escapes
    pub escape_string_prefix: bool,
    /// `$$...$$` and `$tag$...$tag$` string bodies
    pub dollar_quotes: bool,
    pub bracket_identifiers: bool,
    pub backtick_identifiers: bool,
    /// `#` line comments, `--` only before whitespace, and `/*!...*/`
    /// bodies lexed as code
    pub mysql_comments: bool,
}

impl Default for LexicalRules {
    fn default() -> Self {
        Self {
            backslash_escapes: false,
            double_quoted_strings: false,
            escape_string_prefix: false,
            dollar_quotes: false,
            bracket_identifiers: true,
            backtick_identifiers: true,
            mysql_comments: false,
        }
    }
}

impl LexicalRules {
    /// MySQL with its default SQL mode
    pub fn mysql() -> Self {
        Self {
            backslash_escapes: true,
            double_quoted_strings: true,
            bracket_identifiers: false,
            mysql_comments: true,
            ..Self::default()
        }
    }

    /// PostgreSQL with `standard_conforming_strings` on
    pub fn postgres() -> Self {
        Self {
            escape_string_prefix: true,
            dollar_quotes: true,
            bracket_identifiers: false,
            backtick_identifiers: false,
            ..Self::default()
        }
    }

    pub fn tsql() -> Self {
        Self {
            backtick_identifiers: false,
            ..Self::default()
        }
    }

    pub fn influxql() -> Self {
        Self {
            backslash_escapes: true,
            bracket_identifiers: false,
            backtick_identifiers: false,
            ..Self::default()
        }
    }
}

/// Split `text` into tokens, dropping whitespace and comments
pub fn tokenize(text: &str, rules: LexicalRules) -> Result<Vec<Token<'_>>, LexError> {
    let bytes = text.as_bytes();
    let mut tokens: Vec<Token<'_>> = Vec::new();
    let mut i = 0;
    let mut in_executable_comment = false;

    while i < bytes.len() {
        let b = bytes[i];
        let start = i;

        if b.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        if b == b'-' && bytes.get(i + 1) == Some(&b'-') && starts_line_comment(bytes, i + 2, rules) {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }

        if b == b'#' && rules.mysql_comments {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }

        if b == b'/' && bytes.get(i + 1) == Some(&b'*') {
            if let Some(body) = executable_comment_body(bytes, i, rules) {
                in_executable_comment = true;
                i = body;
                continue;
            }
            let end = text[i + 2..].find("*/").ok_or(LexError {
                what: "block comment",
                offset: start,
            })?;
            i += 2 + end + 2;
            continue;
        }

        if in_executable_comment && b == b'*' && bytes.get(i + 1) == Some(&b'/') {
            in_executable_comment = false;
            i += 2;
            continue;
        }

        let kind = match b {
            b'\'' => {
                let backslash = rules.backslash_escapes
                    || (rules.escape_string_prefix && has_escape_prefix(tokens.last(), start));
                i = scan_quoted(bytes, i, b'\'', backslash).ok_or(LexError {
                    what: "string literal",
                    offset: start,
                })?;
                TokenKind::StringLiteral
            }
            b'"' if rules.double_quoted_strings => {
                i = scan_quoted(bytes, i, b'"', rules.backslash_escapes).ok_or(LexError {
                    what: "string literal",
                    offset: start,
                })?;
                TokenKind::StringLiteral
            }
            b'$' if rules.dollar_quotes && dollar_tag_len(bytes, i).is_some() => {
                i = scan_dollar_quoted(text, i).ok_or(LexError {
                    what: "dollar-quoted string",
                    offset: start,
                })?;
                TokenKind::StringLiteral
            }
            b'"' => {
                i = scan_quoted(bytes, i, b'"', rules.backslash_escapes).ok_or(LexError {
                    what: "quoted identifier",
                    offset: start,
                })?;
                TokenKind::QuotedIdentifier
            }
            b'`' | b'[' if quotes_identifier(b, rules) => {
                let close = if b == b'[' { b']' } else { b };
                i = scan_quoted(bytes, i, close, false).ok_or(LexError {
                    what: "quoted identifier",
                    offset: start,
                })?;
                TokenKind::QuotedIdentifier
            }
            b';' => {
                i += 1;
                TokenKind::Semicolon
            }
            b if b.is_ascii_digit() => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'.') {
                    i += 1;
                }
                TokenKind::Number
            }
            b if is_word_start(b) => {
                i += 1;
                while i < bytes.len() && is_word_continue(bytes[i]) {
                    i += 1;
                }
                TokenKind::Word
            }
            _ => {
                let width = text[i..].chars().next().map_or(1, char::len_utf8);
                i += width;
                TokenKind::Punct
            }
        };

        tokens.push(Token {
            kind,
            text: &text[start..i],
            offset: start,
        });
    }

    Ok(tokens)
}

/// First keyword of `text` in upper case, if it starts with a word
pub fn leading_keyword(text: &str) -> Option<String> {
    let tokens = tokenize(text, LexicalRules::default()).ok()?;
    tokens
        .first()
        .filter(|t| t.kind == TokenKind::Word)
        .map(|t| t.text.to_ascii_uppercase())
}

fn is_word_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || matches!(b, b'_' | b'@' | b'#' | b'$') || b >= 0x80
}

fn is_word_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'$' | b'#') || b >= 0x80
}

/// Whether `--` followed by the byte at `next` opens a comment
fn starts_line_comment(bytes: &[u8], next: usize, rules: LexicalRules) -> bool {
    !rules.mysql_comments || bytes.get(next).is_none_or(|b| b.is_ascii_whitespace() || b.is_ascii_control())
}

/// Start of the code inside a MySQL `/*!NNNNN ... */` or `/*M!...` comment
fn executable_comment_body(bytes: &[u8], open: usize, rules: LexicalRules) -> Option<usize> {
    if !rules.mysql_comments {
        return None;
    }
    let mut i = open + 2;
    if bytes.get(i) == Some(&b'M') {
        i += 1;
    }
    if bytes.get(i) != Some(&b'!') {
        return None;
    }
    i += 1;
    while bytes.get(i).is_some_and(u8::is_ascii_digit) {
        i += 1;
    }
    Some(i)
}

/// `E'...'` or `e'...'` with no space before the quote
fn has_escape_prefix(previous: Option<&Token<'_>>, quote: usize) -> bool {
    previous.is_some_and(|t| {
        t.kind == TokenKind::Word
            && t.text.eq_ignore_ascii_case("e")
            && t.offset + t.text.len() == quote
    })
}

fn quotes_identifier(b: u8, rules: LexicalRules) -> bool {
    match b {
        b'`' => rules.backtick_identifiers,
        b'[' => rules.bracket_identifiers,
        _ => false,
    }
}

/// Length of the `$tag$` delimiter starting at `open`
fn dollar_tag_len(bytes: &[u8], open: usize) -> Option<usize> {
    let mut i = open + 1;
    if bytes.get(i).is_some_and(u8::is_ascii_digit) {
        return None;
    }
    while let Some(&b) = bytes.get(i) {
        match b {
            b'$' => return Some(i + 1 - open),
            b if b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80 => i += 1,
            _ => return None,
        }
    }
    None
}

/// Index just past the closing `$tag$`, or `None` if unterminated
fn scan_dollar_quoted(text: &str, open: usize) -> Option<usize> {
    let tag_len = dollar_tag_len(text.as_bytes(), open)?;
    let tag = &text[open..open + tag_len];
    let body = open + tag_len;
    text[body..].find(tag).map(|end| body + end + tag_len)
}

/// Index just past the closing delimiter, or `None` if unterminated
///
/// A doubled delimiter is an escaped delimiter. With `backslash` set a
/// backslash escapes the next byte.
fn scan_quoted(bytes: &[u8], open: usize, close: u8, backslash: bool) -> Option<usize> {
    let mut i = open + 1;
    while i < bytes.len() {
        let b = bytes[i];
        if backslash && b == b'\\' {
            i += 2;
            continue;
        }
        if b == close {
            if bytes.get(i + 1) == Some(&close) {
                i += 2;
                continue;
            }
            return Some(i + 1);
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<(TokenKind, &str)> {
        kinds_with(text, LexicalRules::default())
    }

    fn kinds_with(text: &str, rules: LexicalRules) -> Vec<(TokenKind, &str)> {
        tokenize(text, rules)
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.text))
            .collect()
    }

    #[test]
    fn test_skips_comments() {
        let tokens = kinds("-- leading\n/* block; */ SELECT 1");
        assert_eq!(
            tokens,
            vec![(TokenKind::Word, "SELECT"), (TokenKind::Number, "1")]
        );
    }

    #[test]
    fn test_semicolon_inside_literal_is_not_a_separator() {
        let tokens = kinds("SELECT 'a;b', \"x;y\" FROM t");
        assert!(tokens.iter().all(|(k, _)| *k != TokenKind::Semicolon));
        assert!(tokens.contains(&(TokenKind::StringLiteral, "'a;b'")));
        assert!(tokens.contains(&(TokenKind::QuotedIdentifier, "\"x;y\"")));
    }

    #[test]
    fn test_doubled_quote_escapes() {
        let tokens = kinds("SELECT 'it''s' FROM t");
        assert_eq!(tokens[1], (TokenKind::StringLiteral, "'it''s'"));
    }

    #[test]
    fn test_mdx_brackets() {
        let tokens = kinds("SELECT [Measures].[Sales Amount] ON 0 FROM [Adventure Works]");
        assert!(tokens.contains(&(TokenKind::QuotedIdentifier, "[Sales Amount]")));
        assert!(tokens.contains(&(TokenKind::QuotedIdentifier, "[Adventure Works]")));
    }

    #[test]
    fn test_unterminated_literal() {
        let err = tokenize("SELECT 'oops", LexicalRules::default()).unwrap_err();
        assert_eq!(err.what, "string literal");
        assert_eq!(err.offset, 7);
        assert!(tokenize("SELECT 1 /* open", LexicalRules::default()).is_err());
    }

    #[test]
    fn test_leading_keyword() {
        assert_eq!(leading_keyword("  select 1").as_deref(), Some("SELECT"));
        assert_eq!(leading_keyword("/* c */ with x as (select 1) select * from x").as_deref(), Some("WITH"));
        assert_eq!(leading_keyword("(SELECT 1)"), None);
        assert_eq!(leading_keyword(""), None);
    }

    #[test]
    fn test_non_ascii_punctuation() {
        let tokens = kinds("SELECT ≥");
        assert_eq!(tokens[1], (TokenKind::Punct, "≥"));
    }

    fn semicolons(text: &str, rules: LexicalRules) -> usize {
        kinds_with(text, rules)
            .iter()
            .filter(|(k, _)| *k == TokenKind::Semicolon)
            .count()
    }

    #[test]
    fn test_backslash_ends_standard_literal() {
        let text = r"SELECT 'a\'; DROP TABLE users; --'";
        for rules in [LexicalRules::default(), LexicalRules::postgres(), LexicalRules::tsql()] {
            let tokens = kinds_with(text, rules);
            assert_eq!(tokens[1], (TokenKind::StringLiteral, r"'a\'"));
            assert_eq!(semicolons(text, rules), 2);
        }
    }

    #[test]
    fn test_mysql_backslash_escapes() {
        let text = r"SELECT 'a\'; DROP TABLE users; --'";
        assert_eq!(semicolons(text, LexicalRules::mysql()), 0);

        let text = r#"SELECT '\'' ; DROP TABLE t; -- '"#;
        assert_eq!(semicolons(text, LexicalRules::mysql()), 2);

        let text = r#"SELECT "\"" ; DROP TABLE t; -- ""#;
        let tokens = kinds_with(text, LexicalRules::mysql());
        assert_eq!(tokens[1], (TokenKind::StringLiteral, r#""\"""#));
        assert_eq!(semicolons(text, LexicalRules::mysql()), 2);
    }

    #[test]
    fn test_mysql_comments() {
        let rules = LexicalRules::mysql();
        assert_eq!(semicolons("SELECT 1 # '\n; DROP TABLE t; -- '", rules), 2);
        assert_eq!(semicolons("SELECT 1 --1; DROP TABLE t", rules), 1);
        assert_eq!(semicolons("SELECT 1 -- note; DROP TABLE t", rules), 0);
        assert_eq!(semicolons("SELECT 1 /*!50000 ; DROP TABLE t */", rules), 1);
        assert_eq!(semicolons("SELECT 1 /*+ hint; */", rules), 0);
    }

    #[test]
    fn test_postgres_escape_and_dollar_strings() {
        let rules = LexicalRules::postgres();
        assert_eq!(semicolons(r"SELECT E'\'' ; DROP TABLE t; -- '", rules), 2);
        assert_eq!(semicolons(r"SELECT e'a\'; b'", rules), 0);
        assert_eq!(semicolons("SELECT $$'$$; DROP TABLE t; --'", rules), 2);
        assert_eq!(semicolons("SELECT $fn$ ; $x$ ; $fn$", rules), 0);

        let tokens = kinds_with("SELECT $1, a$b", rules);
        assert_eq!(tokens[1], (TokenKind::Word, "$1"));
        assert!(tokenize("SELECT $$open", rules).is_err());
    }
}
