// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Response cleanup before validation

const FENCE: &str = "```";

/// Strip surrounding whitespace and fenced-code markers
///
/// An opening fence may carry a language tag (```` ```sql ````) on its own
/// line. Text inside the fences is returned untouched apart from trimming.
pub fn sanitize(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix(FENCE) {
        text = match rest.split_once('\n') {
            Some((tag, body)) if is_language_tag(tag.trim()) => body,
            _ => rest,
        };
    }

    if let Some(rest) = text.trim_end().strip_suffix(FENCE) {
        text = rest;
    }

    text.trim()
}

fn is_language_tag(text: &str) -> bool {
    text.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+'))
}
