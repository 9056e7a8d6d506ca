//! Sanitizer
//!
//! Reduces untrusted oracle text to a code-only candidate. Every step is a pure function over
//! the rule set of the target direction:
//!
//! 1. strip fenced code-block delimiters and their language tags
//! 2. drop the conversational preamble before the earliest start-of-code anchor
//! 3. drop a non-code epilogue after the last closing brace
//! 4. strip residual source-language lines and apply residual keyword substitutions
//!
//! An empty result means no code anchor was found and the attempt has failed.

use crate::rules::{apply_rules, rule_set, RuleSet, CODE_FENCE, CODE_LIKE_LINE};
use crate::types::Direction;

/// Sanitize raw oracle output for the given direction
pub fn sanitize(raw: &str, direction: Direction) -> String {
    let rules = rule_set(direction);

    let unfenced = strip_fences(raw);
    let Some(body) = strip_preamble(&unfenced, rules) else {
        tracing::debug!("Sanitizer found no code anchor in {} chars", raw.len());
        return String::new();
    };
    let body = strip_epilogue(body);

    apply_rules(&rules.cleanup, body).trim().to_string()
}

fn strip_fences(text: &str) -> String {
    CODE_FENCE.replace_all(text, "").into_owned()
}

fn strip_preamble<'t>(text: &'t str, rules: &RuleSet) -> Option<&'t str> {
    rules
        .code_anchor
        .find(text)
        .map(|anchor| &text[anchor.start()..])
}

fn strip_epilogue(text: &str) -> &str {
    let Some(last_brace) = text.rfind('}') else {
        return text;
    };

    let tail = &text[last_brace + 1..];
    if tail.trim().is_empty() || looks_like_code(tail) {
        return text;
    }

    &text[..=last_brace]
}

fn looks_like_code(tail: &str) -> bool {
    tail.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| CODE_LIKE_LINE.is_match(line))
        .unwrap_or(false)
}
