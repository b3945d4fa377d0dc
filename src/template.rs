//! Path-template interpolation
//!
//! Handles `{placeholder}` interpolation in stream path templates, e.g.
//! `/lists/{list_id}/members`. Placeholder values come from a [`Context`]
//! derived from a parent stream record.

use crate::error::{Error, Result};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Regex for matching path placeholders: {name}
static PLACEHOLDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-zA-Z_][a-zA-Z0-9_]*)\}").unwrap());

/// Scoping values threaded from a parent record into a child stream's path
pub type Context = HashMap<String, String>;

/// Render a path template with the given context
///
/// Every placeholder must have a value in the context; an unresolved
/// placeholder is an error rather than a literal left in the URL.
pub fn render(template: &str, ctx: &Context) -> Result<String> {
    let mut result = template.to_string();
    let mut missing = Vec::new();

    for cap in PLACEHOLDER_REGEX.captures_iter(template) {
        let full_match = cap.get(0).unwrap().as_str();
        let name = cap.get(1).unwrap().as_str();

        match ctx.get(name) {
            Some(value) => {
                result = result.replace(full_match, value);
            }
            None => missing.push(name.to_string()),
        }
    }

    if missing.is_empty() {
        Ok(result)
    } else {
        Err(Error::undefined_placeholder(missing.join(", ")))
    }
}

/// Check if a path template contains placeholders
pub fn has_placeholders(s: &str) -> bool {
    PLACEHOLDER_REGEX.is_match(s)
}

/// Extract all placeholder names from a template
pub fn placeholders(template: &str) -> Vec<String> {
    PLACEHOLDER_REGEX
        .captures_iter(template)
        .map(|cap| cap.get(1).unwrap().as_str().to_string())
        .collect()
}
