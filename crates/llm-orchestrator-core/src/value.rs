// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! C2: the placeholder resolver (§4.2).
//!
//! A pure function over a results map: no I/O, no clocks, no randomness.
//! Every outcome — including a miss — is expressed as a returned `Value`,
//! never as an error (`ResolverMiss` is not part of the error taxonomy).

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

use crate::state::ResultsMap;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z0-9_]+(?:\.[A-Za-z0-9_]+)*)\}").expect("valid placeholder regex")
    })
}

/// Recursively substitutes every `${name.path}` placeholder in `template`
/// against `results`, preserving container kind and key/ordering.
pub fn resolve(template: &Value, results: &ResultsMap) -> Value {
    match template {
        Value::String(s) => resolve_string(s, results),
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| resolve(item, results)).collect())
        }
        Value::Object(map) => {
            let mut resolved = Map::with_capacity(map.len());
            for (key, value) in map {
                resolved.insert(key.clone(), resolve(value, results));
            }
            Value::Object(resolved)
        }
        other => other.clone(),
    }
}

/// A string that is *exactly* `"${PATH}"` (no leading/trailing characters)
/// resolves to the referenced value's native type. Anything else resolves
/// to a string with each placeholder stringified in place.
fn resolve_string(s: &str, results: &ResultsMap) -> Value {
    if let Some(path) = exact_placeholder_path(s) {
        return resolve_path(path, results, s);
    }

    let re = placeholder_re();
    if !re.is_match(s) {
        return Value::String(s.to_string());
    }

    let mut out = String::with_capacity(s.len());
    let mut last_end = 0;
    for caps in re.captures_iter(s) {
        let whole = caps.get(0).unwrap();
        let path = caps.get(1).unwrap().as_str();
        out.push_str(&s[last_end..whole.start()]);
        let resolved = resolve_path(path, results, whole.as_str());
        out.push_str(&stringify(&resolved));
        last_end = whole.end();
    }
    out.push_str(&s[last_end..]);
    Value::String(out)
}

fn exact_placeholder_path(s: &str) -> Option<&str> {
    let inner = s.strip_prefix("${")?.strip_suffix('}')?;
    if inner.is_empty() {
        return None;
    }
    if inner
        .split('.')
        .all(|seg| !seg.is_empty() && seg.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
    {
        Some(inner)
    } else {
        None
    }
}

/// Canonical textual representation of a value for embedding inside a
/// larger string (quotes are stripped from JSON strings; everything else
/// uses its compact JSON form).
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        _ => value.to_string(),
    }
}

/// The record envelope fields addressable alongside `output` (§3: "any
/// scalar field under a task's record is addressable via `${name.field}`").
const ENVELOPE_FIELDS: [&str; 6] = ["output", "status", "error", "start", "end", "attempts"];

/// Walks `path` (dot-separated segments) against `results`. Falls back to
/// `original` (the placeholder's own literal text) on any miss: unknown root
/// name, missing key, out-of-range index, or an attempt to traverse past a
/// scalar.
fn resolve_path(path: &str, results: &ResultsMap, original: &str) -> Value {
    let mut segments = path.split('.');
    let root = segments.next().expect("split always yields at least one item");

    let Some(entry) = results.get(root) else {
        return Value::String(original.to_string());
    };

    let rest: Vec<&str> = segments.collect();
    if rest.is_empty() {
        // A task record is addressed as a mapping; a single-segment path
        // returns its `output` field by convention.
        return entry.output.clone();
    }

    // `${name.output...}` / `${name.status}` etc. address the record
    // envelope; any other first segment addresses a field *inside*
    // `output` directly, so `${name.field}` means `name.output.field`,
    // not a literal sibling of `output` in the envelope.
    let mut current = if ENVELOPE_FIELDS.contains(&rest[0]) {
        entry.as_value()
    } else {
        entry.output.clone()
    };
    drop(entry);

    for segment in rest {
        current = match &current {
            Value::Object(map) => match map.get(segment) {
                Some(v) => v.clone(),
                None => return Value::String(original.to_string()),
            },
            Value::Array(items) => match segment.parse::<usize>().ok().and_then(|i| items.get(i))
            {
                Some(v) => v.clone(),
                None => return Value::String(original.to_string()),
            },
            // Scalars cannot be traversed further.
            _ => return Value::String(original.to_string()),
        };
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{new_results_map, TaskRecord, TaskState};
    use chrono::Utc;

    fn sample_results() -> ResultsMap {
        let results = new_results_map();
        results.insert(
            "input".to_string(),
            TaskRecord::for_input(serde_json::json!({"x": 2})),
        );
        results.insert(
            "a".to_string(),
            TaskRecord {
                status: TaskState::Success,
                output: Value::from(4),
                error: None,
                start: Some(Utc::now()),
                end: Some(Utc::now()),
                attempts: 1,
            },
        );
        results.insert(
            "b".to_string(),
            TaskRecord {
                status: TaskState::Success,
                output: serde_json::json!({"items": [10, 20, 30]}),
                error: None,
                start: None,
                end: None,
                attempts: 1,
            },
        );
        results
    }

    #[test]
    fn exact_placeholder_preserves_native_type() {
        let results = sample_results();
        let resolved = resolve(&Value::String("${a.output}".to_string()), &results);
        assert_eq!(resolved, Value::from(4));
    }

    #[test]
    fn single_segment_returns_output_by_convention() {
        let results = sample_results();
        let resolved = resolve(&Value::String("${a}".to_string()), &results);
        assert_eq!(resolved, Value::from(4));
    }

    #[test]
    fn nested_field_traversal() {
        let results = sample_results();
        let resolved = resolve(&Value::String("${input.x}".to_string()), &results);
        assert_eq!(resolved, Value::from(2));
    }

    #[test]
    fn sequence_index_traversal() {
        let results = sample_results();
        let resolved = resolve(&Value::String("${b.output.items.1}".to_string()), &results);
        assert_eq!(resolved, Value::from(20));
    }

    #[test]
    fn embedded_placeholder_stringifies() {
        let results = sample_results();
        let resolved = resolve(
            &Value::String("value is ${a.output} units".to_string()),
            &results,
        );
        assert_eq!(resolved, Value::String("value is 4 units".to_string()));
    }

    #[test]
    fn missing_reference_falls_through_to_literal() {
        let results = sample_results();
        let resolved = resolve(&Value::String("${ghost.output}".to_string()), &results);
        assert_eq!(resolved, Value::String("${ghost.output}".to_string()));
    }

    #[test]
    fn scalar_cannot_be_traversed_further() {
        let results = sample_results();
        // a.output is the scalar 4; a.output.sub attempts to go deeper.
        let resolved = resolve(&Value::String("${a.output.sub}".to_string()), &results);
        assert_eq!(resolved, Value::String("${a.output.sub}".to_string()));
    }

    #[test]
    fn container_recursion_preserves_shape() {
        let results = sample_results();
        let template = serde_json::json!({
            "r": "${a.output}",
            "nested": ["${input.x}", "literal"],
        });
        let resolved = resolve(&template, &results);
        assert_eq!(
            resolved,
            serde_json::json!({"r": 4, "nested": [2, "literal"]})
        );
    }

    #[test]
    fn resolution_is_idempotent() {
        let results = sample_results();
        let template = serde_json::json!({"r": "${a.output}", "msg": "x=${input.x}"});
        let once = resolve(&template, &results);
        let twice = resolve(&once, &results);
        assert_eq!(once, twice);
    }

    #[test]
    fn literal_values_pass_through_unchanged() {
        let results = sample_results();
        assert_eq!(resolve(&Value::from(42), &results), Value::from(42));
        assert_eq!(resolve(&Value::Bool(true), &results), Value::Bool(true));
        assert_eq!(resolve(&Value::Null, &results), Value::Null);
    }
}
