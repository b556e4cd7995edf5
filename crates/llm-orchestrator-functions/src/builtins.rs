// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Small, pure, non-LLM task functions useful for wiring test workflows and
//! glue logic between completion calls (§0.3, §4.1 supplement).

use llm_orchestrator_core::registry::{FunctionError, FunctionRegistry, ParamMap};
use serde_json::Value;

/// Registers every builtin under its conventional name.
pub fn register_all(registry: &FunctionRegistry) {
    registry.register_fn("double", double);
    registry.register_fn("concat", concat);
    registry.register_fn("uppercase", uppercase);
    registry.register_fn("json_merge", json_merge);
}

/// `{n: <number>}` -> `n * 2`.
async fn double(params: ParamMap) -> Result<Value, FunctionError> {
    let n = params
        .get("n")
        .and_then(Value::as_f64)
        .ok_or_else(|| FunctionError::from("double requires a numeric 'n' param"))?;
    Ok(Value::from(n * 2.0))
}

/// `{values: [<string>, ...], separator?: <string>}` -> the joined string.
async fn concat(params: ParamMap) -> Result<Value, FunctionError> {
    let values = params
        .get("values")
        .and_then(Value::as_array)
        .ok_or_else(|| FunctionError::from("concat requires an array 'values' param"))?;
    let separator = params
        .get("separator")
        .and_then(Value::as_str)
        .unwrap_or("");

    let parts: Vec<String> = values
        .iter()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect();

    Ok(Value::String(parts.join(separator)))
}

/// `{text: <string>}` -> the upper-cased string.
async fn uppercase(params: ParamMap) -> Result<Value, FunctionError> {
    let text = params
        .get("text")
        .and_then(Value::as_str)
        .ok_or_else(|| FunctionError::from("uppercase requires a string 'text' param"))?;
    Ok(Value::String(text.to_uppercase()))
}

/// `{a: <object>, b: <object>}` -> a shallow merge of `b` over `a`.
async fn json_merge(params: ParamMap) -> Result<Value, FunctionError> {
    let a = params
        .get("a")
        .and_then(Value::as_object)
        .ok_or_else(|| FunctionError::from("json_merge requires an object 'a' param"))?;
    let b = params
        .get("b")
        .and_then(Value::as_object)
        .ok_or_else(|| FunctionError::from("json_merge requires an object 'b' param"))?;

    let mut merged = a.clone();
    for (key, value) in b {
        merged.insert(key.clone(), value.clone());
    }
    Ok(Value::Object(merged))
}
