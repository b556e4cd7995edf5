// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bridges an [`LLMProvider`] into the orchestrator core's `TaskFunction`,
//! so a workflow's `func:` entry can name an LLM completion directly.

use async_trait::async_trait;
use llm_orchestrator_core::registry::{FunctionError, ParamMap, TaskFunction};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::traits::{CompletionRequest, LLMProvider};

/// Adapts a provider into a task function taking the `custom_vars` shape:
/// `model`, `prompt`, `system` (optional), `temperature` (optional),
/// `max_tokens` (optional); any other key is passed through as `extra`.
/// Returns the provider's completion text as a `Value::String`.
pub struct CompletionFunction {
    provider: Arc<dyn LLMProvider>,
}

impl CompletionFunction {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }

    fn request_from_params(params: &ParamMap) -> Result<CompletionRequest, FunctionError> {
        let model = params
            .get("model")
            .and_then(Value::as_str)
            .ok_or_else(|| FunctionError::from("completion task requires a 'model' param"))?
            .to_string();
        let prompt = params
            .get("prompt")
            .and_then(Value::as_str)
            .ok_or_else(|| FunctionError::from("completion task requires a 'prompt' param"))?
            .to_string();

        let mut extra = HashMap::new();
        for (key, value) in params {
            if !matches!(
                key.as_str(),
                "model" | "prompt" | "system" | "temperature" | "max_tokens"
            ) {
                extra.insert(key.clone(), value.clone());
            }
        }

        Ok(CompletionRequest {
            model,
            prompt,
            system: params
                .get("system")
                .and_then(Value::as_str)
                .map(str::to_string),
            temperature: params
                .get("temperature")
                .and_then(Value::as_f64)
                .map(|f| f as f32),
            max_tokens: params
                .get("max_tokens")
                .and_then(Value::as_u64)
                .map(|u| u as u32),
            extra,
        })
    }
}

#[async_trait]
impl TaskFunction for CompletionFunction {
    async fn call(&self, params: ParamMap) -> Result<Value, FunctionError> {
        let request = Self::request_from_params(&params)?;
        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|err| FunctionError::from(err.to_string()))?;
        Ok(serde_json::json!({
            "text": response.text,
            "model": response.model,
            "tokens_used": response.tokens_used,
            "metadata": response.metadata,
        }))
    }
}
