// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in task functions for LLM Orchestrator: LLM completion providers
//! (Anthropic, OpenAI) adapted to the core's `TaskFunction` trait, plus a
//! handful of pure helpers for wiring test and glue-logic workflows.

pub mod adapter;
pub mod anthropic;
pub mod builtins;
pub mod openai;
pub mod traits;

pub use adapter::CompletionFunction;
pub use anthropic::AnthropicProvider;
pub use builtins::register_all as register_builtins;
pub use openai::OpenAIProvider;
pub use traits::{CompletionRequest, CompletionResponse, LLMProvider, ProviderError};

/// Registers the Anthropic and OpenAI providers (as `anthropic.complete` /
/// `openai.complete`) and every pure builtin into `registry`.
pub fn register_defaults(
    registry: &llm_orchestrator_core::registry::FunctionRegistry,
    anthropic: Option<std::sync::Arc<AnthropicProvider>>,
    openai: Option<std::sync::Arc<OpenAIProvider>>,
) {
    if let Some(provider) = anthropic {
        registry.register("anthropic.complete", std::sync::Arc::new(CompletionFunction::new(provider)));
    }
    if let Some(provider) = openai {
        registry.register("openai.complete", std::sync::Arc::new(CompletionFunction::new(provider)));
    }
    builtins::register_all(registry);
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
