// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! C1: the function registry — a process-lifetime name -> callable mapping.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::{OrchestratorError, Result};

/// The resolved parameter bag handed to a registered function: string key to
/// whatever value the placeholder resolver produced (scalar, list, map, or
/// null — see the "schema-lite resolved map" design note).
pub type ParamMap = HashMap<String, Value>;

/// Opaque error type raised by a registered function. The registry and
/// executor never inspect it beyond its `Display` text.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct FunctionError(pub String);

impl From<String> for FunctionError {
    fn from(msg: String) -> Self {
        Self(msg)
    }
}

impl From<&str> for FunctionError {
    fn from(msg: &str) -> Self {
        Self(msg.to_string())
    }
}

/// A registered task function. The registry has no schema for `params`;
/// type agreement between a workflow author's `custom_vars` and a function's
/// expectations is the caller's responsibility (§4.1).
#[async_trait]
pub trait TaskFunction: Send + Sync {
    /// Invokes the function with a resolved parameter bag, returning any
    /// serializable value.
    async fn call(&self, params: ParamMap) -> std::result::Result<Value, FunctionError>;
}

type BoxedFuture = Pin<Box<dyn Future<Output = std::result::Result<Value, FunctionError>> + Send>>;

/// Adapts a plain `async fn(ParamMap) -> Result<Value, FunctionError>`-shaped
/// closure into a [`TaskFunction`], so callers can register functions
/// without hand-writing a struct + trait impl for each one.
struct FnTaskFunction<F>(F)
where
    F: Fn(ParamMap) -> BoxedFuture + Send + Sync;

#[async_trait]
impl<F> TaskFunction for FnTaskFunction<F>
where
    F: Fn(ParamMap) -> BoxedFuture + Send + Sync,
{
    async fn call(&self, params: ParamMap) -> std::result::Result<Value, FunctionError> {
        (self.0)(params).await
    }
}

/// Wraps a closure returning a boxed future into a [`TaskFunction`]. Use
/// [`FunctionRegistry::register_fn`] for the common case instead of calling
/// this directly.
pub fn from_fn<F, Fut>(f: F) -> Arc<dyn TaskFunction>
where
    F: Fn(ParamMap) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<Value, FunctionError>> + Send + 'static,
{
    Arc::new(FnTaskFunction(move |params| {
        Box::pin(f(params)) as BoxedFuture
    }))
}

/// Process-lifetime mapping from function name to callable implementation.
///
/// Safe for concurrent reads after initialization; writes typically only
/// occur during setup, but the underlying `DashMap` tolerates concurrent
/// writes too.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: Arc<DashMap<String, Arc<dyn TaskFunction>>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent replace: the last registration under a name wins.
    pub fn register(&self, name: impl Into<String>, function: Arc<dyn TaskFunction>) {
        self.functions.insert(name.into(), function);
    }

    /// Convenience wrapper around [`from_fn`] + [`register`](Self::register).
    pub fn register_fn<F, Fut>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(ParamMap) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Value, FunctionError>> + Send + 'static,
    {
        self.register(name, from_fn(f));
    }

    /// Looks up a function by name.
    pub fn lookup(&self, name: &str) -> Result<Arc<dyn TaskFunction>> {
        self.functions
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| OrchestratorError::FunctionNotFound {
                name: name.to_string(),
            })
    }

    /// All registered function names, in an arbitrary but stable-for-this-call order.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}
