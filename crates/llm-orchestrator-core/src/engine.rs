// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! C6: the engine — the process-lifetime home for loaded workflows and
//! registered functions, and the entry point embedders actually reach for.

use dashmap::DashMap;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use tracing::info;

use crate::error::{OrchestratorError, Result};
use crate::facade::{RunOutcome, WorkflowFacade};
use crate::registry::{FunctionRegistry, ParamMap, TaskFunction};
use crate::workflow::Workflow;

/// Holds every workflow loaded this process and the single function registry
/// they are all run against.
///
/// Cheap to clone: internally `Arc`-backed, so embedders can share one
/// `Engine` across tasks without wrapping it themselves.
#[derive(Clone, Default)]
pub struct Engine {
    workflows: Arc<DashMap<String, Arc<Workflow>>>,
    registry: FunctionRegistry,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a YAML workflow description and stores it under `name`
    /// (falling back to the workflow's own `metadata.name` when `None`).
    /// Rejects a name collision with an already-loaded workflow.
    pub fn load(&self, source: &str, name: Option<&str>) -> Result<String> {
        let workflow = Workflow::from_yaml(source)?;
        let key = name
            .map(str::to_string)
            .or_else(|| workflow.name().map(str::to_string))
            .ok_or_else(|| {
                OrchestratorError::other("workflow has no name and none was provided at load time")
            })?;

        if self.workflows.contains_key(&key) {
            return Err(OrchestratorError::DuplicateWorkflow(key));
        }

        info!(workflow = %key, "loaded workflow");
        self.workflows.insert(key.clone(), Arc::new(workflow));
        Ok(key)
    }

    /// Registers a task function under `name`, available to every loaded
    /// workflow from this point on.
    pub fn register_function(&self, name: impl Into<String>, function: Arc<dyn TaskFunction>) {
        self.registry.register(name, function);
    }

    /// Convenience wrapper for registering a plain async closure as a task
    /// function, without hand-writing a [`TaskFunction`] impl.
    pub fn register_fn<F, Fut>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(ParamMap) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<serde_json::Value, crate::registry::FunctionError>>
            + Send
            + 'static,
    {
        self.registry.register_fn(name, f);
    }

    /// Validates and runs a previously loaded workflow by name.
    pub async fn run(&self, name: &str) -> Result<RunOutcome> {
        self.run_with_overrides(name, None).await
    }

    /// Same as [`Self::run`], but shallow-merges `overrides` into the
    /// workflow's input data before running: top-level keys present in
    /// `overrides` replace the corresponding key in `input.data`; keys
    /// absent from `overrides` are left untouched. The stored workflow
    /// itself is never mutated — each run starts from a fresh copy.
    pub async fn run_with_overrides(
        &self,
        name: &str,
        overrides: Option<Map<String, Value>>,
    ) -> Result<RunOutcome> {
        self.run_with_options(name, overrides, None).await
    }

    /// Same as [`Self::run_with_overrides`], additionally bounding how many
    /// tasks may be in flight at once.
    pub async fn run_with_options(
        &self,
        name: &str,
        overrides: Option<Map<String, Value>>,
        max_in_flight: Option<usize>,
    ) -> Result<RunOutcome> {
        let workflow = self.workflow_handle(name)?;
        let mut workflow = (*workflow).clone();
        if let Some(overrides) = overrides {
            for (key, value) in overrides {
                workflow.input.data.insert(key, value);
            }
        }
        let mut facade = WorkflowFacade::new(workflow, self.registry.clone());
        if let Some(max) = max_in_flight {
            facade = facade.with_max_in_flight(max);
        }
        facade.validate()?;
        facade.run().await
    }

    /// Structural validation only, without dispatching anything.
    pub fn validate(&self, name: &str) -> Result<()> {
        let workflow = self.workflow_handle(name)?;
        WorkflowFacade::new((*workflow).clone(), self.registry.clone()).validate()
    }

    /// The task graph's nodes and edges, for tooling and `describe` CLI output.
    pub fn describe(&self, name: &str) -> Result<crate::dag::GraphView> {
        let workflow = self.workflow_handle(name)?;
        WorkflowFacade::new((*workflow).clone(), self.registry.clone()).describe()
    }

    pub fn list_workflows(&self) -> Vec<String> {
        let mut names: Vec<String> = self.workflows.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn list_functions(&self) -> Vec<String> {
        self.registry.list()
    }

    /// A cheap, `Arc`-backed handle to the engine's function registry, for
    /// bulk registration helpers (e.g. `llm_orchestrator_functions::register_defaults`).
    pub fn registry(&self) -> FunctionRegistry {
        self.registry.clone()
    }

    fn workflow_handle(&self, name: &str) -> Result<Arc<Workflow>> {
        self.workflows
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| OrchestratorError::WorkflowNotFound(name.to_string()))
    }
}
