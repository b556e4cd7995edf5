// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! C5: the workflow façade — binds one [`Workflow`] to a [`FunctionRegistry`]
//! and exposes the three operations a caller actually needs: validate,
//! describe, run.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use uuid::Uuid;

use crate::dag::{GraphView, WorkflowDag};
use crate::error::Result;
use crate::registry::FunctionRegistry;
use crate::scheduler::DagScheduler;
use crate::state::{new_results_map, TaskSummary};
use crate::value::resolve;
use crate::workflow::Workflow;

/// The result envelope of one workflow run (§6): a unique run identifier,
/// the resolved output node, and a per-task summary of how it got there.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub output: Value,
    pub tasks: HashMap<String, TaskSummary>,
}

/// A workflow bound to the registry it will be run against.
pub struct WorkflowFacade {
    workflow: Workflow,
    registry: FunctionRegistry,
    scheduler: DagScheduler,
}

impl WorkflowFacade {
    pub fn new(workflow: Workflow, registry: FunctionRegistry) -> Self {
        Self {
            workflow,
            registry,
            scheduler: DagScheduler::new(),
        }
    }

    /// Bounds how many tasks may be in flight at once; unset means the
    /// whole ready frontier dispatches together every round.
    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.scheduler = self.scheduler.with_max_in_flight(max);
        self
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// Structural, cycle, and function-registration validation without
    /// dispatching anything.
    pub fn validate(&self) -> Result<()> {
        self.scheduler.validate(&self.workflow, &self.registry)
    }

    /// The task graph's nodes and dependency edges, for tooling.
    pub fn describe(&self) -> Result<GraphView> {
        Ok(WorkflowDag::build(&self.workflow)?.describe())
    }

    /// Runs the workflow to completion, resolving the output node's
    /// template against the final results map.
    pub async fn run(&self) -> Result<RunOutcome> {
        self.run_cancellable(Arc::new(AtomicBool::new(false))).await
    }

    /// Same as [`Self::run`], but accepts an externally owned cancellation
    /// flag so a caller (e.g. the engine, honoring a workflow-level timeout)
    /// can abort an in-flight run.
    pub async fn run_cancellable(&self, cancelled: Arc<AtomicBool>) -> Result<RunOutcome> {
        let results = new_results_map();
        let tasks = self
            .scheduler
            .run(&self.workflow, &self.registry, &results, cancelled)
            .await?;

        let output_template = Value::Object(self.workflow.output.data.clone());
        let output = resolve(&output_template, &results);

        Ok(RunOutcome {
            run_id: Uuid::new_v4(),
            output,
            tasks,
        })
    }
}
