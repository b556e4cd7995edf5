// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error taxonomy for the workflow engine.

use std::time::Duration;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// All errors the orchestrator core can surface.
///
/// `ResolverMiss` is intentionally absent: per the placeholder resolution
/// rules, a missing reference falls through to the original literal text
/// and is never raised as an error.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// A `depends_on` entry names a task that does not exist in the workflow.
    #[error("task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency { task: String, dependency: String },

    /// Two tasks (or a task and the input node) share a name.
    #[error("duplicate task name '{name}'")]
    DuplicateTaskName { name: String },

    /// The dependency graph contains a cycle.
    #[error("workflow graph contains a cycle involving: {}", .cycle.join(" -> "))]
    CycleDetected { cycle: Vec<String> },

    /// A task references a function that was never registered.
    #[error("function '{name}' is not registered")]
    FunctionNotFound { name: String },

    /// A task could not be found by name (internal bookkeeping error).
    #[error("task '{0}' not found")]
    TaskNotFound(String),

    /// A single task invocation exceeded its configured timeout.
    #[error("task '{task}' timed out after {duration:?}")]
    Timeout { task: String, duration: Duration },

    /// A task exhausted its retry budget without succeeding.
    #[error("task '{task}' failed after {attempts} attempt(s): {reason}")]
    TaskFailed {
        task: String,
        attempts: u32,
        reason: String,
    },

    /// The run was cancelled before completion.
    #[error("workflow run was cancelled")]
    Cancelled,

    /// A workflow name collides with one already loaded into the engine.
    #[error("workflow '{0}' is already loaded")]
    DuplicateWorkflow(String),

    /// No workflow registered under the given name.
    #[error("workflow '{0}' not found")]
    WorkflowNotFound(String),

    /// The workflow description failed to parse.
    #[error("failed to parse workflow description: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Catch-all for opaque errors raised by registered functions.
    #[error("{0}")]
    Other(String),
}

impl OrchestratorError {
    /// Wraps an arbitrary displayable error as an opaque [`OrchestratorError::Other`].
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}
