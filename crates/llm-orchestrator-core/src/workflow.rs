// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The workflow description data model (§3, §6 of the design).
//!
//! This module only models the *shape* the core consumes; turning a YAML or
//! JSON document into a [`Workflow`] is ordinary `serde` deserialization, not
//! a loader subsystem of its own.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::error::{OrchestratorError, Result};

fn default_timeout_secs() -> u64 {
    30
}

/// Exponential/linear/constant backoff, mirrored from the executor's retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// Same delay before every retry.
    Constant,
    /// Delay grows linearly with attempt number.
    Linear,
    /// Delay doubles with every attempt (the default).
    #[default]
    Exponential,
}

/// Retry behavior for a single task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts *after* the first failure.
    #[serde(default)]
    pub max_attempts: u32,
    /// Backoff strategy between attempts.
    #[serde(default)]
    pub backoff: BackoffStrategy,
    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Upper bound on any single retry delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_initial_delay_ms() -> u64 {
    200
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            backoff: BackoffStrategy::Exponential,
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// The three task kinds a workflow document can contain.
///
/// Only `Task` is ever dispatched by the scheduler; `Start`/`End` describe
/// the input and output nodes when they appear inline in `executors` rather
/// than as the dedicated `input`/`output` keys (both shapes are accepted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    #[default]
    Task,
    Start,
    End,
}

/// One node in the task DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Unique identifier within the workflow.
    pub name: String,

    /// Dispatch kind; only `Task` is actually executed.
    #[serde(rename = "type", default)]
    pub task_type: TaskType,

    /// Name of the registered function to invoke. Required for `Task` nodes.
    #[serde(default)]
    pub func: Option<String>,

    /// Parameter name -> value template (literal, placeholder, or nested
    /// container of the same). Modeled as a `serde_json::Value` tree per the
    /// "schema-lite resolved map" design note.
    #[serde(default)]
    pub custom_vars: Map<String, Value>,

    /// Names of tasks that must reach `SUCCESS` before this task is ready.
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Maximum wall-clock seconds for one invocation attempt.
    #[serde(default = "default_timeout_secs")]
    pub timeout: u64,

    /// Maximum additional attempts after the first failure.
    #[serde(default)]
    pub retry: u32,

    /// Full retry policy (backoff shape); falls back to a bare count + the
    /// default exponential backoff when absent.
    #[serde(default)]
    pub retry_policy: Option<RetryConfig>,
}

impl TaskSpec {
    /// Effective retry configuration, reconciling the bare `retry` count
    /// (the field named directly in the spec) with an optional detailed
    /// `retry_policy` block.
    pub fn effective_retry(&self) -> RetryConfig {
        match &self.retry_policy {
            Some(policy) => RetryConfig {
                max_attempts: policy.max_attempts.max(self.retry),
                ..policy.clone()
            },
            None => RetryConfig {
                max_attempts: self.retry,
                ..RetryConfig::default()
            },
        }
    }
}

/// The `input` node: a name plus a bag of literal values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputNode {
    #[serde(rename = "type", default = "start_type")]
    pub node_type: String,
    pub name: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

fn start_type() -> String {
    "start".to_string()
}

/// The `output` node: a name plus a template mapping, typically containing
/// placeholder references into completed tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputNode {
    #[serde(rename = "type", default = "end_type")]
    pub node_type: String,
    pub name: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

fn end_type() -> String {
    "end".to_string()
}

/// Opaque workflow metadata; `name` is used by the engine façade to key its
/// workflow table when the caller does not supply one explicitly.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkflowMetadata {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Unknown keys are preserved, never interpreted by the core.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An immutable workflow description: metadata, an input node, task specs,
/// and an output node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default)]
    pub metadata: WorkflowMetadata,
    pub input: InputNode,
    #[serde(default)]
    pub executors: Vec<TaskSpec>,
    pub output: OutputNode,
}

impl Workflow {
    /// Parses a workflow description from a YAML document.
    pub fn from_yaml(source: &str) -> Result<Self> {
        let workflow: Workflow = serde_yaml::from_str(source)?;
        Ok(workflow)
    }

    /// The name the engine façade keys this workflow under, absent an
    /// explicit override at load time.
    pub fn name(&self) -> Option<&str> {
        self.metadata.name.as_deref()
    }

    /// Only the dispatchable task nodes (`type: task`).
    pub fn tasks(&self) -> impl Iterator<Item = &TaskSpec> {
        self.executors
            .iter()
            .filter(|t| t.task_type == TaskType::Task)
    }

    /// Structural validation: unique names (including the input node's),
    /// every `depends_on` names an existing task. Cycle detection is the
    /// DAG builder's responsibility (it needs the graph structure anyway).
    pub fn validate_structure(&self) -> Result<()> {
        let mut seen = HashSet::new();
        seen.insert(self.input.name.clone());

        for task in self.tasks() {
            if !seen.insert(task.name.clone()) {
                return Err(OrchestratorError::DuplicateTaskName {
                    name: task.name.clone(),
                });
            }
        }

        let known: HashSet<&str> = std::iter::once(self.input.name.as_str())
            .chain(self.tasks().map(|t| t.name.as_str()))
            .collect();

        for task in self.tasks() {
            for dep in &task.depends_on {
                if !known.contains(dep.as_str()) {
                    return Err(OrchestratorError::UnknownDependency {
                        task: task.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
            if task.func.is_none() {
                return Err(OrchestratorError::Other(format!(
                    "task '{}' has no registered function",
                    task.name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
metadata:
  version: "1.0"
  description: "sample"
  name: "sample"
input:
  type: start
  name: input
  data:
    x: 2
executors:
  - name: a
    type: task
    func: double
    custom_vars:
      n: "${input.x}"
output:
  type: end
  name: output
  data:
    r: "${a.output}"
"#
    }

    #[test]
    fn parses_minimal_workflow() {
        let wf = Workflow::from_yaml(sample_yaml()).unwrap();
        assert_eq!(wf.name(), Some("sample"));
        assert_eq!(wf.input.name, "input");
        assert_eq!(wf.executors.len(), 1);
        assert_eq!(wf.output.name, "output");
    }

    #[test]
    fn validate_structure_accepts_sample() {
        let wf = Workflow::from_yaml(sample_yaml()).unwrap();
        assert!(wf.validate_structure().is_ok());
    }

    #[test]
    fn validate_structure_rejects_unknown_dependency() {
        let mut wf = Workflow::from_yaml(sample_yaml()).unwrap();
        wf.executors[0].depends_on.push("ghost".to_string());
        let err = wf.validate_structure().unwrap_err();
        assert!(matches!(err, OrchestratorError::UnknownDependency { .. }));
    }

    #[test]
    fn validate_structure_rejects_duplicate_names() {
        let mut wf = Workflow::from_yaml(sample_yaml()).unwrap();
        let dup = wf.executors[0].clone();
        wf.executors.push(dup);
        let err = wf.validate_structure().unwrap_err();
        assert!(matches!(err, OrchestratorError::DuplicateTaskName { .. }));
    }

    #[test]
    fn effective_retry_falls_back_to_bare_count() {
        let mut task = TaskSpec {
            name: "t".into(),
            task_type: TaskType::Task,
            func: Some("f".into()),
            custom_vars: Map::new(),
            depends_on: vec![],
            timeout: 30,
            retry: 2,
            retry_policy: None,
        };
        assert_eq!(task.effective_retry().max_attempts, 2);

        task.retry_policy = Some(RetryConfig {
            max_attempts: 5,
            backoff: BackoffStrategy::Linear,
            initial_delay_ms: 10,
            max_delay_ms: 100,
        });
        assert_eq!(task.effective_retry().max_attempts, 5);
    }
}
