// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! C4: the DAG scheduler — validates, dispatches ready frontiers in
//! parallel layers, and drains a workflow to completion (§4.4).

use std::collections::{HashMap, HashSet};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::dag::WorkflowDag;
use crate::error::Result;
use crate::executor::TaskExecutor;
use crate::registry::{FunctionRegistry, ParamMap};
use crate::state::{ResultsMap, TaskRecord, TaskState, TaskSummary};
use crate::value::resolve;
use crate::workflow::{TaskSpec, Workflow};

/// Drives one run of a workflow's task graph to completion.
///
/// Concurrency bound is optional (`with_max_in_flight`); unset means the
/// whole ready frontier is dispatched at once, every round.
#[derive(Clone, Default)]
pub struct DagScheduler {
    max_in_flight: Option<usize>,
}

impl DagScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = Some(max);
        self
    }

    /// Structural + cycle + function-registration validation, without
    /// running anything.
    pub fn validate(&self, workflow: &Workflow, registry: &FunctionRegistry) -> Result<()> {
        WorkflowDag::build(workflow)?;
        for task in workflow.tasks() {
            if let Some(name) = &task.func {
                registry.lookup(name)?;
            }
        }
        Ok(())
    }

    /// Executes every reachable task, writing records into `results` as they
    /// complete, and returns the per-task summary for the result envelope.
    pub async fn run(
        &self,
        workflow: &Workflow,
        registry: &FunctionRegistry,
        results: &ResultsMap,
        cancelled: Arc<AtomicBool>,
    ) -> Result<HashMap<String, TaskSummary>> {
        self.validate(workflow, registry)?;

        info!(workflow = ?workflow.name(), "starting workflow run");

        let mut pending: HashMap<String, TaskSpec> =
            workflow.tasks().map(|t| (t.name.clone(), t.clone())).collect();
        let mut completed: HashSet<String> = HashSet::new();
        completed.insert(workflow.input.name.clone());
        results.insert(
            workflow.input.name.clone(),
            TaskRecord::for_input(serde_json::Value::Object(workflow.input.data.clone())),
        );

        let semaphore = self.max_in_flight.map(|n| Arc::new(Semaphore::new(n)));
        let executor = Arc::new(TaskExecutor::new(registry.clone()));

        loop {
            if pending.is_empty() {
                break;
            }

            let ready: Vec<String> = pending
                .iter()
                .filter(|(_, spec)| spec.depends_on.iter().all(|dep| completed.contains(dep)))
                .map(|(name, _)| name.clone())
                .collect();

            if ready.is_empty() {
                warn!(
                    remaining = pending.len(),
                    "no progress possible; cancelling remaining tasks"
                );
                for (name, _) in pending.drain() {
                    results.insert(
                        name,
                        TaskRecord {
                            status: TaskState::Cancelled,
                            output: serde_json::Value::Null,
                            error: Some(
                                "unreachable: an upstream dependency did not succeed".to_string(),
                            ),
                            start: None,
                            end: None,
                            attempts: 0,
                        },
                    );
                }
                break;
            }

            let mut joins = JoinSet::new();
            for name in &ready {
                let spec = pending.remove(name).expect("name came from pending");
                let params = resolved_params(&spec, results);
                let executor = executor.clone();
                let cancelled = cancelled.clone();
                let permit = match &semaphore {
                    Some(sem) => Some(sem.clone().acquire_owned().await.expect("semaphore open")),
                    None => None,
                };
                joins.spawn(async move {
                    let record = executor.run(&spec, params, &cancelled).await;
                    drop(permit);
                    (spec.name, record)
                });
            }

            while let Some(joined) = joins.join_next().await {
                let (name, record) = joined.map_err(|e| {
                    crate::error::OrchestratorError::other(format!(
                        "task runtime panicked: {e}"
                    ))
                })?;
                if record.status == TaskState::Success {
                    completed.insert(name.clone());
                }
                results.insert(name, record);
            }
        }

        let failed = results
            .iter()
            .filter(|e| matches!(e.value().status, TaskState::Failed | TaskState::Timeout))
            .count();
        if failed > 0 {
            warn!(failed, "workflow run completed with failed tasks");
        } else {
            info!("workflow run completed successfully");
        }

        Ok(results
            .iter()
            .map(|e| (e.key().clone(), e.value().to_summary()))
            .collect())
    }
}

/// Resolves a task's `custom_vars` template against the current results map
/// into the parameter bag handed to the executor (§4.4 step 3).
fn resolved_params(spec: &TaskSpec, results: &ResultsMap) -> ParamMap {
    let template = serde_json::Value::Object(spec.custom_vars.clone());
    match resolve(&template, results) {
        serde_json::Value::Object(map) => map.into_iter().collect(),
        _ => ParamMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::new_results_map;
    use crate::workflow::{InputNode, OutputNode, TaskType, WorkflowMetadata};
    use serde_json::{Map, Value};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn task(name: &str, func: &str, deps: &[&str], custom_vars: Map<String, Value>) -> TaskSpec {
        TaskSpec {
            name: name.to_string(),
            task_type: TaskType::Task,
            func: Some(func.to_string()),
            custom_vars,
            depends_on: deps.iter().map(|s| s.to_string()).collect(),
            timeout: 5,
            retry: 0,
            retry_policy: None,
        }
    }

    fn double_registry() -> FunctionRegistry {
        let registry = FunctionRegistry::new();
        registry.register_fn("double", |params: ParamMap| async move {
            let n = params.get("n").and_then(Value::as_f64).unwrap_or(0.0);
            Ok(Value::from(n * 2.0))
        });
        registry
    }

    fn input(data: Map<String, Value>) -> InputNode {
        InputNode {
            node_type: "start".into(),
            name: "input".into(),
            data,
        }
    }

    fn output(data: Map<String, Value>) -> OutputNode {
        OutputNode {
            node_type: "end".into(),
            name: "output".into(),
            data,
        }
    }

    #[tokio::test]
    async fn linear_workflow_s1() {
        let mut vars = Map::new();
        vars.insert("n".to_string(), Value::String("${input.x}".to_string()));
        let mut in_data = Map::new();
        in_data.insert("x".to_string(), Value::from(2));
        let mut out_data = Map::new();
        out_data.insert("r".to_string(), Value::String("${a.output}".to_string()));

        let workflow = Workflow {
            metadata: WorkflowMetadata::default(),
            input: input(in_data),
            executors: vec![task("a", "double", &["input"], vars)],
            output: output(out_data),
        };

        let registry = double_registry();
        let results = new_results_map();
        let scheduler = DagScheduler::new();
        let summary = scheduler
            .run(&workflow, &registry, &results, Arc::new(AtomicBool::new(false)))
            .await
            .unwrap();

        assert_eq!(summary["a"].state, TaskState::Success);
        let output_value = resolve(&Value::Object(workflow.output.data.clone()), &results);
        assert_eq!(output_value, serde_json::json!({"r": 4.0}));
    }

    #[tokio::test]
    async fn diamond_workflow_s2_parallelism() {
        let mut a_vars = Map::new();
        a_vars.insert("n".to_string(), Value::String("${input.x}".to_string()));
        let mut b_vars = Map::new();
        b_vars.insert("n".to_string(), Value::String("${a.output}".to_string()));
        let mut c_vars = Map::new();
        c_vars.insert("n".to_string(), Value::String("${a.output}".to_string()));
        let mut d_vars = Map::new();
        d_vars.insert("n".to_string(), Value::String("${b.output}".to_string()));

        let mut in_data = Map::new();
        in_data.insert("x".to_string(), Value::from(1));

        let registry = FunctionRegistry::new();
        registry.register_fn("double_sleep", |params: ParamMap| async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let n = params.get("n").and_then(Value::as_f64).unwrap_or(0.0);
            Ok(Value::from(n * 2.0))
        });

        let mut out_data = Map::new();
        out_data.insert("r".to_string(), Value::String("${d.output}".to_string()));

        let workflow = Workflow {
            metadata: WorkflowMetadata::default(),
            input: input(in_data),
            executors: vec![
                task("a", "double_sleep", &["input"], a_vars),
                task("b", "double_sleep", &["a"], b_vars),
                task("c", "double_sleep", &["a"], c_vars),
                task("d", "double_sleep", &["b", "c"], d_vars),
            ],
            output: output(out_data),
        };

        let results = new_results_map();
        let scheduler = DagScheduler::new();
        let summary = scheduler
            .run(&workflow, &registry, &results, Arc::new(AtomicBool::new(false)))
            .await
            .unwrap();

        for name in ["a", "b", "c", "d"] {
            assert_eq!(summary[name].state, TaskState::Success);
        }

        let b_start = results.get("b").unwrap().start.unwrap();
        let c_start = results.get("c").unwrap().start.unwrap();
        let d_start = results.get("d").unwrap().start.unwrap();
        assert!(b_start < d_start);
        assert!(c_start < d_start);

        let b_end = results.get("b").unwrap().end.unwrap();
        let c_end = results.get("c").unwrap().end.unwrap();
        // b and c overlap: b started before c ended, and vice versa.
        assert!(b_start < c_end && c_start < b_end);
    }

    #[tokio::test]
    async fn downstream_cancellation_s5() {
        let registry = FunctionRegistry::new();
        registry.register_fn("always_fails", |_: ParamMap| async move {
            Err(crate::registry::FunctionError::from("boom"))
        });
        registry.register_fn("noop", |_: ParamMap| async move { Ok(Value::Null) });

        let workflow = Workflow {
            metadata: WorkflowMetadata::default(),
            input: input(Map::new()),
            executors: vec![
                task("a", "always_fails", &["input"], Map::new()),
                task("b", "noop", &["a"], Map::new()),
                task("c", "noop", &["input"], Map::new()),
            ],
            output: output(Map::new()),
        };

        let results = new_results_map();
        let scheduler = DagScheduler::new();
        let summary = scheduler
            .run(&workflow, &registry, &results, Arc::new(AtomicBool::new(false)))
            .await
            .unwrap();

        assert_eq!(summary["a"].state, TaskState::Failed);
        assert_eq!(summary["b"].state, TaskState::Cancelled);
        assert_eq!(summary["c"].state, TaskState::Success);
    }

    #[tokio::test]
    async fn validate_rejects_unregistered_function_before_running() {
        let workflow = Workflow {
            metadata: WorkflowMetadata::default(),
            input: input(Map::new()),
            executors: vec![task("a", "ghost", &["input"], Map::new())],
            output: output(Map::new()),
        };
        let registry = FunctionRegistry::new();
        let scheduler = DagScheduler::new();
        let err = scheduler.validate(&workflow, &registry).unwrap_err();
        assert!(matches!(
            err,
            crate::error::OrchestratorError::FunctionNotFound { .. }
        ));
    }

    #[tokio::test]
    async fn max_in_flight_is_honored() {
        let registry = FunctionRegistry::new();
        let concurrent = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let max_seen = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let concurrent_clone = concurrent.clone();
        let max_seen_clone = max_seen.clone();
        registry.register_fn("track", move |_: ParamMap| {
            let concurrent = concurrent_clone.clone();
            let max_seen = max_seen_clone.clone();
            async move {
                let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                concurrent.fetch_sub(1, Ordering::SeqCst);
                Ok(Value::Null)
            }
        });

        let workflow = Workflow {
            metadata: WorkflowMetadata::default(),
            input: input(Map::new()),
            executors: (0..4)
                .map(|i| task(&format!("t{i}"), "track", &["input"], Map::new()))
                .collect(),
            output: output(Map::new()),
        };

        let results = new_results_map();
        let scheduler = DagScheduler::new().with_max_in_flight(2);
        scheduler
            .run(&workflow, &registry, &results, Arc::new(AtomicBool::new(false)))
            .await
            .unwrap();

        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }
}
