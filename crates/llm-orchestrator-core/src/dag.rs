// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graph construction and validation for C4, the DAG scheduler.
//!
//! The runtime ready-frontier computation (§4.4 step 1) only needs each
//! task's `depends_on` set checked against the completed-name set and lives
//! in [`crate::scheduler`]; this module owns the one-time structural
//! validation — unknown dependencies, duplicate names, and cycles — using
//! `petgraph` the way the teacher workspace already depends on it for.

use petgraph::algo::{is_cyclic_directed, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

use crate::error::{OrchestratorError, Result};
use crate::workflow::{Workflow, WorkflowMetadata};

/// A read-only structural view of a workflow's task graph, for tooling
/// (`Workflow::describe`) and for one-time cycle validation.
pub struct WorkflowDag {
    graph: DiGraph<String, ()>,
    index_of: HashMap<String, NodeIndex>,
    metadata: WorkflowMetadata,
}

/// Structural view returned by [`crate::facade::WorkflowFacade::describe`]
/// (§4.5: `describe() -> {nodes, edges, metadata}`).
#[derive(Debug, Clone, serde::Serialize)]
pub struct GraphView {
    pub nodes: Vec<String>,
    pub edges: Vec<(String, String)>,
    pub metadata: WorkflowMetadata,
}

impl WorkflowDag {
    /// Builds and validates the dependency graph: structural checks first
    /// (unique names, known dependencies), then cycle detection.
    pub fn build(workflow: &Workflow) -> Result<Self> {
        workflow.validate_structure()?;

        let mut graph = DiGraph::new();
        let mut index_of = HashMap::new();

        index_of.insert(
            workflow.input.name.clone(),
            graph.add_node(workflow.input.name.clone()),
        );
        for task in workflow.tasks() {
            index_of.insert(task.name.clone(), graph.add_node(task.name.clone()));
        }
        for task in workflow.tasks() {
            let to = index_of[&task.name];
            for dep in &task.depends_on {
                let from = index_of[dep];
                graph.add_edge(from, to, ());
            }
        }

        if is_cyclic_directed(&graph) {
            let cycle = Self::find_one_cycle(&graph);
            return Err(OrchestratorError::CycleDetected { cycle });
        }

        Ok(Self {
            graph,
            index_of,
            metadata: workflow.metadata.clone(),
        })
    }

    /// Returns the node names forming one offending cycle. `petgraph`'s
    /// Tarjan SCC groups mutually-reachable nodes together; any group larger
    /// than one node, or a single node with a self-loop, is a cycle.
    fn find_one_cycle(graph: &DiGraph<String, ()>) -> Vec<String> {
        for scc in tarjan_scc(graph) {
            if scc.len() > 1 {
                return scc.into_iter().map(|idx| graph[idx].clone()).collect();
            }
            if let [idx] = scc[..] {
                if graph.find_edge(idx, idx).is_some() {
                    return vec![graph[idx].clone()];
                }
            }
        }
        Vec::new()
    }

    /// All node names and dependency edges (`depends_on` target -> task),
    /// for read-only structural inspection.
    pub fn describe(&self) -> GraphView {
        let nodes = self.index_of.keys().cloned().collect();
        let edges = self
            .graph
            .edge_indices()
            .filter_map(|e| {
                let (from, to) = self.graph.edge_endpoints(e)?;
                Some((self.graph[from].clone(), self.graph[to].clone()))
            })
            .collect();
        GraphView {
            nodes,
            edges,
            metadata: self.metadata.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workflow_with_deps(pairs: &[(&str, &[&str])]) -> Workflow {
        use crate::workflow::{InputNode, OutputNode, TaskSpec, TaskType, WorkflowMetadata};
        use serde_json::Map;

        Workflow {
            metadata: WorkflowMetadata::default(),
            input: InputNode {
                node_type: "start".into(),
                name: "input".into(),
                data: Map::new(),
            },
            executors: pairs
                .iter()
                .map(|(name, deps)| TaskSpec {
                    name: name.to_string(),
                    task_type: TaskType::Task,
                    func: Some("noop".into()),
                    custom_vars: Map::new(),
                    depends_on: deps.iter().map(|s| s.to_string()).collect(),
                    timeout: 30,
                    retry: 0,
                    retry_policy: None,
                })
                .collect(),
            output: OutputNode {
                node_type: "end".into(),
                name: "output".into(),
                data: Map::new(),
            },
        }
    }

    #[test]
    fn builds_acyclic_diamond() {
        let wf = workflow_with_deps(&[
            ("a", &["input"]),
            ("b", &["a"]),
            ("c", &["a"]),
            ("d", &["b", "c"]),
        ]);
        let dag = WorkflowDag::build(&wf).unwrap();
        let view = dag.describe();
        assert_eq!(view.nodes.len(), 5);
        assert_eq!(view.edges.len(), 5);
    }

    #[test]
    fn detects_direct_cycle() {
        let wf = workflow_with_deps(&[("a", &["b"]), ("b", &["a"])]);
        let err = WorkflowDag::build(&wf).unwrap_err();
        match err {
            OrchestratorError::CycleDetected { cycle } => {
                assert_eq!(cycle.len(), 2);
                assert!(cycle.contains(&"a".to_string()));
                assert!(cycle.contains(&"b".to_string()));
            }
            other => panic!("expected CycleDetected, got {other:?}"),
        }
    }

    #[test]
    fn detects_self_loop() {
        let wf = workflow_with_deps(&[("a", &["a"])]);
        let err = WorkflowDag::build(&wf).unwrap_err();
        assert!(matches!(err, OrchestratorError::CycleDetected { .. }));
    }

    #[test]
    fn rejects_unknown_dependency_before_cycle_check() {
        let wf = workflow_with_deps(&[("a", &["ghost"])]);
        let err = WorkflowDag::build(&wf).unwrap_err();
        assert!(matches!(err, OrchestratorError::UnknownDependency { .. }));
    }

    #[test]
    fn describe_carries_workflow_metadata() {
        let mut wf = workflow_with_deps(&[("a", &["input"])]);
        wf.metadata.version = "2.0".to_string();
        wf.metadata.description = "a sample graph".to_string();

        let view = WorkflowDag::build(&wf).unwrap().describe();
        assert_eq!(view.metadata.version, "2.0");
        assert_eq!(view.metadata.description, "a sample graph");
    }
}
