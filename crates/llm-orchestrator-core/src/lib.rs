// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core DAG workflow orchestration engine for LLM pipelines.
//!
//! Six cooperating components carry one workflow run from a parsed
//! description to a result envelope:
//!
//! - [`registry`] (C1) — the process-lifetime function name -> callable map.
//! - [`value`] (C2) — the `${name.path}` placeholder resolver.
//! - [`executor`] (C3) — timeout + bounded retry around one task invocation.
//! - [`dag`] and [`scheduler`] (C4) — graph validation and the concurrent
//!   ready-frontier execution loop.
//! - [`facade`] (C5) — one workflow bound to a registry.
//! - [`engine`] (C6) — the process-lifetime home for every loaded workflow.

pub mod dag;
pub mod engine;
pub mod error;
pub mod executor;
pub mod facade;
pub mod registry;
pub mod retry;
pub mod scheduler;
pub mod state;
pub mod value;
pub mod workflow;

pub use engine::Engine;
pub use error::{OrchestratorError, Result};
pub use facade::{RunOutcome, WorkflowFacade};
pub use registry::{FunctionError, FunctionRegistry, ParamMap, TaskFunction};
pub use state::{TaskRecord, TaskState, TaskSummary};
pub use workflow::{TaskSpec, Workflow};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
