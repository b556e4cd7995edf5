// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! C3: the task executor — timeout + bounded retry around one invocation.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::OrchestratorError;
use crate::registry::{FunctionRegistry, ParamMap};
use crate::retry::{RetryExecutor, RetryPolicy};
use crate::state::{TaskRecord, TaskState};
use crate::workflow::TaskSpec;

/// Runs a single task invocation with its configured timeout and retry
/// budget, never propagating an error upward — every outcome lands in the
/// returned [`TaskRecord`] (§4.3).
pub struct TaskExecutor {
    registry: FunctionRegistry,
}

impl TaskExecutor {
    pub fn new(registry: FunctionRegistry) -> Self {
        Self { registry }
    }

    /// Executes `spec` with already-resolved `params`. `cancelled` is
    /// polled at every suspension point; once set, the in-flight attempt is
    /// abandoned and the record transitions to `CANCELLED`.
    pub async fn run(&self, spec: &TaskSpec, params: ParamMap, cancelled: &AtomicBool) -> TaskRecord {
        let start = Utc::now();
        let task_name = spec.name.clone();

        let function = match self.registry.lookup(spec.func.as_deref().unwrap_or("")) {
            Ok(f) => f,
            Err(err) => {
                warn!(task = %task_name, error = %err, "function lookup failed at dispatch time");
                return TaskRecord {
                    status: TaskState::Failed,
                    output: serde_json::Value::Null,
                    error: Some(err.to_string()),
                    start: Some(start),
                    end: Some(Utc::now()),
                    attempts: 0,
                };
            }
        };

        let retry_config = spec.effective_retry();
        let policy: RetryPolicy = (&retry_config).into();
        let retry_executor = RetryExecutor::new(policy);
        let timeout_duration = Duration::from_secs(spec.timeout.max(1));

        let attempts = Arc::new(AtomicU32::new(0));

        debug!(task = %task_name, timeout_secs = spec.timeout, "dispatching task");

        let outcome = retry_executor
            .execute(cancelled, {
                let function = function.clone();
                let params = params.clone();
                let attempts = attempts.clone();
                let task_name = task_name.clone();
                move || {
                    let function = function.clone();
                    let params = params.clone();
                    let attempts = attempts.clone();
                    let task_name = task_name.clone();
                    async move {
                        attempts.fetch_add(1, Ordering::SeqCst);
                        match tokio::time::timeout(timeout_duration, function.call(params)).await {
                            Ok(Ok(value)) => Ok(value),
                            Ok(Err(function_err)) => Err(OrchestratorError::TaskFailed {
                                task: task_name,
                                attempts: 0,
                                reason: function_err.to_string(),
                            }),
                            Err(_elapsed) => Err(OrchestratorError::Timeout {
                                task: task_name,
                                duration: timeout_duration,
                            }),
                        }
                    }
                }
            })
            .await;

        let end = Utc::now();
        let final_attempts = attempts.load(Ordering::SeqCst);

        match outcome {
            Ok(value) => TaskRecord {
                status: TaskState::Success,
                output: value,
                error: None,
                start: Some(start),
                end: Some(end),
                attempts: final_attempts,
            },
            Err(OrchestratorError::Cancelled) => TaskRecord {
                status: TaskState::Cancelled,
                output: serde_json::Value::Null,
                error: Some("task invocation was cancelled".to_string()),
                start: Some(start),
                end: Some(end),
                attempts: final_attempts,
            },
            Err(err @ OrchestratorError::Timeout { .. }) => TaskRecord {
                status: TaskState::Timeout,
                output: serde_json::Value::Null,
                error: Some(err.to_string()),
                start: Some(start),
                end: Some(end),
                attempts: final_attempts,
            },
            Err(err) => TaskRecord {
                status: TaskState::Failed,
                output: serde_json::Value::Null,
                error: Some(err.to_string()),
                start: Some(start),
                end: Some(end),
                attempts: final_attempts,
            },
        }
    }
}
