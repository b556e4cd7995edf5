// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Task state machine, task records, and the results map (§3).

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// `PENDING -> READY -> RUNNING -> {SUCCESS, FAILED, TIMEOUT, CANCELLED}`.
///
/// The four capitalized variants are terminal and sticky: once reached, a
/// task record never transitions again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Pending,
    Ready,
    Running,
    Success,
    Failed,
    Timeout,
    Cancelled,
}

impl TaskState {
    /// Terminal states never transition further.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Success | TaskState::Failed | TaskState::Timeout | TaskState::Cancelled
        )
    }
}

/// Per-task bookkeeping: state, timestamps, attempt count, error, and (on
/// success) the returned value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub status: TaskState,
    #[serde(default)]
    pub output: Value,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attempts: u32,
}

impl TaskRecord {
    /// A record for the synthetic input node: immediately `SUCCESS`, output
    /// is `input.data` verbatim.
    pub fn for_input(data: Value) -> Self {
        let now = Utc::now();
        Self {
            status: TaskState::Success,
            output: data,
            error: None,
            start: Some(now),
            end: Some(now),
            attempts: 1,
        }
    }

    pub fn pending() -> Self {
        Self {
            status: TaskState::Pending,
            output: Value::Null,
            error: None,
            start: None,
            end: None,
            attempts: 0,
        }
    }

    /// The record re-expressed as a JSON object so the placeholder resolver
    /// can address any scalar field via `${name.field}`, not just `output`.
    pub fn as_value(&self) -> Value {
        serde_json::json!({
            "output": self.output,
            "status": self.status,
            "error": self.error,
            "start": self.start,
            "end": self.end,
            "attempts": self.attempts,
        })
    }

    /// The per-task summary shape returned in the final result envelope
    /// (§6): `{ state, attempts, start, end, error? }`.
    pub fn to_summary(&self) -> TaskSummary {
        TaskSummary {
            state: self.status,
            attempts: self.attempts,
            start: self.start,
            end: self.end,
            error: self.error.clone(),
        }
    }
}

/// Public, envelope-facing view of a [`TaskRecord`] (no raw output — callers
/// read that via the resolved `output` tree instead).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSummary {
    pub state: TaskState,
    pub attempts: u32,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The accumulator keyed by task name, shared (read many / write few) across
/// one run. Concurrent-safe: entries are only ever inserted by the
/// scheduler's completion handler (§5), so a `DashMap` needs no external
/// locking on top.
pub type ResultsMap = Arc<DashMap<String, TaskRecord>>;

/// Builds a fresh, empty results map.
pub fn new_results_map() -> ResultsMap {
    Arc::new(DashMap::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(TaskState::Success.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(TaskState::Timeout.is_terminal());
        assert!(TaskState::Cancelled.is_terminal());
        assert!(!TaskState::Pending.is_terminal());
        assert!(!TaskState::Ready.is_terminal());
        assert!(!TaskState::Running.is_terminal());
    }

    #[test]
    fn input_record_is_immediately_successful() {
        let record = TaskRecord::for_input(serde_json::json!({"x": 2}));
        assert_eq!(record.status, TaskState::Success);
        assert_eq!(record.output, serde_json::json!({"x": 2}));
    }
}
