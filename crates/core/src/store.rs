//! In-memory store of submission lifecycle records.
//!
//! Each submitted query gets a `Task` keyed by id. A task transitions exactly
//! once from pending to a terminal state; late transition attempts are
//! ignored so a slow worker cannot clobber an already-settled record.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, warn};

use sqlyard_common::models::{Task, TaskStatus};
use sqlyard_error::{Error, ErrorCode, Result};

#[derive(Default)]
pub struct ResultStore {
    tasks: Mutex<HashMap<String, Task>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tasks(&self) -> MutexGuard<'_, HashMap<String, Task>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a fresh pending task under `id`.
    pub fn insert_pending(&self, id: &str) {
        self.tasks().insert(id.to_string(), Task::pending(id));
    }

    /// Snapshot of the task for `id`.
    pub fn get(&self, id: &str) -> Result<Task> {
        self.tasks().get(id).cloned().ok_or_else(|| {
            Error::not_found(
                ErrorCode::SubmissionNotFound,
                format!("Submission '{id}' not found"),
            )
            .with_hint("Results are removed after the retention window; re-submit the query")
        })
    }

    /// Settle `id` as completed. No-op if the task is already terminal or
    /// was reclaimed.
    pub fn complete(
        &self,
        id: &str,
        result: serde_json::Value,
        cached: bool,
        execution_time: f64,
    ) {
        let mut tasks = self.tasks();
        match tasks.get_mut(id) {
            Some(task) if !task.status.is_terminal() => {
                task.status = TaskStatus::Completed;
                task.result = Some(result);
                task.cached = cached;
                task.execution_time = Some(execution_time);
            }
            Some(_) => warn!(id, "Ignoring completion for already-settled task"),
            None => debug!(id, "Ignoring completion for reclaimed task"),
        }
    }

    /// Settle `id` as failed. Same single-transition rule as `complete`.
    pub fn fail(&self, id: &str, error: &Error, execution_time: f64) {
        let mut tasks = self.tasks();
        match tasks.get_mut(id) {
            Some(task) if !task.status.is_terminal() => {
                task.status = TaskStatus::Error;
                task.error = Some(error.to_string());
                task.execution_time = Some(execution_time);
            }
            Some(_) => warn!(id, "Ignoring failure for already-settled task"),
            None => debug!(id, "Ignoring failure for reclaimed task"),
        }
    }

    /// Drop the record for `id`. Used by retention reclaim.
    pub fn remove(&self, id: &str) -> bool {
        self.tasks().remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.tasks().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
