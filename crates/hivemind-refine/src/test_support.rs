//! Scripted [`TaskExecutor`] used by the reflection and voting tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use hivemind_core::{SwarmError, SwarmResult, Task, TaskExecutor, TaskResult};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Returns scripted responses; `None` entries become failed results.
pub(crate) struct ScriptedExecutor {
    one: Mutex<Vec<Option<String>>>,
    many: Mutex<Vec<Vec<Option<String>>>>,
    one_calls: AtomicU32,
    last_many: Mutex<Vec<Task>>,
}

impl ScriptedExecutor {
    pub(crate) fn with_one(responses: Vec<Option<String>>) -> Self {
        Self {
            one: Mutex::new(responses),
            many: Mutex::new(Vec::new()),
            one_calls: AtomicU32::new(0),
            last_many: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_many(batches: Vec<Vec<Option<String>>>) -> Self {
        Self {
            one: Mutex::new(Vec::new()),
            many: Mutex::new(batches),
            one_calls: AtomicU32::new(0),
            last_many: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn and_one(self, responses: Vec<Option<String>>) -> Self {
        *self.one.lock().unwrap() = responses;
        self
    }

    pub(crate) fn one_calls(&self) -> u32 {
        self.one_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_many_size(&self) -> usize {
        self.last_many.lock().unwrap().len()
    }

    pub(crate) fn last_many_tasks(&self) -> Vec<Task> {
        self.last_many.lock().unwrap().clone()
    }

    fn result_for(task: &Task, response: Option<String>) -> TaskResult {
        TaskResult {
            task_id: task.id,
            node_id: uuid::Uuid::new_v4(),
            success: response.is_some(),
            value: response,
            error: None,
            error_kind: None,
            duration_ms: 1,
            cached: false,
            retry_count: 0,
            quality_rejected: false,
        }
    }
}

#[async_trait]
impl TaskExecutor for ScriptedExecutor {
    async fn execute_one(&self, task: Task) -> SwarmResult<TaskResult> {
        self.one_calls.fetch_add(1, Ordering::SeqCst);
        let mut one = self.one.lock().unwrap();
        if one.is_empty() {
            return Err(SwarmError::Provider("script exhausted".to_string()));
        }
        let response = one.remove(0);
        Ok(Self::result_for(&task, response))
    }

    async fn execute_many(&self, tasks: Vec<Task>) -> SwarmResult<Vec<TaskResult>> {
        let mut many = self.many.lock().unwrap();
        if many.is_empty() {
            return Err(SwarmError::Provider("script exhausted".to_string()));
        }
        let batch = many.remove(0);
        let results = tasks
            .iter()
            .enumerate()
            .map(|(i, task)| Self::result_for(task, batch.get(i).cloned().flatten()))
            .collect();
        *self.last_many.lock().unwrap() = tasks;
        Ok(results)
    }
}
