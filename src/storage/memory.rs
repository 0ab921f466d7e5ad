use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{StoreResult, TaskStore, name_contains};
use crate::tasks::{Task, TaskExecution};

/// Process-local store. Iteration order is id order.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<BTreeMap<String, Task>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Task>> {
        Ok(self.tasks.read().await.get(id).cloned())
    }

    async fn save(&self, task: Task) -> StoreResult<Task> {
        tracing::debug!(task_id = %task.id, "saving task");
        self.tasks
            .write()
            .await
            .insert(task.id.clone(), task.clone());
        Ok(task)
    }

    async fn save_definition(&self, mut task: Task) -> StoreResult<Task> {
        tracing::debug!(task_id = %task.id, "saving task definition");
        let mut tasks = self.tasks.write().await;
        task.task_executions = tasks
            .remove(&task.id)
            .map(|existing| existing.task_executions)
            .unwrap_or_default();
        tasks.insert(task.id.clone(), task.clone());
        Ok(task)
    }

    async fn delete_by_id(&self, id: &str) -> StoreResult<()> {
        self.tasks.write().await.remove(id);
        Ok(())
    }

    async fn find_all(&self) -> StoreResult<Vec<Task>> {
        Ok(self.tasks.read().await.values().cloned().collect())
    }

    async fn find_by_name_containing_ignore_case(
        &self,
        fragment: &str,
    ) -> StoreResult<Vec<Task>> {
        let needle = fragment.to_lowercase();
        Ok(self
            .tasks
            .read()
            .await
            .values()
            .filter(|task| name_contains(task, &needle))
            .cloned()
            .collect())
    }

    async fn append_execution(
        &self,
        id: &str,
        execution: TaskExecution,
    ) -> StoreResult<Option<Task>> {
        let mut tasks = self.tasks.write().await;
        Ok(tasks.get_mut(id).map(|task| {
            task.task_executions.push(execution);
            task.clone()
        }))
    }
}
