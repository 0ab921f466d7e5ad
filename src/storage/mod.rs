pub mod file;
pub mod memory;

use async_trait::async_trait;

use crate::error::TaskRunnerError;
use crate::tasks::{Task, TaskExecution};

pub use file::JsonFileTaskStore;
pub use memory::InMemoryTaskStore;

pub type StoreResult<T> = Result<T, TaskRunnerError>;

/// Document store holding whole `Task` documents keyed by id.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Task>>;

    /// Upsert. Overwrites the whole stored document.
    async fn save(&self, task: Task) -> StoreResult<Task>;

    /// Save a task's definition, keeping the history already stored under its
    /// id. Incoming `task_executions` are discarded; a new id starts empty.
    ///
    /// The default is read-then-write. Stores that can do it under one lock
    /// should override it.
    async fn save_definition(&self, mut task: Task) -> StoreResult<Task> {
        task.task_executions = match self.find_by_id(&task.id).await? {
            Some(existing) => existing.task_executions,
            None => Vec::new(),
        };
        self.save(task).await
    }

    /// Deleting an unknown id is not an error.
    async fn delete_by_id(&self, id: &str) -> StoreResult<()>;

    async fn find_all(&self) -> StoreResult<Vec<Task>>;

    async fn find_by_name_containing_ignore_case(&self, fragment: &str)
    -> StoreResult<Vec<Task>>;

    /// Append one execution to a task's history in a single step, so that
    /// concurrent runs of the same task cannot overwrite each other's records.
    /// Returns `None` if the task no longer exists.
    async fn append_execution(
        &self,
        id: &str,
        execution: TaskExecution,
    ) -> StoreResult<Option<Task>>;
}

fn name_contains(task: &Task, needle_lower: &str) -> bool {
    task.name.to_lowercase().contains(needle_lower)
}
