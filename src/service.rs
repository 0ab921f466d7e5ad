use tracing::Instrument;
use uuid::Uuid;

use crate::enforcement::policy::CommandPolicy;
use crate::enforcement::{Decision, evaluate};
use crate::error::TaskRunnerError;
use crate::storage::TaskStore;
use crate::tasks::Task;
use crate::tasks::executor::CommandExecutor;

/// Task operations. Every path that stores or runs a command goes through the
/// policy here; data read back from the store is checked again before it runs.
pub struct TaskService<S> {
    store: S,
    policy: CommandPolicy,
    executor: CommandExecutor,
}

impl<S: TaskStore> TaskService<S> {
    pub fn new(store: S, policy: CommandPolicy, executor: CommandExecutor) -> Self {
        Self {
            store,
            policy,
            executor,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn list(&self) -> Result<Vec<Task>, TaskRunnerError> {
        self.store.find_all().await
    }

    pub async fn get(&self, id: &str) -> Result<Option<Task>, TaskRunnerError> {
        self.store.find_by_id(id).await
    }

    /// A blank fragment matches every task.
    pub async fn search_by_name(&self, fragment: &str) -> Result<Vec<Task>, TaskRunnerError> {
        if fragment.trim().is_empty() {
            return self.list().await;
        }
        self.store.find_by_name_containing_ignore_case(fragment).await
    }

    /// Create or replace a task. Tasks without an id get a fresh UUID v7.
    ///
    /// Only the definition is written: execution history comes from the
    /// store (empty for a new task), never from the caller.
    pub async fn upsert(&self, mut task: Task) -> Result<Task, TaskRunnerError> {
        task.validate()?;
        if !self.policy.is_safe(task.command.as_deref()) {
            tracing::warn!(
                task_id = %task.id,
                owner = %task.owner,
                "rejected unsafe command on write"
            );
            return Err(TaskRunnerError::UnsafeCommand);
        }
        if task.id.trim().is_empty() {
            task.id = Uuid::now_v7().to_string();
        }
        self.store.save_definition(task).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), TaskRunnerError> {
        self.store.delete_by_id(id).await
    }

    /// Run the stored command and append the run to the task's history.
    ///
    /// A run that fails to spawn or read is still recorded; only a missing
    /// task or a stored command the policy now rejects is an error.
    pub async fn execute(&self, id: &str) -> Result<Task, TaskRunnerError> {
        let task = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| TaskRunnerError::TaskNotFound(id.to_owned()))?;

        let command = match evaluate(task.command.as_deref(), &self.policy) {
            Decision::Allow(command) => command,
            Decision::Reject => {
                tracing::warn!(
                    task_id = %id,
                    "stored command fails policy at execution time; refusing to run"
                );
                return Err(TaskRunnerError::UnsafeStoredCommand { id: id.to_owned() });
            }
        };

        let execution = self
            .executor
            .run(command)
            .instrument(tracing::info_span!("execute", task_id = %id))
            .await;

        self.store
            .append_execution(id, execution)
            .await?
            .ok_or_else(|| TaskRunnerError::TaskNotFound(id.to_owned()))
    }
}
