pub mod executor;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TaskRunnerError;

/// Prefix marking an execution record whose output is a diagnostic, not
/// something the command printed.
pub const ERROR_PREFIX: &str = "ERROR: ";

/// A named shell command owned by someone, plus the history of its runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Empty until the service assigns one.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub command: Option<String>,
    /// Insertion order is execution order.
    #[serde(default)]
    pub task_executions: Vec<TaskExecution>,
}

impl Task {
    pub fn new(name: &str, owner: &str, command: &str) -> Self {
        Self {
            id: String::new(),
            name: name.to_owned(),
            owner: owner.to_owned(),
            command: Some(command.to_owned()),
            task_executions: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_owned();
        self
    }

    /// Field checks that do not involve the command policy.
    pub fn validate(&self) -> Result<(), TaskRunnerError> {
        if self.name.trim().is_empty() {
            return Err(TaskRunnerError::InvalidTask("name must not be blank".to_owned()));
        }
        if self.owner.trim().is_empty() {
            return Err(TaskRunnerError::InvalidTask("owner must not be blank".to_owned()));
        }
        Ok(())
    }
}

/// Immutable record of a single run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskExecution {
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    output: String,
}

impl TaskExecution {
    /// `end` is clamped so a record never ends before it starts, even if the
    /// wall clock stepped backwards during the run.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, output: String) -> Self {
        Self {
            start_time: start,
            end_time: end.max(start),
            output,
        }
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    /// Whether the output is a diagnostic produced by a failed run.
    pub fn is_failure(&self) -> bool {
        self.output.starts_with(ERROR_PREFIX)
    }
}
