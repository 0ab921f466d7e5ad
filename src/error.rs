use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskRunnerError {
    #[error("Unsupported or unsafe command. Only echo ... is allowed.")]
    UnsafeCommand,

    /// A stored command no longer passes the policy at execution time.
    #[error("Stored command is unsafe. Only echo ... is allowed.")]
    UnsafeStoredCommand { id: String },

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("invalid task: {0}")]
    InvalidTask(String),

    /// Malformed interactive input.
    #[error("{0}")]
    Usage(String),

    #[error("policy validation failed: {0}")]
    PolicyValidation(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("cannot render output: {0}")]
    Render(#[source] serde_json::Error),

    #[error("config load failed: {0}")]
    ConfigLoad(String),

    #[error("invalid config: {0}")]
    ConfigValidation(String),
}

impl TaskRunnerError {
    /// Errors caused by the caller's input rather than by the runtime.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnsafeCommand
                | Self::UnsafeStoredCommand { .. }
                | Self::TaskNotFound(_)
                | Self::InvalidTask(_)
                | Self::Usage(_)
        )
    }
}
