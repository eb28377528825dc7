use thiserror::Error;

/// Boxed cause of a failed action.
pub type ActionCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type for Conveyor operations
#[derive(Debug, Error)]
pub enum ConveyorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Task '{0}' is already registered")]
    DuplicateTask(String),

    #[error("Task '{task}' depends on '{dependency}', which is not registered yet")]
    UnknownDependency { task: String, dependency: String },

    #[error("Task '{0}' not found")]
    NotFound(String),

    #[error("Circular dependency detected: {}", .cycle.join(" -> "))]
    CycleDetected { cycle: Vec<String> },

    #[error("Task '{task}' failed: {cause}")]
    ActionFailure { task: String, cause: ActionCause },

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Interrupted before the run completed")]
    Interrupted,
}

impl ConveyorError {
    /// Wrap the cause an action reported.
    pub fn action_failure(task: impl Into<String>, cause: impl Into<ActionCause>) -> Self {
        Self::ActionFailure {
            task: task.into(),
            cause: cause.into(),
        }
    }

    /// Name of the task that failed at run time, if this is a run-time failure.
    pub fn failed_task(&self) -> Option<&str> {
        match self {
            Self::ActionFailure { task, .. } => Some(task),
            _ => None,
        }
    }

    /// Whether this error was raised while building a plan, before any action ran.
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateTask(_)
                | Self::UnknownDependency { .. }
                | Self::NotFound(_)
                | Self::CycleDetected { .. }
        )
    }
}

/// Result type alias for Conveyor operations
pub type ConveyorResult<T> = Result<T, ConveyorError>;
