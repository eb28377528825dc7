use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::actions::{CleanAction, CommandAction, CopyAction, ServeAction};
use crate::composition::Composition;
use crate::execution::command::CommandLine;
use crate::registry::{Registry, Task, TaskBody};
use crate::types::{ConveyorError, ConveyorResult};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Command {
    /// Run through the shell.
    Single(String),
    /// Program followed by its arguments, run without a shell.
    Multiple(Vec<String>),
}

impl Command {
    pub fn to_command_line(&self) -> ConveyorResult<CommandLine> {
        match self {
            Command::Single(cmd) => Ok(CommandLine::Shell(cmd.clone())),
            Command::Multiple(parts) => match parts.split_first() {
                Some((program, args)) => Ok(CommandLine::program(program.clone(), args.to_vec())),
                None => Err(ConveyorError::Config("Command must not be empty".to_string())),
            },
        }
    }
}

/// The external work a task performs.
#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(tag = "type", rename_all = "camelCase", deny_unknown_fields)]
pub enum ActionConfig {
    /// Remove a path below the pipeline root.
    Clean { path: String },
    /// Copy the task's sources into its destination.
    Copy,
    /// Run an external tool over the task's sources.
    Command {
        command: Command,
        /// Run once per source file with `{source}` and `{output}` placeholders.
        #[serde(rename = "perFile", default)]
        per_file: bool,
        /// Extension for `{output}` paths, e.g. `css` for SCSS sources.
        extension: Option<String>,
    },
    /// Start a long-running server.
    Serve {
        command: Command,
        /// Output line marker that signals the server is ready.
        #[serde(rename = "readyPattern")]
        ready_pattern: Option<String>,
    },
}

impl ActionConfig {
    pub fn to_body(&self) -> ConveyorResult<TaskBody> {
        Ok(match self {
            ActionConfig::Clean { path } => TaskBody::action(CleanAction::new(path)),
            ActionConfig::Copy => TaskBody::action(CopyAction::new()),
            ActionConfig::Command {
                command,
                per_file,
                extension,
            } => {
                let mut action = CommandAction::new(command.to_command_line()?).per_file(*per_file);
                if let Some(extension) = extension {
                    action = action.with_extension(extension.trim_start_matches('.'));
                }
                TaskBody::action(action)
            }
            ActionConfig::Serve {
                command,
                ready_pattern,
            } => {
                let mut action = ServeAction::new(command.to_command_line()?);
                if let Some(pattern) = ready_pattern {
                    action = action.with_ready_pattern(pattern);
                }
                TaskBody::action(action)
            }
        })
    }
}

/// A step of a composite task: a task name or a nested group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum StepConfig {
    Task(String),
    Series { series: Vec<StepConfig> },
    Parallel { parallel: Vec<StepConfig> },
}

impl From<&StepConfig> for Composition {
    fn from(step: &StepConfig) -> Self {
        match step {
            StepConfig::Task(name) => Composition::task(name.clone()),
            StepConfig::Series { series } => Composition::series(series),
            StepConfig::Parallel { parallel } => Composition::parallel(parallel),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TaskConfig {
    pub name: String,
    pub description: Option<String>,
    /// Tasks that run, in order, before this one.
    pub dependencies: Option<Vec<String>>,
    /// Glob patterns relative to the pipeline root; `!` excludes.
    pub sources: Option<Vec<String>>,
    /// Destination directory relative to the pipeline root.
    pub dest: Option<String>,
    /// Notify the live-reload server when this task completes.
    pub reload: Option<bool>,
    pub action: Option<ActionConfig>,
    /// Run these steps one after another.
    pub series: Option<Vec<StepConfig>>,
    /// Run these steps together.
    pub parallel: Option<Vec<StepConfig>>,
}

impl TaskConfig {
    /// Build the task this entry describes.
    ///
    /// A task has at most one of `action`, `series` and `parallel`; with none
    /// it only groups its dependencies.
    pub fn to_task(&self) -> ConveyorResult<Task> {
        let body = match (&self.action, &self.series, &self.parallel) {
            (Some(action), None, None) => action.to_body()?,
            (None, Some(series), None) => Composition::series(series).into(),
            (None, None, Some(parallel)) => Composition::parallel(parallel).into(),
            (None, None, None) => TaskBody::noop(),
            _ => {
                return Err(ConveyorError::Config(format!(
                    "Task '{}' must define only one of action, series or parallel",
                    self.name
                )))
            }
        };

        let mut task = Task::new(self.name.clone(), body)
            .with_dependencies(self.dependencies.iter().flatten().cloned())
            .with_sources(self.sources.iter().flatten().cloned())
            .with_reload(self.reload.unwrap_or(false));
        if let Some(dest) = &self.dest {
            task = task.with_dest(PathBuf::from(dest));
        }
        if let Some(description) = &self.description {
            task = task.with_description(description.clone());
        }
        Ok(task)
    }
}

/// A `.conveyor/tasks/*.yml` fragment.
#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TasksFileConfig {
    pub description: Option<String>,
    pub tasks: Vec<TaskConfig>,
}

pub fn parse_tasks_config(yaml_str: &str) -> ConveyorResult<TasksFileConfig> {
    let config: TasksFileConfig = serde_yaml::from_str(yaml_str)?;
    Ok(config)
}

/// Register `tasks` in declaration order.
///
/// Dependencies and composite members must refer to tasks declared earlier.
pub fn to_registry(tasks: &[TaskConfig]) -> ConveyorResult<Registry> {
    let mut registry = Registry::new();
    for config in tasks {
        registry.insert(config.to_task()?)?;
    }
    Ok(registry)
}
