//! Result types for pipeline operations
//!
//! This module contains all result types returned by pipeline manager operations,
//! providing a centralized location for output structures.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use colored::Color;

use crate::registry::{Task, TaskEdge};

/// Information about a registered task
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub name: String,
    pub description: Option<String>,
    /// `clean`, `copy`, `command`, `serve`, `series` or `parallel`
    pub kind: String,
    pub dependencies: Vec<String>,
    pub sources: Vec<String>,
    pub dest: Option<PathBuf>,
    pub reload: bool,
    /// Watch patterns that re-trigger this task
    pub watched_by: Vec<String>,
}

/// Result of listing tasks in the pipeline
#[derive(Debug)]
pub struct TaskListResult {
    pub pipeline_name: Option<String>,
    pub default_task: String,
    pub tasks: Vec<TaskInfo>,
    pub task_colors: HashMap<String, Color>,
}

/// Result of getting the dependency graph
#[derive(Debug)]
pub struct DependencyGraphResult {
    pub graph: petgraph::Graph<String, TaskEdge>,
    pub cycles: Vec<Vec<String>>,
}

/// Outcome of one successful executor run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub target: String,
    /// Task names in completion order; a task appears once per step it ran.
    pub completed: Vec<String>,
    pub elapsed: Duration,
}

impl From<&Task> for TaskInfo {
    fn from(task: &Task) -> Self {
        Self {
            name: task.name.clone(),
            description: task.description.clone(),
            kind: task.body.kind().to_string(),
            dependencies: task.dependencies.clone(),
            sources: task.sources.clone(),
            dest: task.dest.clone(),
            reload: task.reload,
            watched_by: Vec::new(), // Populated by caller from the watch rules
        }
    }
}
