//! High-level pipeline management interface
//!
//! This module provides the [`PipelineManager`] which serves as the primary interface
//! for all pipeline operations. It encapsulates configuration loading, task
//! registration, planning, execution and watching.
//!
//! The PipelineManager abstracts away the complexity of:
//! - Loading and merging configuration files
//! - Building the task registry in declaration order
//! - Resolving and running execution plans
//! - Wiring watch rules and live-reload notifications
//!
//! ## Example
//!
//! ```rust,no_run
//! use conveyor_core::pipeline_manager::{PipelineManager, PipelineManagerConfig};
//! use std::path::PathBuf;
//!
//! # async fn example() -> conveyor_core::types::ConveyorResult<()> {
//! let manager = PipelineManager::new(PipelineManagerConfig {
//!     pipeline_root: PathBuf::from("."),
//! })?;
//!
//! // List all tasks
//! let tasks = manager.list_tasks();
//!
//! // Get execution plan for a task
//! let plan = manager.get_execution_plan(Some("build:html"))?;
//!
//! // Run the default task
//! manager.run_task(None).await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use colored::*;
use tokio_util::sync::CancellationToken;

use crate::configs::{
    pipeline::{parse_pipeline_config, PipelineConfig},
    tasks::{parse_tasks_config, to_registry, TasksFileConfig},
};
use crate::execution::{resolve_task, ExecutionPlan, Executor};
use crate::registry::Registry;
use crate::reload::{CompletionListener, HttpReloadNotifier};
use crate::results::{DependencyGraphResult, RunSummary, TaskInfo, TaskListResult};
use crate::tasks::{format_elapsed, get_task_color};
use crate::types::{ConveyorError, ConveyorResult};
use crate::watcher::Watcher;

/// Directory below the pipeline root holding configuration.
pub const CONFIG_DIR: &str = ".conveyor";

/// High-level pipeline manager that encapsulates all pipeline operations
pub struct PipelineManager {
    pub root: PathBuf,
    pub config: PipelineConfig,
    registry: Registry,
    watcher: Watcher,
    listener: Option<Arc<dyn CompletionListener>>,
    cancel: CancellationToken,
}

/// Configuration for initializing a pipeline manager
pub struct PipelineManagerConfig {
    pub pipeline_root: PathBuf,
}

impl PipelineManager {
    /// Load `.conveyor/pipeline.yml` and `.conveyor/tasks/*.yml` below the given root
    pub fn new(config: PipelineManagerConfig) -> ConveyorResult<Self> {
        let root = std::fs::canonicalize(&config.pipeline_root).map_err(|e| {
            ConveyorError::Config(format!(
                "Pipeline root {} is not accessible: {}",
                config.pipeline_root.display(),
                e
            ))
        })?;

        let pipeline_config = Self::load_pipeline_config(&root)?;
        let fragments = Self::load_task_fragments(&root)?;

        Self::from_config(root, pipeline_config, fragments)
    }

    /// Build a manager from already parsed configuration.
    pub fn from_config(
        root: PathBuf,
        config: PipelineConfig,
        fragments: Vec<TasksFileConfig>,
    ) -> ConveyorResult<Self> {
        let registry = to_registry(&config.all_tasks(&fragments))?;

        let mut watcher = Watcher::new(root.clone(), config.debounce());
        for rule in config.watch.iter().flatten() {
            if !registry.contains(&rule.task) {
                return Err(ConveyorError::Config(format!(
                    "Watch rule for {:?} refers to unknown task '{}'",
                    rule.patterns, rule.task
                )));
            }
            watcher.watch(rule.patterns.iter().cloned(), rule.task.clone())?;
        }

        let listener = config.reload.as_ref().map(|reload| {
            Arc::new(HttpReloadNotifier::new(reload.url.clone())) as Arc<dyn CompletionListener>
        });

        tracing::debug!(
            root = %root.display(),
            tasks = registry.len(),
            watch_rules = watcher.rules().len(),
            "pipeline loaded"
        );

        Ok(Self {
            root,
            config,
            registry,
            watcher,
            listener,
            cancel: CancellationToken::new(),
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn watcher(&self) -> &Watcher {
        &self.watcher
    }

    /// Token that stops runs and watching; cancel it on Ctrl-C.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// List all tasks in registration order
    pub fn list_tasks(&self) -> TaskListResult {
        let tasks = self
            .registry
            .tasks()
            .map(|task| {
                let mut info = TaskInfo::from(task.as_ref());
                info.watched_by = self
                    .watcher
                    .rules()
                    .iter()
                    .filter(|rule| rule.task == task.name)
                    .flat_map(|rule| rule.patterns.iter().cloned())
                    .collect();
                info
            })
            .collect();

        TaskListResult {
            pipeline_name: self.config.name.clone(),
            default_task: self.config.default_task_name().to_string(),
            tasks,
            task_colors: self.get_task_colors(),
        }
    }

    /// Get execution plan for a task, or for the default task
    pub fn get_execution_plan(&self, target: Option<&str>) -> ConveyorResult<ExecutionPlan> {
        let target = target.unwrap_or_else(|| self.config.default_task_name());
        resolve_task(&self.registry, target)
    }

    /// Resolve and run a task, or the default task
    pub async fn run_task(&self, target: Option<&str>) -> ConveyorResult<RunSummary> {
        let plan = self.get_execution_plan(target)?;
        let summary = self.executor().run(&plan).await?;

        println!(
            "{} {} {}",
            "Completed".green().bold(),
            format!("'{}'", summary.target).color(get_task_color(&summary.target)).bold(),
            format!("({} steps in {})", summary.completed.len(), format_elapsed(summary.elapsed))
                .bright_black()
        );
        Ok(summary)
    }

    /// Whether running `target` leaves a dev server behind that should be
    /// kept alive until the user interrupts.
    pub fn keeps_serving(&self, target: Option<&str>) -> ConveyorResult<bool> {
        Ok(self.get_execution_plan(target)?.starts_server())
    }

    /// Resolves once the pipeline has been cancelled, e.g. by Ctrl-C.
    pub async fn wait_for_shutdown(&self) {
        self.cancel.cancelled().await;
    }

    /// Watch the filesystem and re-run bound tasks until cancelled
    pub async fn watch(&self) -> ConveyorResult<()> {
        if self.watcher.rules().is_empty() {
            return Err(ConveyorError::Config(
                "No watch rules configured".to_string(),
            ));
        }

        let (_fs_watcher, events) = self.watcher.start_fs_events()?;
        for rule in self.watcher.rules() {
            println!(
                "{} {} {}",
                "Watching".bright_black(),
                rule.patterns.join(", ").cyan(),
                format!("-> '{}'", rule.task).color(get_task_color(&rule.task))
            );
        }

        self.watcher
            .run(
                events,
                |task| async move { self.run_task(Some(task.as_str())).await.map(|_| ()) },
                self.cancel.clone(),
            )
            .await;
        Ok(())
    }

    /// Get dependency graph information
    pub fn get_dependency_graph(&self) -> DependencyGraphResult {
        DependencyGraphResult {
            graph: self.registry.dependency_graph(),
            cycles: self.registry.cycles(),
        }
    }

    // Private helper methods

    fn executor(&self) -> Executor {
        let executor = Executor::new(self.root.clone()).with_cancellation(self.cancel.clone());
        match &self.listener {
            Some(listener) => executor.with_listener(Arc::clone(listener)),
            None => executor,
        }
    }

    fn load_pipeline_config(root: &Path) -> ConveyorResult<PipelineConfig> {
        let pipeline_config_path = root.join(CONFIG_DIR).join("pipeline.yml");
        let content = std::fs::read_to_string(&pipeline_config_path).map_err(|e| {
            ConveyorError::Config(format!(
                "Failed to read pipeline config {}: {}",
                pipeline_config_path.display(),
                e
            ))
        })?;

        parse_pipeline_config(&content).map_err(|e| {
            ConveyorError::Config(format!(
                "Failed to parse pipeline config {}: {}",
                pipeline_config_path.display(),
                e
            ))
        })
    }

    fn load_task_fragments(root: &Path) -> ConveyorResult<Vec<TasksFileConfig>> {
        let tasks_dir = root.join(CONFIG_DIR).join("tasks");
        if !tasks_dir.exists() {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&tasks_dir).map_err(|e| {
            ConveyorError::Config(format!("Failed to read tasks directory {}: {}", tasks_dir.display(), e))
        })? {
            let path = entry?.path();
            if matches!(path.extension().and_then(|s| s.to_str()), Some("yml" | "yaml")) {
                paths.push(path);
            }
        }
        paths.sort();

        paths
            .iter()
            .map(|path| {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    ConveyorError::Config(format!("Failed to read task config {}: {}", path.display(), e))
                })?;
                parse_tasks_config(&content).map_err(|e| {
                    ConveyorError::Config(format!("Failed to parse task config {}: {}", path.display(), e))
                })
            })
            .collect()
    }

    fn get_task_colors(&self) -> HashMap<String, Color> {
        self.registry
            .names()
            .map(|name| (name.to_string(), get_task_color(name)))
            .collect()
    }
}
