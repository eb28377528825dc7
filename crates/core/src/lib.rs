//! Conveyor Core Library
//!
//! This is the core library for the Conveyor asset pipeline runner. It wires
//! source globs to destination directories and sequences or parallelizes calls
//! to external tools; it never transforms file contents itself.
//!
//! ## Architecture
//!
//! The core library is organized into several modules:
//!
//! - [`pipeline_manager`] - High-level pipeline management interface
//! - [`registry`] - Named tasks, registered in declaration order
//! - [`composition`] - Series/parallel task trees
//! - [`execution`] - Plan resolution with cycle detection, and the executor
//! - [`watcher`] - Debounced re-runs on file changes
//! - [`actions`] - Built-in clean/copy/command/serve actions
//! - [`sources`] - Glob resolution for task sources
//! - [`reload`] - Live-reload notifications
//! - [`configs`] - Configuration parsing for pipelines and task fragments
//! - [`tasks`] - Task output helpers and color management
//! - [`results`] - Result types for pipeline operations
//! - [`types`] - Common error types and type aliases
//!
//! ## Usage
//!
//! Pipelines can be assembled in code:
//!
//! ```rust,no_run
//! use conveyor_core::actions::{CleanAction, CopyAction};
//! use conveyor_core::composition::Composition;
//! use conveyor_core::execution::{resolve, Executor};
//! use conveyor_core::registry::{Registry, Task, TaskBody};
//!
//! # async fn example() -> conveyor_core::types::ConveyorResult<()> {
//! let mut registry = Registry::new();
//! registry.insert(Task::new("clean", TaskBody::action(CleanAction::new("build"))))?;
//! registry.insert(
//!     Task::new("mv:img", TaskBody::action(CopyAction::new()))
//!         .with_sources(["src/img/**/*.{png,svg}"])
//!         .with_dest("build/img"),
//! )?;
//!
//! let plan = resolve(&registry, &Composition::series(["clean", "mv:img"]))?;
//! Executor::new(".").run(&plan).await?;
//! # Ok(())
//! # }
//! ```
//!
//! or loaded from `.conveyor/pipeline.yml` through the
//! [`PipelineManager`].

pub mod actions;
pub mod composition;
pub mod configs;
pub mod execution;
pub mod pipeline_manager;
pub mod registry;
pub mod reload;
pub mod results;
pub mod sources;
pub mod tasks;
pub mod types;
pub mod watcher;

// Re-export the main types for easier usage
pub use types::{ConveyorError, ConveyorResult};
pub use pipeline_manager::{PipelineManager, PipelineManagerConfig};
