//! Task execution module
//!
//! This module turns compositions into execution plans and runs them,
//! including process execution for actions that shell out to external tools.

pub mod command;
pub mod plan;
pub mod resolver;
pub mod runner;

pub use command::CommandExecutor;
pub use plan::{ExecutionPlan, PlanNode, PlanStep};
pub use resolver::{resolve, resolve_task};
pub use runner::Executor;
