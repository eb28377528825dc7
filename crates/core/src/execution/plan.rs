//! Resolved execution plans
//!
//! An [`ExecutionPlan`] is the immutable, ready-to-run form of a
//! composition: every task reference has been looked up, dependencies have
//! been expanded and composite tasks have been inlined.

use std::fmt;
use std::sync::Arc;

use conveyor_action_protocol::Action;

use crate::registry::Task;

/// A single action to run, together with the task that owns it.
#[derive(Clone)]
pub struct PlanStep {
    pub task: Arc<Task>,
    pub action: Arc<dyn Action>,
}

impl PlanStep {
    pub fn name(&self) -> &str {
        &self.task.name
    }
}

impl fmt::Debug for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanStep")
            .field("task", &self.task.name)
            .field("action", &self.action.kind())
            .finish()
    }
}

/// Node of a resolved plan.
#[derive(Debug, Clone)]
pub enum PlanNode {
    Step(PlanStep),
    /// Children run one after another; a failure skips the rest.
    Series(Vec<PlanNode>),
    /// Children start together and are joined at the end.
    Parallel(Vec<PlanNode>),
}

impl PlanNode {
    fn collect_steps<'a>(&'a self, steps: &mut Vec<&'a PlanStep>) {
        match self {
            Self::Step(step) => steps.push(step),
            Self::Series(children) | Self::Parallel(children) => {
                for child in children {
                    child.collect_steps(steps);
                }
            }
        }
    }

    fn render(&self, f: &mut fmt::Formatter<'_>, prefix: &str, last: bool) -> fmt::Result {
        let connector = if last { "└─ " } else { "├─ " };
        let children = match self {
            Self::Step(step) => {
                return writeln!(f, "{}{}{} ({})", prefix, connector, step.name(), step.action.kind());
            }
            Self::Series(children) => {
                writeln!(f, "{}{}series", prefix, connector)?;
                children
            }
            Self::Parallel(children) => {
                writeln!(f, "{}{}parallel", prefix, connector)?;
                children
            }
        };
        let child_prefix = format!("{}{}", prefix, if last { "   " } else { "│  " });
        for (i, child) in children.iter().enumerate() {
            child.render(f, &child_prefix, i + 1 == children.len())?;
        }
        Ok(())
    }
}

/// An immutable, resolved plan for one invocation.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    target: String,
    root: PlanNode,
}

impl ExecutionPlan {
    pub(crate) fn new(target: impl Into<String>, root: PlanNode) -> Self {
        Self {
            target: target.into(),
            root,
        }
    }

    /// What was resolved, e.g. `default` or `series(clean, mv:js)`.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn root(&self) -> &PlanNode {
        &self.root
    }

    /// All steps in declaration order.
    pub fn steps(&self) -> Vec<&PlanStep> {
        let mut steps = Vec::new();
        self.root.collect_steps(&mut steps);
        steps
    }

    /// Task names of all steps in declaration order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps().into_iter().map(PlanStep::name).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.steps().is_empty()
    }

    /// Whether any step starts a long-running server that outlives the run.
    pub fn starts_server(&self) -> bool {
        self.steps().iter().any(|step| step.action.kind() == "serve")
    }
}

impl fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.target)?;
        self.root.render(f, "", true)
    }
}
