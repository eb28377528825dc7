//! Graph resolver
//!
//! Expands a [`Composition`] into an [`ExecutionPlan`] by depth-first
//! traversal of the registry. Tasks are colored white (unvisited), gray
//! (on the current path) and black (resolved); reaching a gray task again
//! means the path closes a cycle, which is reported with the full path.
//!
//! Expansion rules:
//! - an action task becomes a single step;
//! - a composite task becomes its series/parallel body;
//! - a task with dependencies becomes `series(dep1, .., depN, body)`.

use std::collections::HashMap;

use crate::composition::Composition;
use crate::execution::plan::{ExecutionPlan, PlanNode, PlanStep};
use crate::registry::{Registry, TaskBody};
use crate::types::{ConveyorError, ConveyorResult};

enum Mark {
    /// Gray: on the current DFS path.
    Visiting,
    /// Black: fully resolved.
    Resolved(PlanNode),
}

struct Resolver<'a> {
    registry: &'a Registry,
    marks: HashMap<String, Mark>,
    path: Vec<String>,
}

impl<'a> Resolver<'a> {
    fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            marks: HashMap::new(),
            path: Vec::new(),
        }
    }

    fn resolve_composition(&mut self, composition: &Composition) -> ConveyorResult<PlanNode> {
        match composition {
            Composition::Task(name) => self.resolve_task(name),
            Composition::Series(children) => Ok(PlanNode::Series(
                children
                    .iter()
                    .map(|child| self.resolve_composition(child))
                    .collect::<ConveyorResult<_>>()?,
            )),
            Composition::Parallel(children) => Ok(PlanNode::Parallel(
                children
                    .iter()
                    .map(|child| self.resolve_composition(child))
                    .collect::<ConveyorResult<_>>()?,
            )),
        }
    }

    fn resolve_task(&mut self, name: &str) -> ConveyorResult<PlanNode> {
        match self.marks.get(name) {
            Some(Mark::Resolved(node)) => return Ok(node.clone()),
            Some(Mark::Visiting) => return Err(self.cycle_through(name)),
            None => {}
        }

        let task = self.registry.lookup(name)?;
        self.marks.insert(name.to_string(), Mark::Visiting);
        self.path.push(name.to_string());

        let mut nodes = Vec::with_capacity(task.dependencies.len() + 1);
        for dependency in &task.dependencies {
            nodes.push(self.resolve_task(dependency)?);
        }
        let body = match &task.body {
            TaskBody::Action(action) => PlanNode::Step(PlanStep {
                task: task.clone(),
                action: action.clone(),
            }),
            TaskBody::Composite(composition) => self.resolve_composition(composition)?,
        };

        let node = if nodes.is_empty() {
            body
        } else {
            nodes.push(body);
            PlanNode::Series(nodes)
        };

        self.path.pop();
        self.marks
            .insert(name.to_string(), Mark::Resolved(node.clone()));
        Ok(node)
    }

    fn cycle_through(&self, name: &str) -> ConveyorError {
        let start = self.path.iter().position(|entry| entry == name).unwrap_or(0);
        let mut cycle: Vec<String> = self.path[start..].to_vec();
        cycle.push(name.to_string());
        ConveyorError::CycleDetected { cycle }
    }
}

/// Resolve a composition against `registry`.
///
/// Fails with [`ConveyorError::NotFound`] for unknown task names and
/// [`ConveyorError::CycleDetected`] for cycles. Never runs anything.
pub fn resolve(registry: &Registry, composition: &Composition) -> ConveyorResult<ExecutionPlan> {
    let root = Resolver::new(registry).resolve_composition(composition)?;
    Ok(ExecutionPlan::new(composition.to_string(), root))
}

/// Resolve a single task by name.
pub fn resolve_task(registry: &Registry, name: &str) -> ConveyorResult<ExecutionPlan> {
    resolve(registry, &Composition::task(name))
}
