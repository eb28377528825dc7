//! Task registry
//!
//! The [`Registry`] owns every named task of a pipeline. It is an explicit
//! value passed to the resolver and executor, so tests and embedders can hold
//! as many independent registries as they like.
//!
//! Tasks must be declared before they are referenced: registering a task
//! whose dependency (or composite member) is not registered yet fails with
//! [`ConveyorError::UnknownDependency`].

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use conveyor_action_protocol::Action;
use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::composition::Composition;
use crate::types::{ConveyorError, ConveyorResult};

/// What a task does when it runs.
#[derive(Clone)]
pub enum TaskBody {
    /// Run an external action.
    Action(Arc<dyn Action>),
    /// Run other tasks in series/parallel, like a `default` or `dev` task.
    Composite(Composition),
}

impl TaskBody {
    pub fn action<A: Action + 'static>(action: A) -> Self {
        Self::Action(Arc::new(action))
    }

    /// A body that does nothing; useful for tasks that only group dependencies.
    pub fn noop() -> Self {
        Self::Composite(Composition::Series(Vec::new()))
    }

    /// Short label for listings.
    pub fn kind(&self) -> &str {
        match self {
            Self::Action(action) => action.kind(),
            Self::Composite(Composition::Parallel(_)) => "parallel",
            Self::Composite(_) => "series",
        }
    }
}

impl fmt::Debug for TaskBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Action(action) => f.debug_tuple("Action").field(&action.kind()).finish(),
            Self::Composite(composition) => f.debug_tuple("Composite").field(composition).finish(),
        }
    }
}

impl From<Composition> for TaskBody {
    fn from(composition: Composition) -> Self {
        Self::Composite(composition)
    }
}

impl From<Arc<dyn Action>> for TaskBody {
    fn from(action: Arc<dyn Action>) -> Self {
        Self::Action(action)
    }
}

/// A named unit of work.
#[derive(Debug, Clone)]
pub struct Task {
    pub name: String,
    pub description: Option<String>,
    pub body: TaskBody,
    /// Tasks that run, in order, before this one.
    pub dependencies: Vec<String>,
    /// Glob patterns resolved against the pipeline root before each run.
    pub sources: Vec<String>,
    /// Destination directory relative to the pipeline root.
    pub dest: Option<PathBuf>,
    /// Notify the live-reload collaborator when this task completes.
    pub reload: bool,
}

impl Task {
    pub fn new(name: impl Into<String>, body: impl Into<TaskBody>) -> Self {
        Self {
            name: name.into(),
            description: None,
            body: body.into(),
            dependencies: Vec::new(),
            sources: Vec::new(),
            dest: None,
            reload: false,
        }
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = sources.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_dest(mut self, dest: impl Into<PathBuf>) -> Self {
        self.dest = Some(dest.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_reload(mut self, reload: bool) -> Self {
        self.reload = reload;
        self
    }

    /// Names of composite members, in declaration order.
    pub fn members(&self) -> Vec<&str> {
        match &self.body {
            TaskBody::Composite(composition) => composition.task_names(),
            TaskBody::Action(_) => Vec::new(),
        }
    }
}

/// Kind of edge in the task graph returned by [`Registry::dependency_graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEdge {
    /// The task lists the target in its dependencies.
    Dependency,
    /// The target appears in the task's series/parallel body.
    Member,
}

/// Explicit, per-pipeline task registry.
#[derive(Debug, Default)]
pub struct Registry {
    tasks: HashMap<String, Arc<Task>>,
    order: Vec<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task from its parts.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        body: impl Into<TaskBody>,
        dependencies: Vec<String>,
    ) -> ConveyorResult<()> {
        self.insert(Task::new(name, body).with_dependencies(dependencies))
    }

    /// Register a fully described task.
    pub fn insert(&mut self, task: Task) -> ConveyorResult<()> {
        if self.tasks.contains_key(&task.name) {
            return Err(ConveyorError::DuplicateTask(task.name));
        }

        let unknown = task
            .dependencies
            .iter()
            .map(String::as_str)
            .chain(task.members())
            .find(|name| !self.tasks.contains_key(*name))
            .map(str::to_string);
        if let Some(dependency) = unknown {
            return Err(ConveyorError::UnknownDependency {
                task: task.name,
                dependency,
            });
        }

        tracing::debug!(task = %task.name, kind = task.body.kind(), "registered task");
        self.order.push(task.name.clone());
        self.tasks.insert(task.name.clone(), Arc::new(task));
        Ok(())
    }

    /// Append a dependency to an already registered task.
    ///
    /// Both tasks must exist. This is the only way two tasks can end up
    /// depending on each other; the resolver rejects such cycles.
    pub fn add_dependency(&mut self, task: &str, dependency: &str) -> ConveyorResult<()> {
        if !self.tasks.contains_key(dependency) {
            return Err(ConveyorError::UnknownDependency {
                task: task.to_string(),
                dependency: dependency.to_string(),
            });
        }
        let entry = self
            .tasks
            .get_mut(task)
            .ok_or_else(|| ConveyorError::NotFound(task.to_string()))?;
        Arc::make_mut(entry).dependencies.push(dependency.to_string());
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> ConveyorResult<Arc<Task>> {
        self.tasks
            .get(name)
            .cloned()
            .ok_or_else(|| ConveyorError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Task names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Tasks in registration order.
    pub fn tasks(&self) -> impl Iterator<Item = &Arc<Task>> {
        self.order.iter().filter_map(|name| self.tasks.get(name))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Build a graph of tasks with edges to their dependencies and composite members.
    pub fn dependency_graph(&self) -> DiGraph<String, TaskEdge> {
        let mut graph = DiGraph::new();
        let mut node_indices: HashMap<&str, NodeIndex> = HashMap::new();

        for name in self.names() {
            node_indices.insert(name, graph.add_node(name.to_string()));
        }

        for task in self.tasks() {
            let from = node_indices[task.name.as_str()];
            let edges = task
                .dependencies
                .iter()
                .map(|dep| (dep.as_str(), TaskEdge::Dependency))
                .chain(task.members().into_iter().map(|m| (m, TaskEdge::Member)));
            for (target, kind) in edges {
                if let Some(&to) = node_indices.get(target) {
                    graph.add_edge(from, to, kind);
                }
            }
        }

        graph
    }

    /// Groups of tasks that depend on each other, each sorted by name.
    ///
    /// Only [`Registry::add_dependency`] can introduce these; the resolver
    /// refuses to plan through them.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let graph = self.dependency_graph();
        let mut cycles: Vec<Vec<String>> = kosaraju_scc(&graph)
            .into_iter()
            .filter_map(|component| {
                if component.len() > 1 {
                    let mut cycle = component
                        .iter()
                        .map(|node| graph[*node].clone())
                        .collect::<Vec<_>>();
                    cycle.sort();
                    Some(cycle)
                } else {
                    let node = component[0];
                    graph
                        .contains_edge(node, node)
                        .then(|| vec![graph[node].clone()])
                }
            })
            .collect();
        cycles.sort();
        cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conveyor_action_protocol::{ActionContext, ActionReport, Completion};

    struct Noop;

    impl Action for Noop {
        fn kind(&self) -> &str {
            "noop"
        }

        fn start(&self, _context: ActionContext) -> Completion {
            Completion::Done(Ok(ActionReport::empty()))
        }
    }

    fn registry_with(names: &[&str]) -> Registry {
        let mut registry = Registry::new();
        for name in names {
            registry
                .register(*name, TaskBody::action(Noop), Vec::new())
                .unwrap();
        }
        registry
    }

    #[test]
    fn registers_and_looks_up_tasks() {
        let mut registry = registry_with(&["clean"]);
        registry
            .register("build:html", TaskBody::action(Noop), vec!["clean".to_string()])
            .unwrap();

        let task = registry.lookup("build:html").unwrap();
        assert_eq!(task.dependencies, vec!["clean".to_string()]);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["clean", "build:html"]);
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut registry = registry_with(&["clean"]);
        let err = registry
            .register("clean", TaskBody::action(Noop), Vec::new())
            .unwrap_err();
        assert!(matches!(err, ConveyorError::DuplicateTask(name) if name == "clean"));
    }

    #[test]
    fn forward_dependency_is_rejected() {
        let mut registry = Registry::new();
        let err = registry
            .register("build", TaskBody::action(Noop), vec!["clean".to_string()])
            .unwrap_err();
        match err {
            ConveyorError::UnknownDependency { task, dependency } => {
                assert_eq!(task, "build");
                assert_eq!(dependency, "clean");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(registry.is_empty(), "failed registration must not leave a task behind");
    }

    #[test]
    fn composite_members_must_exist() {
        let mut registry = registry_with(&["clean"]);
        let err = registry
            .register(
                "default",
                Composition::series(["clean", "mv:js"]),
                Vec::new(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            ConveyorError::UnknownDependency { dependency, .. } if dependency == "mv:js"
        ));
    }

    #[test]
    fn lookup_of_missing_task_fails() {
        let registry = Registry::new();
        assert!(matches!(
            registry.lookup("default"),
            Err(ConveyorError::NotFound(name)) if name == "default"
        ));
    }

    #[test]
    fn add_dependency_requires_both_tasks() {
        let mut registry = registry_with(&["a"]);
        assert!(matches!(
            registry.add_dependency("a", "b"),
            Err(ConveyorError::UnknownDependency { .. })
        ));
        assert!(matches!(
            registry.add_dependency("b", "a"),
            Err(ConveyorError::NotFound(_))
        ));

        let mut registry = registry_with(&["a", "b"]);
        registry.add_dependency("a", "b").unwrap();
        assert_eq!(registry.lookup("a").unwrap().dependencies, vec!["b".to_string()]);
    }

    #[test]
    fn dependency_graph_has_dependency_and_member_edges() {
        let mut registry = registry_with(&["clean", "mv:js"]);
        registry
            .register(
                "default",
                Composition::series(["mv:js"]),
                vec!["clean".to_string()],
            )
            .unwrap();

        let graph = registry.dependency_graph();
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        let kinds: Vec<_> = graph.edge_weights().copied().collect();
        assert!(kinds.contains(&TaskEdge::Dependency));
        assert!(kinds.contains(&TaskEdge::Member));
    }

    #[test]
    fn cycles_report_mutual_dependencies() {
        let mut registry = registry_with(&["a", "b", "c"]);
        assert!(registry.cycles().is_empty());

        registry.add_dependency("b", "a").unwrap();
        registry.add_dependency("a", "b").unwrap();
        registry.add_dependency("c", "c").unwrap();
        assert_eq!(
            registry.cycles(),
            vec![vec!["a".to_string(), "b".to_string()], vec!["c".to_string()]]
        );
    }
}
