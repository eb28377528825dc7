//! Plan executor
//!
//! This module runs resolved [`ExecutionPlan`]s. Series children run one
//! after another; parallel children are polled together and their blocking
//! work overlaps on tokio's blocking pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use conveyor_action_protocol::{ActionContext, CompletionMessage};
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::execution::plan::{ExecutionPlan, PlanNode, PlanStep};
use crate::reload::CompletionListener;
use crate::results::RunSummary;
use crate::sources::resolve_sources;
use crate::tasks::{print_errored, print_finished, print_starting};
use crate::types::{ConveyorError, ConveyorResult};

/// Runs execution plans against a pipeline root.
///
/// An executor holds no per-run state, so the same executor (and the same
/// plan) can be run any number of times.
pub struct Executor {
    root: PathBuf,
    listener: Option<Arc<dyn CompletionListener>>,
    cancel: CancellationToken,
}

impl Executor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            listener: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Notify `listener` whenever a reload-flagged task completes.
    pub fn with_listener(mut self, listener: Arc<dyn CompletionListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Stop starting new steps once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run `plan` to completion.
    ///
    /// A failing step aborts the rest of its series. Parallel siblings that
    /// already started are allowed to finish; the first failure observed is
    /// returned and later ones are logged.
    pub async fn run(&self, plan: &ExecutionPlan) -> ConveyorResult<RunSummary> {
        let started = Instant::now();
        let (completed_tx, mut completed_rx) = mpsc::unbounded_channel();

        tracing::info!(target_name = plan.target(), steps = plan.steps().len(), "running plan");
        let result = self.run_node(plan.root(), &completed_tx).await;
        drop(completed_tx);

        let mut completed = Vec::new();
        while let Ok(name) = completed_rx.try_recv() {
            completed.push(name);
        }

        result?;
        Ok(RunSummary {
            target: plan.target().to_string(),
            completed,
            elapsed: started.elapsed(),
        })
    }

    fn run_node<'a>(
        &'a self,
        node: &'a PlanNode,
        completed: &'a mpsc::UnboundedSender<String>,
    ) -> BoxFuture<'a, ConveyorResult<()>> {
        async move {
            match node {
                PlanNode::Step(step) => self.run_step(step, completed).await,
                PlanNode::Series(children) => {
                    for child in children {
                        self.run_node(child, completed).await?;
                    }
                    Ok(())
                }
                PlanNode::Parallel(children) => {
                    let mut branches: FuturesUnordered<_> = children
                        .iter()
                        .map(|child| self.run_node(child, completed))
                        .collect();

                    let mut first_error = None;
                    while let Some(result) = branches.next().await {
                        let Err(e) = result else { continue };
                        if first_error.is_none() {
                            first_error = Some(e);
                        } else {
                            tracing::warn!(error = %e, "additional failure in parallel group");
                        }
                    }

                    match first_error {
                        Some(e) => Err(e),
                        None => Ok(()),
                    }
                }
            }
        }
        .boxed()
    }

    async fn run_step(
        &self,
        step: &PlanStep,
        completed: &mpsc::UnboundedSender<String>,
    ) -> ConveyorResult<()> {
        if self.cancel.is_cancelled() {
            tracing::debug!(task = step.name(), "cancelled; not starting step");
            return Err(ConveyorError::Interrupted);
        }

        let task = &step.task;
        let sources = resolve_sources(&self.root, &task.sources)
            .map_err(|e| ConveyorError::action_failure(task.name.clone(), e))?;
        let mut context = ActionContext::new(task.name.clone(), self.root.clone()).with_sources(sources);
        if let Some(dest) = &task.dest {
            context = context.with_dest(self.root.join(dest));
        }

        print_starting(&task.name);
        tracing::debug!(task = %task.name, kind = step.action.kind(), sources = context.sources.len(), "starting step");
        let started = Instant::now();

        let action = Arc::clone(&step.action);
        let outcome = match tokio::task::spawn_blocking(move || action.start(context)).await {
            Ok(completion) => completion.wait().await,
            Err(e) => Err(anyhow::anyhow!("action panicked or was aborted: {}", e)),
        };
        let elapsed = started.elapsed();

        let report = match outcome {
            Ok(report) => report,
            Err(cause) => {
                print_errored(&task.name, elapsed, &cause);
                tracing::error!(task = %task.name, error = %cause, "step failed");
                return Err(ConveyorError::action_failure(task.name.clone(), cause));
            }
        };

        print_finished(&task.name, elapsed);
        let _ = completed.send(task.name.clone());

        if task.reload {
            if let Some(listener) = &self.listener {
                listener.task_completed(CompletionMessage::from_report(task.name.clone(), &report));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::Composition;
    use crate::execution::resolver::resolve;
    use crate::registry::{Registry, Task, TaskBody};
    use conveyor_action_protocol::{done_channel, Action, ActionReport, Completion};
    use std::sync::Mutex;
    use std::time::Duration;

    type Log = Arc<Mutex<Vec<String>>>;

    /// Records start/finish events; sleeps `millis` in between.
    struct Recorded {
        log: Log,
        millis: u64,
        fail: bool,
    }

    impl Action for Recorded {
        fn kind(&self) -> &str {
            "recorded"
        }

        fn start(&self, context: ActionContext) -> Completion {
            self.log.lock().unwrap().push(format!("start:{}", context.task));
            std::thread::sleep(Duration::from_millis(self.millis));
            self.log.lock().unwrap().push(format!("finish:{}", context.task));
            if self.fail {
                Completion::Done(Err(anyhow::anyhow!("{} exited with 1", context.task)))
            } else {
                Completion::Done(Ok(ActionReport::empty()))
            }
        }
    }

    /// Completes from a background thread after `millis`.
    struct Deferred {
        millis: u64,
    }

    impl Action for Deferred {
        fn kind(&self) -> &str {
            "deferred"
        }

        fn start(&self, context: ActionContext) -> Completion {
            let (handle, signal) = done_channel();
            let millis = self.millis;
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(millis));
                handle.complete(Ok(ActionReport::written(vec![context.root.join("build/index.html")])));
            });
            Completion::Deferred(signal)
        }
    }

    #[derive(Default)]
    struct RecordingListener {
        messages: Mutex<Vec<CompletionMessage>>,
    }

    impl CompletionListener for RecordingListener {
        fn task_completed(&self, message: CompletionMessage) {
            self.messages.lock().unwrap().push(message);
        }
    }

    fn recorded(log: &Log, millis: u64, fail: bool) -> TaskBody {
        TaskBody::action(Recorded {
            log: Arc::clone(log),
            millis,
            fail,
        })
    }

    fn position(log: &[String], entry: &str) -> usize {
        log.iter()
            .position(|e| e == entry)
            .unwrap_or_else(|| panic!("{entry} not in {log:?}"))
    }

    #[tokio::test]
    async fn parallel_siblings_start_before_either_finishes() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log = Log::default();
        let mut registry = Registry::new();
        registry.register("a", recorded(&log, 100, false), vec![]).unwrap();
        registry.register("b", recorded(&log, 50, false), vec![]).unwrap();

        let plan = resolve(&registry, &Composition::parallel(["a", "b"])).unwrap();
        let summary = Executor::new(temp_dir.path()).run(&plan).await.unwrap();

        let log = log.lock().unwrap();
        let last_start = position(&log, "start:a").max(position(&log, "start:b"));
        let first_finish = position(&log, "finish:a").min(position(&log, "finish:b"));
        assert!(last_start < first_finish, "{log:?}");
        assert_eq!(summary.completed, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn series_failure_skips_remaining_steps() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log = Log::default();
        let mut registry = Registry::new();
        registry.register("a", recorded(&log, 0, true), vec![]).unwrap();
        registry.register("b", recorded(&log, 0, false), vec![]).unwrap();

        let plan = resolve(&registry, &Composition::series(["a", "b"])).unwrap();
        let err = Executor::new(temp_dir.path()).run(&plan).await.unwrap_err();

        assert_eq!(err.failed_task(), Some("a"));
        assert!(err.to_string().contains("a exited with 1"));
        assert!(!log.lock().unwrap().contains(&"start:b".to_string()));
    }

    #[tokio::test]
    async fn parallel_failure_lets_siblings_finish() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log = Log::default();
        let mut registry = Registry::new();
        registry.register("broken", recorded(&log, 0, true), vec![]).unwrap();
        registry.register("slow", recorded(&log, 50, false), vec![]).unwrap();
        registry.register("after", recorded(&log, 0, false), vec![]).unwrap();

        let composition = Composition::series([Composition::parallel(["broken", "slow"]), "after".into()]);
        let plan = resolve(&registry, &composition).unwrap();
        let err = Executor::new(temp_dir.path()).run(&plan).await.unwrap_err();

        assert_eq!(err.failed_task(), Some("broken"));
        let log = log.lock().unwrap();
        assert!(log.contains(&"finish:slow".to_string()));
        assert!(!log.contains(&"start:after".to_string()));
    }

    #[tokio::test]
    async fn same_plan_runs_twice_independently() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log = Log::default();
        let mut registry = Registry::new();
        registry.register("clean", recorded(&log, 0, false), vec![]).unwrap();
        registry.register("build", recorded(&log, 0, false), vec!["clean".into()]).unwrap();

        let plan = resolve(&registry, &Composition::task("build")).unwrap();
        let executor = Executor::new(temp_dir.path());
        let first = executor.run(&plan).await.unwrap();
        let second = executor.run(&plan).await.unwrap();

        assert_eq!(first.completed, vec!["clean", "build"]);
        assert_eq!(second.completed, vec!["clean", "build"]);
        assert_eq!(log.lock().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn cancellation_stops_new_steps() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log = Log::default();
        let mut registry = Registry::new();
        registry.register("a", recorded(&log, 0, false), vec![]).unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let plan = resolve(&registry, &Composition::task("a")).unwrap();
        let err = Executor::new(temp_dir.path())
            .with_cancellation(cancel)
            .run(&plan)
            .await
            .unwrap_err();

        assert!(matches!(err, ConveyorError::Interrupted));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn deferred_completion_is_awaited_and_reported() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut registry = Registry::new();
        registry
            .insert(Task::new("build:html", TaskBody::action(Deferred { millis: 20 })).with_reload(true))
            .unwrap();
        registry
            .insert(Task::new("mv:img", TaskBody::action(Deferred { millis: 0 })))
            .unwrap();

        let listener = Arc::new(RecordingListener::default());
        let plan = resolve(&registry, &Composition::series(["build:html", "mv:img"])).unwrap();
        let summary = Executor::new(temp_dir.path())
            .with_listener(listener.clone())
            .run(&plan)
            .await
            .unwrap();

        assert_eq!(summary.completed, vec!["build:html", "mv:img"]);
        let messages = listener.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].task, "build:html");
        assert!(messages[0].written[0].ends_with("index.html"));
    }

    #[tokio::test]
    async fn sources_and_destination_are_passed_to_actions() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("src/js")).unwrap();
        std::fs::write(root.join("src/js/app.js"), "let a;").unwrap();

        let mut registry = Registry::new();
        registry
            .insert(
                Task::new("mv:js", TaskBody::action(crate::actions::CopyAction::new()))
                    .with_sources(["src/js/**/*.js"])
                    .with_dest("build/js"),
            )
            .unwrap();

        let plan = resolve(&registry, &Composition::task("mv:js")).unwrap();
        Executor::new(root).run(&plan).await.unwrap();

        assert!(root.join("build/js/app.js").exists());
    }
}
