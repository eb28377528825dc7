//! File watcher
//!
//! Binds glob patterns to tasks and re-triggers a task when a matching file
//! changes. Each task has a single debounce timer shared by all patterns bound
//! to it:
//!
//! - a matching event moves an idle task to pending and arms the timer
//! - more events while pending re-arm the timer
//! - when the timer fires the task runs once
//! - events that arrive while it runs queue exactly one follow-up run
//!
//! Paths handed to [`Watcher::run`] are relative to the pipeline root.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use colored::*;
use futures::stream::{FuturesUnordered, StreamExt};
use globset::GlobSet;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::sources::{compile_pattern_set, glob_base};
use crate::types::{ConveyorError, ConveyorResult};

/// Debounce window used when the pipeline does not configure one.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Patterns that re-trigger `task`.
#[derive(Debug, Clone)]
pub struct WatchRule {
    pub patterns: Vec<String>,
    pub task: String,
    matcher: GlobSet,
    excluded: GlobSet,
}

impl WatchRule {
    fn new(patterns: Vec<String>, task: String) -> ConveyorResult<Self> {
        if patterns.is_empty() {
            return Err(ConveyorError::Config(format!(
                "Watch rule for task '{}' has no patterns",
                task
            )));
        }
        let (negated, positive): (Vec<&String>, Vec<&String>) =
            patterns.iter().partition(|p| p.starts_with('!'));
        let matcher = compile_pattern_set(&positive)?;
        let excluded = compile_pattern_set(
            &negated
                .iter()
                .map(|p| p.trim_start_matches('!'))
                .collect::<Vec<_>>(),
        )?;
        Ok(Self {
            patterns,
            task,
            matcher,
            excluded,
        })
    }

    pub fn matches(&self, path: &Path) -> bool {
        self.matcher.is_match(path) && !self.excluded.is_match(path)
    }
}

#[derive(Debug, Clone, Copy)]
enum RuleState {
    Idle,
    Pending { deadline: Instant },
    Running { dirty: bool },
}

/// Watch rules for one pipeline root.
#[derive(Debug)]
pub struct Watcher {
    root: PathBuf,
    debounce: Duration,
    rules: Vec<WatchRule>,
}

impl Watcher {
    pub fn new(root: impl Into<PathBuf>, debounce: Duration) -> Self {
        Self {
            root: root.into(),
            debounce,
            rules: Vec::new(),
        }
    }

    /// Re-trigger `task` when a file matching any of `patterns` changes.
    pub fn watch<I, S>(&mut self, patterns: I, task: impl Into<String>) -> ConveyorResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rule = WatchRule::new(patterns.into_iter().map(Into::into).collect(), task.into())?;
        tracing::debug!(task = %rule.task, patterns = ?rule.patterns, "registered watch rule");
        self.rules.push(rule);
        Ok(())
    }

    pub fn rules(&self) -> &[WatchRule] {
        &self.rules
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Tasks bound to `path` (relative to the root), each listed once.
    pub fn tasks_for(&self, path: &Path) -> Vec<&str> {
        let mut tasks: Vec<&str> = Vec::new();
        for rule in &self.rules {
            if rule.matches(path) && !tasks.contains(&rule.task.as_str()) {
                tasks.push(&rule.task);
            }
        }
        tasks
    }

    /// Existing directories that cover every watch pattern.
    ///
    /// Each pattern contributes its glob base, or the nearest existing
    /// ancestor when the base does not exist yet. Directories nested inside
    /// another returned directory are dropped.
    pub fn watch_roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = Vec::new();
        for pattern in self.rules.iter().flat_map(|rule| &rule.patterns) {
            if pattern.starts_with('!') {
                continue;
            }
            let mut dir = self.root.join(glob_base(pattern));
            while !dir.is_dir() && dir != self.root && dir.pop() {}
            if !roots.contains(&dir) {
                roots.push(dir);
            }
        }

        roots.sort();
        let mut covering: Vec<PathBuf> = Vec::new();
        for dir in roots {
            if !covering.iter().any(|parent| dir.starts_with(parent)) {
                covering.push(dir);
            }
        }
        covering
    }

    /// Start watching the filesystem.
    ///
    /// Created, modified and removed paths are sent relative to the root.
    /// Events stop when the returned [`RecommendedWatcher`] is dropped.
    pub fn start_fs_events(
        &self,
    ) -> ConveyorResult<(RecommendedWatcher, mpsc::UnboundedReceiver<PathBuf>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let root = self.root.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(error = %e, "file watcher error");
                    return;
                }
            };
            if !matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            ) {
                return;
            }
            for path in event.paths {
                match path.strip_prefix(&root) {
                    Ok(relative) => {
                        let _ = tx.send(relative.to_path_buf());
                    }
                    Err(_) => tracing::trace!(path = %path.display(), "event outside pipeline root"),
                }
            }
        })?;

        for dir in self.watch_roots() {
            tracing::debug!(dir = %dir.display(), "watching directory");
            watcher.watch(&dir, RecursiveMode::Recursive)?;
        }

        Ok((watcher, rx))
    }

    /// Drive the debounce state machine until `events` closes or `cancel` fires.
    ///
    /// `trigger` runs a task by name. Failed runs are reported and watching
    /// continues. On cancellation pending runs are dropped and in-flight runs
    /// are awaited; when `events` closes, pending runs still fire.
    pub async fn run<F, Fut>(
        &self,
        mut events: mpsc::UnboundedReceiver<PathBuf>,
        trigger: F,
        cancel: CancellationToken,
    ) where
        F: Fn(String) -> Fut,
        Fut: Future<Output = ConveyorResult<()>>,
    {
        let mut states: HashMap<String, RuleState> = self
            .rules
            .iter()
            .map(|rule| (rule.task.clone(), RuleState::Idle))
            .collect();
        let trigger = &trigger;
        let start_run = |task: String| async move {
            let result = trigger(task.clone()).await;
            (task, result)
        };
        let mut running: FuturesUnordered<_> = std::iter::empty().map(start_run).collect();
        let mut accepting = true;

        loop {
            let next_deadline = states
                .values()
                .filter_map(|state| match state {
                    RuleState::Pending { deadline } => Some(*deadline),
                    _ => None,
                })
                .min();

            if !accepting && next_deadline.is_none() && running.is_empty() {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled(), if accepting => {
                    tracing::debug!("watcher cancelled; waiting for running tasks");
                    accepting = false;
                    for state in states.values_mut() {
                        *state = match *state {
                            RuleState::Running { .. } => RuleState::Running { dirty: false },
                            _ => RuleState::Idle,
                        };
                    }
                }
                event = events.recv(), if accepting => {
                    let Some(path) = event else {
                        accepting = false;
                        continue;
                    };
                    for task in self.tasks_for(&path) {
                        tracing::debug!(%task, path = %path.display(), "change detected");
                        let Some(state) = states.get_mut(task) else { continue };
                        *state = match *state {
                            RuleState::Idle | RuleState::Pending { .. } => RuleState::Pending {
                                deadline: Instant::now() + self.debounce,
                            },
                            RuleState::Running { .. } => RuleState::Running { dirty: true },
                        };
                    }
                }
                Some((task, result)) = running.next(), if !running.is_empty() => {
                    if let Err(e) = result {
                        report_failure(&task, &e);
                    }
                    if let Some(state) = states.get_mut(&task) {
                        *state = match *state {
                            RuleState::Running { dirty: true } => RuleState::Pending {
                                deadline: Instant::now() + self.debounce,
                            },
                            _ => RuleState::Idle,
                        };
                    }
                }
                _ = tokio::time::sleep_until(next_deadline.unwrap_or_else(Instant::now)), if next_deadline.is_some() => {
                    let now = Instant::now();
                    for (task, state) in states.iter_mut() {
                        let RuleState::Pending { deadline } = *state else { continue };
                        if deadline > now {
                            continue;
                        }
                        *state = RuleState::Running { dirty: false };
                        running.push(start_run(task.clone()));
                    }
                }
            }
        }
    }
}

fn report_failure(task: &str, error: &ConveyorError) {
    tracing::warn!(%task, error = %error, "watched task failed; still watching");
    if !matches!(error, ConveyorError::Interrupted) {
        eprintln!(
            "{} {}",
            format!("'{}' failed:", task).red().bold(),
            "still watching for changes".bright_black()
        );
    }
}
