use std::io::{BufRead, BufReader};
use std::process::Child;
use std::sync::Mutex;

use conveyor_action_protocol::{
    done_channel, Action, ActionContext, ActionReport, Completion, DoneHandle,
};

use crate::execution::command::{kill_process_group, CommandExecutor, CommandLine};

/// Starts a long-running external dev server (for example a browser-sync
/// or live-reload server) and completes once it is ready.
///
/// With a `ready_pattern` the action completes when a line of the server's
/// stdout contains it; without one it completes as soon as the process has
/// been spawned. Server output is forwarded to our stdout. Spawned servers
/// are killed when the action is dropped, which happens when the pipeline
/// shuts down.
#[derive(Debug)]
pub struct ServeAction {
    command: CommandLine,
    ready_pattern: Option<String>,
    children: Mutex<Vec<Child>>,
}

impl ServeAction {
    pub fn new(command: CommandLine) -> Self {
        Self {
            command,
            ready_pattern: None,
            children: Mutex::new(Vec::new()),
        }
    }

    pub fn with_ready_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.ready_pattern = Some(pattern.into());
        self
    }

    /// Kill every server this action started, including the processes
    /// those servers spawned themselves.
    pub fn stop(&self) {
        let mut children = match self.children.lock() {
            Ok(children) => children,
            Err(poisoned) => poisoned.into_inner(),
        };
        for mut child in children.drain(..) {
            tracing::debug!(pid = child.id(), "stopping server");
            kill_process_group(&mut child);
        }
    }

    fn track(&self, child: Child) {
        match self.children.lock() {
            Ok(mut children) => children.push(child),
            Err(poisoned) => poisoned.into_inner().push(child),
        }
    }
}

/// Forward server output, firing `handle` on the first line containing `pattern`.
fn forward_output(
    task: String,
    stdout: impl std::io::Read,
    pattern: Option<String>,
    mut handle: Option<DoneHandle>,
) {
    for line in BufReader::new(stdout).lines() {
        let Ok(line) = line else { break };
        println!("[{}] {}", task, line);

        let ready = pattern.as_deref().is_some_and(|p| line.contains(p));
        if ready {
            if let Some(handle) = handle.take() {
                handle.complete(Ok(ActionReport::empty()));
            }
        }
    }

    if let Some(handle) = handle.take() {
        handle.complete(Err(anyhow::anyhow!(
            "server for task '{}' exited before printing '{}'",
            task,
            pattern.unwrap_or_default()
        )));
    }
}

impl Action for ServeAction {
    fn kind(&self) -> &str {
        "serve"
    }

    fn start(&self, context: ActionContext) -> Completion {
        let mut child = match CommandExecutor::new(&context).spawn(&self.command) {
            Ok(child) => child,
            Err(e) => return Completion::Done(Err(e)),
        };
        tracing::info!(task = %context.task, pid = child.id(), "server started");

        let stdout = child.stdout.take();
        self.track(child);

        let Some(stdout) = stdout else {
            return Completion::Done(Ok(ActionReport::empty()));
        };

        match &self.ready_pattern {
            Some(pattern) => {
                let (handle, signal) = done_channel();
                let pattern = pattern.clone();
                std::thread::spawn(move || {
                    forward_output(context.task, stdout, Some(pattern), Some(handle))
                });
                Completion::Deferred(signal)
            }
            None => {
                std::thread::spawn(move || forward_output(context.task, stdout, None, None));
                Completion::Done(Ok(ActionReport::empty()))
            }
        }
    }
}

impl Drop for ServeAction {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use futures::executor::block_on;

    fn context() -> (tempfile::TempDir, ActionContext) {
        let temp_dir = tempfile::tempdir().unwrap();
        let context = ActionContext::new("webserver", temp_dir.path());
        (temp_dir, context)
    }

    #[test]
    fn completes_on_readiness_marker() {
        let (_temp_dir, context) = context();
        let action = ServeAction::new(CommandLine::Shell(
            "echo booting; echo 'Serving files from: build/'; sleep 30".to_string(),
        ))
        .with_ready_pattern("Serving files");

        let completion = action.start(context);
        assert!(matches!(completion, Completion::Deferred(_)));
        block_on(completion.wait()).unwrap();

        action.stop();
        assert!(action.children.lock().unwrap().is_empty());
    }

    #[test]
    fn early_exit_without_marker_fails() {
        let (_temp_dir, context) = context();
        let action = ServeAction::new(CommandLine::Shell("echo crashed".to_string()))
            .with_ready_pattern("Serving files");

        let err = block_on(action.start(context).wait()).unwrap_err();
        assert!(err.to_string().contains("exited before printing 'Serving files'"));
    }

    #[cfg(target_os = "linux")]
    fn is_running(pid: &str) -> bool {
        // Zombies still have a /proc entry; state 'Z' counts as gone.
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => !stat
                .rsplit(')')
                .next()
                .is_some_and(|rest| rest.trim_start().starts_with('Z')),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn drop_kills_processes_spawned_by_the_server() {
        let (temp_dir, context) = context();
        let action = ServeAction::new(CommandLine::Shell(
            "sleep 300 & echo $! > server.pid; echo 'Serving files from build'; wait".to_string(),
        ))
        .with_ready_pattern("Serving files from");

        block_on(action.start(context).wait()).unwrap();
        let pid = std::fs::read_to_string(temp_dir.path().join("server.pid")).unwrap();
        let pid = pid.trim().to_string();
        assert!(is_running(&pid));

        drop(action);

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while is_running(&pid) && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        assert!(!is_running(&pid), "server process {} survived stop", pid);
    }

    #[test]
    fn without_pattern_completes_immediately() {
        let (_temp_dir, context) = context();
        let action = ServeAction::new(CommandLine::Shell("sleep 30".to_string()));

        let completion = action.start(context);
        assert!(matches!(completion, Completion::Done(Ok(_))));
    }
}
