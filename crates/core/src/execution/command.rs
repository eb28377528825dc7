//! Command execution utilities
//!
//! This module provides a unified interface for running external tools
//! (shell commands, executables with args, long-running servers) with
//! consistent environment setup and error handling.

use std::process::{Child, Command, Stdio};

use anyhow::{bail, Context};
use conveyor_action_protocol::ActionContext;

/// A command line as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    /// Run through `sh -c`.
    Shell(String),
    /// Run a program directly with arguments.
    Program { program: String, args: Vec<String> },
}

impl CommandLine {
    pub fn program(program: impl Into<String>, args: Vec<String>) -> Self {
        Self::Program {
            program: program.into(),
            args,
        }
    }

    /// Human-readable form for logs and error messages.
    pub fn display(&self) -> String {
        match self {
            Self::Shell(cmd) => cmd.clone(),
            Self::Program { program, args } => {
                std::iter::once(program.as_str())
                    .chain(args.iter().map(String::as_str))
                    .collect::<Vec<_>>()
                    .join(" ")
            }
        }
    }
}

/// Runs external processes for a single action invocation.
///
/// Every process starts in the pipeline root and sees:
/// - `CONVEYOR_TASK` - the task name
/// - `CONVEYOR_ROOT` - the pipeline root
/// - `CONVEYOR_DEST` - the destination directory, if any
/// - `CONVEYOR_SOURCE_COUNT` and `CONVEYOR_SOURCE_<i>` - the resolved sources
pub struct CommandExecutor<'a> {
    context: &'a ActionContext,
}

impl<'a> CommandExecutor<'a> {
    pub fn new(context: &'a ActionContext) -> Self {
        Self { context }
    }

    /// Build a [`Command`] for `line` with the common setup applied.
    pub fn build(&self, line: &CommandLine) -> Command {
        let mut command = match line {
            CommandLine::Shell(cmd) => {
                let mut command = Command::new("sh");
                command.arg("-c").arg(cmd);
                command
            }
            CommandLine::Program { program, args } => {
                let mut command = Command::new(program);
                command.args(args);
                command
            }
        };

        command.current_dir(&self.context.root);
        command.env("CONVEYOR_TASK", &self.context.task);
        command.env("CONVEYOR_ROOT", &self.context.root);
        if let Some(dest) = &self.context.dest {
            command.env("CONVEYOR_DEST", dest);
        }
        command.env("CONVEYOR_SOURCE_COUNT", self.context.sources.len().to_string());
        for (i, source) in self.context.sources.iter().enumerate() {
            command.env(format!("CONVEYOR_SOURCE_{}", i), &source.path);
        }

        command
    }

    /// Run `line` to completion; a non-zero exit status is an error.
    pub fn execute(&self, line: &CommandLine) -> anyhow::Result<()> {
        let rendered = line.display();
        tracing::debug!(task = %self.context.task, command = %rendered, "executing command");

        let status = self
            .build(line)
            .status()
            .with_context(|| format!("Failed to execute command '{}'", rendered))?;

        if !status.success() {
            bail!(
                "Command '{}' failed with exit code {}",
                rendered,
                status.code().unwrap_or(-1)
            );
        }
        Ok(())
    }

    /// Start `line` without waiting for it, with stdout piped back to the caller.
    ///
    /// On unix the process leads its own process group, so
    /// [`kill_process_group`] reaches everything it spawns.
    pub fn spawn(&self, line: &CommandLine) -> anyhow::Result<Child> {
        let rendered = line.display();
        tracing::debug!(task = %self.context.task, command = %rendered, "spawning command");

        let mut command = self.build(line);
        command.stdin(Stdio::null()).stdout(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        command
            .spawn()
            .with_context(|| format!("Failed to start command '{}'", rendered))
    }
}

/// Kill `child` and every process in its group, then reap it.
pub fn kill_process_group(child: &mut Child) {
    let pid = child.id();
    #[cfg(unix)]
    {
        let group = format!("-{}", pid);
        match Command::new("kill")
            .args(["-KILL", "--", group.as_str()])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(status) if status.success() => {}
            Ok(_) => tracing::debug!(pid, "process group already gone"),
            Err(e) => tracing::warn!(pid, error = %e, "failed to signal process group"),
        }
    }
    if let Err(e) = child.kill() {
        tracing::debug!(pid, error = %e, "process already exited");
    }
    if let Err(e) = child.wait() {
        tracing::warn!(pid, error = %e, "failed to reap process");
    }
}
