use std::path::{Path, PathBuf};

use anyhow::Context;
use conveyor_action_protocol::{
    Action, ActionContext, ActionReport, ActionResult, Completion, SourceFile,
};

use crate::execution::command::{CommandExecutor, CommandLine};

const SOURCES: &str = "{sources}";

/// Runs an external tool over a task's sources.
///
/// Arguments may contain placeholders:
/// - `{root}` and `{dest}` - the pipeline root and destination directory
/// - `{sources}` - every resolved source; as a whole argument it expands to
///   one argument per file, inside a shell string to a quoted list
/// - `{source}` and `{output}` - per-file mode only: the current source and
///   its mirrored destination path (with `extension` applied)
///
/// In per-file mode the tool runs once per source, e.g.
/// `terser {source} -o {output}`. Otherwise it runs once, e.g.
/// `sass --style=compressed src/scss:{dest}`.
#[derive(Debug, Clone)]
pub struct CommandAction {
    command: CommandLine,
    per_file: bool,
    extension: Option<String>,
}

impl CommandAction {
    pub fn new(command: CommandLine) -> Self {
        Self {
            command,
            per_file: false,
            extension: None,
        }
    }

    pub fn per_file(mut self, per_file: bool) -> Self {
        self.per_file = per_file;
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    fn run(&self, context: &ActionContext) -> ActionResult {
        let executor = CommandExecutor::new(context);

        if !self.per_file {
            if self.uses_sources() && context.sources.is_empty() {
                tracing::info!(task = %context.task, "no sources matched; skipping command");
                return Ok(ActionReport::empty());
            }
            let line = self.expand(context, None);
            executor.execute(&line)?;
            return Ok(ActionReport::written(context.dest.iter().cloned().collect()));
        }

        let dest = context.require_dest()?;
        let mut written = Vec::with_capacity(context.sources.len());
        for source in &context.sources {
            let output = source.output_path(dest, self.extension.as_deref());
            if let Some(parent) = output.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let line = self.expand(context, Some((source, &output)));
            executor.execute(&line)?;
            written.push(output);
        }
        Ok(ActionReport::written(written))
    }

    fn uses_sources(&self) -> bool {
        match &self.command {
            CommandLine::Shell(cmd) => cmd.contains(SOURCES),
            CommandLine::Program { args, .. } => args.iter().any(|arg| arg.contains(SOURCES)),
        }
    }

    fn expand(&self, context: &ActionContext, file: Option<(&SourceFile, &PathBuf)>) -> CommandLine {
        match &self.command {
            CommandLine::Shell(cmd) => {
                let sources = context
                    .source_paths()
                    .map(|path| shell_quote(&path.display().to_string()))
                    .collect::<Vec<_>>()
                    .join(" ");
                CommandLine::Shell(substitute(cmd, context, file, &sources, true))
            }
            CommandLine::Program { program, args } => {
                let paths: Vec<String> = context
                    .source_paths()
                    .map(|p| p.display().to_string())
                    .collect();
                let sources = paths.join(" ");
                let mut expanded = Vec::with_capacity(args.len());
                for arg in args {
                    if arg == SOURCES {
                        expanded.extend(paths.iter().cloned());
                    } else {
                        expanded.push(substitute(arg, context, file, &sources, false));
                    }
                }
                CommandLine::program(program.clone(), expanded)
            }
        }
    }
}

fn substitute(
    template: &str,
    context: &ActionContext,
    file: Option<(&SourceFile, &PathBuf)>,
    sources: &str,
    quote: bool,
) -> String {
    let render = |path: &Path| {
        let text = path.display().to_string();
        if quote {
            shell_quote(&text)
        } else {
            text
        }
    };

    let mut result = template
        .replace("{root}", &render(context.root.as_path()))
        .replace(SOURCES, sources);
    if let Some(dest) = &context.dest {
        result = result.replace("{dest}", &render(dest.as_path()));
    }
    if let Some((source, output)) = file {
        result = result
            .replace("{source}", &render(source.path.as_path()))
            .replace("{output}", &render(output.as_path()));
    }
    result
}

fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}

impl Action for CommandAction {
    fn kind(&self) -> &str {
        "command"
    }

    fn start(&self, context: ActionContext) -> Completion {
        Completion::Done(self.run(&context))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::sources::resolve_sources;
    use futures::executor::block_on;

    fn scss_context(root: &Path) -> ActionContext {
        std::fs::create_dir_all(root.join("src/scss/parts")).unwrap();
        std::fs::write(root.join("src/scss/main.scss"), "main").unwrap();
        std::fs::write(root.join("src/scss/parts/nav.scss"), "nav").unwrap();
        let sources = resolve_sources(root, &["src/scss/**/*.scss".to_string()]).unwrap();
        ActionContext::new("dev:scss", root)
            .with_sources(sources)
            .with_dest(root.join("build/css"))
    }

    #[test]
    fn per_file_mode_writes_mirrored_outputs() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        let action = CommandAction::new(CommandLine::program(
            "cp",
            vec!["{source}".into(), "{output}".into()],
        ))
        .per_file(true)
        .with_extension("css");

        let report = block_on(action.start(scss_context(root)).wait()).unwrap();

        assert_eq!(
            report.written,
            vec![root.join("build/css/main.css"), root.join("build/css/parts/nav.css")]
        );
        assert_eq!(std::fs::read_to_string(root.join("build/css/parts/nav.css")).unwrap(), "nav");
    }

    #[test]
    fn sources_placeholder_expands_to_separate_arguments() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        let action = CommandAction::new(CommandLine::program(
            "sh",
            vec![
                "-c".into(),
                "mkdir -p \"$0\" && cat \"$@\" > \"$0/bundle.css\"".into(),
                "{dest}".into(),
                "{sources}".into(),
            ],
        ));

        block_on(action.start(scss_context(root)).wait()).unwrap();

        let bundle = std::fs::read_to_string(root.join("build/css/bundle.css")).unwrap();
        assert_eq!(bundle, "mainnav");
    }

    #[test]
    fn shell_mode_quotes_paths() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        let action = CommandAction::new(CommandLine::Shell(
            "mkdir -p {dest} && ls {sources} | wc -l | tr -d ' ' > {dest}/count.txt".to_string(),
        ));

        block_on(action.start(scss_context(root)).wait()).unwrap();

        let count = std::fs::read_to_string(root.join("build/css/count.txt")).unwrap();
        assert_eq!(count.trim(), "2");
    }

    #[test]
    fn skips_when_no_sources_matched() {
        let temp_dir = tempfile::tempdir().unwrap();
        let context = ActionContext::new("mv:js", temp_dir.path());
        let action = CommandAction::new(CommandLine::Shell("exit 1 {sources}".to_string()));

        let report = block_on(action.start(context).wait()).unwrap();
        assert!(report.written.is_empty());
    }

    #[test]
    fn failing_tool_is_reported() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        let action = CommandAction::new(CommandLine::Shell("exit 2".to_string()));

        let err = block_on(action.start(scss_context(root)).wait()).unwrap_err();
        assert!(err.to_string().contains("exit code 2"));
    }
}
