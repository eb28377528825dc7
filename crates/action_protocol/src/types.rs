//! Core types handed to and returned from actions.
//!
//! - [`SourceFile`] - A file matched by one of a task's source globs
//! - [`ActionContext`] - Everything an action is allowed to know about its run
//! - [`ActionReport`] - What an action produced

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Outcome of an action: a report on success, an `anyhow` cause on failure.
pub type ActionResult = anyhow::Result<ActionReport>;

/// A source file resolved from a glob pattern.
///
/// `relative` is the path below the pattern's glob base, so for the pattern
/// `src/scss/**/*.scss` the file `src/scss/parts/nav.scss` has the relative
/// path `parts/nav.scss`. Actions that write one output per input join this
/// onto their destination directory to mirror the source layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Absolute path of the matched file.
    pub path: PathBuf,

    /// Path relative to the glob base of the pattern that matched it.
    pub relative: PathBuf,
}

impl SourceFile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, relative: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            relative: relative.into(),
        }
    }

    /// Destination path for this file below `dest`, optionally swapping its extension.
    #[must_use]
    pub fn output_path(&self, dest: &Path, extension: Option<&str>) -> PathBuf {
        let mut output = dest.join(&self.relative);
        if let Some(extension) = extension {
            output.set_extension(extension);
        }
        output
    }
}

/// The input of a single action invocation.
///
/// Built fresh by the executor for every step: source globs are resolved
/// right before the action starts, so watch-triggered re-runs pick up newly
/// created files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionContext {
    /// Name of the task this action belongs to.
    pub task: String,

    /// Absolute pipeline root. Relative paths in configuration resolve against it.
    pub root: PathBuf,

    /// Files matched by the task's source patterns, in a stable order.
    pub sources: Vec<SourceFile>,

    /// Absolute destination directory, if the task declares one.
    pub dest: Option<PathBuf>,
}

impl ActionContext {
    #[must_use]
    pub fn new(task: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            task: task.into(),
            root: root.into(),
            sources: Vec::new(),
            dest: None,
        }
    }

    #[must_use]
    pub fn with_sources(mut self, sources: Vec<SourceFile>) -> Self {
        self.sources = sources;
        self
    }

    #[must_use]
    pub fn with_dest(mut self, dest: impl Into<PathBuf>) -> Self {
        self.dest = Some(dest.into());
        self
    }

    /// The destination directory, or an error naming the task that lacks one.
    pub fn require_dest(&self) -> anyhow::Result<&Path> {
        self.dest
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("task '{}' has no destination directory", self.task))
    }

    /// Source paths only, for actions that pass them straight to a tool.
    pub fn source_paths(&self) -> impl Iterator<Item = &Path> {
        self.sources.iter().map(|source| source.path.as_path())
    }
}

/// What an action reports once it has completed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionReport {
    /// Files or directories the action wrote or removed.
    pub written: Vec<PathBuf>,
}

impl ActionReport {
    /// A report for an action that produced nothing worth mentioning.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn written(written: Vec<PathBuf>) -> Self {
        Self { written }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_path_mirrors_relative_layout() {
        let source = SourceFile::new("/site/src/scss/parts/nav.scss", "parts/nav.scss");
        let output = source.output_path(Path::new("/site/build/css"), Some("css"));
        assert_eq!(output, PathBuf::from("/site/build/css/parts/nav.css"));
    }

    #[test]
    fn output_path_keeps_extension_by_default() {
        let source = SourceFile::new("/site/img/logo.png", "logo.png");
        let output = source.output_path(Path::new("/site/build/img"), None);
        assert_eq!(output, PathBuf::from("/site/build/img/logo.png"));
    }

    #[test]
    fn require_dest_names_the_task() {
        let context = ActionContext::new("mv:img", "/site");
        let err = context.require_dest().unwrap_err();
        assert!(err.to_string().contains("mv:img"));

        let context = context.with_dest("/site/build/img");
        assert_eq!(context.require_dest().unwrap(), Path::new("/site/build/img"));
    }
}
