use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context};
use conveyor_action_protocol::{Action, ActionContext, ActionReport, ActionResult, Completion};

/// Removes a directory (or file) below the pipeline root.
///
/// A missing target is not an error. Targets that resolve to the root
/// itself or escape it are refused.
#[derive(Debug, Clone)]
pub struct CleanAction {
    path: PathBuf,
}

impl CleanAction {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn clean(&self, context: &ActionContext) -> ActionResult {
        let escapes = self
            .path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
        let is_root = self
            .path
            .components()
            .all(|c| matches!(c, Component::CurDir));
        if escapes || is_root {
            bail!(
                "refusing to clean '{}': target must be a path inside the pipeline root",
                self.path.display()
            );
        }

        let target = context.root.join(&self.path);
        remove(&target).with_context(|| format!("Failed to remove {}", target.display()))?;
        Ok(ActionReport::written(vec![target]))
    }
}

fn remove(target: &Path) -> std::io::Result<()> {
    match std::fs::symlink_metadata(target) {
        Ok(metadata) if metadata.is_dir() => std::fs::remove_dir_all(target),
        Ok(_) => std::fs::remove_file(target),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

impl Action for CleanAction {
    fn kind(&self) -> &str {
        "clean"
    }

    fn start(&self, context: ActionContext) -> Completion {
        Completion::Done(self.clean(&context))
    }
}
