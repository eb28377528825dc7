use anyhow::Context;
use conveyor_action_protocol::{Action, ActionContext, ActionReport, ActionResult, Completion};

/// Copies every source file into the destination, keeping its layout
/// relative to the glob base.
#[derive(Debug, Clone, Default)]
pub struct CopyAction;

impl CopyAction {
    pub fn new() -> Self {
        Self
    }

    fn copy(&self, context: &ActionContext) -> ActionResult {
        let dest = context.require_dest()?;
        let mut written = Vec::with_capacity(context.sources.len());

        for source in &context.sources {
            let output = source.output_path(dest, None);
            if let Some(parent) = output.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::copy(&source.path, &output).with_context(|| {
                format!(
                    "Failed to copy {} to {}",
                    source.path.display(),
                    output.display()
                )
            })?;
            written.push(output);
        }

        tracing::debug!(task = %context.task, files = written.len(), "copied sources");
        Ok(ActionReport::written(written))
    }
}

impl Action for CopyAction {
    fn kind(&self) -> &str {
        "copy"
    }

    fn start(&self, context: ActionContext) -> Completion {
        Completion::Done(self.copy(&context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::resolve_sources;
    use futures::executor::block_on;

    #[test]
    fn mirrors_sources_below_destination() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("img/icons")).unwrap();
        std::fs::write(root.join("img/logo.png"), b"png").unwrap();
        std::fs::write(root.join("img/icons/star.svg"), b"<svg/>").unwrap();

        let sources = resolve_sources(root, &["img/**/*.{svg,png}".to_string()]).unwrap();
        let context = ActionContext::new("mv:img", root)
            .with_sources(sources)
            .with_dest(root.join("build/img"));

        let report = block_on(CopyAction::new().start(context).wait()).unwrap();

        assert_eq!(report.written.len(), 2);
        assert_eq!(std::fs::read(root.join("build/img/logo.png")).unwrap(), b"png");
        assert!(root.join("build/img/icons/star.svg").exists());
    }

    #[test]
    fn requires_destination() {
        let temp_dir = tempfile::tempdir().unwrap();
        let context = ActionContext::new("mv:css", temp_dir.path());
        let err = block_on(CopyAction::new().start(context).wait()).unwrap_err();
        assert!(err.to_string().contains("no destination"));
    }
}
