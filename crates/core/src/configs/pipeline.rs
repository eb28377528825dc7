use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::configs::tasks::{TaskConfig, TasksFileConfig};
use crate::types::ConveyorResult;
use crate::watcher::DEFAULT_DEBOUNCE;

/// Task run when none is named on the command line.
pub const DEFAULT_TASK: &str = "default";

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PipelineConfig {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Task to run when none is given. Defaults to `default`.
    pub default_task: Option<String>,
    /// Quiet period after a change before a watched task re-runs. Defaults to 200.
    pub debounce_ms: Option<u64>,
    pub reload: Option<ReloadConfig>,
    pub watch: Option<Vec<WatchConfig>>,
    pub tasks: Option<Vec<TaskConfig>>,
}

/// External live-reload server to notify after `reload` tasks.
#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReloadConfig {
    /// Endpoint that receives a JSON completion message per reload task.
    pub url: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WatchConfig {
    /// Glob patterns relative to the pipeline root; `!` excludes.
    pub patterns: Vec<String>,
    pub task: String,
}

impl PipelineConfig {
    pub fn default_task_name(&self) -> &str {
        self.default_task.as_deref().unwrap_or(DEFAULT_TASK)
    }

    pub fn debounce(&self) -> Duration {
        self.debounce_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_DEBOUNCE)
    }

    /// All tasks in registration order: fragment tasks first, in fragment
    /// order, then the tasks declared in the pipeline file itself.
    pub fn all_tasks(&self, fragments: &[TasksFileConfig]) -> Vec<TaskConfig> {
        fragments
            .iter()
            .flat_map(|fragment| fragment.tasks.iter())
            .chain(self.tasks.iter().flatten())
            .cloned()
            .collect()
    }
}

pub fn parse_pipeline_config(yaml_str: &str) -> ConveyorResult<PipelineConfig> {
    let config: PipelineConfig = serde_yaml::from_str(yaml_str)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configs::tasks::parse_tasks_config;

    #[test]
    fn defaults_apply_to_minimal_pipeline() {
        let config = parse_pipeline_config("name: site\n").unwrap();
        assert_eq!(config.default_task_name(), "default");
        assert_eq!(config.debounce(), Duration::from_millis(200));
        assert!(config.reload.is_none());
    }

    #[test]
    fn parses_watch_rules_and_reload() {
        let config = parse_pipeline_config(
            r#"
defaultTask: dev
debounceMs: 50
reload:
  url: http://localhost:35729/changed
watch:
  - patterns: ["src/scss/**/*.scss"]
    task: "dev:scss"
tasks:
  - name: dev
"#,
        )
        .unwrap();

        assert_eq!(config.default_task_name(), "dev");
        assert_eq!(config.debounce(), Duration::from_millis(50));
        assert_eq!(config.reload.unwrap().url, "http://localhost:35729/changed");
        let watch = config.watch.unwrap();
        assert_eq!(watch[0].task, "dev:scss");
        assert_eq!(watch[0].patterns, vec!["src/scss/**/*.scss"]);
    }

    #[test]
    fn fragments_register_before_pipeline_tasks() {
        let config = parse_pipeline_config("tasks:\n  - name: default\n    series: [clean]\n").unwrap();
        let fragment = parse_tasks_config("tasks:\n  - name: clean\n").unwrap();

        let names: Vec<_> = config
            .all_tasks(&[fragment])
            .into_iter()
            .map(|task| task.name)
            .collect();
        assert_eq!(names, vec!["clean", "default"]);
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(parse_pipeline_config("plugins: []\n").is_err());
    }
}
