use anyhow::Result;
use conveyor_core::configs::{pipeline::PipelineConfig, tasks::TasksFileConfig};

pub fn execute() -> Result<()> {
    let schemas = serde_json::json!({
        "pipeline": schemars::schema_for!(PipelineConfig),
        "tasks": schemars::schema_for!(TasksFileConfig),
    });
    println!("{}", serde_json::to_string_pretty(&schemas)?);
    Ok(())
}
