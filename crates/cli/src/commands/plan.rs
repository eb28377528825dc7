use anyhow::Result;
use colored::*;
use conveyor_core::pipeline_manager::PipelineManager;

pub fn execute(manager: &PipelineManager, task: Option<&str>) -> Result<()> {
    // Get execution plan from pipeline manager
    let execution_plan = manager
        .get_execution_plan(task)
        .map_err(|e| anyhow::anyhow!("Failed to get execution plan: {}", e))?;

    println!("{} {}", "Execution plan for".bold(), execution_plan.target().cyan());

    println!("\n{}:", "Execution order".bold());
    for (i, step) in execution_plan.steps().iter().enumerate() {
        println!(
            "  {}. {} {}",
            i + 1,
            step.name(),
            format!("({})", step.action.kind()).dimmed()
        );
    }

    println!("\n{}:", "Structure".bold());
    print!("{}", execution_plan);

    Ok(())
}
