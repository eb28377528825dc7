use anyhow::Result;
use colored::*;
use conveyor_core::pipeline_manager::PipelineManager;

pub fn execute(manager: &PipelineManager) -> Result<()> {
    let result = manager.list_tasks();

    let heading = match &result.pipeline_name {
        Some(name) => format!("Tasks ({})", name),
        None => "Tasks".to_string(),
    };
    println!("{}", heading.bold().underline());

    if result.tasks.is_empty() {
        println!("  {}", "No tasks found".dimmed());
        return Ok(());
    }

    for task in &result.tasks {
        let color = result
            .task_colors
            .get(&task.name)
            .copied()
            .unwrap_or(Color::White);
        let marker = if task.name == result.default_task {
            " [default]".green().to_string()
        } else {
            String::new()
        };
        println!(
            "{} {}{}",
            task.name.color(color).bold(),
            format!("({})", task.kind).dimmed(),
            marker
        );

        if let Some(description) = &task.description {
            println!("  {}", description);
        }
        if !task.dependencies.is_empty() {
            println!("  {} {}", "depends on:".dimmed(), task.dependencies.join(", "));
        }
        if !task.sources.is_empty() {
            println!("  {} {}", "sources:".dimmed(), task.sources.join(", "));
        }
        if let Some(dest) = &task.dest {
            println!("  {} {}", "dest:".dimmed(), dest.display());
        }
        if !task.watched_by.is_empty() {
            println!("  {} {}", "watching:".dimmed(), task.watched_by.join(", "));
        }
        if task.reload {
            println!("  {}", "reloads browser".dimmed());
        }
    }

    Ok(())
}
