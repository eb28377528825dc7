use anyhow::Result;
use colored::*;
use conveyor_core::pipeline_manager::PipelineManager;

pub async fn execute(manager: &PipelineManager, task: Option<&str>, watch: bool) -> Result<()> {
    let target = task.unwrap_or_else(|| manager.config.default_task_name());
    let serving = manager
        .keeps_serving(Some(target))
        .map_err(|e| anyhow::anyhow!("Failed to run task: {}", e))?;
    println!("{} {}", "Running task".bold(), target.cyan());
    println!();

    // Execute task using pipeline manager
    match manager.run_task(Some(target)).await {
        Ok(_) => {
            println!();
            println!(
                "{} {}",
                "✓".green().bold(),
                "All tasks completed successfully!".green().bold()
            );
        }
        // In watch mode a broken build should not stop the watcher
        Err(e) if watch && e.failed_task().is_some() => {
            eprintln!("{} {}", "Warning:".yellow().bold(), e.to_string().yellow());
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to run task: {}", e)),
    }

    if watch {
        println!();
        manager
            .watch()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to watch: {}", e))?;
    } else if serving {
        // Dev servers die with the pipeline, so stay up until interrupted
        println!();
        println!("{}", "Serving; press Ctrl-C to stop".bright_black());
        manager.wait_for_shutdown().await;
    }

    Ok(())
}
