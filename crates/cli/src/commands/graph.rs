use anyhow::Result;
use colored::*;
use conveyor_core::pipeline_manager::PipelineManager;
use conveyor_core::registry::TaskEdge;
use petgraph::visit::EdgeRef;

pub fn execute(manager: &PipelineManager) -> Result<()> {
    println!("{}", "Task Dependency Graph:".bold().underline());

    let result = manager.get_dependency_graph();
    let graph = &result.graph;

    if graph.node_count() == 0 {
        println!("No tasks registered");
        return Ok(());
    }

    if !result.cycles.is_empty() {
        let cycles_description = result
            .cycles
            .iter()
            .map(|cycle| {
                let mut path = cycle.clone();
                if let Some(first) = path.first().cloned() {
                    path.push(first);
                }
                path.join(" -> ")
            })
            .collect::<Vec<_>>()
            .join("; ");

        println!(
            "{} {}",
            "Warning:".yellow().bold(),
            format!("Circular dependencies detected: {}", cycles_description).yellow()
        );
    }

    for node_index in graph.node_indices() {
        println!("{}", graph[node_index].blue().bold());

        let mut deps = Vec::new();
        let mut members = Vec::new();
        // petgraph yields outgoing edges newest first
        let mut edges: Vec<_> = graph.edges(node_index).collect();
        edges.reverse();
        for edge in edges {
            let name = graph[edge.target()].clone();
            match edge.weight() {
                TaskEdge::Dependency => deps.push(name),
                TaskEdge::Member => members.push(name),
            }
        }

        if deps.is_empty() && members.is_empty() {
            println!("  {}", "no dependencies".dimmed());
        }
        if !deps.is_empty() {
            println!("  {} {}", "depends on:".dimmed(), deps.join(", "));
        }
        if !members.is_empty() {
            println!("  {} {}", "runs:".dimmed(), members.join(", "));
        }
        println!();
    }

    Ok(())
}
