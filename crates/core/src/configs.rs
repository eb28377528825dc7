//! Pipeline configuration
//!
//! YAML files under `.conveyor/`: `pipeline.yml` declares the pipeline,
//! and every `tasks/*.yml` fragment contributes more tasks.

pub mod pipeline;
pub mod tasks;
