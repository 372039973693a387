use anyhow::Context;
use clap::Parser;
use generator::{write_volume, GeneratorConfig};
use std::path::PathBuf;
use workflow::config::WorkflowConfig;
use workflow::runner::Runner;

mod generator;
mod range_table;
mod sink;
mod source;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Level-II archive ingester")]
struct Args {
    /// Archive files, ingested in the order given
    files: Vec<PathBuf>,
    /// Load a workflow config from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory for finished sweep documents (overrides the config)
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Write a synthetic split-cut volume to this path and ingest it first
    #[arg(long)]
    synthesize: Option<PathBuf>,
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let workflow_config = match &args.config {
        Some(path) => WorkflowConfig::load(path)?,
        None => WorkflowConfig::default(),
    }
    .with_output_dir(args.output_dir.clone());

    let mut files = Vec::with_capacity(args.files.len() + 1);
    if let Some(path) = &args.synthesize {
        let generator = GeneratorConfig {
            seed: args.seed,
            ..Default::default()
        };
        write_volume(path, &generator)
            .with_context(|| format!("synthesizing volume at {}", path.display()))?;
        files.push(path.clone());
    }
    files.extend(args.files.iter().cloned());
    if files.is_empty() {
        anyhow::bail!("no input files; pass archive paths or --synthesize");
    }

    let runner = Runner::new(workflow_config.clone());
    let summary = runner.execute(&files)?;
    let status = summary.status;

    println!(
        "Ingest run -> files {} (failed {}), messages {}, beams {}, sweeps written {}, lost {}, skipped {}, errors {}",
        summary.files,
        summary.failed_files.len(),
        status.messages,
        status.beams,
        status.sweeps_written,
        status.sweeps_lost,
        status.sweeps_skipped,
        status.errors
    );
    for path in &summary.outputs {
        println!("  {}", path.display());
    }
    if !summary.failed_files.is_empty() {
        println!(
            "Unreadable inputs: {:?} (output in {})",
            summary.failed_files,
            workflow_config.output_dir.display()
        );
    }

    Ok(())
}
