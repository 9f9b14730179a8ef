use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use mcr_core::SamplingEngine;
use mcr_mcmc::{execute, write_outputs, Execution, MetropolisEngine, RunSummary};
use tracing::info;

use super::RunInputs;

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub inputs: RunInputs,
    /// Output directory for run artefacts (overrides the configuration).
    #[arg(long)]
    pub out: Option<PathBuf>,
    /// Keep extending until convergence or the iteration budget.
    #[arg(long)]
    pub extra: bool,
}

pub fn run(args: &RunArgs) -> Result<(), Box<dyn Error>> {
    let mut config = args.inputs.load_config()?;
    if let Some(out) = &args.out {
        config.output.run_directory = Some(out.clone());
    }
    if args.extra {
        config.extra = true;
    }
    let request = args.inputs.load_request(&config)?;
    let engine: Arc<dyn SamplingEngine> = Arc::new(MetropolisEngine::new());

    match execute(engine, &request, &config)? {
        Execution::Debug(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Execution::Sampled(outcome) => {
            if let Some(manifest) = write_outputs(&outcome, &config, &request)? {
                info!(files = manifest.files.len(), "artefacts written");
            }
            print!("{}", RunSummary::from_outcome(&outcome, &config).render_text());
        }
    }
    Ok(())
}
