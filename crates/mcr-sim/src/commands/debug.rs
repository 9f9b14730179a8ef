use std::error::Error;

use clap::Args;
use mcr_mcmc::{debug as debug_build, MetropolisEngine};

use super::RunInputs;

#[derive(Args, Debug)]
pub struct DebugArgs {
    #[command(flatten)]
    pub inputs: RunInputs,
}

pub fn run(args: &DebugArgs) -> Result<(), Box<dyn Error>> {
    let config = args.inputs.load_config()?;
    let request = args.inputs.load_request(&config)?;
    let engine = MetropolisEngine::new();
    let report = debug_build(&engine, &request, &config)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
