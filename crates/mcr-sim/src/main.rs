use std::error::Error;

use clap::{Parser, Subcommand};
use commands::{
    debug::{self, DebugArgs},
    run::{self, RunArgs},
    version::{self, VersionArgs},
};
use logging::LogFormat;

mod commands;
mod logging;

#[derive(Parser, Debug)]
#[command(name = "mcr-sim", about = "Parallel multi-chain MCMC runner")]
struct Cli {
    /// Raise the default log level to debug.
    #[arg(long, short, global = true)]
    verbose: bool,
    /// Log line encoding on stderr.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sample every chain in parallel and write the run artefacts.
    Run(RunArgs),
    /// Check that one session of the model can be built.
    Debug(DebugArgs),
    /// Print version information.
    Version(VersionArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    logging::init(cli.log_format, cli.verbose)?;
    match cli.command {
        Command::Run(args) => run::run(&args),
        Command::Debug(args) => debug::run(&args),
        Command::Version(args) => version::run(&args),
    }
}
