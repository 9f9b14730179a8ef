pub mod debug;
pub mod run;
pub mod version;

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use mcr_core::{DataBlob, InitValues, ModelSource};
use mcr_mcmc::inits::InitStrategy;
use mcr_mcmc::metropolis::random_inits;
use mcr_mcmc::{RunConfig, RunRequest};
use serde_json::Value;

/// Inputs shared by `run` and `debug`.
#[derive(Args, Debug)]
pub struct RunInputs {
    /// YAML run configuration.
    #[arg(long)]
    pub config: PathBuf,
    /// YAML model definition.
    #[arg(long)]
    pub model: PathBuf,
    /// JSON data file (defaults to an empty object).
    #[arg(long)]
    pub data: Option<PathBuf>,
    /// JSON array with one initial value object per chain.
    #[arg(long)]
    pub inits: Option<PathBuf>,
    /// Override the number of chains.
    #[arg(long)]
    pub chains: Option<usize>,
    /// Override the master seed.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Draw initial values per chain instead of reading `--inits`.
    #[arg(long)]
    pub random: bool,
}

impl RunInputs {
    /// Loads the configuration and applies command line overrides.
    pub fn load_config(&self) -> Result<RunConfig, Box<dyn Error>> {
        let mut config = RunConfig::load(&self.config)?;
        if let Some(chains) = self.chains {
            config.n_chain = chains;
        }
        if let Some(seed) = self.seed {
            config.seed_policy.master_seed = seed;
        }
        if self.random {
            config.random = true;
        }
        Ok(config)
    }

    /// Reads data, model and initial values.
    pub fn load_request(&self, config: &RunConfig) -> Result<RunRequest, Box<dyn Error>> {
        let model = ModelSource::File(self.model.clone());
        let data: DataBlob = match &self.data {
            Some(path) => read_json(path)?,
            None => Value::Object(Default::default()),
        };
        let inits = if config.random {
            InitStrategy::Random(random_inits(&model)?)
        } else {
            let values: Vec<InitValues> = match &self.inits {
                Some(path) => read_json(path)?,
                None => vec![Value::Null; config.n_chain],
            };
            InitStrategy::Fixed(values)
        };
        Ok(RunRequest { data, model, inits })
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, Box<dyn Error>> {
    let text = fs::read_to_string(path)
        .map_err(|err| format!("failed to read {}: {err}", path.display()))?;
    Ok(serde_json::from_str(&text)?)
}
