use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use mcr_core::{ErrorInfo, McrError};
use serde::{Deserialize, Serialize};

/// YAML-configurable parameters governing a multi-chain run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Short run identifier used in summaries.
    #[serde(default)]
    pub name: Option<String>,
    /// Free-form description recorded in summaries.
    #[serde(default)]
    pub description: Option<String>,
    /// Parameters tracked in every chain.
    pub params: Vec<String>,
    /// Parameters whose convergence drives extension rounds (defaults to `params`).
    #[serde(default)]
    pub params_extra: Option<Vec<String>>,
    /// Parameters reported in the summary (defaults to `params`).
    #[serde(default)]
    pub params_report: Option<Vec<String>>,
    /// Number of chains, one pool worker each.
    #[serde(default = "default_chains")]
    pub n_chain: usize,
    /// Adaptation iterations performed while building each session.
    #[serde(default = "default_adapt")]
    pub n_adapt: usize,
    /// Burn-in iterations of the initial pass.
    #[serde(default = "default_burn")]
    pub n_burn: usize,
    /// Iterations drawn per round.
    #[serde(default = "default_draw")]
    pub n_draw: usize,
    /// Interval at which draws are retained.
    #[serde(default = "default_thinning")]
    pub n_thin: usize,
    /// Extra burn-in iterations before every extension round.
    #[serde(default)]
    pub n_rburn: usize,
    /// Total iteration budget once extension rounds start.
    #[serde(default)]
    pub n_max: Option<usize>,
    /// Convergence threshold for the diagnostic.
    #[serde(default = "default_rhat_max")]
    pub rhat_max: f64,
    /// Use the split-chain variant of the diagnostic.
    #[serde(default = "default_true")]
    pub split_rhat: bool,
    /// Sampler extensions loaded on every worker before building sessions.
    #[serde(default)]
    pub extensions: Vec<String>,
    /// Only check that a single session can be built.
    #[serde(default)]
    pub debug: bool,
    /// Extend sampling until convergence or budget exhaustion.
    #[serde(default)]
    pub extra: bool,
    /// Generate initial values per worker instead of using a fixed list.
    #[serde(default)]
    pub random: bool,
    /// Write the text and JSON summary.
    #[serde(default = "default_true")]
    pub report: bool,
    /// Write the merged chain snapshot.
    #[serde(default = "default_true")]
    pub save_object: bool,
    /// Write a copy of the input data.
    #[serde(default)]
    pub save_data: bool,
    /// Master seed and substream policy.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    /// Output directory configuration.
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_chains() -> usize {
    3
}

fn default_adapt() -> usize {
    1000
}

fn default_burn() -> usize {
    1000
}

fn default_draw() -> usize {
    1000
}

fn default_thinning() -> usize {
    1
}

fn default_rhat_max() -> f64 {
    1.1
}

fn default_true() -> bool {
    true
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            name: None,
            description: None,
            params: Vec::new(),
            params_extra: None,
            params_report: None,
            n_chain: default_chains(),
            n_adapt: default_adapt(),
            n_burn: default_burn(),
            n_draw: default_draw(),
            n_thin: default_thinning(),
            n_rburn: 0,
            n_max: None,
            rhat_max: default_rhat_max(),
            split_rhat: true,
            extensions: Vec::new(),
            debug: false,
            extra: false,
            random: false,
            report: true,
            save_object: true,
            save_data: false,
            seed_policy: SeedPolicy::default(),
            output: OutputConfig::default(),
        }
    }
}

impl RunConfig {
    /// Parses a YAML configuration.
    pub fn from_yaml_str(text: &str) -> Result<Self, McrError> {
        serde_yaml::from_str(text).map_err(|err| {
            McrError::Serde(
                ErrorInfo::new("config-parse", err.to_string())
                    .with_hint("check the run configuration YAML"),
            )
        })
    }

    /// Reads and parses a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self, McrError> {
        let text = fs::read_to_string(path).map_err(|err| {
            McrError::Serde(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        Self::from_yaml_str(&text)
            .map_err(|err| err.with_context("path", path.display().to_string()))
    }

    /// Parameters monitored by the extension loop.
    pub fn params_extra(&self) -> &[String] {
        self.params_extra.as_deref().unwrap_or(&self.params)
    }

    /// Parameters evaluated for the initial decision and the summary.
    pub fn params_report(&self) -> &[String] {
        self.params_report.as_deref().unwrap_or(&self.params)
    }

    /// Iteration budget, defaulting to the burn-in plus two extension rounds.
    pub fn n_max(&self) -> usize {
        self.n_max
            .unwrap_or(self.n_burn + (self.n_rburn + self.n_draw) * 2)
    }

    /// Checks the structural invariants of the configuration.
    pub fn validate(&self) -> Result<(), McrError> {
        if self.n_chain == 0 {
            return Err(config_error("chain-count", "n_chain must be at least 1"));
        }
        if self.n_thin == 0 {
            return Err(config_error("thinning", "n_thin must be at least 1"));
        }
        if self.n_draw == 0 {
            return Err(config_error("draw-length", "n_draw must be at least 1"));
        }
        if self.params.is_empty() {
            return Err(McrError::Config(
                ErrorInfo::new("params-empty", "at least one parameter must be tracked")
                    .with_hint("list parameter names under `params`"),
            ));
        }
        if !self.rhat_max.is_finite() || self.rhat_max <= 0.0 {
            return Err(config_error("rhat-max", "rhat_max must be a positive number")
                .with_context("rhat_max", self.rhat_max.to_string()));
        }
        let tracked: BTreeSet<&str> = self.params.iter().map(String::as_str).collect();
        check_subset("params_extra", self.params_extra(), &tracked)?;
        check_subset("params_report", self.params_report(), &tracked)?;
        if self.extra && self.n_max() < self.n_burn {
            return Err(config_error("budget-too-small", "n_max is smaller than n_burn")
                .with_context("n_max", self.n_max().to_string())
                .with_context("n_burn", self.n_burn.to_string()));
        }
        Ok(())
    }
}

fn check_subset(field: &str, subset: &[String], tracked: &BTreeSet<&str>) -> Result<(), McrError> {
    if subset.is_empty() {
        return Err(config_error("params-subset-empty", "parameter subset is empty")
            .with_context("field", field));
    }
    if let Some(missing) = subset.iter().find(|param| !tracked.contains(param.as_str())) {
        return Err(config_error(
            "params-subset",
            "parameter subset contains an untracked parameter",
        )
        .with_context("field", field)
        .with_context("param", missing.clone()));
    }
    Ok(())
}

fn config_error(code: &str, message: &str) -> McrError {
    McrError::Config(ErrorInfo::new(code, message))
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedPolicy {
    /// Master seed used for the run.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Optional label recorded in manifests.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    0x05EE_D5EE_DD15_5EED_u64
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            label: None,
        }
    }
}

/// Output directory layout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root directory for run artefacts. Created if it does not exist.
    #[serde(default)]
    pub run_directory: Option<PathBuf>,
    /// Text summary filename relative to `run_directory`.
    #[serde(default = "default_summary_filename")]
    pub summary_file: PathBuf,
    /// Merged chain snapshot filename relative to `run_directory`.
    #[serde(default = "default_samples_filename")]
    pub samples_file: PathBuf,
    /// Input data copy filename relative to `run_directory`.
    #[serde(default = "default_data_filename")]
    pub data_file: PathBuf,
    /// Manifest filename relative to `run_directory`.
    #[serde(default = "default_manifest_filename")]
    pub manifest_file: PathBuf,
}

fn default_summary_filename() -> PathBuf {
    PathBuf::from("summary.txt")
}

fn default_samples_filename() -> PathBuf {
    PathBuf::from("samples.json")
}

fn default_data_filename() -> PathBuf {
    PathBuf::from("data.json")
}

fn default_manifest_filename() -> PathBuf {
    PathBuf::from("manifest.json")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            run_directory: None,
            summary_file: default_summary_filename(),
            samples_file: default_samples_filename(),
            data_file: default_data_filename(),
            manifest_file: default_manifest_filename(),
        }
    }
}
