use std::collections::BTreeSet;
use std::sync::Mutex;

use mcr_core::chain::column_matches;
use mcr_core::{
    Chain, DataBlob, ErrorInfo, InitValues, McrError, ModelSource, RngHandle, SamplingEngine,
    SamplingSession, SessionSpec,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::inits::InitGenerator;

/// Extensions the engine knows how to load.
pub const KNOWN_EXTENSIONS: [&str; 3] = ["base", "glm", "mix"];

const TARGET_ACCEPTANCE: f64 = 0.44;
const ADAPT_BATCH: usize = 50;

/// Model definition: independent normal targets, one per parameter element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    /// Extensions that must be loaded before a session is built.
    #[serde(default)]
    pub extensions: Vec<String>,
    /// Parameters of the model.
    pub parameters: Vec<ParameterDefinition>,
}

/// One (possibly vector-valued) normal parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDefinition {
    /// Parameter name.
    pub name: String,
    /// Target mean.
    #[serde(default)]
    pub mean: f64,
    /// Target standard deviation.
    #[serde(default = "default_sd")]
    pub sd: f64,
    /// Number of elements.
    #[serde(default = "default_size")]
    pub size: usize,
    /// Data key whose numeric array mean replaces `mean`.
    #[serde(default)]
    pub data: Option<String>,
}

fn default_sd() -> f64 {
    1.0
}

fn default_size() -> usize {
    1
}

impl ModelDefinition {
    /// Parses and validates a YAML model definition.
    pub fn parse(source: &ModelSource) -> Result<Self, McrError> {
        let text = source.read_text()?;
        let definition: Self = serde_yaml::from_str(&text).map_err(|err| {
            McrError::Model(
                ErrorInfo::new("model-parse", err.to_string())
                    .with_context("model", source.label()),
            )
        })?;
        definition.validate()?;
        Ok(definition)
    }

    fn validate(&self) -> Result<(), McrError> {
        if self.parameters.is_empty() {
            return Err(McrError::Model(ErrorInfo::new(
                "model-empty",
                "model declares no parameters",
            )));
        }
        let mut seen = BTreeSet::new();
        for param in &self.parameters {
            if !seen.insert(param.name.as_str()) {
                return Err(model_error("parameter-duplicate", "parameter declared twice")
                    .with_context("param", param.name.clone()));
            }
            if param.size == 0 || !param.sd.is_finite() || param.sd <= 0.0 {
                return Err(model_error(
                    "parameter-invalid",
                    "parameters need a positive size and standard deviation",
                )
                .with_context("param", param.name.clone()));
            }
        }
        Ok(())
    }

    fn targets(&self, data: &DataBlob) -> Result<Vec<Target>, McrError> {
        let mut targets = Vec::new();
        for param in &self.parameters {
            let mean = match &param.data {
                Some(key) => data_mean(data, key)?,
                None => param.mean,
            };
            for element in 0..param.size {
                let column = if param.size == 1 {
                    param.name.clone()
                } else {
                    format!("{}[{}]", param.name, element + 1)
                };
                targets.push(Target {
                    column,
                    param: param.name.clone(),
                    mean,
                    sd: param.sd,
                });
            }
        }
        Ok(targets)
    }
}

fn data_mean(data: &DataBlob, key: &str) -> Result<f64, McrError> {
    let values: Option<Vec<f64>> = data
        .get(key)
        .and_then(Value::as_array)
        .and_then(|items| items.iter().map(Value::as_f64).collect());
    match values {
        Some(values) if !values.is_empty() => {
            Ok(values.iter().sum::<f64>() / values.len() as f64)
        }
        _ => Err(model_error("data-missing", "data key is missing or not a numeric array")
            .with_context("key", key)),
    }
}

fn model_error(code: &str, message: &str) -> McrError {
    McrError::Model(ErrorInfo::new(code, message))
}

#[derive(Debug, Clone)]
struct Target {
    column: String,
    param: String,
    mean: f64,
    sd: f64,
}

impl Target {
    fn log_density(&self, x: f64) -> f64 {
        let z = (x - self.mean) / self.sd;
        -0.5 * z * z
    }
}

/// Component-wise random-walk Metropolis engine.
#[derive(Debug, Default)]
pub struct MetropolisEngine {
    loaded: Mutex<BTreeSet<String>>,
}

impl MetropolisEngine {
    /// Creates an engine with no extensions loaded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Extensions loaded so far.
    pub fn loaded_extensions(&self) -> Result<Vec<String>, McrError> {
        Ok(self.lock()?.iter().cloned().collect())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeSet<String>>, McrError> {
        self.loaded
            .lock()
            .map_err(|_| model_error("extension-lock", "extension registry poisoned"))
    }
}

impl SamplingEngine for MetropolisEngine {
    fn name(&self) -> &str {
        "metropolis"
    }

    fn load_extensions(&self, modules: &[String]) -> Result<(), McrError> {
        let mut loaded = self.lock()?;
        for module in modules {
            if !KNOWN_EXTENSIONS.contains(&module.as_str()) {
                return Err(McrError::Model(
                    ErrorInfo::new("extension-unknown", "unknown sampler extension")
                        .with_context("extension", module.clone())
                        .with_hint("known extensions: base, glm, mix"),
                ));
            }
            loaded.insert(module.clone());
        }
        Ok(())
    }

    fn build(&self, spec: &SessionSpec<'_>) -> Result<Box<dyn SamplingSession>, McrError> {
        if spec.n_chain != 1 {
            return Err(model_error(
                "multi-chain-session",
                "metropolis sessions hold exactly one chain",
            )
            .with_context("n_chain", spec.n_chain.to_string()));
        }
        let definition = ModelDefinition::parse(spec.model)?;
        {
            let loaded = self.lock()?;
            if let Some(missing) = definition
                .extensions
                .iter()
                .find(|extension| !loaded.contains(*extension))
            {
                return Err(model_error(
                    "extension-not-loaded",
                    "model requires an extension that was not loaded",
                )
                .with_context("extension", missing.clone()));
            }
        }
        let targets = definition.targets(spec.data)?;
        let state = initial_state(&targets, spec.inits)?;
        let mut session = MetropolisSession {
            scales: targets.iter().map(|target| target.sd).collect(),
            targets,
            state,
            rng: RngHandle::from_seed(spec.seed),
            iteration: 0,
        };
        session.adapt(spec.n_adapt);
        Ok(Box::new(session))
    }
}

fn initial_state(targets: &[Target], inits: &InitValues) -> Result<Vec<f64>, McrError> {
    let mut state: Vec<f64> = targets.iter().map(|target| target.mean).collect();
    let entries = match inits {
        Value::Null => return Ok(state),
        Value::Object(entries) => entries,
        _ => return Err(model_error("inits-shape", "initial values must be a JSON object")),
    };
    for (name, value) in entries {
        let indices: Vec<usize> = targets
            .iter()
            .enumerate()
            .filter(|(_, target)| &target.param == name)
            .map(|(index, _)| index)
            .collect();
        if indices.is_empty() {
            return Err(model_error("inits-unknown", "initial value for an unknown parameter")
                .with_context("param", name.clone()));
        }
        let values: Option<Vec<f64>> = match value {
            Value::Array(items) => items.iter().map(Value::as_f64).collect(),
            other => other.as_f64().map(|x| vec![x]),
        };
        match values {
            Some(values) if values.len() == indices.len() => {
                for (index, x) in indices.into_iter().zip(values) {
                    state[index] = x;
                }
            }
            _ => {
                return Err(model_error("inits-size", "initial value has the wrong size")
                    .with_context("param", name.clone())
                    .with_context("expected", indices.len().to_string()))
            }
        }
    }
    Ok(state)
}

struct MetropolisSession {
    targets: Vec<Target>,
    state: Vec<f64>,
    scales: Vec<f64>,
    rng: RngHandle,
    iteration: usize,
}

impl MetropolisSession {
    fn step(&mut self, accepted: &mut [usize]) {
        for (index, target) in self.targets.iter().enumerate() {
            let current = self.state[index];
            let candidate = current + self.scales[index] * self.rng.standard_normal();
            let ratio = target.log_density(candidate) - target.log_density(current);
            let acceptance = ratio.exp().min(1.0);
            if self.rng.uniform() < acceptance {
                self.state[index] = candidate;
                accepted[index] += 1;
            }
        }
    }

    fn adapt(&mut self, n_adapt: usize) {
        let mut accepted = vec![0; self.targets.len()];
        let mut batch = 0usize;
        for iter in 1..=n_adapt {
            self.step(&mut accepted);
            if iter % ADAPT_BATCH == 0 || iter == n_adapt {
                let size = if iter % ADAPT_BATCH == 0 {
                    ADAPT_BATCH
                } else {
                    iter % ADAPT_BATCH
                };
                batch += 1;
                let delta = (1.0 / (batch as f64).sqrt()).min(0.1);
                for (scale, count) in self.scales.iter_mut().zip(accepted.iter_mut()) {
                    let rate = *count as f64 / size as f64;
                    *scale *= if rate > TARGET_ACCEPTANCE {
                        delta.exp()
                    } else {
                        (-delta).exp()
                    };
                    *count = 0;
                }
            }
        }
    }
}

impl SamplingSession for MetropolisSession {
    fn burn_in(&mut self, n_iter: usize) -> Result<(), McrError> {
        let mut accepted = vec![0; self.targets.len()];
        for _ in 0..n_iter {
            self.step(&mut accepted);
        }
        self.iteration += n_iter;
        Ok(())
    }

    fn draw(&mut self, params: &[String], n_iter: usize, thin: usize) -> Result<Chain, McrError> {
        if thin == 0 {
            return Err(McrError::Sampling(ErrorInfo::new(
                "draw-thin",
                "thinning interval must be positive",
            )));
        }
        let mut columns = Vec::new();
        for param in params {
            let before = columns.len();
            columns.extend(
                self.targets
                    .iter()
                    .enumerate()
                    .filter(|(_, target)| column_matches(&target.column, param))
                    .map(|(index, _)| index),
            );
            if columns.len() == before {
                return Err(McrError::Sampling(
                    ErrorInfo::new("unknown-parameter", "parameter is not defined by the model")
                        .with_context("param", param.clone()),
                ));
            }
        }
        let start = self.iteration + thin;
        let mut accepted = vec![0; self.targets.len()];
        let mut draws: Vec<Vec<f64>> = Vec::with_capacity(n_iter / thin);
        for iter in 1..=n_iter {
            self.step(&mut accepted);
            if iter % thin == 0 {
                draws.push(columns.iter().map(|&index| self.state[index]).collect());
            }
        }
        self.iteration += n_iter;
        let variables = columns
            .iter()
            .map(|&index| self.targets[index].column.clone())
            .collect();
        Chain::new(variables, draws, start, thin)
    }

    fn iteration(&self) -> usize {
        self.iteration
    }
}

/// Generator producing dispersed initial values around every target mean.
pub fn random_inits(model: &ModelSource) -> Result<InitGenerator, McrError> {
    let definition = ModelDefinition::parse(model)?;
    Ok(InitGenerator::new(move |data, rng| {
        let targets = definition.targets(data)?;
        let mut inits = Map::new();
        for param in &definition.parameters {
            let values: Vec<Value> = targets
                .iter()
                .filter(|target| target.param == param.name)
                .map(|target| {
                    let offset: f64 = rng.inner_mut().gen_range(-2.0..2.0);
                    Value::from(target.mean + offset * target.sd)
                })
                .collect();
            let value = if param.size == 1 {
                values.into_iter().next().unwrap_or(Value::Null)
            } else {
                Value::Array(values)
            };
            inits.insert(param.name.clone(), value);
        }
        Ok(Value::Object(inits))
    }))
}
