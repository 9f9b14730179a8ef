#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use mcr_core::chain::column_matches;
use mcr_core::{
    Chain, ErrorInfo, InitValues, McrError, ModelSource, RngHandle, SamplingEngine,
    SamplingSession, SessionSpec,
};
use mcr_mcmc::convergence::ConvergenceDiagnostic;
use mcr_mcmc::inits::InitStrategy;
use mcr_mcmc::merge::MergedChainSet;
use mcr_mcmc::{RunConfig, RunRequest};
use serde_json::{json, Value};

pub const COLUMNS: [&str; 3] = ["theta", "beta[1]", "beta[2]"];

/// Session lifecycle counters shared with the test.
#[derive(Debug, Default, Clone)]
pub struct Counters {
    pub built: Arc<AtomicUsize>,
    pub dropped: Arc<AtomicUsize>,
    pub loads: Arc<AtomicUsize>,
}

impl Counters {
    pub fn built(&self) -> usize {
        self.built.load(Ordering::SeqCst)
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }
}

/// Engine with deterministic draws around an init-supplied offset.
///
/// Inits understood: `offset` (f64), `invalid` (fail the build),
/// `fail_on_draw` / `panic_on_draw` (1-based draw call that fails).
#[derive(Debug, Default)]
pub struct StubEngine {
    pub counters: Counters,
    pub specs: Mutex<Vec<(usize, u64)>>,
    pub threads: Mutex<Vec<String>>,
}

impl StubEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SamplingEngine for StubEngine {
    fn name(&self) -> &str {
        "stub"
    }

    fn load_extensions(&self, _modules: &[String]) -> Result<(), McrError> {
        self.counters.loads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn build(&self, spec: &SessionSpec<'_>) -> Result<Box<dyn SamplingSession>, McrError> {
        let thread = std::thread::current().name().unwrap_or("unnamed").to_string();
        self.threads.lock().unwrap().push(thread);
        if let ModelSource::Inline(text) = spec.model {
            if text.contains("syntax error") {
                return Err(McrError::Model(ErrorInfo::new("stub-parse", "malformed model")));
            }
        }
        if spec.inits.get("invalid").and_then(Value::as_bool) == Some(true) {
            return Err(McrError::Model(ErrorInfo::new("stub-inits", "rejected inits")));
        }
        self.specs.lock().unwrap().push((spec.n_adapt, spec.seed));
        self.counters.built.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubSession {
            rng: RngHandle::from_seed(spec.seed),
            offset: spec.inits.get("offset").and_then(Value::as_f64).unwrap_or(0.0),
            fail_on_draw: spec.inits.get("fail_on_draw").and_then(Value::as_u64),
            panic_on_draw: spec.inits.get("panic_on_draw").and_then(Value::as_u64),
            draws: 0,
            iteration: 0,
            dropped: Arc::clone(&self.counters.dropped),
        }))
    }
}

struct StubSession {
    rng: RngHandle,
    offset: f64,
    fail_on_draw: Option<u64>,
    panic_on_draw: Option<u64>,
    draws: u64,
    iteration: usize,
    dropped: Arc<AtomicUsize>,
}

impl SamplingSession for StubSession {
    fn burn_in(&mut self, n_iter: usize) -> Result<(), McrError> {
        for _ in 0..n_iter {
            self.rng.standard_normal();
        }
        self.iteration += n_iter;
        Ok(())
    }

    fn draw(&mut self, params: &[String], n_iter: usize, thin: usize) -> Result<Chain, McrError> {
        self.draws += 1;
        if self.panic_on_draw == Some(self.draws) {
            panic!("stub session exploded");
        }
        if self.fail_on_draw == Some(self.draws) {
            return Err(McrError::Sampling(ErrorInfo::new("stub-draw", "draw failed")));
        }
        let variables: Vec<String> = COLUMNS
            .iter()
            .filter(|column| params.iter().any(|param| column_matches(column, param)))
            .map(|column| column.to_string())
            .collect();
        let start = self.iteration + thin;
        let mut rows = Vec::new();
        for iter in 1..=n_iter {
            let row: Vec<f64> = variables
                .iter()
                .map(|_| self.offset + self.rng.standard_normal())
                .collect();
            if iter % thin == 0 {
                rows.push(row);
            }
        }
        self.iteration += n_iter;
        Chain::new(variables, rows, start, thin)
    }

    fn iteration(&self) -> usize {
        self.iteration
    }
}

impl Drop for StubSession {
    fn drop(&mut self) {
        self.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

/// Diagnostic returning a scripted value per evaluation, repeating the last.
#[derive(Debug)]
pub struct ScriptedDiagnostic {
    values: Vec<Option<f64>>,
    calls: AtomicUsize,
}

impl ScriptedDiagnostic {
    pub fn new(values: &[f64]) -> Self {
        Self::with_undefined(values.iter().copied().map(Some).collect())
    }

    pub fn with_undefined(values: Vec<Option<f64>>) -> Self {
        Self {
            values,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ConvergenceDiagnostic for ScriptedDiagnostic {
    fn name(&self) -> &str {
        "scripted"
    }

    fn diagnose(&self, _merged: &MergedChainSet, _column: &str) -> Option<f64> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let index = call.min(self.values.len().saturating_sub(1));
        self.values.get(index).copied().flatten()
    }
}

pub fn stub_config(n_chain: usize) -> RunConfig {
    RunConfig {
        params: vec!["theta".to_string()],
        n_chain,
        n_adapt: 10,
        n_burn: 100,
        n_draw: 100,
        ..RunConfig::default()
    }
}

pub fn offset_inits(n_chain: usize) -> Vec<InitValues> {
    (0..n_chain)
        .map(|index| json!({ "offset": index as f64 * 100.0 }))
        .collect()
}

pub fn stub_request(inits: Vec<InitValues>) -> RunRequest {
    RunRequest {
        data: json!({ "y": [1.0, 2.0, 3.0] }),
        model: ModelSource::Inline("model { theta ~ dnorm(0, 1) }".to_string()),
        inits: InitStrategy::Fixed(inits),
    }
}

pub fn engine() -> (Arc<StubEngine>, Arc<dyn SamplingEngine>) {
    let stub = Arc::new(StubEngine::new());
    let shared: Arc<dyn SamplingEngine> = stub.clone();
    (stub, shared)
}

pub const NORMAL_MODEL: &str = "\
parameters:
  - name: mu
    mean: 2.0
    sd: 1.0
  - name: beta
    size: 2
    mean: -1.0
    sd: 0.5
";
