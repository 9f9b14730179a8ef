use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use mcr_core::{
    DataBlob, ErrorInfo, McrError, ModelSource, SamplingEngine, SessionSpec, WorkerId,
};
use serde::{Deserialize, Serialize};
use tracing::{info, info_span};

use crate::config::RunConfig;
use crate::controller::{ExtensionController, LoopState, RunAccounting};
use crate::convergence::{ConvergenceDiagnostic, ConvergenceState, GelmanRubin};
use crate::determinism;
use crate::inits::{InitAssignment, InitStrategy};
use crate::merge::{merge, MergedChainSet};
use crate::pool::WorkerPool;
use crate::session::SessionDriver;

/// Adaptation used by debug mode.
pub const DEBUG_ADAPT: usize = 1;

/// Inputs of a run besides its configuration.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Input data.
    pub data: DataBlob,
    /// Model definition.
    pub model: ModelSource,
    /// Initial values.
    pub inits: InitStrategy,
}

/// Final state of a sampled run handed to the output collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    /// Engine that produced the draws.
    pub engine: String,
    /// Master seed.
    pub seed: u64,
    /// RFC 3339 timestamp of the run start.
    pub started_at: String,
    /// RFC 3339 timestamp of the run end.
    pub finished_at: String,
    /// Latest merged chain set.
    pub merged: MergedChainSet,
    /// Convergence over the report parameters.
    pub convergence: ConvergenceState,
    /// Convergence over the extension parameters, when the loop was entered.
    pub extra_convergence: Option<ConvergenceState>,
    /// Diagnostic name.
    pub diagnostic: String,
    /// Iteration and time bookkeeping.
    pub accounting: RunAccounting,
    /// Terminal loop state.
    pub terminal: LoopState,
    /// States visited by the loop.
    pub transitions: Vec<LoopState>,
}

impl RunOutcome {
    /// Convergence flag of the report parameters.
    pub fn converged(&self) -> bool {
        self.convergence.converged
    }
}

/// Result of a debug-mode compile check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugReport {
    /// Engine used for the check.
    pub engine: String,
    /// Model label.
    pub model: String,
    /// Adaptation used while building.
    pub n_adapt: usize,
    /// True once the session was constructed.
    pub compiled: bool,
}

/// What a single entry-point call produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum Execution {
    /// Debug mode compile check.
    Debug(DebugReport),
    /// Full parallel run.
    Sampled(Box<RunOutcome>),
}

/// Entry point honouring the `debug` flag.
pub fn execute(
    engine: Arc<dyn SamplingEngine>,
    request: &RunRequest,
    config: &RunConfig,
) -> Result<Execution, McrError> {
    if config.debug {
        debug(engine.as_ref(), request, config).map(Execution::Debug)
    } else {
        run(engine, request, config).map(|outcome| Execution::Sampled(Box::new(outcome)))
    }
}

/// Runs every chain in parallel with the default diagnostic.
pub fn run(
    engine: Arc<dyn SamplingEngine>,
    request: &RunRequest,
    config: &RunConfig,
) -> Result<RunOutcome, McrError> {
    let diagnostic = GelmanRubin {
        split: config.split_rhat,
    };
    run_with_diagnostic(engine, request, config, &diagnostic)
}

/// Runs every chain in parallel, judging convergence with `diagnostic`.
pub fn run_with_diagnostic(
    engine: Arc<dyn SamplingEngine>,
    request: &RunRequest,
    config: &RunConfig,
    diagnostic: &dyn ConvergenceDiagnostic,
) -> Result<RunOutcome, McrError> {
    config.validate()?;
    request.inits.check(config.n_chain, config.random)?;
    let span = info_span!("run", engine = engine.name(), n_chain = config.n_chain);
    let _guard = span.enter();

    let started = Instant::now();
    let started_at = Utc::now().to_rfc3339();
    let pool = WorkerPool::acquire(config.n_chain, Arc::clone(&engine))?;
    let assignment = InitAssignment::build(
        &pool.worker_ids(),
        &request.inits,
        config.seed_policy.master_seed,
    )?;

    let mut driver = SessionDriver::new(&pool, config);
    let chains = driver.initial_round(
        config,
        Arc::new(request.data.clone()),
        Arc::new(request.model.clone()),
        &assignment,
    )?;
    let initial = merge(chains, config.n_chain)?;
    info!(
        draws_per_chain = initial.draws_per_chain(),
        "initial pass merged"
    );

    let controller = ExtensionController::new(config, diagnostic);
    let outcome = controller.drive(initial, &mut driver, started)?;
    drop(driver);
    pool.release();

    Ok(RunOutcome {
        engine: engine.name().to_string(),
        seed: config.seed_policy.master_seed,
        started_at,
        finished_at: Utc::now().to_rfc3339(),
        merged: outcome.merged,
        convergence: outcome.convergence,
        extra_convergence: outcome.extra_convergence,
        diagnostic: diagnostic.name().to_string(),
        accounting: outcome.accounting,
        terminal: outcome.terminal,
        transitions: outcome.transitions,
    })
}

/// Builds one single-chain session with minimal adaptation, without a pool.
pub fn debug(
    engine: &dyn SamplingEngine,
    request: &RunRequest,
    config: &RunConfig,
) -> Result<DebugReport, McrError> {
    let worker = WorkerId::from_raw(0);
    engine.load_extensions(&config.extensions)?;
    let inits = match &request.inits {
        InitStrategy::Fixed(values) => values.first().cloned().ok_or_else(|| {
            McrError::Config(ErrorInfo::new("init-count", "no initial values supplied"))
        })?,
        InitStrategy::Random(generator) => {
            let mut rng = mcr_core::RngHandle::from_seed(determinism::init_seed(
                config.seed_policy.master_seed,
                worker,
            ));
            generator.generate(&request.data, &mut rng)?
        }
    };
    let spec = SessionSpec {
        data: &request.data,
        model: &request.model,
        inits: &inits,
        n_chain: 1,
        n_adapt: DEBUG_ADAPT,
        seed: determinism::session_seed(config.seed_policy.master_seed, worker),
    };
    engine.build(&spec)?;
    info!(engine = engine.name(), model = %request.model.label(), "debug build succeeded");
    Ok(DebugReport {
        engine: engine.name().to_string(),
        model: request.model.label(),
        n_adapt: DEBUG_ADAPT,
        compiled: true,
    })
}
