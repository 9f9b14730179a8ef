use std::sync::Arc;

use mcr_core::{
    Chain, DataBlob, ErrorInfo, McrError, ModelSource, SamplingEngine, SamplingSession,
    SessionSpec, WorkerId,
};
use tracing::debug;

use crate::config::RunConfig;
use crate::controller::ExtensionRound;
use crate::determinism;
use crate::inits::{InitAssignment, WorkerInits};
use crate::merge::{merge, MergedChainSet};
use crate::pool::WorkerPool;

/// Task descriptor for the initial pass of one worker.
#[derive(Debug, Clone)]
pub struct BuildTask {
    /// Input data shared read-only by all workers.
    pub data: Arc<DataBlob>,
    /// Model definition.
    pub model: Arc<ModelSource>,
    /// This worker's initial values.
    pub inits: WorkerInits,
    /// Extensions loaded before the session is built.
    pub extensions: Arc<[String]>,
    /// Parameters retained in the draws.
    pub params: Arc<[String]>,
    /// Adaptation iterations.
    pub n_adapt: usize,
    /// Burn-in iterations.
    pub n_burn: usize,
    /// Iterations drawn.
    pub n_draw: usize,
    /// Thinning interval.
    pub n_thin: usize,
    /// Seed of the session's random stream.
    pub seed: u64,
}

/// Task descriptor for one extension round of one worker.
#[derive(Debug, Clone)]
pub struct ExtendTask {
    /// Extra burn-in iterations, skipped when zero.
    pub n_rburn: usize,
    /// Iterations drawn.
    pub n_draw: usize,
    /// Thinning interval.
    pub n_thin: usize,
    /// Parameters retained in the draws.
    pub params: Arc<[String]>,
}

/// Work sent to a pool worker.
#[derive(Debug, Clone)]
pub enum WorkerTask {
    /// Build the session and run the initial pass.
    Build(Box<BuildTask>),
    /// Continue the existing session.
    Extend(ExtendTask),
}

/// Builds a session, burns it in and returns it with the first draws.
pub fn initial_pass(
    engine: &dyn SamplingEngine,
    worker: WorkerId,
    task: &BuildTask,
) -> Result<(Box<dyn SamplingSession>, Chain), McrError> {
    engine.load_extensions(&task.extensions)?;
    let inits = task.inits.resolve(&task.data)?;
    let spec = SessionSpec {
        data: &task.data,
        model: &task.model,
        inits: &inits,
        n_chain: 1,
        n_adapt: task.n_adapt,
        seed: task.seed,
    };
    let mut session = engine.build(&spec)?;
    debug!(%worker, n_adapt = task.n_adapt, "session built");
    session.burn_in(task.n_burn)?;
    let chain = session.draw(&task.params, task.n_draw, task.n_thin)?;
    Ok((session, chain))
}

/// Continues a session and returns only the new round's draws.
pub fn extension_pass(
    session: &mut dyn SamplingSession,
    task: &ExtendTask,
) -> Result<Chain, McrError> {
    if task.n_rburn > 0 {
        session.burn_in(task.n_rburn)?;
    }
    session.draw(&task.params, task.n_draw, task.n_thin)
}

/// Runs one task against the worker-owned session slot.
pub(crate) fn execute(
    engine: &dyn SamplingEngine,
    slot: &mut Option<Box<dyn SamplingSession>>,
    worker: WorkerId,
    task: WorkerTask,
) -> Result<Chain, McrError> {
    let result = match task {
        WorkerTask::Build(task) => initial_pass(engine, worker, &task).map(|(session, chain)| {
            *slot = Some(session);
            chain
        }),
        WorkerTask::Extend(task) => match slot.as_mut() {
            Some(session) => extension_pass(session.as_mut(), &task),
            None => Err(McrError::Sampling(ErrorInfo::new(
                "session-missing",
                "extension requested before the session was built",
            ))),
        },
    };
    result.map_err(|err| err.with_context("worker", worker.index().to_string()))
}

/// Drives sampling rounds across the pool.
pub struct SessionDriver<'p> {
    pool: &'p WorkerPool,
    n_chain: usize,
    params: Arc<[String]>,
    extend: ExtendTask,
}

impl<'p> SessionDriver<'p> {
    /// Creates a driver for the given pool and configuration.
    pub fn new(pool: &'p WorkerPool, config: &RunConfig) -> Self {
        let params: Arc<[String]> = config.params.clone().into();
        Self {
            pool,
            n_chain: config.n_chain,
            extend: ExtendTask {
                n_rburn: config.n_rburn,
                n_draw: config.n_draw,
                n_thin: config.n_thin,
                params: Arc::clone(&params),
            },
            params,
        }
    }

    /// Initial pass on every worker; returns chains in worker order.
    pub fn initial_round(
        &self,
        config: &RunConfig,
        data: Arc<DataBlob>,
        model: Arc<ModelSource>,
        assignment: &InitAssignment,
    ) -> Result<Vec<Chain>, McrError> {
        let extensions: Arc<[String]> = config.extensions.clone().into();
        let master_seed = config.seed_policy.master_seed;
        let tasks = self
            .pool
            .worker_ids()
            .into_iter()
            .map(|worker| {
                Ok(WorkerTask::Build(Box::new(BuildTask {
                    data: Arc::clone(&data),
                    model: Arc::clone(&model),
                    inits: assignment.for_worker(worker)?,
                    extensions: Arc::clone(&extensions),
                    params: Arc::clone(&self.params),
                    n_adapt: config.n_adapt,
                    n_burn: config.n_burn,
                    n_draw: config.n_draw,
                    n_thin: config.n_thin,
                    seed: determinism::session_seed(master_seed, worker),
                })))
            })
            .collect::<Result<Vec<_>, McrError>>()?;
        self.pool.dispatch(tasks)
    }

    /// Extension pass on every worker; returns chains in worker order.
    pub fn extension_round(&self) -> Result<Vec<Chain>, McrError> {
        let tasks = vec![WorkerTask::Extend(self.extend.clone()); self.pool.len()];
        self.pool.dispatch(tasks)
    }
}

impl ExtensionRound for SessionDriver<'_> {
    fn extend(&mut self) -> Result<MergedChainSet, McrError> {
        let chains = self.extension_round()?;
        merge(chains, self.n_chain)
    }
}
