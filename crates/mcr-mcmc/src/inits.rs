use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use mcr_core::{DataBlob, ErrorInfo, InitValues, McrError, RngHandle, WorkerId};

use crate::determinism;

type GeneratorFn = dyn Fn(&DataBlob, &mut RngHandle) -> Result<InitValues, McrError> + Send + Sync;

/// Shared initial-value generator called once per worker at session-build time.
#[derive(Clone)]
pub struct InitGenerator(Arc<GeneratorFn>);

impl InitGenerator {
    /// Wraps a generator function.
    pub fn new<F>(generator: F) -> Self
    where
        F: Fn(&DataBlob, &mut RngHandle) -> Result<InitValues, McrError> + Send + Sync + 'static,
    {
        Self(Arc::new(generator))
    }

    /// Produces a fresh set of initial values.
    pub fn generate(&self, data: &DataBlob, rng: &mut RngHandle) -> Result<InitValues, McrError> {
        (self.0)(data, rng)
    }
}

impl fmt::Debug for InitGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("InitGenerator(..)")
    }
}

/// Source of initial values for a run.
#[derive(Debug, Clone)]
pub enum InitStrategy {
    /// One value set per chain, assigned by worker index.
    Fixed(Vec<InitValues>),
    /// Each worker draws its own values.
    Random(InitGenerator),
}

impl InitStrategy {
    /// Returns true for per-worker generated inits.
    pub fn is_random(&self) -> bool {
        matches!(self, InitStrategy::Random(_))
    }

    /// Checks the strategy against the configured chain count and init mode.
    pub fn check(&self, n_chain: usize, random: bool) -> Result<(), McrError> {
        if self.is_random() != random {
            return Err(McrError::Config(
                ErrorInfo::new("init-mode", "init strategy does not match the `random` flag")
                    .with_context("random", random.to_string()),
            ));
        }
        match self {
            InitStrategy::Fixed(values) if values.len() != n_chain => Err(McrError::Config(
                ErrorInfo::new("init-count", "initial value list must have one entry per chain")
                    .with_context("inits", values.len().to_string())
                    .with_context("n_chain", n_chain.to_string()),
            )),
            _ => Ok(()),
        }
    }
}

/// Initial values travelling inside one worker's task descriptor.
#[derive(Debug, Clone)]
pub enum WorkerInits {
    /// Values taken from the fixed list.
    Fixed(InitValues),
    /// Values produced on the worker from its own seeded stream.
    Generate {
        /// Generator shared by all workers.
        generator: InitGenerator,
        /// Seed of this worker's generator stream.
        seed: u64,
    },
}

impl WorkerInits {
    /// Materialises the values on the worker.
    pub fn resolve(&self, data: &DataBlob) -> Result<InitValues, McrError> {
        match self {
            WorkerInits::Fixed(values) => Ok(values.clone()),
            WorkerInits::Generate { generator, seed } => {
                let mut rng = RngHandle::from_seed(*seed);
                generator.generate(data, &mut rng)
            }
        }
    }
}

/// Worker identity to init-list index table, built once before dispatch.
#[derive(Debug, Clone)]
pub struct InitAssignment {
    table: BTreeMap<WorkerId, usize>,
    strategy: InitStrategy,
    master_seed: u64,
}

impl InitAssignment {
    /// Maps the i-th worker to the i-th entry of the init list.
    pub fn build(
        workers: &[WorkerId],
        strategy: &InitStrategy,
        master_seed: u64,
    ) -> Result<Self, McrError> {
        let mut table = BTreeMap::new();
        for (index, worker) in workers.iter().enumerate() {
            if table.insert(*worker, index).is_some() {
                return Err(McrError::Worker(
                    ErrorInfo::new("worker-duplicate", "worker identity registered twice")
                        .with_context("worker", worker.to_string()),
                ));
            }
        }
        if let InitStrategy::Fixed(values) = strategy {
            if values.len() < workers.len() {
                return Err(McrError::Config(
                    ErrorInfo::new("init-count", "fewer initial value sets than workers")
                        .with_context("inits", values.len().to_string())
                        .with_context("workers", workers.len().to_string()),
                ));
            }
        }
        Ok(Self {
            table,
            strategy: strategy.clone(),
            master_seed,
        })
    }

    /// Init-list index assigned to a worker.
    pub fn index_of(&self, worker: WorkerId) -> Option<usize> {
        self.table.get(&worker).copied()
    }

    /// Task payload for one worker.
    pub fn for_worker(&self, worker: WorkerId) -> Result<WorkerInits, McrError> {
        match &self.strategy {
            InitStrategy::Random(generator) => Ok(WorkerInits::Generate {
                generator: generator.clone(),
                seed: determinism::init_seed(self.master_seed, worker),
            }),
            InitStrategy::Fixed(values) => {
                let index = self.index_of(worker).ok_or_else(|| {
                    McrError::Worker(
                        ErrorInfo::new("worker-unknown", "worker has no init assignment")
                            .with_context("worker", worker.to_string()),
                    )
                })?;
                Ok(WorkerInits::Fixed(values[index].clone()))
            }
        }
    }
}
