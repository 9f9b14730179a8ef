#![deny(missing_docs)]
#![doc = "Core traits and data types for the mcr multi-chain run orchestrator."]

pub mod chain;
pub mod errors;
pub mod provenance;
pub mod rng;
mod types;

pub use chain::Chain;
pub use errors::{ErrorInfo, McrError};
pub use provenance::{RunProvenance, SchemaVersion};
pub use rng::{derive_substream_seed, RngHandle};
pub use types::{DataBlob, InitValues, ModelSource, WorkerId};

/// Everything an engine needs to construct one single-chain session.
#[derive(Debug, Clone, Copy)]
pub struct SessionSpec<'a> {
    /// Input data shared by every chain.
    pub data: &'a DataBlob,
    /// Model definition.
    pub model: &'a ModelSource,
    /// Initial values for this chain.
    pub inits: &'a InitValues,
    /// Chains built inside the session. Pool workers always use one.
    pub n_chain: usize,
    /// Adaptation iterations performed while building the session.
    pub n_adapt: usize,
    /// Seed for the session's private random stream.
    pub seed: u64,
}

/// Stateful handle to a constructed sampler.
///
/// Sessions resume from their internal sampler state on every call; nothing
/// restarts between burn-in and draw phases.
pub trait SamplingSession: Send {
    /// Advances the sampler without retaining draws.
    fn burn_in(&mut self, n_iter: usize) -> Result<(), McrError>;

    /// Advances the sampler by `n_iter` iterations, keeping every `thin`-th
    /// draw of the requested parameters.
    fn draw(&mut self, params: &[String], n_iter: usize, thin: usize) -> Result<Chain, McrError>;

    /// Iterations completed since construction (adaptation excluded).
    fn iteration(&self) -> usize;
}

/// Factory for sampling sessions, shared read-only across pool workers.
pub trait SamplingEngine: Send + Sync {
    /// Engine name recorded in manifests.
    fn name(&self) -> &str;

    /// Loads optional sampler extensions. Loading twice is a no-op.
    fn load_extensions(&self, modules: &[String]) -> Result<(), McrError>;

    /// Builds and adapts a new session.
    fn build(&self, spec: &SessionSpec<'_>) -> Result<Box<dyn SamplingSession>, McrError>;
}
