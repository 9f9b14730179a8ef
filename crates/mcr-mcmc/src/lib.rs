#![deny(missing_docs)]

//! Parallel multi-chain MCMC run orchestration.
//!
//! A run spawns one worker per chain, builds a single-chain sampling session
//! on every worker, runs burn-in and draws, merges the chains in worker order
//! and, when enabled, keeps extending every chain until the convergence
//! diagnostic falls below the threshold or the iteration budget is spent.

/// YAML configuration schema and defaults.
pub mod config;
/// Convergence diagnostics and evaluation.
pub mod convergence;
/// Extension loop state machine and run accounting.
pub mod controller;
/// Deterministic seed derivation helpers.
pub mod determinism;
/// Per-worker initial value assignment.
pub mod inits;
/// Run manifest and output artefacts.
pub mod manifest;
/// Ordered collection of per-worker chains.
pub mod merge;
/// Reference random-walk Metropolis engine.
pub mod metropolis;
/// Worker pool lifecycle and round dispatch.
pub mod pool;
/// Public `run`/`debug` entry points.
pub mod runner;
/// Session construction and continuation on workers.
pub mod session;
/// Posterior summaries of a finished run.
pub mod summary;

pub use config::{OutputConfig, RunConfig, SeedPolicy};
pub use controller::{ExtensionBudget, ExtensionController, LoopState, RunAccounting};
pub use convergence::{ConvergenceDiagnostic, ConvergenceState, GelmanRubin};
pub use inits::{InitAssignment, InitGenerator, InitStrategy};
pub use manifest::{load_samples, write_outputs, RunManifest};
pub use merge::{merge, MergedChainSet};
pub use metropolis::MetropolisEngine;
pub use pool::WorkerPool;
pub use runner::{
    debug, execute, run, run_with_diagnostic, DebugReport, Execution, RunOutcome, RunRequest,
};
pub use summary::{ParameterSummary, RunSummary};
