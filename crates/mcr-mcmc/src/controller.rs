use std::time::Instant;

use mcr_core::McrError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::RunConfig;
use crate::convergence::{evaluate, ConvergenceDiagnostic, ConvergenceState};
use crate::merge::MergedChainSet;

/// States of the extension loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoopState {
    /// The first pass already met the threshold.
    InitialConverged,
    /// The first pass did not meet the threshold.
    InitialNotConverged,
    /// Extension rounds are running.
    Extending,
    /// Not converged and another round would exceed `n_max`.
    BudgetExhausted,
    /// Finished, converged or extension disabled.
    Done,
}

/// Cumulative bookkeeping of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunAccounting {
    /// Wall-clock seconds since the run started.
    pub elapsed_secs: f64,
    /// Iterations charged against `n_max`: `n_burn + n_draw` when no extension
    /// runs, otherwise `n_burn` plus the cost of every extension round.
    pub n_total: usize,
    /// Iterations spent in extension rounds.
    pub n_extra: usize,
    /// Draw iterations across all rounds.
    pub n_draw_total: usize,
    /// Extension rounds completed.
    pub rounds: usize,
}

impl RunAccounting {
    fn initial(budget: &ExtensionBudget, started: Instant) -> Self {
        Self {
            elapsed_secs: started.elapsed().as_secs_f64(),
            n_total: budget.n_burn + budget.n_draw,
            n_extra: 0,
            n_draw_total: budget.n_draw,
            rounds: 0,
        }
    }

    /// Rebases the total on the burn-in once the loop starts extending.
    fn enter_extension(&mut self, budget: &ExtensionBudget) {
        self.n_total = budget.n_burn;
    }

    fn record_round(&mut self, budget: &ExtensionBudget, started: Instant) {
        self.n_extra += budget.round_cost();
        self.n_draw_total += budget.n_draw;
        self.n_total += budget.round_cost();
        self.rounds += 1;
        self.elapsed_secs = started.elapsed().as_secs_f64();
    }
}

/// Iteration costs and the cap for extension rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionBudget {
    /// Burn-in of the initial pass.
    pub n_burn: usize,
    /// Draws per round.
    pub n_draw: usize,
    /// Extra burn-in per extension round.
    pub n_rburn: usize,
    /// Total iteration cap.
    pub n_max: usize,
}

impl ExtensionBudget {
    /// Budget resolved from a configuration (with the default `n_max`).
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            n_burn: config.n_burn,
            n_draw: config.n_draw,
            n_rburn: config.n_rburn,
            n_max: config.n_max(),
        }
    }

    /// Iterations consumed by one extension round.
    pub fn round_cost(&self) -> usize {
        self.n_rburn + self.n_draw
    }

    /// True when one more round keeps the total within `n_max` (inclusive).
    pub fn next_round_fits(&self, n_total: usize) -> bool {
        n_total + self.round_cost() <= self.n_max
    }
}

/// Source of fresh merged chain sets for extension rounds.
pub trait ExtensionRound {
    /// Runs one more round on every chain and merges the new draws.
    fn extend(&mut self) -> Result<MergedChainSet, McrError>;
}

/// Final state produced by the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopOutcome {
    /// Latest merged chain set.
    pub merged: MergedChainSet,
    /// Convergence over the report parameters for the latest set.
    pub convergence: ConvergenceState,
    /// Convergence over the extension parameters, when the loop was entered.
    pub extra_convergence: Option<ConvergenceState>,
    /// Accounting at termination.
    pub accounting: RunAccounting,
    /// Terminal state (`Done` or `BudgetExhausted`).
    pub terminal: LoopState,
    /// Every state visited, in order.
    pub transitions: Vec<LoopState>,
}

/// Convergence-driven extension loop.
pub struct ExtensionController<'a> {
    budget: ExtensionBudget,
    extra: bool,
    threshold: f64,
    params_report: &'a [String],
    params_extra: &'a [String],
    diagnostic: &'a dyn ConvergenceDiagnostic,
}

impl<'a> ExtensionController<'a> {
    /// Controller configured from a run configuration.
    pub fn new(config: &'a RunConfig, diagnostic: &'a dyn ConvergenceDiagnostic) -> Self {
        Self {
            budget: ExtensionBudget::from_config(config),
            extra: config.extra,
            threshold: config.rhat_max,
            params_report: config.params_report(),
            params_extra: config.params_extra(),
            diagnostic,
        }
    }

    /// Budget in use.
    pub fn budget(&self) -> &ExtensionBudget {
        &self.budget
    }

    /// Evaluates the first pass and extends until converged or out of budget.
    pub fn drive<R: ExtensionRound + ?Sized>(
        &self,
        initial: MergedChainSet,
        rounds: &mut R,
        started: Instant,
    ) -> Result<LoopOutcome, McrError> {
        let mut accounting = RunAccounting::initial(&self.budget, started);
        let initial_state = self.evaluate(&initial, self.params_report)?;
        let mut transitions = vec![if initial_state.converged {
            LoopState::InitialConverged
        } else {
            LoopState::InitialNotConverged
        }];

        if initial_state.converged || !self.extra {
            info!(
                converged = initial_state.converged,
                max_diagnostic = initial_state.max_diagnostic,
                n_total = accounting.n_total,
                "no extension rounds"
            );
            transitions.push(LoopState::Done);
            return Ok(LoopOutcome {
                merged: initial,
                convergence: initial_state,
                extra_convergence: None,
                accounting,
                terminal: LoopState::Done,
                transitions,
            });
        }

        transitions.push(LoopState::Extending);
        accounting.enter_extension(&self.budget);
        info!(
            n_max = self.budget.n_max,
            n_total = accounting.n_total,
            "extending sampling"
        );
        let mut merged = initial;
        let mut extra_state = if self.params_extra == self.params_report {
            initial_state
        } else {
            self.evaluate(&merged, self.params_extra)?
        };

        let terminal = loop {
            let converged = extra_state.converged;
            let fits = self.budget.next_round_fits(accounting.n_total);
            if converged {
                break LoopState::Done;
            }
            if !fits {
                break LoopState::BudgetExhausted;
            }
            merged = rounds.extend()?;
            extra_state = self.evaluate(&merged, self.params_extra)?;
            accounting.record_round(&self.budget, started);
            debug!(
                round = accounting.rounds,
                n_total = accounting.n_total,
                max_diagnostic = extra_state.max_diagnostic,
                "extension round complete"
            );
        };
        accounting.elapsed_secs = started.elapsed().as_secs_f64();
        transitions.push(terminal);
        info!(
            ?terminal,
            rounds = accounting.rounds,
            n_total = accounting.n_total,
            max_diagnostic = extra_state.max_diagnostic,
            "extension loop finished"
        );

        let convergence = if self.params_extra == self.params_report {
            extra_state.clone()
        } else {
            self.evaluate(&merged, self.params_report)?
        };
        Ok(LoopOutcome {
            merged,
            convergence,
            extra_convergence: Some(extra_state),
            accounting,
            terminal,
            transitions,
        })
    }

    fn evaluate(
        &self,
        merged: &MergedChainSet,
        params: &[String],
    ) -> Result<ConvergenceState, McrError> {
        evaluate(merged, params, self.threshold, self.diagnostic)
    }
}
