use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::config::RunConfig;
use crate::controller::LoopState;
use crate::runner::RunOutcome;

/// Posterior summary of one reported column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSummary {
    /// Column name.
    pub column: String,
    /// Mean across all chains.
    pub mean: f64,
    /// Standard deviation across all chains.
    pub sd: f64,
    /// 2.5% quantile.
    pub q025: f64,
    /// Median.
    pub q50: f64,
    /// 97.5% quantile.
    pub q975: f64,
    /// Convergence diagnostic, when defined.
    pub diagnostic: Option<f64>,
}

impl ParameterSummary {
    /// Summarises pooled draws of one column.
    pub fn from_draws(column: &str, draws: &[f64], diagnostic: Option<f64>) -> Self {
        let mut sorted = draws.to_vec();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let sd = if sorted.len() > 1 {
            (sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        } else {
            0.0
        };
        Self {
            column: column.to_string(),
            mean,
            sd,
            q025: quantile(&sorted, 0.025),
            q50: quantile(&sorted, 0.5),
            q975: quantile(&sorted, 0.975),
            diagnostic,
        }
    }
}

/// Linear-interpolation quantile of sorted values.
pub fn quantile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        len => {
            let h = (len - 1) as f64 * p.clamp(0.0, 1.0);
            let lo = h.floor() as usize;
            let hi = (lo + 1).min(len - 1);
            sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
        }
    }
}

/// Report of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Run name.
    pub name: Option<String>,
    /// Run description.
    pub description: Option<String>,
    /// Engine that produced the draws.
    pub engine: String,
    /// Diagnostic used for convergence.
    pub diagnostic: String,
    /// RFC 3339 start timestamp.
    pub started_at: String,
    /// RFC 3339 end timestamp.
    pub finished_at: String,
    /// Wall-clock seconds.
    pub elapsed_secs: f64,
    /// Number of chains.
    pub n_chain: usize,
    /// Burn-in plus draw iterations per chain.
    pub n_total: usize,
    /// Iterations spent in extension rounds.
    pub n_extra: usize,
    /// Draw iterations per chain across all rounds.
    pub n_draw_total: usize,
    /// Retained draws per chain in the final set.
    pub draws_per_chain: usize,
    /// Retained draws across all chains in the final set.
    pub n_samples: usize,
    /// Extension rounds completed.
    pub rounds: usize,
    /// Terminal loop state.
    pub terminal: LoopState,
    /// Convergence flag for the reported parameters.
    pub converged: bool,
    /// Largest defined diagnostic of the reported parameters.
    pub max_diagnostic: f64,
    /// Convergence threshold.
    pub threshold: f64,
    /// Reported columns.
    pub parameters: Vec<ParameterSummary>,
}

impl RunSummary {
    /// Builds the summary of the report parameters of a finished run.
    pub fn from_outcome(outcome: &RunOutcome, config: &RunConfig) -> Self {
        let merged = &outcome.merged;
        let parameters = config
            .params_report()
            .iter()
            .flat_map(|param| merged.parameter_columns(param))
            .filter_map(|column| {
                let draws = merged.pooled_column(&column)?;
                let diagnostic = outcome.convergence.diagnostics.get(&column).copied().flatten();
                Some(ParameterSummary::from_draws(&column, &draws, diagnostic))
            })
            .collect();
        let draws_per_chain = merged.draws_per_chain();
        Self {
            name: config.name.clone(),
            description: config.description.clone(),
            engine: outcome.engine.clone(),
            diagnostic: outcome.diagnostic.clone(),
            started_at: outcome.started_at.clone(),
            finished_at: outcome.finished_at.clone(),
            elapsed_secs: outcome.accounting.elapsed_secs,
            n_chain: merged.len(),
            n_total: outcome.accounting.n_total,
            n_extra: outcome.accounting.n_extra,
            n_draw_total: outcome.accounting.n_draw_total,
            draws_per_chain,
            n_samples: draws_per_chain * merged.len(),
            rounds: outcome.accounting.rounds,
            terminal: outcome.terminal,
            converged: outcome.convergence.converged,
            max_diagnostic: outcome.convergence.max_diagnostic,
            threshold: outcome.convergence.threshold,
            parameters,
        }
    }

    /// Plain-text rendering written to `summary.txt`.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "run: {}", self.name.as_deref().unwrap_or("unnamed"));
        if let Some(description) = &self.description {
            let _ = writeln!(out, "description: {description}");
        }
        let _ = writeln!(out, "engine: {}", self.engine);
        let _ = writeln!(out, "started: {}", self.started_at);
        let _ = writeln!(out, "finished: {}", self.finished_at);
        let _ = writeln!(out, "elapsed: {:.3}s", self.elapsed_secs);
        let _ = writeln!(
            out,
            "chains: {} | iterations: {} (extra {}) | samples: {} ({} per chain)",
            self.n_chain, self.n_total, self.n_extra, self.n_samples, self.draws_per_chain
        );
        let _ = writeln!(
            out,
            "convergence: {} | max {} = {:.4} (threshold {}) | rounds: {} | state: {:?}",
            if self.converged { "yes" } else { "no" },
            self.diagnostic,
            self.max_diagnostic,
            self.threshold,
            self.rounds,
            self.terminal
        );
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{:<16} {:>10} {:>10} {:>10} {:>10} {:>10} {:>8}",
            "parameter", "mean", "sd", "2.5%", "50%", "97.5%", "rhat"
        );
        for param in &self.parameters {
            let rhat = param
                .diagnostic
                .map_or_else(|| "-".to_string(), |value| format!("{value:.3}"));
            let _ = writeln!(
                out,
                "{:<16} {:>10.4} {:>10.4} {:>10.4} {:>10.4} {:>10.4} {:>8}",
                param.column, param.mean, param.sd, param.q025, param.q50, param.q975, rhat
            );
        }
        out
    }
}
