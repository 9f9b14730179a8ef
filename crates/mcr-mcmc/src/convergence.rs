use indexmap::IndexMap;
use mcr_core::{ErrorInfo, McrError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::merge::MergedChainSet;

/// Scalar convergence statistic computed per monitored column.
pub trait ConvergenceDiagnostic: Send + Sync {
    /// Name recorded in summaries.
    fn name(&self) -> &str;

    /// Diagnostic for one column, `None` when it is undefined.
    fn diagnose(&self, merged: &MergedChainSet, column: &str) -> Option<f64>;
}

/// Gelman-Rubin potential scale reduction factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GelmanRubin {
    /// Split every chain in half before comparing chains.
    pub split: bool,
}

impl Default for GelmanRubin {
    fn default() -> Self {
        Self { split: true }
    }
}

impl ConvergenceDiagnostic for GelmanRubin {
    fn name(&self) -> &str {
        if self.split {
            "split-psrf"
        } else {
            "psrf"
        }
    }

    fn diagnose(&self, merged: &MergedChainSet, column: &str) -> Option<f64> {
        let chains = merged.column_by_chain(column)?;
        let length = chains.iter().map(Vec::len).min()?;
        let segments: Vec<&[f64]> = if self.split {
            let half = length / 2;
            chains
                .iter()
                .flat_map(|chain| [&chain[..half], &chain[length - half..length]])
                .collect()
        } else {
            chains.iter().map(|chain| &chain[..length]).collect()
        };
        potential_scale_reduction(&segments)
    }
}

/// PSRF over equal-length segments; `None` without enough draws or variance.
pub fn potential_scale_reduction(segments: &[&[f64]]) -> Option<f64> {
    let m = segments.len();
    let n = segments.first().map(|segment| segment.len())?;
    if m < 2 || n < 2 || segments.iter().any(|segment| segment.len() != n) {
        return None;
    }
    let means: Vec<f64> = segments.iter().map(|segment| mean(segment)).collect();
    let within = segments
        .iter()
        .zip(&means)
        .map(|(segment, mu)| sample_variance(segment, *mu))
        .sum::<f64>()
        / m as f64;
    if !within.is_finite() || within <= 0.0 {
        return None;
    }
    let grand = mean(&means);
    let between = n as f64 * sample_variance(&means, grand);
    let n_f = n as f64;
    let pooled = (n_f - 1.0) / n_f * within + between / n_f;
    let rhat = (pooled / within).sqrt();
    rhat.is_finite().then_some(rhat)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_variance(values: &[f64], mean: f64) -> f64 {
    values.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / (values.len() as f64 - 1.0)
}

/// Convergence decision for one set of monitored parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceState {
    /// True when every defined diagnostic is at or below the threshold.
    pub converged: bool,
    /// Largest defined diagnostic.
    pub max_diagnostic: f64,
    /// Threshold the maximum was compared against.
    pub threshold: f64,
    /// Diagnostic per monitored column, in parameter order.
    pub diagnostics: IndexMap<String, Option<f64>>,
}

/// Computes the diagnostic over a parameter subset and classifies the state.
///
/// Undefined values are skipped. If every value is undefined the evaluation
/// fails instead of guessing a state.
pub fn evaluate(
    merged: &MergedChainSet,
    params: &[String],
    threshold: f64,
    diagnostic: &dyn ConvergenceDiagnostic,
) -> Result<ConvergenceState, McrError> {
    let mut diagnostics = IndexMap::new();
    for param in params {
        let columns = merged.parameter_columns(param);
        if columns.is_empty() {
            return Err(McrError::Config(
                ErrorInfo::new("unknown-parameter", "monitored parameter is not in the chains")
                    .with_context("param", param.clone()),
            ));
        }
        for column in columns {
            let value = diagnostic.diagnose(merged, &column);
            diagnostics.insert(column, value);
        }
    }
    let max_diagnostic = diagnostics
        .values()
        .flatten()
        .copied()
        .fold(None, |acc: Option<f64>, value| {
            Some(acc.map_or(value, |current| current.max(value)))
        })
        .ok_or_else(|| {
            McrError::Evaluation(
                ErrorInfo::new("diagnostic-undefined", "diagnostic undefined for every column")
                    .with_context("diagnostic", diagnostic.name())
                    .with_context("columns", diagnostics.len().to_string())
                    .with_hint("draw more iterations or check for constant parameters"),
            )
        })?;
    let converged = max_diagnostic <= threshold;
    debug!(
        diagnostic = diagnostic.name(),
        max_diagnostic, threshold, converged, "convergence evaluated"
    );
    Ok(ConvergenceState {
        converged,
        max_diagnostic,
        threshold,
        diagnostics,
    })
}
