use mcr_core::{Chain, ErrorInfo, McrError};
use serde::{Deserialize, Serialize};

/// Chains of the latest round, one per worker in worker order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedChainSet {
    chains: Vec<Chain>,
}

impl MergedChainSet {
    /// Chains in worker order.
    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    /// Number of chains.
    pub fn len(&self) -> usize {
        self.chains.len()
    }

    /// Returns true when the set holds no chains.
    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Column names shared by every chain.
    pub fn variables(&self) -> &[String] {
        self.chains
            .first()
            .map(|chain| chain.variables())
            .unwrap_or(&[])
    }

    /// Retained draws per chain (shortest chain when lengths differ).
    pub fn draws_per_chain(&self) -> usize {
        self.chains.iter().map(Chain::len).min().unwrap_or(0)
    }

    /// Column names selected by a parameter name.
    pub fn parameter_columns(&self, parameter: &str) -> Vec<String> {
        self.chains
            .first()
            .map(|chain| {
                chain
                    .parameter_columns(parameter)
                    .into_iter()
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Per-chain values of one column.
    pub fn column_by_chain(&self, column: &str) -> Option<Vec<Vec<f64>>> {
        self.chains.iter().map(|chain| chain.column(column)).collect()
    }

    /// Values of one column pooled across chains.
    pub fn pooled_column(&self, column: &str) -> Option<Vec<f64>> {
        self.column_by_chain(column)
            .map(|chains| chains.into_iter().flatten().collect())
    }
}

/// Collects per-worker chains, already in worker order, into one set.
pub fn merge(chains: Vec<Chain>, n_chain: usize) -> Result<MergedChainSet, McrError> {
    if chains.len() != n_chain {
        return Err(McrError::Sampling(
            ErrorInfo::new("merge-count", "merged chain count differs from n_chain")
                .with_context("chains", chains.len().to_string())
                .with_context("n_chain", n_chain.to_string()),
        ));
    }
    if let Some(first) = chains.first() {
        if let Some(index) = chains
            .iter()
            .position(|chain| chain.variables() != first.variables())
        {
            return Err(McrError::Sampling(
                ErrorInfo::new("merge-variables", "chains monitor different variables")
                    .with_context("chain", index.to_string()),
            ));
        }
    }
    Ok(MergedChainSet { chains })
}
