//! Retained draws produced by a single worker session.

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, McrError};

/// Ordered sequence of retained parameter-vector draws from one session.
///
/// Each row is one retained iteration; columns follow [`Chain::variables`].
/// Vector-valued parameters expand into `name[i]` columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chain {
    variables: Vec<String>,
    draws: Vec<Vec<f64>>,
    start: usize,
    thin: usize,
}

impl Chain {
    /// Builds a chain, checking that every row matches the variable list.
    pub fn new(
        variables: Vec<String>,
        draws: Vec<Vec<f64>>,
        start: usize,
        thin: usize,
    ) -> Result<Self, McrError> {
        if thin == 0 {
            return Err(McrError::Sampling(ErrorInfo::new(
                "chain-thin",
                "thinning interval must be positive",
            )));
        }
        if let Some((row, draw)) = draws
            .iter()
            .enumerate()
            .find(|(_, draw)| draw.len() != variables.len())
        {
            return Err(McrError::Sampling(
                ErrorInfo::new("chain-width", "draw width does not match variable count")
                    .with_context("row", row.to_string())
                    .with_context("width", draw.len().to_string())
                    .with_context("variables", variables.len().to_string()),
            ));
        }
        Ok(Self {
            variables,
            draws,
            start,
            thin,
        })
    }

    /// Column names.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Retained draws, one row per kept iteration.
    pub fn draws(&self) -> &[Vec<f64>] {
        &self.draws
    }

    /// Number of retained draws.
    pub fn len(&self) -> usize {
        self.draws.len()
    }

    /// Returns true when no draws were retained.
    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    /// Session iteration of the first retained draw.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Thinning interval used when the draws were retained.
    pub fn thin(&self) -> usize {
        self.thin
    }

    /// Session iteration of the last retained draw.
    pub fn end(&self) -> usize {
        self.start + self.len().saturating_sub(1) * self.thin
    }

    /// Index of the column with the exact name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|variable| variable == name)
    }

    /// Values of one column in draw order.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let index = self.column_index(name)?;
        Some(self.draws.iter().map(|draw| draw[index]).collect())
    }

    /// Column names selected by a parameter name.
    ///
    /// `beta` selects a scalar column `beta` or every element `beta[..]` of a
    /// vector parameter.
    pub fn parameter_columns(&self, parameter: &str) -> Vec<&str> {
        self.variables
            .iter()
            .filter(|variable| column_matches(variable, parameter))
            .map(String::as_str)
            .collect()
    }
}

/// Returns true when a column belongs to the named parameter.
pub fn column_matches(column: &str, parameter: &str) -> bool {
    if column == parameter {
        return true;
    }
    column
        .strip_prefix(parameter)
        .is_some_and(|rest| rest.starts_with('['))
}
