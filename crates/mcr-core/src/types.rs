use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, McrError};

/// Input data handed to every session; structure is the engine's business.
pub type DataBlob = serde_json::Value;

/// Initial values for one chain; structure is the engine's business.
pub type InitValues = serde_json::Value;

/// Stable logical identity of a pool worker, assigned at spawn time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct WorkerId(usize);

impl WorkerId {
    /// Creates a new identifier from its raw index.
    pub fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    /// Returns the worker index (dispatch order).
    pub fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Reference to a model definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum ModelSource {
    /// Model definition stored in a file.
    File(PathBuf),
    /// Model definition supplied as text.
    Inline(String),
}

impl ModelSource {
    /// Returns the model definition text, reading the file when necessary.
    pub fn read_text(&self) -> Result<String, McrError> {
        match self {
            ModelSource::Inline(text) => Ok(text.clone()),
            ModelSource::File(path) => fs::read_to_string(path).map_err(|err| {
                McrError::Model(
                    ErrorInfo::new("model-read", err.to_string())
                        .with_context("path", path.display().to_string()),
                )
            }),
        }
    }

    /// Short label used in logs and summaries.
    pub fn label(&self) -> String {
        match self {
            ModelSource::File(path) => path.display().to_string(),
            ModelSource::Inline(_) => "<inline>".to_string(),
        }
    }
}
