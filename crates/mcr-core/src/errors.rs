//! Structured error types shared across mcr crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`McrError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (worker index, parameter names, sizes).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for mcr runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum McrError {
    /// Invalid run configuration (chain counts, parameter subsets, inits).
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Model or session construction failures reported by the engine.
    #[error("model error: {0}")]
    Model(ErrorInfo),
    /// Failures while advancing burn-in, drawing or merging chains.
    #[error("sampling error: {0}")]
    Sampling(ErrorInfo),
    /// The convergence diagnostic could not be evaluated.
    #[error("evaluation error: {0}")]
    Evaluation(ErrorInfo),
    /// Worker thread lifecycle and channel failures.
    #[error("worker error: {0}")]
    Worker(ErrorInfo),
    /// Serialization, schema and filesystem errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl McrError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            McrError::Config(info)
            | McrError::Model(info)
            | McrError::Sampling(info)
            | McrError::Evaluation(info)
            | McrError::Worker(info)
            | McrError::Serde(info) => info,
        }
    }

    /// Short family label used in logs and manifests.
    pub fn family(&self) -> &'static str {
        match self {
            McrError::Config(_) => "config",
            McrError::Model(_) => "model",
            McrError::Sampling(_) => "sampling",
            McrError::Evaluation(_) => "evaluation",
            McrError::Worker(_) => "worker",
            McrError::Serde(_) => "serde",
        }
    }

    /// Attaches an additional context entry to the wrapped payload.
    pub fn with_context(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        match self {
            McrError::Config(info) => McrError::Config(info.with_context(key, value)),
            McrError::Model(info) => McrError::Model(info.with_context(key, value)),
            McrError::Sampling(info) => McrError::Sampling(info.with_context(key, value)),
            McrError::Evaluation(info) => McrError::Evaluation(info.with_context(key, value)),
            McrError::Worker(info) => McrError::Worker(info.with_context(key, value)),
            McrError::Serde(info) => McrError::Serde(info.with_context(key, value)),
        }
    }
}
