use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use mcr_core::{ErrorInfo, McrError, RunProvenance, SchemaVersion};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::config::RunConfig;
use crate::controller::{LoopState, RunAccounting};
use crate::merge::MergedChainSet;
use crate::runner::{RunOutcome, RunRequest};
use crate::summary::RunSummary;

/// Layout version written into every manifest.
pub const MANIFEST_SCHEMA: SchemaVersion = SchemaVersion::new(1, 0, 0);

/// Structured manifest describing a completed run directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    /// Manifest layout version.
    pub schema: SchemaVersion,
    /// Configuration used for the run.
    pub config: RunConfig,
    /// Engine that produced the draws.
    pub engine: String,
    /// Optional seed label captured from the configuration.
    pub seed_label: Option<String>,
    /// Hashes, seed and timestamps of the run.
    pub provenance: RunProvenance,
    /// Terminal loop state.
    pub terminal: LoopState,
    /// Convergence flag of the reported parameters.
    pub converged: bool,
    /// Iteration and time bookkeeping.
    pub accounting: RunAccounting,
    /// Files written next to the manifest (relative to the run directory).
    pub files: Vec<PathBuf>,
}

impl RunManifest {
    /// Writes the manifest to a JSON file.
    pub fn write(&self, path: &Path) -> Result<(), McrError> {
        write_json(path, self, "manifest")
    }

    /// Loads a manifest from disk, rejecting layouts this build cannot read.
    pub fn load(path: &Path) -> Result<Self, McrError> {
        let manifest: Self = read_json(path, "manifest")?;
        if !MANIFEST_SCHEMA.reads(&manifest.schema) {
            return Err(McrError::Serde(
                ErrorInfo::new("manifest-schema", "unsupported manifest schema version")
                    .with_context("path", path.display().to_string())
                    .with_context("found", manifest.schema.to_string())
                    .with_context("supported", MANIFEST_SCHEMA.to_string()),
            ));
        }
        Ok(manifest)
    }
}

/// Writes every artefact the configuration asks for and returns the manifest.
///
/// Nothing is written when no run directory is configured.
pub fn write_outputs(
    outcome: &RunOutcome,
    config: &RunConfig,
    request: &RunRequest,
) -> Result<Option<RunManifest>, McrError> {
    let Some(dir) = &config.output.run_directory else {
        return Ok(None);
    };
    let provenance = provenance(outcome, request)?;
    fs::create_dir_all(dir).map_err(|err| {
        McrError::Serde(
            ErrorInfo::new("output-mkdir", err.to_string())
                .with_context("path", dir.display().to_string()),
        )
    })?;

    let mut files = Vec::new();
    if config.report {
        let summary = RunSummary::from_outcome(outcome, config);
        let text_path = dir.join(&config.output.summary_file);
        fs::write(&text_path, summary.render_text()).map_err(|err| {
            McrError::Serde(
                ErrorInfo::new("summary-write", err.to_string())
                    .with_context("path", text_path.display().to_string()),
            )
        })?;
        files.push(config.output.summary_file.clone());
        let json_file = config.output.summary_file.with_extension("json");
        write_json(&dir.join(&json_file), &summary, "summary")?;
        files.push(json_file);
    }
    if config.save_object {
        write_json(
            &dir.join(&config.output.samples_file),
            &outcome.merged,
            "samples",
        )?;
        files.push(config.output.samples_file.clone());
    }
    if config.save_data {
        write_json(&dir.join(&config.output.data_file), &request.data, "data")?;
        files.push(config.output.data_file.clone());
    }

    let manifest = RunManifest {
        schema: MANIFEST_SCHEMA,
        config: config.clone(),
        engine: outcome.engine.clone(),
        seed_label: config.seed_policy.label.clone(),
        provenance,
        terminal: outcome.terminal,
        converged: outcome.converged(),
        accounting: outcome.accounting.clone(),
        files,
    };
    manifest.write(&dir.join(&config.output.manifest_file))?;
    info!(
        path = %dir.display(),
        files = manifest.files.len(),
        "run outputs written"
    );
    Ok(Some(manifest))
}

/// Loads a merged chain snapshot written by [`write_outputs`].
pub fn load_samples(path: &Path) -> Result<MergedChainSet, McrError> {
    read_json(path, "samples")
}

fn provenance(outcome: &RunOutcome, request: &RunRequest) -> Result<RunProvenance, McrError> {
    let data = serde_json::to_vec(&request.data).map_err(|err| {
        McrError::Serde(ErrorInfo::new("data-serialize", err.to_string()))
    })?;
    let model = request.model.read_text()?;
    let mut tool_versions = BTreeMap::new();
    tool_versions.insert(
        "mcr-mcmc".to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    );
    tool_versions.insert("engine".to_string(), outcome.engine.clone());
    Ok(RunProvenance {
        data_hash: sha256_hex(&data),
        model_hash: sha256_hex(model.as_bytes()),
        seed: outcome.seed,
        started_at: outcome.started_at.clone(),
        created_at: Utc::now().to_rfc3339(),
        tool_versions,
    })
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

fn write_json<T: Serialize>(path: &Path, value: &T, kind: &str) -> Result<(), McrError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| {
            McrError::Serde(
                ErrorInfo::new(format!("{kind}-mkdir"), err.to_string())
                    .with_context("path", parent.display().to_string()),
            )
        })?;
    }
    let json = serde_json::to_string_pretty(value).map_err(|err| {
        McrError::Serde(
            ErrorInfo::new(format!("{kind}-serialize"), err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })?;
    fs::write(path, json).map_err(|err| {
        McrError::Serde(
            ErrorInfo::new(format!("{kind}-write"), err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path, kind: &str) -> Result<T, McrError> {
    let contents = fs::read_to_string(path).map_err(|err| {
        McrError::Serde(
            ErrorInfo::new(format!("{kind}-read"), err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })?;
    serde_json::from_str(&contents).map_err(|err| {
        McrError::Serde(
            ErrorInfo::new(format!("{kind}-parse"), err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })
}
