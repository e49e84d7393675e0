//! Pipeline catalog loading.
//!
//! Every `<name>.json` file in a configuration directory is one pipeline.
//! Each document is validated before it is resolved; any failure aborts the
//! load so no subject is evaluated under a partial catalog.

use std::path::Path;

use tracing::{debug, info};

use bidsweep_contracts::{
    error::{SweepError, SweepResult},
    pipeline::PipelineConfig,
};
use bidsweep_schema::engine::PipelineValidator;

use crate::document::PipelineDocument;

/// Validate and resolve one pipeline document.
///
/// `source` names the document in error messages.
pub fn load_document(validator: &PipelineValidator, source: &str, text: &str) -> SweepResult<PipelineConfig> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(|e| SweepError::ConfigError {
        reason: format!("{source}: invalid JSON: {e}"),
    })?;
    validator.validate(&value).into_result(source)?;

    let document: PipelineDocument = serde_json::from_value(value).map_err(|e| SweepError::ConfigError {
        reason: format!("{source}: {e}"),
    })?;
    document.resolve()
}

/// Load every pipeline document in `dir`, sorted by file name.
///
/// A document's `pipeline` field must match its file stem.
pub fn load_dir(dir: &Path) -> SweepResult<Vec<PipelineConfig>> {
    let entries = std::fs::read_dir(dir).map_err(|e| SweepError::ConfigError {
        reason: format!("failed to read pipeline directory '{}': {e}", dir.display()),
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| SweepError::ConfigError {
                reason: format!("failed to read pipeline directory '{}': {e}", dir.display()),
            })?
            .path();
        if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    let validator = PipelineValidator::new()?;
    let mut configs = Vec::with_capacity(paths.len());
    for path in paths {
        let source = path.display().to_string();
        let text = std::fs::read_to_string(&path).map_err(|e| SweepError::ConfigError {
            reason: format!("failed to read pipeline file '{source}': {e}"),
        })?;
        let config = load_document(&validator, &source, &text)?;

        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        if stem != config.name {
            return Err(SweepError::ConfigError {
                reason: format!("{source}: declares pipeline '{}' but is named '{stem}'", config.name),
            });
        }
        debug!(pipeline = %config.name, groups = config.groups.len(), "loaded pipeline");
        configs.push(config);
    }

    info!(dir = %dir.display(), pipelines = configs.len(), "pipeline catalog loaded");
    Ok(configs)
}
