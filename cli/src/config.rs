//! The `bidsweep run` configuration file.
//!
//! ```toml
//! pipelines_dir = "pipelines"
//! store_root = "data"
//! registry_snapshot = "state/registry.json"
//! broker_snapshot = "state/broker.json"
//! trace_dir = "traces"
//!
//! [sweep]
//! pipeline = "mriqc"
//! bids_bucket = "bids"
//! ...
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use bidsweep_contracts::{
    error::{SweepError, SweepResult},
    settings::SweepSettings,
};

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Directory of `<pipeline>.json` documents.
    pub pipelines_dir: PathBuf,
    /// Root of the local object store; each bucket is a subdirectory.
    pub store_root: PathBuf,
    pub registry_snapshot: PathBuf,
    pub broker_snapshot: PathBuf,
    /// Where trace JSON, CSV and HTML files are written.
    #[serde(default = "default_trace_dir")]
    pub trace_dir: PathBuf,
    pub sweep: SweepSettings,
}

fn default_trace_dir() -> PathBuf {
    PathBuf::from("traces")
}

impl RunConfig {
    /// Parse `s`, resolving relative paths against `base`.
    pub fn from_toml_str(s: &str, base: &Path) -> SweepResult<Self> {
        let mut config: RunConfig = toml::from_str(s).map_err(|e| SweepError::ConfigError {
            reason: format!("failed to parse sweep settings TOML: {e}"),
        })?;
        for path in [
            &mut config.pipelines_dir,
            &mut config.store_root,
            &mut config.registry_snapshot,
            &mut config.broker_snapshot,
            &mut config.trace_dir,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> SweepResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| SweepError::ConfigError {
            reason: format!("failed to read settings file '{}': {e}", path.display()),
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml_str(&contents, base)
    }
}
