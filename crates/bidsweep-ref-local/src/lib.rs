//! # bidsweep-ref-local
//!
//! Reference adapters that let a sweep run against the local filesystem.
//!
//! - [`LocalObjectStore`]: each bucket is a subdirectory of a root
//!   directory; object keys are `/`-separated paths below it.
//! - [`JsonFileRegistry`]: the registry catalog as a JSON snapshot file.
//! - [`JsonJobBroker`]: submitted jobs and stale marks as a JSON snapshot file.
//!
//! None of these contact a remote system. They exist for local trial runs,
//! for reproducing a sweep from exported state, and for end-to-end tests.

pub mod broker;
pub mod fs_store;
pub mod registry;

pub use broker::JsonJobBroker;
pub use fs_store::LocalObjectStore;
pub use registry::JsonFileRegistry;

use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

use bidsweep_contracts::error::SweepError;

/// Read a JSON snapshot, or `T::default()` when the file does not exist.
pub(crate) fn load_snapshot<T, E>(path: &Path, to_error: E) -> Result<T, SweepError>
where
    T: DeserializeOwned + Default,
    E: Fn(String) -> SweepError,
{
    match std::fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map_err(|e| to_error(format!("invalid snapshot '{}': {e}", path.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(to_error(format!("failed to read '{}': {e}", path.display()))),
    }
}

/// Write a JSON snapshot, creating parent directories as needed.
pub(crate) fn save_snapshot<T, E>(path: &Path, value: &T, to_error: E) -> Result<(), SweepError>
where
    T: Serialize,
    E: Fn(String) -> SweepError,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| to_error(format!("failed to create '{}': {e}", parent.display())))?;
    }
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| to_error(format!("failed to serialize snapshot: {e}")))?;
    std::fs::write(path, bytes).map_err(|e| to_error(format!("failed to write '{}': {e}", path.display())))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
