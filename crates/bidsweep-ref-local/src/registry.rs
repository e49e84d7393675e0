//! JSON-snapshot `FileRegistry`.
//!
//! The snapshot is a JSON array of `RegistryFile` records. It is read once at
//! open and rewritten after every registration.

use std::{
    path::PathBuf,
    sync::{Mutex, MutexGuard},
};

use tracing::info;

use bidsweep_contracts::{
    error::{SweepError, SweepResult},
    registry::{find_file, RegisterOutcome, RegistryFile},
};
use bidsweep_core::traits::FileRegistry;

use crate::{load_snapshot, save_snapshot};

fn registry_error(reason: String) -> SweepError {
    SweepError::RegistryError { reason }
}

pub struct JsonFileRegistry {
    path: PathBuf,
    files: Mutex<Vec<RegistryFile>>,
}

impl JsonFileRegistry {
    /// Open the snapshot at `path`. A missing file is an empty registry.
    pub fn open(path: impl Into<PathBuf>) -> SweepResult<Self> {
        let path = path.into();
        let files: Vec<RegistryFile> = load_snapshot(&path, registry_error)?;
        Ok(Self {
            path,
            files: Mutex::new(files),
        })
    }

    fn lock(&self) -> SweepResult<MutexGuard<'_, Vec<RegistryFile>>> {
        self.files
            .lock()
            .map_err(|e| registry_error(format!("registry lock poisoned: {e}")))
    }

    fn next_id(files: &[RegistryFile]) -> u64 {
        files.iter().map(|f| f.id).max().unwrap_or(0) + 1
    }

    /// Register a file with a known size, e.g. a `BidsSubject` folder.
    pub fn insert(&self, name: &str, file_type: &str, provider_id: u64, size: u64) -> SweepResult<u64> {
        let mut files = self.lock()?;
        if let Some(existing) = find_file(&files, name, file_type).filter(|f| f.provider_id == provider_id) {
            return Ok(existing.id);
        }
        let id = Self::next_id(&files);
        files.push(RegistryFile {
            id,
            name: name.to_string(),
            file_type: file_type.to_string(),
            provider_id,
            size,
        });
        save_snapshot(&self.path, &*files, registry_error)?;
        Ok(id)
    }
}

impl FileRegistry for JsonFileRegistry {
    fn query_files(&self, provider_id: u64) -> SweepResult<Vec<RegistryFile>> {
        Ok(self
            .lock()?
            .iter()
            .filter(|f| f.provider_id == provider_id)
            .cloned()
            .collect())
    }

    fn register_upload(&self, name: &str, file_type: &str, provider_id: u64) -> SweepResult<RegisterOutcome> {
        let mut files = self.lock()?;
        let exists = files
            .iter()
            .any(|f| f.name == name && f.file_type == file_type && f.provider_id == provider_id);
        if exists {
            return Ok(RegisterOutcome::AlreadyExists);
        }

        let id = Self::next_id(&files);
        files.push(RegistryFile {
            id,
            name: name.to_string(),
            file_type: file_type.to_string(),
            provider_id,
            size: 0,
        });
        save_snapshot(&self.path, &*files, registry_error)?;
        info!(id, name, file_type, provider_id, "upload registered");
        Ok(RegisterOutcome::Registered { id })
    }
}
