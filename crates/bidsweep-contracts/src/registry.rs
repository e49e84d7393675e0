//! Remote file registry records.

use serde::{Deserialize, Serialize};

/// A file (or file collection) registered with the remote platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryFile {
    pub id: u64,
    pub name: String,
    pub file_type: String,
    pub provider_id: u64,
    pub size: u64,
}

/// Result of registering an uploaded object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegisterOutcome {
    Registered { id: u64 },
    AlreadyExists,
}

/// Find the first registry file with `name` and `file_type`.
pub fn find_file<'a>(files: &'a [RegistryFile], name: &str, file_type: &str) -> Option<&'a RegistryFile> {
    files
        .iter()
        .find(|f| f.name == name && f.file_type == file_type)
}
