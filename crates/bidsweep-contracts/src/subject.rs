//! Subject, session, and candidate-file types.
//!
//! A sweep evaluates one `SubjectListing` per subject/session. The listing is
//! built fresh from the object store each sweep and never cached across runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::qc::QcTable;

/// Metadata for one object returned by the object store listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Full object key, including the listing prefix.
    pub key: String,
    /// Object size in bytes.
    pub size: u64,
    /// Last modification time reported by the store.
    pub last_modified: DateTime<Utc>,
    /// Store-provided entity tag. Not treated as a content identity.
    pub etag: String,
}

/// Identifies one subject/session pair within a sweep.
///
/// `session` is empty for subjects stored without session folders.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubjectKey {
    /// BIDS subject label, e.g. `sub-0001`.
    pub subject: String,
    /// BIDS session label, e.g. `ses-V02`, or empty.
    pub session: String,
}

impl SubjectKey {
    pub fn new(subject: impl Into<String>, session: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            session: session.into(),
        }
    }

    /// `sub-0001_ses-V02`, or just the subject when there is no session.
    pub fn label(&self) -> String {
        if self.session.is_empty() {
            self.subject.clone()
        } else {
            format!("{}_{}", self.subject, self.session)
        }
    }
}

/// One storage object that may serve as a pipeline input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateFile {
    /// Key relative to the BIDS prefix, starting with the subject folder
    /// (e.g. `sub-0001/ses-V02/anat/sub-0001_ses-V02_T1w.nii.gz`).
    pub path: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub content_hash: String,
}

impl CandidateFile {
    /// The final path segment. Naming rules and QC lookups match on this.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// The path below the subject folder, as written into file lists.
    pub fn subject_relative_path(&self) -> &str {
        match self.path.split_once('/') {
            Some((_, rest)) => rest,
            None => &self.path,
        }
    }

    /// True when the file does not live inside any `ses-*` folder.
    ///
    /// Session-agnostic files (e.g. `sub-0001_sessions.tsv`) are rewritten
    /// whenever a session is added, so ancestor checks ignore their size.
    pub fn is_session_agnostic(&self) -> bool {
        let mut segments: Vec<&str> = self.path.split('/').collect();
        segments.pop();
        !segments.iter().any(|s| s.starts_with("ses-"))
    }
}

/// Everything the selection engine sees for one subject/session.
#[derive(Debug, Clone)]
pub struct SubjectListing {
    pub key: SubjectKey,
    /// Candidate files for this session plus session-agnostic subject files.
    pub files: Vec<CandidateFile>,
    /// The session's QC table, when a scans file exists and parsed.
    pub qc: Option<QcTable>,
}

impl SubjectListing {
    /// Look up a candidate by its path.
    pub fn find(&self, path: &str) -> Option<&CandidateFile> {
        self.files.iter().find(|f| f.path == path)
    }
}
