//! Per-subject decision rows and submission logs.
//!
//! `DecisionRow` is what the trace writer appends: exactly one per
//! subject/session per sweep, whether or not a job was submitted.
//! `SubmissionLog` is the durable record of what a submitted job consumed,
//! read back later by downstream pipelines' ancestor checks.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{outcome::SelectionOutcome, subject::SubjectKey};

/// Why a subject was not processed this sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkipReason {
    /// Present in storage but not registered as a subject in the registry.
    NotRegistered,
    /// Pipeline outputs already exist in storage.
    DerivativesFound,
    /// Existing job records block resubmission at the configured rerun level.
    ExistingJobs,
    /// No requirement group is satisfied.
    RequirementsNotMet,
    /// Selected files were modified too recently.
    FilesTooRecent,
    /// An ancestor pipeline's recorded inputs differ from today's selection.
    AncestorDrift,
    /// A registry-side input could not be resolved.
    MissingExternalRequirement,
    /// The broker refused the job; the sweep stopped at this subject.
    SubmissionFailed,
}

impl SkipReason {
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::NotRegistered => "Not Registered",
            SkipReason::DerivativesFound => "Derivatives Found",
            SkipReason::ExistingJobs => "Existing Jobs",
            SkipReason::RequirementsNotMet => "Requirements Not Met",
            SkipReason::FilesTooRecent => "Files Too Recent",
            SkipReason::AncestorDrift => "Ancestor Drift",
            SkipReason::MissingExternalRequirement => "Missing External Requirement",
            SkipReason::SubmissionFailed => "Submission Failed",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The final disposition of one subject/session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disposition {
    Submitted { job_id: u64 },
    /// Eligible, but the sweep ran in dry-run mode.
    WouldSubmit,
    NoProcessing { reason: SkipReason },
}

impl Disposition {
    pub fn is_submitted(&self) -> bool {
        matches!(self, Disposition::Submitted { .. })
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disposition::Submitted { job_id } => write!(f, "Submitted ({job_id})"),
            Disposition::WouldSubmit => f.write_str("Would Submit"),
            Disposition::NoProcessing { reason } => write!(f, "No Processing: {reason}"),
        }
    }
}

/// Resolution state of an external requirement column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExternalStatus {
    Satisfied,
    NoFile,
}

impl ExternalStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ExternalStatus::Satisfied => "Satisfied",
            ExternalStatus::NoFile => "No File",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCell {
    pub role: String,
    /// `None` renders as "Not Evaluated".
    pub outcome: Option<SelectionOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalCell {
    pub name: String,
    pub status: Option<ExternalStatus>,
}

/// One row of the decision trace.
///
/// Built fresh for each subject/session and appended once; never modified
/// after it is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRow {
    pub subject: String,
    pub pipeline: String,
    pub session: String,
    pub derivatives_found: Option<bool>,
    /// Example job status from the rerun classifier.
    pub cbrain_status: Option<String>,
    pub scans_tsv_present: Option<bool>,
    pub roles: Vec<RoleCell>,
    pub external: Vec<ExternalCell>,
    /// Ancestor consistency: `Some(true)` stable, `Some(false)` drifted.
    pub ancestor_files: Option<bool>,
    pub disposition: Disposition,
    pub recorded_at: DateTime<Utc>,
}

impl DecisionRow {
    /// A row with every column "Not Evaluated".
    ///
    /// `disposition` is the caller's final answer; the columns are filled in
    /// by whichever stages actually ran.
    pub fn not_evaluated(
        key: &SubjectKey,
        pipeline: &str,
        roles: &[String],
        external: &[String],
        disposition: Disposition,
    ) -> Self {
        Self {
            subject: key.subject.clone(),
            pipeline: pipeline.to_string(),
            session: key.session.clone(),
            derivatives_found: None,
            cbrain_status: None,
            scans_tsv_present: None,
            roles: roles
                .iter()
                .map(|r| RoleCell { role: r.clone(), outcome: None })
                .collect(),
            external: external
                .iter()
                .map(|n| ExternalCell { name: n.clone(), status: None })
                .collect(),
            ancestor_files: None,
            disposition,
            recorded_at: Utc::now(),
        }
    }

    pub fn key(&self) -> SubjectKey {
        SubjectKey::new(self.subject.clone(), self.session.clone())
    }
}

/// One input recorded in a submission log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedFile {
    pub path: String,
    pub size: u64,
    pub etag: String,
}

/// The persisted selection behind one submitted job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionLog {
    pub pipeline: String,
    pub subject: String,
    pub session: String,
    pub job_id: u64,
    pub submitted_at: DateTime<Utc>,
    pub files: Vec<LoggedFile>,
}

impl SubmissionLog {
    /// Object key of the log for `pipeline` and `key` below `prefix`.
    pub fn object_key(prefix: &str, pipeline: &str, key: &SubjectKey) -> String {
        format!("{}/{}/{}.json", prefix.trim_end_matches('/'), pipeline, key.label())
    }
}

/// Counts reported at the end of a sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSummary {
    pub evaluated: usize,
    pub submitted: usize,
    pub would_submit: usize,
    pub skipped: usize,
}
