//! Sweep-wide settings and identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for one sweep run. Appears in every trace event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SweepId(pub uuid::Uuid);

impl SweepId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SweepId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SweepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// How aggressively failed jobs are resubmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum RerunLevel {
    /// Never resubmit once any job exists.
    Never = 0,
    /// Resubmit when every job failed for infrastructure reasons.
    Infrastructure = 1,
    /// Resubmit when every job failed for any reason.
    AnyFailure = 2,
}

impl TryFrom<u8> for RerunLevel {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            0 => Ok(RerunLevel::Never),
            1 => Ok(RerunLevel::Infrastructure),
            2 => Ok(RerunLevel::AnyFailure),
            other => Err(format!("rerun level must be 0, 1, or 2 (got {other})")),
        }
    }
}

impl From<RerunLevel> for u8 {
    fn from(level: RerunLevel) -> Self {
        level as u8
    }
}

impl Default for RerunLevel {
    fn default() -> Self {
        RerunLevel::Infrastructure
    }
}

/// Settings for one sweep over one pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepSettings {
    /// The pipeline to run.
    pub pipeline: String,
    pub bids_bucket: String,
    pub bids_prefix: String,
    pub derivatives_bucket: String,
    pub derivatives_prefix: String,
    /// Registry provider holding the BIDS subjects and file lists.
    pub bids_provider_id: u64,
    /// Human-readable provider name written into file lists.
    pub bids_provider_name: String,
    /// Registry provider that receives job results.
    pub results_provider_id: u64,
    pub user_id: u64,
    pub user_name: String,
    pub group_id: u64,
    pub group_name: String,
    #[serde(default)]
    pub rerun_level: RerunLevel,
    /// Delay before the single submission retry.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Prefix (in the BIDS bucket, visible to the registry) for generated
    /// file lists.
    #[serde(default = "default_file_list_prefix")]
    pub file_list_prefix: String,
    /// Prefix (in the derivatives bucket) for submission logs.
    #[serde(default = "default_submission_log_prefix")]
    pub submission_log_prefix: String,
    #[serde(default)]
    pub dry_run: bool,
}

fn default_retry_delay_ms() -> u64 {
    5_000
}

fn default_file_list_prefix() -> String {
    "cbrain_misc/cbrain_csvs".to_string()
}

fn default_submission_log_prefix() -> String {
    "cbrain_misc/submission_logs".to_string()
}
