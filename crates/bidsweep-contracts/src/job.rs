//! Job broker records and the status taxonomy used for rerun decisions.
//!
//! Job records are read-only to the sweep: it lists and classifies them but
//! never edits or deletes them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Broker-reported lifecycle status of a job.
///
/// Statuses the sweep does not know are kept verbatim in `Other` and treated
/// as live, which blocks resubmission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    New,
    Queued,
    SettingUp,
    OnCpu,
    DataReady,
    PostProcessing,
    Completed,
    Terminated,
    FailedToSetup,
    FailedToPostProcess,
    FailedSetupPrerequisites,
    FailedPostProcessPrerequisites,
    Suspended,
    Failed,
    FailedOnCluster,
    Other(String),
}

/// Rerun tier of a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusTier {
    /// Infrastructure failures; rerun from level 1.
    Infrastructure,
    /// Processing-content failures; rerun from level 2.
    Processing,
    /// Queued, running, or completed. Never rerun.
    Live,
}

impl JobStatus {
    pub fn tier(&self) -> StatusTier {
        match self {
            JobStatus::Terminated
            | JobStatus::FailedToSetup
            | JobStatus::FailedToPostProcess
            | JobStatus::FailedSetupPrerequisites
            | JobStatus::FailedPostProcessPrerequisites => StatusTier::Infrastructure,
            JobStatus::Suspended | JobStatus::Failed | JobStatus::FailedOnCluster => {
                StatusTier::Processing
            }
            _ => StatusTier::Live,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::New => "New",
            JobStatus::Queued => "Queued",
            JobStatus::SettingUp => "Setting Up",
            JobStatus::OnCpu => "On CPU",
            JobStatus::DataReady => "Data Ready",
            JobStatus::PostProcessing => "Post Processing",
            JobStatus::Completed => "Completed",
            JobStatus::Terminated => "Terminated",
            JobStatus::FailedToSetup => "Failed To Setup",
            JobStatus::FailedToPostProcess => "Failed To PostProcess",
            JobStatus::FailedSetupPrerequisites => "Failed Setup Prerequisites",
            JobStatus::FailedPostProcessPrerequisites => "Failed PostProcess Prerequisites",
            JobStatus::Suspended => "Suspended",
            JobStatus::Failed => "Failed",
            JobStatus::FailedOnCluster => "Failed On Cluster",
            JobStatus::Other(s) => s,
        }
    }
}

impl From<String> for JobStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "New" => JobStatus::New,
            "Queued" => JobStatus::Queued,
            "Setting Up" => JobStatus::SettingUp,
            "On CPU" => JobStatus::OnCpu,
            "Data Ready" => JobStatus::DataReady,
            "Post Processing" => JobStatus::PostProcessing,
            "Completed" => JobStatus::Completed,
            "Terminated" => JobStatus::Terminated,
            "Failed To Setup" => JobStatus::FailedToSetup,
            "Failed To PostProcess" => JobStatus::FailedToPostProcess,
            "Failed Setup Prerequisites" => JobStatus::FailedSetupPrerequisites,
            "Failed PostProcess Prerequisites" => JobStatus::FailedPostProcessPrerequisites,
            "Suspended" => JobStatus::Suspended,
            "Failed" => JobStatus::Failed,
            "Failed On Cluster" => JobStatus::FailedOnCluster,
            _ => JobStatus::Other(s),
        }
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An existing job as reported by the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: u64,
    pub tool_config_id: u64,
    pub results_provider_id: u64,
    pub status: JobStatus,
    pub input_file_ids: Vec<u64>,
}

/// Narrows `JobBroker::list_jobs`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFilter {
    pub tool_config_id: Option<u64>,
    pub results_provider_id: Option<u64>,
}

impl JobFilter {
    pub fn admits(&self, job: &JobRecord) -> bool {
        self.tool_config_id.map_or(true, |t| t == job.tool_config_id)
            && self.results_provider_id.map_or(true, |p| p == job.results_provider_id)
    }
}

/// A job submission request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub tool_config_id: u64,
    pub group_id: u64,
    pub user_id: u64,
    pub results_provider_id: u64,
    pub description: String,
    pub input_file_ids: Vec<u64>,
    /// Fixed pipeline parameters merged with the per-subject input ids.
    pub invoke_params: serde_json::Map<String, serde_json::Value>,
}

/// The broker's acknowledgement of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedJob {
    pub id: u64,
    pub status: JobStatus,
}
