//! JSON-snapshot `JobBroker`.
//!
//! Submitted jobs start as `New` and never progress on their own; edit the
//! snapshot to simulate broker-side status changes between sweeps.

use std::{
    path::PathBuf,
    sync::{Mutex, MutexGuard},
};

use serde::{Deserialize, Serialize};
use tracing::info;

use bidsweep_contracts::{
    error::{SweepError, SweepResult},
    job::{JobFilter, JobRecord, JobRequest, JobStatus, SubmittedJob},
};
use bidsweep_core::traits::JobBroker;

use crate::{load_snapshot, save_snapshot};

/// Local I/O trouble is reported as the broker being unreachable.
fn broker_error(reason: String) -> SweepError {
    SweepError::BrokerUnavailable { reason }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct BrokerState {
    #[serde(default)]
    jobs: Vec<JobRecord>,
    /// Registry file ids marked stale, in call order.
    #[serde(default)]
    stale_files: Vec<u64>,
}

pub struct JsonJobBroker {
    path: PathBuf,
    state: Mutex<BrokerState>,
}

impl JsonJobBroker {
    /// Open the snapshot at `path`. A missing file is a broker with no jobs.
    pub fn open(path: impl Into<PathBuf>) -> SweepResult<Self> {
        let path = path.into();
        let state: BrokerState = load_snapshot(&path, broker_error)?;
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    fn lock(&self) -> SweepResult<MutexGuard<'_, BrokerState>> {
        self.state
            .lock()
            .map_err(|e| broker_error(format!("broker lock poisoned: {e}")))
    }

    /// File ids marked stale so far.
    pub fn stale_files(&self) -> SweepResult<Vec<u64>> {
        Ok(self.lock()?.stale_files.clone())
    }
}

impl JobBroker for JsonJobBroker {
    fn submit_job(&self, request: &JobRequest) -> SweepResult<SubmittedJob> {
        if request.input_file_ids.is_empty() {
            return Err(SweepError::SubmissionRejected {
                reason: format!("job for tool config {} has no input files", request.tool_config_id),
            });
        }

        let mut state = self.lock()?;
        let id = state.jobs.iter().map(|j| j.id).max().unwrap_or(0) + 1;
        let job = JobRecord {
            id,
            tool_config_id: request.tool_config_id,
            results_provider_id: request.results_provider_id,
            status: JobStatus::New,
            input_file_ids: request.input_file_ids.clone(),
        };
        state.jobs.push(job);
        save_snapshot(&self.path, &*state, broker_error)?;

        info!(id, tool_config_id = request.tool_config_id, description = %request.description, "job accepted");
        Ok(SubmittedJob {
            id,
            status: JobStatus::New,
        })
    }

    fn list_jobs(&self, filter: &JobFilter) -> SweepResult<Vec<JobRecord>> {
        Ok(self
            .lock()?
            .jobs
            .iter()
            .filter(|j| filter.admits(j))
            .cloned()
            .collect())
    }

    fn mark_file_stale(&self, file_id: u64) -> SweepResult<()> {
        let mut state = self.lock()?;
        state.stale_files.push(file_id);
        save_snapshot(&self.path, &*state, broker_error)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Map;

    use bidsweep_contracts::{
        error::SweepError,
        job::{JobFilter, JobRequest, JobStatus},
    };
    use bidsweep_core::traits::JobBroker;

    use super::JsonJobBroker;

    fn request(tool: u64, inputs: Vec<u64>) -> JobRequest {
        JobRequest {
            tool_config_id: tool,
            group_id: 1,
            user_id: 2,
            results_provider_id: 30,
            description: "mriqc sub-01_ses-V01".to_string(),
            input_file_ids: inputs,
            invoke_params: Map::new(),
        }
    }

    #[test]
    fn submitted_jobs_are_listed_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broker.json");

        let broker = JsonJobBroker::open(&path).unwrap();
        let first = broker.submit_job(&request(4331, vec![10, 11])).unwrap();
        let second = broker.submit_job(&request(5000, vec![10])).unwrap();
        assert_eq!((first.id, second.id), (1, 2));
        assert_eq!(first.status, JobStatus::New);

        let reopened = JsonJobBroker::open(&path).unwrap();
        let filter = JobFilter {
            tool_config_id: Some(4331),
            results_provider_id: Some(30),
        };
        let jobs = reopened.list_jobs(&filter).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].input_file_ids, vec![10, 11]);
        assert_eq!(reopened.list_jobs(&JobFilter::default()).unwrap().len(), 2);
    }

    #[test]
    fn job_without_inputs_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let broker = JsonJobBroker::open(dir.path().join("broker.json")).unwrap();
        let err = broker.submit_job(&request(4331, Vec::new())).unwrap_err();
        assert!(matches!(err, SweepError::SubmissionRejected { .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn stale_marks_are_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let broker = JsonJobBroker::open(dir.path().join("broker.json")).unwrap();
        broker.mark_file_stale(42).unwrap();
        assert_eq!(broker.stale_files().unwrap(), vec![42]);
    }
}
