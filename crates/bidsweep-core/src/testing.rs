//! Mock capabilities shared by the unit tests in this crate.
//!
//! Every mock is cheaply cloneable: clone a handle before boxing it into a
//! `Sweep` and inspect the recorded calls afterwards.

use std::{
    collections::{BTreeMap, VecDeque},
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Duration, Utc};

use bidsweep_contracts::{
    decision::{DecisionRow, SubmissionLog},
    error::{SweepError, SweepResult},
    job::{JobFilter, JobRecord, JobRequest, JobStatus, SubmittedJob},
    outcome::{
        AncestorCheck, AncestorStatus, AncestorVerdict, Eligibility, GroupVerdict, RoleDecision,
        SelectionOutcome,
    },
    pipeline::PipelineConfig,
    registry::{RegisterOutcome, RegistryFile},
    subject::{ObjectInfo, SubjectListing},
};

use crate::{
    discovery::SCANS_SUFFIX,
    traits::{DecisionWriter, FileRegistry, JobBroker, ObjectIter, ObjectStore, SelectionEngine},
};

fn old_timestamp() -> DateTime<Utc> {
    Utc::now() - Duration::days(365)
}

// ── Object store ─────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockStore {
    objects: Arc<Mutex<BTreeMap<(String, String), (ObjectInfo, Vec<u8>)>>>,
    pub puts: Arc<Mutex<Vec<(String, String)>>>,
    /// Listing any prefix that starts with one of these fails.
    pub failing_prefixes: Arc<Mutex<Vec<String>>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, bucket: &str, key: &str, size: u64) {
        self.add_at(bucket, key, size, old_timestamp());
    }

    pub fn add_at(&self, bucket: &str, key: &str, size: u64, last_modified: DateTime<Utc>) {
        let info = ObjectInfo {
            key: key.to_string(),
            size,
            last_modified,
            etag: format!("etag-{size}"),
        };
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), (info, Vec::new()));
    }

    pub fn add_body(&self, bucket: &str, key: &str, body: &[u8]) {
        let info = ObjectInfo {
            key: key.to_string(),
            size: body.len() as u64,
            last_modified: old_timestamp(),
            etag: format!("etag-{}", body.len()),
        };
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), (info, body.to_vec()));
    }

    pub fn objects(&self, bucket: &str) -> Vec<ObjectInfo> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .filter(|((b, _), _)| b == bucket)
            .map(|(_, (info, _))| info.clone())
            .collect()
    }

    pub fn body(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .map(|(_, body)| body.clone())
    }
}

impl ObjectStore for MockStore {
    fn list<'a>(&'a self, bucket: &str, prefix: &str) -> ObjectIter<'a> {
        if self.failing_prefixes.lock().unwrap().iter().any(|p| prefix.starts_with(p.as_str())) {
            return Box::new(std::iter::once(Err(SweepError::StorageError {
                reason: format!("listing {prefix} failed"),
            })));
        }
        let found: Vec<SweepResult<ObjectInfo>> = self
            .objects(bucket)
            .into_iter()
            .filter(|o| o.key.starts_with(prefix))
            .map(Ok)
            .collect();
        Box::new(found.into_iter())
    }

    fn get(&self, bucket: &str, key: &str) -> SweepResult<Option<Vec<u8>>> {
        Ok(self.body(bucket, key))
    }

    fn put(&self, bucket: &str, key: &str, body: &[u8]) -> SweepResult<()> {
        self.add_body(bucket, key, body);
        self.puts.lock().unwrap().push((bucket.to_string(), key.to_string()));
        Ok(())
    }
}

// ── Registry ─────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockRegistry {
    pub files: Arc<Mutex<Vec<RegistryFile>>>,
    pub registrations: Arc<Mutex<Vec<String>>>,
}

impl MockRegistry {
    pub fn with_subjects(provider_id: u64, subjects: &[(u64, &str)]) -> Self {
        let registry = Self::default();
        for (id, name) in subjects {
            registry.files.lock().unwrap().push(RegistryFile {
                id: *id,
                name: name.to_string(),
                file_type: "BidsSubject".to_string(),
                provider_id,
                size: 1000,
            });
        }
        registry
    }
}

impl FileRegistry for MockRegistry {
    fn query_files(&self, provider_id: u64) -> SweepResult<Vec<RegistryFile>> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.provider_id == provider_id)
            .cloned()
            .collect())
    }

    fn register_upload(&self, name: &str, file_type: &str, provider_id: u64) -> SweepResult<RegisterOutcome> {
        self.registrations.lock().unwrap().push(name.to_string());
        let mut files = self.files.lock().unwrap();
        if files.iter().any(|f| f.name == name && f.file_type == file_type) {
            return Ok(RegisterOutcome::AlreadyExists);
        }
        let id = 50_000 + files.len() as u64;
        files.push(RegistryFile {
            id,
            name: name.to_string(),
            file_type: file_type.to_string(),
            provider_id,
            size: 0,
        });
        Ok(RegisterOutcome::Registered { id })
    }
}

// ── Broker ───────────────────────────────────────────────────────────────────

/// Records submissions and turns each into a queued job record, so a second
/// sweep sees the first sweep's jobs.
#[derive(Clone, Default)]
pub struct MockBroker {
    pub jobs: Arc<Mutex<Vec<JobRecord>>>,
    pub submissions: Arc<Mutex<Vec<JobRequest>>>,
    pub stale: Arc<Mutex<Vec<u64>>>,
    /// Errors returned by the next submit calls, in order.
    pub failures: Arc<Mutex<VecDeque<SweepError>>>,
}

impl JobBroker for MockBroker {
    fn submit_job(&self, request: &JobRequest) -> SweepResult<SubmittedJob> {
        self.submissions.lock().unwrap().push(request.clone());
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        let mut jobs = self.jobs.lock().unwrap();
        let id = 7_000 + jobs.len() as u64;
        jobs.push(JobRecord {
            id,
            tool_config_id: request.tool_config_id,
            results_provider_id: request.results_provider_id,
            status: JobStatus::Queued,
            input_file_ids: request.input_file_ids.clone(),
        });
        Ok(SubmittedJob {
            id,
            status: JobStatus::Queued,
        })
    }

    fn list_jobs(&self, filter: &JobFilter) -> SweepResult<Vec<JobRecord>> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .iter()
            .filter(|j| filter.admits(j))
            .cloned()
            .collect())
    }

    fn mark_file_stale(&self, file_id: u64) -> SweepResult<()> {
        self.stale.lock().unwrap().push(file_id);
        Ok(())
    }
}

// ── Engine ───────────────────────────────────────────────────────────────────

/// Groups are satisfied per `satisfied` (missing entries count as satisfied);
/// every non-scans file is selected.
#[derive(Clone)]
pub struct MockEngine {
    pub config: PipelineConfig,
    pub satisfied: Vec<bool>,
    pub ancestors_stable: bool,
    pub evaluations: Arc<Mutex<usize>>,
}

impl MockEngine {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            satisfied: Vec::new(),
            ancestors_stable: true,
            evaluations: Arc::new(Mutex::new(0)),
        }
    }
}

impl SelectionEngine for MockEngine {
    fn pipeline(&self, pipeline: &str) -> SweepResult<&PipelineConfig> {
        if pipeline == self.config.name {
            Ok(&self.config)
        } else {
            Err(SweepError::UnknownPipeline { name: pipeline.to_string() })
        }
    }

    fn evaluate(&self, _pipeline: &str, listing: &SubjectListing) -> SweepResult<Eligibility> {
        *self.evaluations.lock().unwrap() += 1;
        let groups: Vec<GroupVerdict> = self
            .config
            .groups
            .iter()
            .enumerate()
            .map(|(i, g)| GroupVerdict {
                group: g.name.clone(),
                satisfied: self.satisfied.get(i).copied().unwrap_or(true),
            })
            .collect();
        let eligible = groups.iter().any(|g| g.satisfied);
        let selected: Vec<_> = listing
            .files
            .iter()
            .filter(|f| !f.path.ends_with(SCANS_SUFFIX))
            .cloned()
            .collect();
        let roles = self
            .config
            .role_names()
            .into_iter()
            .map(|role| RoleDecision {
                role,
                outcome: if eligible { SelectionOutcome::Satisfied } else { SelectionOutcome::NoFile },
                tier: None,
                selected: selected.clone(),
            })
            .collect();
        Ok(Eligibility {
            eligible,
            groups,
            roles,
            selected: if eligible { selected } else { Vec::new() },
        })
    }

    fn check_ancestors(
        &self,
        _pipeline: &str,
        _listing: &SubjectListing,
        recorded: &BTreeMap<String, SubmissionLog>,
    ) -> SweepResult<AncestorVerdict> {
        let checks: Vec<AncestorCheck> = self
            .config
            .ancestors
            .iter()
            .map(|a| AncestorCheck {
                pipeline: a.clone(),
                status: if !recorded.contains_key(a) {
                    AncestorStatus::NoRecord
                } else if self.ancestors_stable {
                    AncestorStatus::Stable
                } else {
                    AncestorStatus::FilesChanged {
                        added: vec!["new.nii.gz".to_string()],
                        removed: Vec::new(),
                    }
                },
            })
            .collect();
        Ok(AncestorVerdict {
            stable: checks.iter().all(|c| c.status.is_stable()),
            checks,
        })
    }
}

// ── Trace ────────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockTrace {
    pub rows: Arc<Mutex<Vec<DecisionRow>>>,
    pub finalized: Arc<Mutex<Vec<String>>>,
}

impl DecisionWriter for MockTrace {
    fn write(&self, row: &DecisionRow) -> SweepResult<()> {
        self.rows.lock().unwrap().push(row.clone());
        Ok(())
    }

    fn finalize(&self, sweep_id: &str) -> SweepResult<()> {
        self.finalized.lock().unwrap().push(sweep_id.to_string());
        Ok(())
    }
}
