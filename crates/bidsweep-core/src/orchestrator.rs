//! The sweep orchestrator: one pass over every subject/session of a dataset.
//!
//! For each subject/session the sweep runs a fixed sequence of gates:
//!
//!   Registered → Derivatives → Existing jobs → Eligibility → File age
//!     → Ancestors → External inputs → [File list + Submit] → Trace
//!
//! The first gate that fails decides the subject's `NoProcessing` reason.
//! Every subject produces exactly one trace row, whichever gate stopped it.
//! A failed submission is recorded for its subject before the sweep aborts.
//! Job records and registry files are fetched once up front and treated as an
//! immutable snapshot for the whole sweep.

use std::{collections::BTreeMap, thread, time::Duration};

use chrono::Utc;
use tracing::{debug, info, warn};

use bidsweep_contracts::{
    decision::{
        DecisionRow, Disposition, ExternalStatus, LoggedFile, SkipReason, SubmissionLog,
        SweepSummary,
    },
    error::{SweepError, SweepResult},
    job::{JobFilter, JobRecord, JobRequest, SubmittedJob},
    outcome::SelectionOutcome,
    pipeline::{PipelineConfig, FILE_LIST_TYPE},
    registry::{find_file, RegisterOutcome, RegistryFile},
    settings::{SweepId, SweepSettings},
    subject::{CandidateFile, ObjectInfo, SubjectKey, SubjectListing},
};

use crate::{
    discovery::{dir_prefix, discover_subjects, find_scans_file, parse_scans_table, session_candidates},
    external::{file_list_name, registered_subject, resolve_external, subject_input_ids, ResolvedExternal},
    file_list::{render_file_list, FileListHeader},
    rerun::classify,
    traits::{DecisionWriter, FileRegistry, JobBroker, ObjectStore, SelectionEngine},
};

/// Drives one sweep of one pipeline over a BIDS dataset.
///
/// Construct one `Sweep` per pipeline. The sweep owns its capabilities and
/// never shares mutable state between subjects.
pub struct Sweep {
    store: Box<dyn ObjectStore>,
    registry: Box<dyn FileRegistry>,
    broker: Box<dyn JobBroker>,
    engine: Box<dyn SelectionEngine>,
    trace: Box<dyn DecisionWriter>,
    settings: SweepSettings,
}

/// A subject's trace row, plus the fault that stops the sweep at it.
struct SubjectDecision {
    row: DecisionRow,
    fault: Option<SweepError>,
}

impl From<DecisionRow> for SubjectDecision {
    fn from(row: DecisionRow) -> Self {
        Self { row, fault: None }
    }
}

/// Per-sweep snapshot shared by every subject.
struct Snapshot<'a> {
    pipeline: &'a PipelineConfig,
    roles: Vec<String>,
    externals: Vec<String>,
    registry: Vec<RegistryFile>,
    jobs: Vec<JobRecord>,
    base: String,
}

impl Sweep {
    pub fn new(
        store: Box<dyn ObjectStore>,
        registry: Box<dyn FileRegistry>,
        broker: Box<dyn JobBroker>,
        engine: Box<dyn SelectionEngine>,
        trace: Box<dyn DecisionWriter>,
        settings: SweepSettings,
    ) -> Self {
        Self { store, registry, broker, engine, trace, settings }
    }

    pub fn settings(&self) -> &SweepSettings {
        &self.settings
    }

    /// Evaluate every subject/session and submit the eligible ones.
    ///
    /// # Errors
    ///
    /// Returns `Err` for listing failures, registry and broker faults,
    /// rejected submissions, and trace write failures. Per-subject data
    /// problems are not errors: they become `NoProcessing` trace rows.
    pub fn run(&self, sweep_id: &SweepId) -> SweepResult<SweepSummary> {
        let pipeline = self.engine.pipeline(&self.settings.pipeline)?;

        info!(
            sweep_id = %sweep_id,
            pipeline = %pipeline.name,
            dry_run = self.settings.dry_run,
            "sweep starting"
        );

        let registry = self.registry.query_files(self.settings.bids_provider_id)?;
        let jobs = self.broker.list_jobs(&JobFilter {
            tool_config_id: Some(pipeline.tool_config_id),
            results_provider_id: Some(self.settings.results_provider_id),
        })?;
        debug!(registry_files = registry.len(), jobs = jobs.len(), "snapshot fetched");

        let snapshot = Snapshot {
            pipeline,
            roles: pipeline.role_names(),
            externals: pipeline.external_names(),
            registry,
            jobs,
            base: dir_prefix(&self.settings.bids_prefix),
        };

        let keys = discover_subjects(self.store.as_ref(), &self.settings.bids_bucket, &self.settings.bids_prefix)?;
        info!(subjects = keys.len(), "discovered subject sessions");

        let mut summary = SweepSummary::default();
        let mut objects: Option<(String, Vec<ObjectInfo>)> = None;

        for key in keys {
            // Sessions of one subject are adjacent; list each subject folder once.
            let listed = match objects.take() {
                Some((subject, found)) if subject == key.subject => found,
                _ => self.list_subject(&snapshot.base, &key.subject)?,
            };

            let SubjectDecision { row, fault } = self.evaluate_subject(&snapshot, &key, &listed)?;
            objects = Some((key.subject.clone(), listed));

            info!(
                subject = %key.subject,
                session = %key.session,
                disposition = %row.disposition,
                "subject evaluated"
            );

            summary.evaluated += 1;
            match &row.disposition {
                Disposition::Submitted { .. } => summary.submitted += 1,
                Disposition::WouldSubmit => summary.would_submit += 1,
                Disposition::NoProcessing { .. } => summary.skipped += 1,
            }

            self.trace.write(&row)?;
            if let Some(fault) = fault {
                warn!(subject = %key.label(), error = %fault, "sweep aborted by submission failure");
                return Err(fault);
            }
        }

        self.trace.finalize(&sweep_id.to_string())?;

        info!(
            sweep_id = %sweep_id,
            evaluated = summary.evaluated,
            submitted = summary.submitted,
            skipped = summary.skipped,
            "sweep complete"
        );
        Ok(summary)
    }

    fn list_subject(&self, base: &str, subject: &str) -> SweepResult<Vec<ObjectInfo>> {
        self.store
            .list(&self.settings.bids_bucket, &format!("{base}{subject}/"))
            .collect()
    }

    /// Run the gates for one subject/session and build its trace row.
    fn evaluate_subject(
        &self,
        snapshot: &Snapshot<'_>,
        key: &SubjectKey,
        objects: &[ObjectInfo],
    ) -> SweepResult<SubjectDecision> {
        let pipeline = snapshot.pipeline;
        let mut row = DecisionRow::not_evaluated(
            key,
            &pipeline.name,
            &snapshot.roles,
            &snapshot.externals,
            Disposition::WouldSubmit,
        );

        // ── Gate 1: the subject must be registered ───────────────────────────
        let Some(subject_record) = registered_subject(&snapshot.registry, &key.subject) else {
            warn!(subject = %key.subject, "subject is in storage but not registered");
            return Ok(skip(row, SkipReason::NotRegistered).into());
        };

        // ── Gate 2: derivatives already exist ────────────────────────────────
        let derivatives = self.derivatives_exist(&pipeline.name, key)?;
        row.derivatives_found = Some(derivatives);
        if derivatives {
            for cell in &mut row.roles {
                cell.outcome = Some(SelectionOutcome::AlreadyProcessed);
            }
            return Ok(skip(row, SkipReason::DerivativesFound).into());
        }

        // ── Gate 3: existing jobs ────────────────────────────────────────────
        let input_ids = subject_input_ids(&snapshot.registry, pipeline, key);
        let rerun = classify(
            &snapshot.jobs,
            &input_ids,
            pipeline.tool_config_id,
            self.settings.results_provider_id,
            self.settings.rerun_level,
        );
        row.cbrain_status = Some(rerun.status_label.clone());
        if !rerun.should_process {
            return Ok(skip(row, SkipReason::ExistingJobs).into());
        }

        // ── Gate 4: eligibility and selection ────────────────────────────────
        let listing = self.build_listing(&snapshot.base, key, objects)?;
        row.scans_tsv_present = Some(find_scans_file(&listing.files, key).is_some());

        let eligibility = self.engine.evaluate(&pipeline.name, &listing)?;
        for cell in &mut row.roles {
            cell.outcome = eligibility.outcome_for(&cell.role);
        }
        if !eligibility.eligible {
            return Ok(skip(row, SkipReason::RequirementsNotMet).into());
        }

        // ── Gate 5: minimum file age ─────────────────────────────────────────
        if pipeline.min_file_age_days > 0 {
            let cutoff = Utc::now() - chrono::Duration::days(i64::from(pipeline.min_file_age_days));
            if let Some(recent) = eligibility.selected.iter().find(|f| f.last_modified > cutoff) {
                debug!(subject = %key.label(), file = %recent.path, "selected file is too recent");
                return Ok(skip(row, SkipReason::FilesTooRecent).into());
            }
        }

        // ── Gate 6: ancestor consistency ─────────────────────────────────────
        if !pipeline.ancestors.is_empty() {
            let recorded = self.load_ancestor_logs(pipeline, key)?;
            let verdict = self.engine.check_ancestors(&pipeline.name, &listing, &recorded)?;
            row.ancestor_files = Some(verdict.stable);
            if !verdict.stable {
                for check in verdict.checks.iter().filter(|c| !c.status.is_stable()) {
                    warn!(
                        subject = %key.label(),
                        ancestor = %check.pipeline,
                        status = ?check.status,
                        "ancestor selection drifted"
                    );
                }
                return Ok(skip(row, SkipReason::AncestorDrift).into());
            }
        }

        // ── Gate 7: external requirements ────────────────────────────────────
        let resolved = resolve_external(&pipeline.external_requirements, &snapshot.registry, key);
        for (cell, ext) in row.external.iter_mut().zip(&resolved) {
            cell.status = Some(if ext.id.is_some() {
                ExternalStatus::Satisfied
            } else {
                ExternalStatus::NoFile
            });
        }
        if resolved.iter().any(|r| r.id.is_none()) {
            return Ok(skip(row, SkipReason::MissingExternalRequirement).into());
        }

        if self.settings.dry_run {
            row.disposition = Disposition::WouldSubmit;
            return Ok(row.into());
        }

        // ── Submission ───────────────────────────────────────────────────────
        let job = match self.submit_subject(pipeline, key, subject_record, &resolved, &eligibility.selected) {
            Ok(job) => job,
            Err(fault) => {
                return Ok(SubjectDecision {
                    row: skip(row, SkipReason::SubmissionFailed),
                    fault: Some(fault),
                })
            }
        };
        info!(subject = %key.label(), job_id = job.id, status = %job.status, "job submitted");

        self.write_submission_log(pipeline, key, job.id, &eligibility.selected)?;
        row.disposition = Disposition::Submitted { job_id: job.id };
        Ok(row.into())
    }

    /// Publish the file list when an input takes it, then submit the job.
    fn submit_subject(
        &self,
        pipeline: &PipelineConfig,
        key: &SubjectKey,
        subject_record: &RegistryFile,
        resolved: &[ResolvedExternal],
        selected: &[CandidateFile],
    ) -> SweepResult<SubmittedJob> {
        let needs_list = resolved.iter().any(|r| r.takes_file_list);
        let file_list_id = if needs_list {
            Some(self.publish_file_list(pipeline, key, subject_record, selected)?)
        } else {
            None
        };

        let mut invoke_params = pipeline.invoke_params.clone();
        let mut input_file_ids = Vec::with_capacity(resolved.len());
        for ext in resolved {
            let id = match (ext.takes_file_list, file_list_id, ext.id) {
                (true, Some(list_id), _) => list_id,
                (_, _, Some(id)) => id,
                (_, _, None) => continue,
            };
            invoke_params.insert(ext.name.clone(), serde_json::Value::from(id));
            input_file_ids.push(id);
        }

        let request = JobRequest {
            tool_config_id: pipeline.tool_config_id,
            group_id: self.settings.group_id,
            user_id: self.settings.user_id,
            results_provider_id: self.settings.results_provider_id,
            description: format!("{} {}", pipeline.name, key.label()),
            input_file_ids,
            invoke_params,
        };

        self.submit_with_retry(&request)
    }

    fn derivatives_exist(&self, pipeline: &str, key: &SubjectKey) -> SweepResult<bool> {
        let mut prefix = format!(
            "{}{}/{}/",
            dir_prefix(&self.settings.derivatives_prefix),
            pipeline,
            key.subject
        );
        if !key.session.is_empty() {
            prefix.push_str(&key.session);
            prefix.push('/');
        }
        match self.store.list(&self.settings.derivatives_bucket, &prefix).next() {
            Some(Err(e)) => Err(e),
            Some(Ok(_)) => Ok(true),
            None => Ok(false),
        }
    }

    fn build_listing(&self, base: &str, key: &SubjectKey, objects: &[ObjectInfo]) -> SweepResult<SubjectListing> {
        let files = session_candidates(objects, base, key);
        let qc = match find_scans_file(&files, key) {
            Some(scans) => {
                let object_key = format!("{base}{}", scans.path);
                match self.store.get(&self.settings.bids_bucket, &object_key)? {
                    Some(body) => match parse_scans_table(&body) {
                        Ok(table) => Some(table),
                        Err(e) => {
                            warn!(subject = %key.label(), file = %scans.path, error = %e, "unreadable scans table");
                            None
                        }
                    },
                    None => None,
                }
            }
            None => None,
        };
        Ok(SubjectListing {
            key: key.clone(),
            files,
            qc,
        })
    }

    fn load_ancestor_logs(
        &self,
        pipeline: &PipelineConfig,
        key: &SubjectKey,
    ) -> SweepResult<BTreeMap<String, SubmissionLog>> {
        let mut recorded = BTreeMap::new();
        for ancestor in &pipeline.ancestors {
            let object_key = SubmissionLog::object_key(&self.settings.submission_log_prefix, ancestor, key);
            let Some(body) = self.store.get(&self.settings.derivatives_bucket, &object_key)? else {
                continue;
            };
            match serde_json::from_slice::<SubmissionLog>(&body) {
                Ok(log) => {
                    recorded.insert(ancestor.clone(), log);
                }
                Err(e) => warn!(ancestor = %ancestor, key = %object_key, error = %e, "unreadable submission log"),
            }
        }
        Ok(recorded)
    }

    /// Upload and register the subject's file list, returning its registry id.
    fn publish_file_list(
        &self,
        pipeline: &PipelineConfig,
        key: &SubjectKey,
        subject: &RegistryFile,
        selected: &[CandidateFile],
    ) -> SweepResult<u64> {
        let header = FileListHeader {
            subject_id: subject.id,
            subject: &key.subject,
            size: subject.size,
            provider_name: &self.settings.bids_provider_name,
            user_name: &self.settings.user_name,
            group_name: &self.settings.group_name,
        };
        let body = render_file_list(&header, selected)?;
        let name = file_list_name(&pipeline.name, key);
        let object_key = format!("{}{}", dir_prefix(&self.settings.file_list_prefix), name);
        self.store.put(&self.settings.bids_bucket, &object_key, &body)?;

        match self.registry.register_upload(&name, FILE_LIST_TYPE, self.settings.bids_provider_id)? {
            RegisterOutcome::Registered { id } => {
                debug!(file_list = %name, id, "file list registered");
                Ok(id)
            }
            RegisterOutcome::AlreadyExists => {
                let files = self.registry.query_files(self.settings.bids_provider_id)?;
                let id = find_file(&files, &name, FILE_LIST_TYPE)
                    .map(|f| f.id)
                    .ok_or_else(|| SweepError::RegistryError {
                        reason: format!("file list {name} is reported as registered but cannot be found"),
                    })?;
                self.broker.mark_file_stale(id)?;
                debug!(file_list = %name, id, "file list refreshed");
                Ok(id)
            }
        }
    }

    /// Submit once, retrying a single time after a fixed delay when the
    /// broker was unreachable.
    fn submit_with_retry(&self, request: &JobRequest) -> SweepResult<SubmittedJob> {
        match self.broker.submit_job(request) {
            Err(e) if e.is_transient() => {
                warn!(
                    error = %e,
                    delay_ms = self.settings.retry_delay_ms,
                    "job submission failed, retrying once"
                );
                thread::sleep(Duration::from_millis(self.settings.retry_delay_ms));
                self.broker.submit_job(request)
            }
            other => other,
        }
    }

    fn write_submission_log(
        &self,
        pipeline: &PipelineConfig,
        key: &SubjectKey,
        job_id: u64,
        selected: &[CandidateFile],
    ) -> SweepResult<()> {
        let log = SubmissionLog {
            pipeline: pipeline.name.clone(),
            subject: key.subject.clone(),
            session: key.session.clone(),
            job_id,
            submitted_at: Utc::now(),
            files: selected
                .iter()
                .map(|f| LoggedFile {
                    path: f.path.clone(),
                    size: f.size,
                    etag: f.content_hash.clone(),
                })
                .collect(),
        };
        let body = serde_json::to_vec_pretty(&log).map_err(|e| SweepError::StorageError {
            reason: format!("failed to encode submission log: {e}"),
        })?;
        let object_key = SubmissionLog::object_key(&self.settings.submission_log_prefix, &pipeline.name, key);
        self.store.put(&self.settings.derivatives_bucket, &object_key, &body)
    }
}

fn skip(mut row: DecisionRow, reason: SkipReason) -> DecisionRow {
    row.disposition = Disposition::NoProcessing { reason };
    row
}

// ── Tests ────────────────────────────────────────────────────────────────────
