//! Rerun/state classification of existing jobs.
//!
//! Decides whether a subject may be (re)submitted given the jobs already
//! recorded against it. The classifier never recommends a submission while a
//! matching job is queued, running, or completed, at any rerun level.

use tracing::debug;

use bidsweep_contracts::{
    job::{JobRecord, StatusTier},
    settings::RerunLevel,
};

/// Label used when no matching job exists.
pub const NO_EXISTING_TASK: &str = "No Existing Task";

/// The classifier's answer for one subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RerunDecision {
    pub should_process: bool,
    /// An example status for display, preferring processing failures.
    pub status_label: String,
    /// Ids of the jobs that matched.
    pub matching_jobs: Vec<u64>,
}

/// Classify `jobs` for a subject.
///
/// A job matches when it ran `tool_config_id`, wrote to
/// `results_provider_id`, and listed any of `subject_file_ids` among its
/// inputs. The subject may be processed when:
///
/// - no job matches, at any level;
/// - level 1 and every match failed for infrastructure reasons;
/// - level 2 and every match failed for any reason.
pub fn classify(
    jobs: &[JobRecord],
    subject_file_ids: &[u64],
    tool_config_id: u64,
    results_provider_id: u64,
    level: RerunLevel,
) -> RerunDecision {
    let matching: Vec<&JobRecord> = jobs
        .iter()
        .filter(|j| j.tool_config_id == tool_config_id)
        .filter(|j| j.results_provider_id == results_provider_id)
        .filter(|j| j.input_file_ids.iter().any(|id| subject_file_ids.contains(id)))
        .collect();

    if matching.is_empty() {
        return RerunDecision {
            should_process: true,
            status_label: NO_EXISTING_TASK.to_string(),
            matching_jobs: Vec::new(),
        };
    }

    let tier_of = |tier: StatusTier| matching.iter().filter(move |j| j.status.tier() == tier);
    let infrastructure = tier_of(StatusTier::Infrastructure).count();
    let processing = tier_of(StatusTier::Processing).count();

    let should_process = match level {
        RerunLevel::Never => false,
        RerunLevel::Infrastructure => infrastructure == matching.len(),
        RerunLevel::AnyFailure => infrastructure + processing == matching.len(),
    };

    let example = tier_of(StatusTier::Processing)
        .next()
        .or_else(|| tier_of(StatusTier::Live).next())
        .or_else(|| tier_of(StatusTier::Infrastructure).next())
        .map(|j| j.status.to_string())
        .unwrap_or_else(|| NO_EXISTING_TASK.to_string());

    let matching_jobs: Vec<u64> = matching.iter().map(|j| j.id).collect();

    debug!(
        jobs = ?matching_jobs,
        level = ?level,
        should_process,
        status = %example,
        "classified existing jobs"
    );

    RerunDecision {
        should_process,
        status_label: example,
        matching_jobs,
    }
}
