//! The eligibility and selection engine.
//!
//! `RuleEngine` holds the resolved pipeline catalog and implements the
//! `SelectionEngine` trait from bidsweep-core.
//!
//! Evaluation algorithm, per role:
//!
//! 1. Filter candidates by the role's naming rules. None left → `NoFile`.
//! 2. Without QC criteria, every match passes.
//! 3. With QC criteria:
//!    a. No scans table → `NoScansFile`.
//!    b. Resolve the first tier whose fields are defined for every match.
//!       All tiers exhausted → `MissingQc`.
//!    c. No match passes the resolved tier → `FailedQc`.
//! 4. Rank the passing candidates and apply `num_to_keep`.
//!
//! A group is satisfied when every role in it is `Satisfied`; the subject is
//! eligible when at least one group is satisfied.

use std::{collections::BTreeMap, path::Path};

use tracing::{debug, warn};

use bidsweep_contracts::{
    decision::SubmissionLog,
    error::{SweepError, SweepResult},
    outcome::{AncestorCheck, AncestorVerdict, Eligibility, GroupVerdict, RoleDecision, SelectionOutcome},
    pipeline::PipelineConfig,
    qc::QcTable,
    requirement::{RequirementGroup, RequirementSpec},
    subject::{CandidateFile, SubjectListing},
};
use bidsweep_core::traits::SelectionEngine;
use bidsweep_schema::engine::PipelineValidator;

use crate::{
    ancestor::compare_selection,
    associated::associated_files,
    catalog::{load_dir, load_document},
    criteria::resolve_tier,
    rank::{keep, rank, rank_by_name},
};

/// The winners of one role.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub files: Vec<CandidateFile>,
    /// Index of the resolved QC tier, when QC applied.
    pub tier: Option<usize>,
}

/// Select the winning files for one role.
///
/// `Err` carries the outcome explaining why nothing was selected.
pub fn select_files(
    candidates: &[CandidateFile],
    spec: &RequirementSpec,
    qc: Option<&QcTable>,
) -> Result<Selection, SelectionOutcome> {
    let matched: Vec<&CandidateFile> = candidates
        .iter()
        .filter(|f| spec.naming().matches(f.file_name()))
        .collect();
    if matched.is_empty() {
        return Err(SelectionOutcome::NoFile);
    }

    let (ranked, tier) = match spec {
        RequirementSpec::NoQc { .. } => (rank_by_name(matched), None),
        RequirementSpec::WithQc { tiers, .. } => {
            let qc = qc.ok_or(SelectionOutcome::NoScansFile)?;
            let resolution = resolve_tier(tiers, &matched, qc).map_err(|_| SelectionOutcome::MissingQc)?;
            if resolution.passing.is_empty() {
                return Err(SelectionOutcome::FailedQc);
            }
            let criteria = &tiers[resolution.tier].criteria;
            (rank(resolution.passing, criteria, qc), Some(resolution.tier))
        }
    };

    let files = keep(ranked, spec.keep()).into_iter().cloned().collect();
    Ok(Selection { files, tier })
}

/// Evaluate one role and record its outcome.
pub fn evaluate_spec(candidates: &[CandidateFile], spec: &RequirementSpec, qc: Option<&QcTable>) -> RoleDecision {
    let decision = match select_files(candidates, spec, qc) {
        Ok(selection) => RoleDecision {
            role: spec.role().to_string(),
            outcome: SelectionOutcome::Satisfied,
            tier: selection.tier,
            selected: selection.files,
        },
        Err(outcome) => RoleDecision {
            role: spec.role().to_string(),
            outcome,
            tier: None,
            selected: Vec::new(),
        },
    };
    debug!(role = %decision.role, outcome = %decision.outcome, tier = ?decision.tier, "role evaluated");
    decision
}

/// Evaluate every role of `group`. The group holds when all roles are satisfied.
pub fn evaluate_group(
    candidates: &[CandidateFile],
    group: &RequirementGroup,
    qc: Option<&QcTable>,
) -> (bool, Vec<RoleDecision>) {
    let decisions: Vec<RoleDecision> = group.specs.iter().map(|s| evaluate_spec(candidates, s, qc)).collect();
    let satisfied = decisions.iter().all(|d| d.outcome == SelectionOutcome::Satisfied);
    debug!(group = %group.name, satisfied, "group evaluated");
    (satisfied, decisions)
}

/// Evaluate a whole pipeline against one listing.
///
/// The selection is the union of the winners of every satisfied group's
/// roles, in role order, followed by their associated files.
pub fn evaluate_pipeline(config: &PipelineConfig, listing: &SubjectListing) -> Eligibility {
    let qc = listing.qc.as_ref();
    let mut groups = Vec::with_capacity(config.groups.len());
    let mut roles: Vec<RoleDecision> = Vec::new();
    let mut winning_roles: Vec<String> = Vec::new();

    for group in &config.groups {
        let (satisfied, decisions) = evaluate_group(&listing.files, group, qc);
        if satisfied {
            winning_roles.extend(decisions.iter().map(|d| d.role.clone()));
        }
        for decision in decisions {
            if !roles.iter().any(|r| r.role == decision.role) {
                roles.push(decision);
            }
        }
        groups.push(GroupVerdict {
            group: group.name.clone(),
            satisfied,
        });
    }

    let eligible = groups.iter().any(|g| g.satisfied);
    let mut selected: Vec<CandidateFile> = Vec::new();
    for decision in roles.iter().filter(|r| winning_roles.contains(&r.role)) {
        for file in &decision.selected {
            if !selected.iter().any(|f| f.path == file.path) {
                selected.push(file.clone());
            }
        }
    }
    let sidecars = associated_files(&selected, &config.associated_files, listing);
    selected.extend(sidecars);

    Eligibility {
        eligible,
        groups,
        roles,
        selected,
    }
}

/// A `SelectionEngine` over a catalog of pipeline configurations.
///
/// Construct via `new`, `from_dir`, or `from_json_str`, then pass to the
/// sweep.
///
/// ```rust,ignore
/// use bidsweep_rules::engine::RuleEngine;
///
/// let engine = RuleEngine::from_dir(Path::new("pipelines"))?;
/// ```
#[derive(Debug)]
pub struct RuleEngine {
    pipelines: BTreeMap<String, PipelineConfig>,
}

impl RuleEngine {
    /// Build an engine from resolved configurations.
    ///
    /// Returns `ConflictingRequirement` when a role differs between groups,
    /// and `ConfigError` for duplicate pipelines or unknown ancestors.
    pub fn new(configs: Vec<PipelineConfig>) -> SweepResult<Self> {
        let mut pipelines = BTreeMap::new();
        for config in configs {
            check_shared_roles(&config)?;
            if pipelines.contains_key(&config.name) {
                return Err(SweepError::ConfigError {
                    reason: format!("pipeline '{}' is defined twice", config.name),
                });
            }
            pipelines.insert(config.name.clone(), config);
        }

        for config in pipelines.values() {
            if let Some(unknown) = config.ancestors.iter().find(|a| !pipelines.contains_key(*a)) {
                return Err(SweepError::ConfigError {
                    reason: format!("pipeline '{}' lists unknown ancestor '{unknown}'", config.name),
                });
            }
        }

        Ok(Self { pipelines })
    }

    /// Load every `*.json` pipeline document in `dir`.
    pub fn from_dir(dir: &Path) -> SweepResult<Self> {
        Self::new(load_dir(dir)?)
    }

    /// Build an engine from a single pipeline document.
    pub fn from_json_str(s: &str) -> SweepResult<Self> {
        let validator = PipelineValidator::new()?;
        Self::new(vec![load_document(&validator, "<inline>", s)?])
    }

    pub fn pipeline_names(&self) -> impl Iterator<Item = &str> {
        self.pipelines.keys().map(String::as_str)
    }
}

fn check_shared_roles(config: &PipelineConfig) -> SweepResult<()> {
    let mut first: BTreeMap<&str, (&str, &RequirementSpec)> = BTreeMap::new();
    for group in &config.groups {
        for spec in &group.specs {
            match first.get(spec.role()) {
                Some((first_group, first_spec)) if *first_spec != spec => {
                    return Err(SweepError::ConflictingRequirement {
                        role: spec.role().to_string(),
                        first_group: first_group.to_string(),
                        second_group: group.name.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    first.insert(spec.role(), (group.name.as_str(), spec));
                }
            }
        }
    }
    Ok(())
}

impl SelectionEngine for RuleEngine {
    fn pipeline(&self, pipeline: &str) -> SweepResult<&PipelineConfig> {
        self.pipelines.get(pipeline).ok_or_else(|| SweepError::UnknownPipeline {
            name: pipeline.to_string(),
        })
    }

    fn evaluate(&self, pipeline: &str, listing: &SubjectListing) -> SweepResult<Eligibility> {
        let config = self.pipeline(pipeline)?;
        let eligibility = evaluate_pipeline(config, listing);
        debug!(
            pipeline,
            subject = %listing.key.label(),
            eligible = eligibility.eligible,
            selected = eligibility.selected.len(),
            "pipeline evaluated"
        );
        Ok(eligibility)
    }

    /// Recompute each ancestor's selection and compare it with its log.
    fn check_ancestors(
        &self,
        pipeline: &str,
        listing: &SubjectListing,
        recorded: &BTreeMap<String, SubmissionLog>,
    ) -> SweepResult<AncestorVerdict> {
        let config = self.pipeline(pipeline)?;
        if config.ancestors.is_empty() {
            return Ok(AncestorVerdict::no_ancestors());
        }

        let mut checks = Vec::with_capacity(config.ancestors.len());
        for ancestor in &config.ancestors {
            let ancestor_config = self.pipeline(ancestor)?;
            let current = evaluate_pipeline(ancestor_config, listing);
            let status = compare_selection(&current.selected, recorded.get(ancestor));
            if !status.is_stable() {
                warn!(
                    pipeline,
                    ancestor = %ancestor,
                    subject = %listing.key.label(),
                    ?status,
                    "ancestor selection is not stable"
                );
            }
            checks.push(AncestorCheck {
                pipeline: ancestor.clone(),
                status,
            });
        }

        Ok(AncestorVerdict {
            stable: checks.iter().all(|c| c.status.is_stable()),
            checks,
        })
    }
}
