//! Selection outcomes, eligibility results, and ancestor verdicts.
//!
//! These are produced by the selection engine and copied into the decision
//! trace. They carry enough detail to explain why a subject was or was not
//! processed without re-running the evaluation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::subject::CandidateFile;

/// The per-role result of evaluating one requirement spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectionOutcome {
    /// At least one candidate matched naming and passed the resolved QC tier.
    Satisfied,
    /// Candidates exist and are fully measured, but none passed.
    FailedQc,
    /// No file matched the naming rules.
    NoFile,
    /// Every QC tier references a field that is undefined for a candidate.
    MissingQc,
    /// Pipeline derivatives already exist; the role was not evaluated.
    AlreadyProcessed,
    /// QC criteria apply but the session has no scans table.
    NoScansFile,
}

impl SelectionOutcome {
    /// The outcome cannot be judged this cycle (as opposed to failing).
    pub fn is_unevaluable(&self) -> bool {
        matches!(self, SelectionOutcome::MissingQc | SelectionOutcome::NoScansFile)
    }

    pub fn label(&self) -> &'static str {
        match self {
            SelectionOutcome::Satisfied => "Satisfied",
            SelectionOutcome::FailedQc => "Failed QC",
            SelectionOutcome::NoFile => "No File",
            SelectionOutcome::MissingQc => "Missing QC",
            SelectionOutcome::AlreadyProcessed => "Already Processed",
            SelectionOutcome::NoScansFile => "No Scans File",
        }
    }
}

impl fmt::Display for SelectionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The engine's verdict for one role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleDecision {
    pub role: String,
    pub outcome: SelectionOutcome,
    /// Index of the QC tier that was used, when QC applied and resolved.
    pub tier: Option<usize>,
    /// Ranked winners, truncated to the role's keep policy.
    pub selected: Vec<CandidateFile>,
}

/// Whether one requirement group was fully satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupVerdict {
    pub group: String,
    pub satisfied: bool,
}

/// The full eligibility decision for one subject/session and pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Eligibility {
    /// True when at least one group is satisfied.
    pub eligible: bool,
    pub groups: Vec<GroupVerdict>,
    pub roles: Vec<RoleDecision>,
    /// De-duplicated union of every role's winners plus associated files,
    /// in role order.
    pub selected: Vec<CandidateFile>,
}

impl Eligibility {
    pub fn outcome_for(&self, role: &str) -> Option<SelectionOutcome> {
        self.roles.iter().find(|r| r.role == role).map(|r| r.outcome)
    }
}

/// How one ancestor pipeline's recorded selection compares to today's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AncestorStatus {
    Stable,
    /// No submission log exists for the ancestor.
    NoRecord,
    /// The selected path sets differ.
    FilesChanged {
        added: Vec<String>,
        removed: Vec<String>,
    },
    /// A session-bound file kept its path but changed size.
    SizeChanged {
        path: String,
        recorded: u64,
        current: u64,
    },
}

impl AncestorStatus {
    pub fn is_stable(&self) -> bool {
        matches!(self, AncestorStatus::Stable)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AncestorCheck {
    pub pipeline: String,
    pub status: AncestorStatus,
}

/// Consistency verdict across every ancestor of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AncestorVerdict {
    pub stable: bool,
    pub checks: Vec<AncestorCheck>,
}

impl AncestorVerdict {
    /// The verdict for a pipeline with no ancestors.
    pub fn no_ancestors() -> Self {
        Self {
            stable: true,
            checks: Vec::new(),
        }
    }
}
