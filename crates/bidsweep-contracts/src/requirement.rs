//! Requirement specifications: how to recognize and rank input files.
//!
//! These are the resolved, typed form of the pipeline JSON documents. Shape
//! decisions (QC or not, bounded or not) are made once at load time so the
//! engine never inspects raw JSON while evaluating subjects.

use serde::{Deserialize, Serialize};

use crate::qc::QcValue;

/// One `file_naming` entry: `pattern` must (or must not) occur in the name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRule {
    pub pattern: String,
    pub present: bool,
}

/// The ordered, conjunctive naming rules for a role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNaming {
    pub rules: Vec<NameRule>,
}

impl FileNaming {
    /// True when every rule holds for `file_name`.
    pub fn matches(&self, file_name: &str) -> bool {
        self.rules
            .iter()
            .all(|rule| file_name.contains(rule.pattern.as_str()) == rule.present)
    }
}

/// Comparison applied between a QC value and a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    LessThan,
    GreaterThan,
}

/// A criterion threshold as written in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Threshold {
    Bool(bool),
    Number(f64),
    Text(String),
}

/// One `(field, threshold, operator)` triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub field: String,
    pub threshold: Threshold,
    pub operator: Operator,
}

impl Criterion {
    /// Whether the criterion only gates inclusion and never ranks.
    ///
    /// Only numeric `less_than` / `greater_than` criteria express a
    /// preference between two passing candidates.
    pub fn is_gate_only(&self) -> bool {
        !matches!(
            (&self.threshold, self.operator),
            (Threshold::Number(_), Operator::LessThan | Operator::GreaterThan)
        )
    }

    /// Evaluate against a defined (non-null) value.
    ///
    /// A value of the wrong kind for the operator fails the criterion.
    /// Booleans and the numbers `1` / `0` compare equal, so review columns
    /// written as `1`/`0` satisfy `true`/`false` thresholds.
    pub fn holds(&self, value: &QcValue) -> bool {
        match (self.operator, &self.threshold, value) {
            (Operator::Equals, Threshold::Bool(t), QcValue::Bool(v)) => t == v,
            (Operator::Equals, Threshold::Bool(t), QcValue::Number(v)) => bool_as_f64(*t) == *v,
            (Operator::Equals, Threshold::Number(t), QcValue::Bool(v)) => *t == bool_as_f64(*v),
            (Operator::Equals, Threshold::Number(t), QcValue::Number(v)) => t == v,
            (Operator::Equals, Threshold::Text(t), QcValue::Text(v)) => t == v,
            (Operator::LessThan, Threshold::Number(t), QcValue::Number(v)) => v < t,
            (Operator::GreaterThan, Threshold::Number(t), QcValue::Number(v)) => v > t,
            _ => false,
        }
    }
}

fn bool_as_f64(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

/// One fallback tier: every criterion must hold for a candidate to pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CriteriaTier {
    pub criteria: Vec<Criterion>,
}

/// How many ranked candidates a role keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeepPolicy {
    Bounded(usize),
    Unbounded,
}

impl KeepPolicy {
    pub fn limit(&self) -> Option<usize> {
        match self {
            KeepPolicy::Bounded(n) => Some(*n),
            KeepPolicy::Unbounded => None,
        }
    }
}

/// The rule for one logical input role (e.g. `T1w`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RequirementSpec {
    /// Any naming match satisfies the role.
    NoQc {
        role: String,
        naming: FileNaming,
        keep: KeepPolicy,
    },
    /// Naming matches must also pass one of the QC tiers.
    WithQc {
        role: String,
        naming: FileNaming,
        tiers: Vec<CriteriaTier>,
        keep: KeepPolicy,
    },
}

impl RequirementSpec {
    pub fn role(&self) -> &str {
        match self {
            RequirementSpec::NoQc { role, .. } | RequirementSpec::WithQc { role, .. } => role,
        }
    }

    pub fn naming(&self) -> &FileNaming {
        match self {
            RequirementSpec::NoQc { naming, .. } | RequirementSpec::WithQc { naming, .. } => naming,
        }
    }

    pub fn keep(&self) -> KeepPolicy {
        match self {
            RequirementSpec::NoQc { keep, .. } | RequirementSpec::WithQc { keep, .. } => *keep,
        }
    }
}

/// A named bundle of roles that must all be satisfied together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementGroup {
    pub name: String,
    pub specs: Vec<RequirementSpec>,
}
