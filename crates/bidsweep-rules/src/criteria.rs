//! QC tier resolution.
//!
//! A role's criteria are split into fallback tiers. A tier can only be used
//! when every field it references is defined for every naming-matched
//! candidate; otherwise evaluation moves on to the next tier. When all tiers
//! are exhausted the role cannot be evaluated this cycle.

use tracing::debug;

use bidsweep_contracts::{
    qc::QcTable,
    requirement::{CriteriaTier, Criterion},
    subject::CandidateFile,
};

/// A criterion field that is undefined for a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingField {
    pub file: String,
    pub field: String,
}

/// The first fully-defined tier and the candidates that passed it.
#[derive(Debug, Clone, PartialEq)]
pub struct TierResolution<'a> {
    pub tier: usize,
    pub passing: Vec<&'a CandidateFile>,
}

/// Evaluate one tier against every candidate.
///
/// Returns the passing candidates in input order, or the first undefined
/// field encountered.
pub fn evaluate_tier<'a>(
    tier: &CriteriaTier,
    candidates: &[&'a CandidateFile],
    qc: &QcTable,
) -> Result<Vec<&'a CandidateFile>, MissingField> {
    let mut passing = Vec::new();
    for candidate in candidates {
        if passes(&tier.criteria, candidate, qc)? {
            passing.push(*candidate);
        }
    }
    Ok(passing)
}

fn passes(criteria: &[Criterion], candidate: &CandidateFile, qc: &QcTable) -> Result<bool, MissingField> {
    let name = candidate.file_name();
    let mut all_hold = true;
    // Check definedness of every field before deciding, so a failing
    // criterion cannot hide an undefined one.
    for criterion in criteria {
        let value = qc.value(name, &criterion.field);
        if value.is_null() {
            return Err(MissingField {
                file: name.to_string(),
                field: criterion.field.clone(),
            });
        }
        all_hold &= criterion.holds(&value);
    }
    Ok(all_hold)
}

/// Walk the tiers in order and return the first one that is fully defined.
///
/// `Err` carries every undefined field that forced a fallback, one per tier.
pub fn resolve_tier<'a>(
    tiers: &[CriteriaTier],
    candidates: &[&'a CandidateFile],
    qc: &QcTable,
) -> Result<TierResolution<'a>, Vec<MissingField>> {
    let mut missing = Vec::with_capacity(tiers.len());
    for (index, tier) in tiers.iter().enumerate() {
        match evaluate_tier(tier, candidates, qc) {
            Ok(passing) => {
                debug!(tier = index, passing = passing.len(), "QC tier resolved");
                return Ok(TierResolution { tier: index, passing });
            }
            Err(field) => {
                debug!(tier = index, file = %field.file, field = %field.field, "QC field undefined, falling back");
                missing.push(field);
            }
        }
    }
    Err(missing)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;

    use bidsweep_contracts::{
        qc::{QcRow, QcTable, QcValue},
        requirement::{CriteriaTier, Criterion, Operator, Threshold},
        subject::CandidateFile,
    };

    use super::resolve_tier;

    fn file(name: &str) -> CandidateFile {
        CandidateFile {
            path: format!("sub-01/ses-V01/anat/{name}"),
            size: 1,
            last_modified: Utc::now(),
            content_hash: String::new(),
        }
    }

    fn row(name: &str, values: &[(&str, QcValue)]) -> QcRow {
        QcRow {
            filename: format!("anat/{name}"),
            values: values.iter().map(|(k, v)| (k.to_string(), v.clone())).collect::<BTreeMap<_, _>>(),
        }
    }

    fn manual() -> Criterion {
        Criterion {
            field: "QU_motion".to_string(),
            threshold: Threshold::Bool(true),
            operator: Operator::Equals,
        }
    }

    fn automated() -> Criterion {
        Criterion {
            field: "aqc_score".to_string(),
            threshold: Threshold::Number(3.0),
            operator: Operator::LessThan,
        }
    }

    fn tiers() -> Vec<CriteriaTier> {
        vec![
            CriteriaTier { criteria: vec![manual(), automated()] },
            CriteriaTier { criteria: vec![automated()] },
        ]
    }

    #[test]
    fn first_defined_tier_wins() {
        let a = file("a_T1w.nii.gz");
        let qc = QcTable {
            columns: Vec::new(),
            rows: vec![row("a_T1w.nii.gz", &[("QU_motion", QcValue::Bool(true)), ("aqc_score", QcValue::Number(1.0))])],
        };
        let resolution = resolve_tier(&tiers(), &[&a], &qc).unwrap();
        assert_eq!(resolution.tier, 0);
        assert_eq!(resolution.passing.len(), 1);
    }

    #[test]
    fn failing_value_does_not_trigger_fallback() {
        let a = file("a_T1w.nii.gz");
        let qc = QcTable {
            columns: Vec::new(),
            rows: vec![row("a_T1w.nii.gz", &[("QU_motion", QcValue::Bool(false)), ("aqc_score", QcValue::Number(1.0))])],
        };
        let resolution = resolve_tier(&tiers(), &[&a], &qc).unwrap();
        assert_eq!(resolution.tier, 0);
        assert!(resolution.passing.is_empty());
    }

    #[test]
    fn exhausted_tiers_report_each_missing_field() {
        let a = file("a_T1w.nii.gz");
        let qc = QcTable {
            columns: Vec::new(),
            rows: vec![row("a_T1w.nii.gz", &[("QU_motion", QcValue::Null)])],
        };
        let missing = resolve_tier(&tiers(), &[&a], &qc).unwrap_err();
        assert_eq!(missing.len(), 2);
        assert_eq!(missing[0].field, "QU_motion");
        assert_eq!(missing[1].field, "aqc_score");
    }

    #[test]
    fn candidate_without_row_is_undefined() {
        let a = file("a_T1w.nii.gz");
        let missing = resolve_tier(&tiers(), &[&a], &QcTable::default()).unwrap_err();
        assert_eq!(missing[0].file, "a_T1w.nii.gz");
    }
}
