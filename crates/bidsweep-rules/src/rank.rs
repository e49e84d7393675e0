//! Candidate ranking.
//!
//! Candidates that passed QC are ordered lexicographically by the ranking
//! criteria in declaration order. Only numeric `less_than` (lower is better)
//! and `greater_than` (higher is better) criteria rank; every other criterion
//! is a gate that all passing candidates already share. Full ties fall back
//! to the file name, then the full path.

use std::cmp::Ordering;

use bidsweep_contracts::{
    qc::QcTable,
    requirement::{Criterion, KeepPolicy, Operator},
    subject::CandidateFile,
};

/// Compare two candidates on one ranking criterion.
fn compare_on(criterion: &Criterion, a: &CandidateFile, b: &CandidateFile, qc: &QcTable) -> Ordering {
    let (Some(va), Some(vb)) = (
        qc.value(a.file_name(), &criterion.field).as_f64(),
        qc.value(b.file_name(), &criterion.field).as_f64(),
    ) else {
        return Ordering::Equal;
    };
    match criterion.operator {
        Operator::LessThan => va.total_cmp(&vb),
        Operator::GreaterThan => vb.total_cmp(&va),
        Operator::Equals => Ordering::Equal,
    }
}

fn by_name(a: &CandidateFile, b: &CandidateFile) -> Ordering {
    a.file_name().cmp(b.file_name()).then_with(|| a.path.cmp(&b.path))
}

/// Order `candidates` best-first under `criteria`.
pub fn rank<'a>(mut candidates: Vec<&'a CandidateFile>, criteria: &[Criterion], qc: &QcTable) -> Vec<&'a CandidateFile> {
    let ranking: Vec<&Criterion> = criteria.iter().filter(|c| !c.is_gate_only()).collect();
    candidates.sort_by(|a, b| {
        ranking
            .iter()
            .map(|c| compare_on(c, a, b, qc))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
            .then_with(|| by_name(a, b))
    });
    candidates
}

/// Order candidates with no QC by name only.
pub fn rank_by_name(mut candidates: Vec<&CandidateFile>) -> Vec<&CandidateFile> {
    candidates.sort_by(|a, b| by_name(a, b));
    candidates
}

/// Apply a keep policy to a best-first list.
pub fn keep<T>(mut ranked: Vec<T>, policy: KeepPolicy) -> Vec<T> {
    if let Some(limit) = policy.limit() {
        ranked.truncate(limit);
    }
    ranked
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;

    use bidsweep_contracts::{
        qc::{QcRow, QcTable, QcValue},
        requirement::{Criterion, KeepPolicy, Operator, Threshold},
        subject::CandidateFile,
    };

    use super::{keep, rank};

    fn file(name: &str) -> CandidateFile {
        CandidateFile {
            path: format!("sub-01/ses-V01/anat/{name}"),
            size: 1,
            last_modified: Utc::now(),
            content_hash: String::new(),
        }
    }

    fn table(rows: &[(&str, f64, f64)]) -> QcTable {
        QcTable {
            columns: Vec::new(),
            rows: rows
                .iter()
                .map(|(name, score, snr)| QcRow {
                    filename: name.to_string(),
                    values: BTreeMap::from([
                        ("score".to_string(), QcValue::Number(*score)),
                        ("snr".to_string(), QcValue::Number(*snr)),
                        ("QU_motion".to_string(), QcValue::Bool(true)),
                    ]),
                })
                .collect(),
        }
    }

    fn criteria() -> Vec<Criterion> {
        vec![
            Criterion {
                field: "QU_motion".to_string(),
                threshold: Threshold::Bool(true),
                operator: Operator::Equals,
            },
            Criterion {
                field: "score".to_string(),
                threshold: Threshold::Number(10.0),
                operator: Operator::LessThan,
            },
            Criterion {
                field: "snr".to_string(),
                threshold: Threshold::Number(0.0),
                operator: Operator::GreaterThan,
            },
        ]
    }

    #[test]
    fn earlier_criterion_decides_first() {
        let (a, b) = (file("a.nii.gz"), file("b.nii.gz"));
        let qc = table(&[("a.nii.gz", 2.0, 50.0), ("b.nii.gz", 1.0, 5.0)]);
        let ranked = rank(vec![&a, &b], &criteria(), &qc);
        assert_eq!(ranked[0].file_name(), "b.nii.gz");
    }

    #[test]
    fn ties_cascade_to_next_criterion() {
        let (a, b) = (file("a.nii.gz"), file("b.nii.gz"));
        let qc = table(&[("a.nii.gz", 1.0, 5.0), ("b.nii.gz", 1.0, 50.0)]);
        let ranked = rank(vec![&a, &b], &criteria(), &qc);
        assert_eq!(ranked[0].file_name(), "b.nii.gz", "higher snr wins");
    }

    #[test]
    fn keep_truncates_bounded_only() {
        assert_eq!(keep(vec![1, 2, 3], KeepPolicy::Bounded(2)), vec![1, 2]);
        assert_eq!(keep(vec![1, 2, 3], KeepPolicy::Unbounded), vec![1, 2, 3]);
    }
}
