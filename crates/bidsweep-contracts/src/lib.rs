//! # bidsweep-contracts
//!
//! Shared types, records, and contracts for the bidsweep processing sweep.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate: only data definitions, small lookup helpers, and error types.

pub mod decision;
pub mod error;
pub mod job;
pub mod outcome;
pub mod pipeline;
pub mod qc;
pub mod registry;
pub mod requirement;
pub mod settings;
pub mod subject;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use decision::{Disposition, SkipReason};
    use error::SweepError;
    use job::{JobStatus, StatusTier};
    use qc::{QcRow, QcTable, QcValue};
    use requirement::{Criterion, FileNaming, NameRule, Operator, Threshold};
    use settings::RerunLevel;
    use subject::{CandidateFile, SubjectKey};

    fn file(path: &str) -> CandidateFile {
        CandidateFile {
            path: path.to_string(),
            size: 10,
            last_modified: Utc::now(),
            content_hash: "etag".to_string(),
        }
    }

    // ── FileNaming ───────────────────────────────────────────────────────────

    #[test]
    fn naming_rules_are_conjunctive() {
        let naming = FileNaming {
            rules: vec![
                NameRule { pattern: "T1w.nii.gz".to_string(), present: true },
                NameRule { pattern: "rec-undistorted".to_string(), present: false },
            ],
        };

        assert!(naming.matches("sub-01_ses-V02_run-1_T1w.nii.gz"));
        assert!(!naming.matches("sub-01_ses-V02_rec-undistorted_T1w.nii.gz"));
        assert!(!naming.matches("sub-01_ses-V02_T2w.nii.gz"));
    }

    #[test]
    fn empty_naming_matches_everything() {
        assert!(FileNaming::default().matches("anything.txt"));
    }

    // ── Criterion ────────────────────────────────────────────────────────────

    #[test]
    fn criterion_operators() {
        let lt = Criterion {
            field: "score".to_string(),
            threshold: Threshold::Number(3.0),
            operator: Operator::LessThan,
        };
        assert!(lt.holds(&QcValue::Number(2.0)));
        assert!(!lt.holds(&QcValue::Number(3.0)));
        assert!(!lt.is_gate_only());

        let gt = Criterion {
            field: "snr".to_string(),
            threshold: Threshold::Number(10.0),
            operator: Operator::GreaterThan,
        };
        assert!(gt.holds(&QcValue::Number(10.5)));
        assert!(!gt.holds(&QcValue::Number(10.0)));

        let eq = Criterion {
            field: "QU_motion".to_string(),
            threshold: Threshold::Bool(true),
            operator: Operator::Equals,
        };
        assert!(eq.holds(&QcValue::Bool(true)));
        assert!(!eq.holds(&QcValue::Bool(false)));
        assert!(eq.is_gate_only());
    }

    #[test]
    fn criterion_kind_mismatch_fails() {
        let lt = Criterion {
            field: "score".to_string(),
            threshold: Threshold::Number(3.0),
            operator: Operator::LessThan,
        };
        assert!(!lt.holds(&QcValue::Bool(true)));
        assert!(!lt.holds(&QcValue::Text("1".to_string())));
    }

    #[test]
    fn boolean_threshold_accepts_numeric_review_flags() {
        let pass = Criterion {
            field: "QU_motion".to_string(),
            threshold: Threshold::Bool(true),
            operator: Operator::Equals,
        };
        assert!(pass.holds(&QcValue::parse("1")));
        assert!(!pass.holds(&QcValue::parse("0")));
        assert!(!pass.holds(&QcValue::parse("2")));

        let reject = Criterion {
            field: "excluded".to_string(),
            threshold: Threshold::Bool(false),
            operator: Operator::Equals,
        };
        assert!(reject.holds(&QcValue::parse("0")));

        let one = Criterion {
            field: "QU_motion".to_string(),
            threshold: Threshold::Number(1.0),
            operator: Operator::Equals,
        };
        assert!(one.holds(&QcValue::Bool(true)));
    }

    // ── QC table ─────────────────────────────────────────────────────────────

    #[test]
    fn qc_value_parsing() {
        assert_eq!(QcValue::parse("n/a"), QcValue::Null);
        assert_eq!(QcValue::parse(""), QcValue::Null);
        assert_eq!(QcValue::parse("True"), QcValue::Bool(true));
        assert_eq!(QcValue::parse("false"), QcValue::Bool(false));
        assert_eq!(QcValue::parse("2.5"), QcValue::Number(2.5));
        assert_eq!(QcValue::parse("good"), QcValue::Text("good".to_string()));
    }

    #[test]
    fn qc_lookup_matches_filename_substring() {
        let mut values = std::collections::BTreeMap::new();
        values.insert("score".to_string(), QcValue::Number(1.0));
        let table = QcTable {
            columns: vec!["filename".to_string(), "score".to_string()],
            rows: vec![QcRow {
                filename: "anat/sub-01_ses-V02_T1w.nii.gz".to_string(),
                values,
            }],
        };

        assert_eq!(table.value("sub-01_ses-V02_T1w.nii.gz", "score"), QcValue::Number(1.0));
        assert_eq!(table.value("sub-01_ses-V02_T1w.nii.gz", "absent"), QcValue::Null);
        assert_eq!(table.value("sub-01_ses-V02_T2w.nii.gz", "score"), QcValue::Null);
    }

    // ── CandidateFile ────────────────────────────────────────────────────────

    #[test]
    fn candidate_path_helpers() {
        let f = file("sub-01/ses-V02/anat/sub-01_ses-V02_T1w.nii.gz");
        assert_eq!(f.file_name(), "sub-01_ses-V02_T1w.nii.gz");
        assert_eq!(f.subject_relative_path(), "ses-V02/anat/sub-01_ses-V02_T1w.nii.gz");
        assert!(!f.is_session_agnostic());

        assert!(file("sub-01/sub-01_sessions.tsv").is_session_agnostic());
    }

    #[test]
    fn subject_key_label() {
        assert_eq!(SubjectKey::new("sub-01", "ses-V02").label(), "sub-01_ses-V02");
        assert_eq!(SubjectKey::new("sub-01", "").label(), "sub-01");
    }

    // ── Job status taxonomy ──────────────────────────────────────────────────

    #[test]
    fn job_status_tiers() {
        assert_eq!(JobStatus::from("Terminated".to_string()).tier(), StatusTier::Infrastructure);
        assert_eq!(JobStatus::from("Failed To Setup".to_string()).tier(), StatusTier::Infrastructure);
        assert_eq!(JobStatus::from("Failed On Cluster".to_string()).tier(), StatusTier::Processing);
        assert_eq!(JobStatus::from("Completed".to_string()).tier(), StatusTier::Live);
        assert_eq!(JobStatus::from("Something New".to_string()).tier(), StatusTier::Live);
    }

    #[test]
    fn job_status_serializes_as_broker_string() {
        let json = serde_json::to_string(&JobStatus::FailedToPostProcess).unwrap();
        assert_eq!(json, "\"Failed To PostProcess\"");
        let back: JobStatus = serde_json::from_str("\"Queued\"").unwrap();
        assert_eq!(back, JobStatus::Queued);
    }

    #[test]
    fn rerun_level_from_integer() {
        let level: RerunLevel = serde_json::from_str("2").unwrap();
        assert_eq!(level, RerunLevel::AnyFailure);
        assert!(serde_json::from_str::<RerunLevel>("3").is_err());
    }

    // ── Disposition and errors ───────────────────────────────────────────────

    #[test]
    fn disposition_display() {
        let d = Disposition::NoProcessing { reason: SkipReason::AncestorDrift };
        assert_eq!(d.to_string(), "No Processing: Ancestor Drift");
        assert_eq!(Disposition::Submitted { job_id: 7 }.to_string(), "Submitted (7)");
    }

    #[test]
    fn conflicting_requirement_display() {
        let err = SweepError::ConflictingRequirement {
            role: "T1w".to_string(),
            first_group: "full".to_string(),
            second_group: "t1_only".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("T1w"));
        assert!(msg.contains("full"));
        assert!(msg.contains("t1_only"));
    }

    #[test]
    fn only_broker_unavailable_is_transient() {
        assert!(SweepError::BrokerUnavailable { reason: "timeout".to_string() }.is_transient());
        assert!(!SweepError::SubmissionRejected { reason: "bad tool".to_string() }.is_transient());
    }
}
