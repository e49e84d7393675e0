//! Ancestor selection comparison.
//!
//! A downstream pipeline may only run when each ancestor's selection, as
//! recomputed today, matches what the ancestor recorded when it was
//! submitted. Identity is path plus size; session-agnostic files (rewritten
//! whenever a session is added) are compared by path only.

use std::collections::{BTreeMap, BTreeSet};

use bidsweep_contracts::{
    decision::SubmissionLog,
    outcome::AncestorStatus,
    subject::CandidateFile,
};

/// Compare today's selection with an ancestor's submission log.
///
/// No log means the ancestor's inputs are unknown, which is unstable.
pub fn compare_selection(current: &[CandidateFile], recorded: Option<&SubmissionLog>) -> AncestorStatus {
    let Some(log) = recorded else {
        return AncestorStatus::NoRecord;
    };

    let now: BTreeMap<&str, &CandidateFile> = current.iter().map(|f| (f.path.as_str(), f)).collect();
    let then: BTreeMap<&str, u64> = log.files.iter().map(|f| (f.path.as_str(), f.size)).collect();

    let now_paths: BTreeSet<&str> = now.keys().copied().collect();
    let then_paths: BTreeSet<&str> = then.keys().copied().collect();
    if now_paths != then_paths {
        return AncestorStatus::FilesChanged {
            added: now_paths.difference(&then_paths).map(|p| p.to_string()).collect(),
            removed: then_paths.difference(&now_paths).map(|p| p.to_string()).collect(),
        };
    }

    for (path, file) in &now {
        if file.is_session_agnostic() {
            continue;
        }
        let recorded_size = then.get(path).copied().unwrap_or_default();
        if recorded_size != file.size {
            return AncestorStatus::SizeChanged {
                path: path.to_string(),
                recorded: recorded_size,
                current: file.size,
            };
        }
    }

    AncestorStatus::Stable
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use bidsweep_contracts::{
        decision::{LoggedFile, SubmissionLog},
        outcome::AncestorStatus,
        subject::CandidateFile,
    };

    use super::compare_selection;

    fn file(path: &str, size: u64) -> CandidateFile {
        CandidateFile {
            path: path.to_string(),
            size,
            last_modified: Utc::now(),
            content_hash: String::new(),
        }
    }

    fn log(files: &[(&str, u64)]) -> SubmissionLog {
        SubmissionLog {
            pipeline: "qsiprep".to_string(),
            subject: "sub-01".to_string(),
            session: "ses-V01".to_string(),
            job_id: 1,
            submitted_at: Utc::now(),
            files: files
                .iter()
                .map(|(p, s)| LoggedFile { path: p.to_string(), size: *s, etag: String::new() })
                .collect(),
        }
    }

    const A: &str = "sub-01/ses-V01/anat/A_T1w.nii.gz";
    const B: &str = "sub-01/ses-V01/dwi/B_dwi.nii.gz";

    #[test]
    fn size_change_is_drift() {
        let status = compare_selection(&[file(A, 150), file(B, 200)], Some(&log(&[(A, 100), (B, 200)])));
        assert_eq!(
            status,
            AncestorStatus::SizeChanged { path: A.to_string(), recorded: 100, current: 150 }
        );
    }

    #[test]
    fn path_change_is_drift_regardless_of_order() {
        let status = compare_selection(&[file(B, 200)], Some(&log(&[(A, 100), (B, 200)])));
        assert_eq!(
            status,
            AncestorStatus::FilesChanged { added: vec![], removed: vec![A.to_string()] }
        );
        let status = compare_selection(&[file(B, 200), file(A, 100)], Some(&log(&[(A, 100), (B, 200)])));
        assert!(status.is_stable());
    }

    #[test]
    fn session_agnostic_size_is_ignored() {
        let sessions = "sub-01/sub-01_sessions.tsv";
        let status = compare_selection(&[file(sessions, 90)], Some(&log(&[(sessions, 40)])));
        assert!(status.is_stable());
    }

    #[test]
    fn missing_log_is_unstable() {
        assert_eq!(compare_selection(&[file(A, 1)], None), AncestorStatus::NoRecord);
    }
}
