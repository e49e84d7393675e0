//! Subject and session discovery from object listings.

use std::collections::{BTreeMap, BTreeSet};

use bidsweep_contracts::{
    error::SweepResult,
    qc::{QcRow, QcTable, QcValue},
    subject::{CandidateFile, ObjectInfo, SubjectKey},
};

use crate::traits::ObjectStore;

/// Scans tables end with this suffix (BIDS `*_scans.tsv`).
pub const SCANS_SUFFIX: &str = "_scans.tsv";

/// Normalize a prefix to end with exactly one `/` (or be empty).
pub fn dir_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}/")
    }
}

/// Find every subject/session below `prefix`.
///
/// Subjects are `sub-*` folders directly under the prefix; sessions are
/// `ses-*` folders directly under a subject. A subject without session
/// folders yields one key with an empty session.
pub fn discover_subjects(
    store: &dyn ObjectStore,
    bucket: &str,
    prefix: &str,
) -> SweepResult<Vec<SubjectKey>> {
    let base = dir_prefix(prefix);
    let mut sessions: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for object in store.list(bucket, &base) {
        let object = object?;
        let Some(relative) = object.key.strip_prefix(&base) else {
            continue;
        };
        let mut parts = relative.split('/');
        let Some(subject) = parts.next().filter(|s| s.starts_with("sub-")) else {
            continue;
        };
        let entry = sessions.entry(subject.to_string()).or_default();
        // Only folders count: the session segment must not be the file name.
        let rest: Vec<&str> = parts.collect();
        if rest.len() > 1 && rest[0].starts_with("ses-") {
            entry.insert(rest[0].to_string());
        }
    }

    let mut keys = Vec::new();
    for (subject, found) in sessions {
        if found.is_empty() {
            keys.push(SubjectKey::new(subject, ""));
        } else {
            keys.extend(found.into_iter().map(|s| SubjectKey::new(subject.clone(), s)));
        }
    }
    Ok(keys)
}

/// Convert a subject's objects into candidates for one session.
///
/// Files inside other sessions' folders are dropped; session-agnostic files
/// are kept for every session.
pub fn session_candidates(objects: &[ObjectInfo], base: &str, key: &SubjectKey) -> Vec<CandidateFile> {
    let mut files: Vec<CandidateFile> = objects
        .iter()
        .filter_map(|o| o.key.strip_prefix(base).map(|rel| (rel, o)))
        .map(|(rel, o)| CandidateFile {
            path: rel.to_string(),
            size: o.size,
            last_modified: o.last_modified,
            content_hash: o.etag.clone(),
        })
        .filter(|f| {
            f.is_session_agnostic()
                || key.session.is_empty()
                || f.path.split('/').any(|seg| seg == key.session)
        })
        .collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));
    files
}

/// Locate the session's scans table among its candidates.
pub fn find_scans_file<'a>(files: &'a [CandidateFile], key: &SubjectKey) -> Option<&'a CandidateFile> {
    let expected = format!("{}{}", key.label(), SCANS_SUFFIX);
    files
        .iter()
        .find(|f| f.file_name() == expected)
        .or_else(|| {
            files
                .iter()
                .find(|f| !f.is_session_agnostic() && f.file_name().ends_with(SCANS_SUFFIX))
        })
}

/// Parse a tab-separated scans table.
///
/// The `filename` column keys rows; every other column becomes a QC measure.
/// A table without a `filename` column has no usable rows.
pub fn parse_scans_table(body: &[u8]) -> Result<QcTable, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(body);

    let columns: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let Some(key_index) = columns.iter().position(|c| c == "filename") else {
        return Ok(QcTable { columns, rows: Vec::new() });
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let Some(filename) = record.get(key_index) else {
            continue;
        };
        let values: BTreeMap<String, QcValue> = columns
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != key_index)
            .map(|(i, name)| (name.clone(), record.get(i).map(QcValue::parse).unwrap_or(QcValue::Null)))
            .collect();
        rows.push(QcRow {
            filename: filename.trim().to_string(),
            values,
        });
    }

    Ok(QcTable { columns, rows })
}
