//! Quality-control table types.
//!
//! A `QcTable` holds one row per acquisition for a subject/session (the
//! session's `scans.tsv`). Rows are keyed by file name; columns are arbitrary
//! named measures referenced by requirement criteria.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single QC measurement.
///
/// `Null` marks an undefined value (empty cell, `n/a`, missing column, or no
/// matching row). Criteria that reference a `Null` field cannot be evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QcValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Null,
}

impl QcValue {
    /// Interpret one raw table cell.
    ///
    /// Empty cells and the BIDS `n/a` marker are null. `true`/`false` (any
    /// case) are booleans. Anything that parses as a finite float is numeric.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("n/a") || trimmed.eq_ignore_ascii_case("nan") {
            return QcValue::Null;
        }
        if trimmed.eq_ignore_ascii_case("true") {
            return QcValue::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return QcValue::Bool(false);
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => QcValue::Number(n),
            _ => QcValue::Text(trimmed.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, QcValue::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            QcValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// One acquisition's QC measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QcRow {
    /// The row key, usually a path such as `anat/sub-0001_ses-V02_T1w.nii.gz`.
    pub filename: String,
    pub values: BTreeMap<String, QcValue>,
}

/// The QC table for one subject/session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QcTable {
    pub columns: Vec<String>,
    pub rows: Vec<QcRow>,
}

impl QcTable {
    /// Find the row describing `file_name`.
    ///
    /// A row matches when its key contains the file name as a substring,
    /// which covers keys carrying a datatype folder prefix.
    pub fn row_for(&self, file_name: &str) -> Option<&QcRow> {
        self.rows.iter().find(|row| row.filename.contains(file_name))
    }

    /// The value of `field` for `file_name`, or `Null` when undefined.
    pub fn value(&self, file_name: &str, field: &str) -> QcValue {
        self.row_for(file_name)
            .and_then(|row| row.values.get(field))
            .cloned()
            .unwrap_or(QcValue::Null)
    }
}
