//! Tabular rendering of decision rows.
//!
//! Columns are fixed: `subject, pipeline, session, derivatives_found,
//! cbrain_status, scans_tsv_present`, one column per role, one
//! `CBRAIN_<input>` column per external requirement, then
//! `ancestor_files` and `disposition`. Role and external columns follow the
//! order of their first appearance across rows.
//!
//! The HTML report colours each cell by value and appends a legend and
//! per-column value counts.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use bidsweep_contracts::{
    decision::{DecisionRow, Disposition},
    error::{SweepError, SweepResult},
    job::{JobStatus, StatusTier},
};

/// Placeholder for any stage that did not run.
pub const NOT_EVALUATED: &str = "Not Evaluated";

const LEADING: [&str; 6] = [
    "subject",
    "pipeline",
    "session",
    "derivatives_found",
    "cbrain_status",
    "scans_tsv_present",
];
const TRAILING: [&str; 2] = ["ancestor_files", "disposition"];

/// A rendered table: header plus one string cell per column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

fn flag(value: Option<bool>) -> String {
    match value {
        Some(true) => "True".to_string(),
        Some(false) => "False".to_string(),
        None => NOT_EVALUATED.to_string(),
    }
}

fn ancestor(value: Option<bool>) -> String {
    match value {
        Some(true) => "Stable".to_string(),
        Some(false) => "Drifted".to_string(),
        None => NOT_EVALUATED.to_string(),
    }
}

fn disposition(value: &Disposition) -> String {
    match value {
        Disposition::Submitted { job_id } => format!("Submitted {job_id}"),
        Disposition::WouldSubmit => "Would Submit".to_string(),
        Disposition::NoProcessing { reason } => format!("No Processing ({reason})"),
    }
}

/// Build the table for `rows`.
pub fn tabulate(rows: &[DecisionRow]) -> Table {
    let mut roles: Vec<&str> = Vec::new();
    let mut externals: Vec<&str> = Vec::new();
    for row in rows {
        for cell in &row.roles {
            if !roles.contains(&cell.role.as_str()) {
                roles.push(&cell.role);
            }
        }
        for cell in &row.external {
            if !externals.contains(&cell.name.as_str()) {
                externals.push(&cell.name);
            }
        }
    }

    let mut headers: Vec<String> = LEADING.iter().map(|h| h.to_string()).collect();
    headers.extend(roles.iter().map(|r| r.to_string()));
    headers.extend(externals.iter().map(|e| format!("CBRAIN_{e}")));
    headers.extend(TRAILING.iter().map(|h| h.to_string()));

    let body = rows
        .iter()
        .map(|row| {
            let mut cells = vec![
                row.subject.clone(),
                row.pipeline.clone(),
                row.session.clone(),
                flag(row.derivatives_found),
                row.cbrain_status.clone().unwrap_or_else(|| NOT_EVALUATED.to_string()),
                flag(row.scans_tsv_present),
            ];
            for role in &roles {
                let outcome = row.roles.iter().find(|c| c.role == *role).and_then(|c| c.outcome);
                cells.push(outcome.map_or_else(|| NOT_EVALUATED.to_string(), |o| o.label().to_string()));
            }
            for name in &externals {
                let status = row.external.iter().find(|c| c.name == *name).and_then(|c| c.status);
                cells.push(status.map_or_else(|| NOT_EVALUATED.to_string(), |s| s.label().to_string()));
            }
            cells.push(ancestor(row.ancestor_files));
            cells.push(disposition(&row.disposition));
            cells
        })
        .collect();

    Table { headers, rows: body }
}

/// Render `rows` as CSV with a header line.
pub fn render_csv(rows: &[DecisionRow]) -> SweepResult<Vec<u8>> {
    let table = tabulate(rows);
    let to_error = |e: csv::Error| SweepError::TraceWriteFailed {
        reason: format!("failed to render trace CSV: {e}"),
    };

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&table.headers).map_err(to_error)?;
    for row in &table.rows {
        writer.write_record(row).map_err(to_error)?;
    }
    writer.into_inner().map_err(|e| SweepError::TraceWriteFailed {
        reason: format!("failed to render trace CSV: {e}"),
    })
}

/// CSS class for one cell value.
fn cell_class(value: &str) -> &'static str {
    match value {
        "Satisfied" | "Already Processed" | "Stable" => "ok",
        "Failed QC" | "Drifted" => "fail",
        "No File" | "Missing QC" | "No Scans File" => "missing",
        NOT_EVALUATED => "na",
        _ if value.starts_with("Submitted") || value == "Would Submit" => "ok",
        _ => match JobStatus::from(value.to_string()) {
            JobStatus::Other(_) => "",
            status => match status.tier() {
                StatusTier::Infrastructure | StatusTier::Processing => "fail",
                StatusTier::Live => "",
            },
        },
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

const STYLE: &str = "table{border-collapse:collapse;font-family:sans-serif;font-size:12px}\
td,th{border:1px solid #ccc;padding:2px 6px}\
.ok{background:#c8e6c9}.fail{background:#ffcdd2}.missing{background:#fff59d}.na{background:#e0e0e0}";

const LEGEND: [(&str, &str); 4] = [
    ("ok", "Satisfied, already processed, or submitted"),
    ("fail", "Failed QC, ancestor drift, or a failed job status"),
    ("missing", "No file, missing QC, or no scans file: cannot be judged this sweep"),
    ("na", "Not evaluated: an earlier stage decided the disposition"),
];

/// Render `rows` as a standalone HTML report.
pub fn render_html(title: &str, rows: &[DecisionRow]) -> String {
    let table = tabulate(rows);
    let mut html = String::new();

    // Writing to a String cannot fail.
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{0}</title><style>{STYLE}</style></head>\n<body><h1>{0}</h1>\n",
        escape(title)
    );

    html.push_str("<table><tr>");
    for header in &table.headers {
        let _ = write!(html, "<th>{}</th>", escape(header));
    }
    html.push_str("</tr>\n");
    for row in &table.rows {
        html.push_str("<tr>");
        for cell in row {
            let _ = write!(html, "<td class=\"{}\">{}</td>", cell_class(cell), escape(cell));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</table>\n<h2>Legend</h2>\n<table>");
    for (class, meaning) in LEGEND {
        let _ = write!(html, "<tr><td class=\"{class}\">&nbsp;&nbsp;</td><td>{meaning}</td></tr>");
    }
    html.push_str("</table>\n<h2>Counts</h2>\n");

    for (column, header) in table.headers.iter().enumerate().skip(3) {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for row in &table.rows {
            *counts.entry(row[column].as_str()).or_default() += 1;
        }
        let _ = write!(html, "<h3>{}</h3><table>", escape(header));
        for (value, count) in counts {
            let _ = write!(
                html,
                "<tr><td class=\"{}\">{}</td><td>{count}</td></tr>",
                cell_class(value),
                escape(value)
            );
        }
        html.push_str("</table>\n");
    }

    html.push_str("</body></html>\n");
    html
}
