//! Associated-file lookup.
//!
//! Selected files pull in their sidecars (JSON metadata, bval/bvec, sbref)
//! through a static substitution table. A substituted name is only added when
//! that file exists in the listing; associated files are never QC'd.

use tracing::debug;

use bidsweep_contracts::{
    pipeline::AssociatedRule,
    subject::{CandidateFile, SubjectListing},
};

/// The path obtained by rewriting the final segment of `path`.
fn sibling_path(path: &str, file_name: &str, pattern: &str, replacement: &str) -> String {
    let dir = &path[..path.len() - file_name.len()];
    format!("{dir}{}", file_name.replace(pattern, replacement))
}

/// Existing sidecars of `selected`, excluding files already selected.
pub fn associated_files(
    selected: &[CandidateFile],
    rules: &[AssociatedRule],
    listing: &SubjectListing,
) -> Vec<CandidateFile> {
    let mut found: Vec<CandidateFile> = Vec::new();
    for file in selected {
        let name = file.file_name();
        for rule in rules.iter().filter(|r| name.contains(r.pattern.as_str())) {
            for replacement in &rule.replacements {
                let path = sibling_path(&file.path, name, &rule.pattern, replacement);
                let already = selected.iter().chain(found.iter()).any(|f| f.path == path);
                if already {
                    continue;
                }
                match listing.find(&path) {
                    Some(sidecar) => found.push(sidecar.clone()),
                    None => debug!(file = %file.path, sidecar = %path, "associated file not present"),
                }
            }
        }
    }
    found
}
