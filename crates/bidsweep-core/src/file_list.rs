//! Extended file-list rendering.
//!
//! An extended file list is a one-row CSV describing a registered subject
//! folder plus the subset of its files a job should see:
//!
//! ```text
//! 9001,"sub-01",52342,"BidsSubject","bids_provider","sweeper","study","{""all_to_keep"":[""ses-V01/anat/sub-01_ses-V01_T1w.nii.gz""]}"
//! ```

use bidsweep_contracts::{
    error::{SweepError, SweepResult},
    pipeline::BIDS_SUBJECT_TYPE,
    subject::CandidateFile,
};

/// The registry-side description of the subject folder.
#[derive(Debug, Clone)]
pub struct FileListHeader<'a> {
    pub subject_id: u64,
    pub subject: &'a str,
    pub size: u64,
    pub provider_name: &'a str,
    pub user_name: &'a str,
    pub group_name: &'a str,
}

/// Render the file list for `selected`.
///
/// Paths are written relative to the subject folder, in selection order.
pub fn render_file_list(header: &FileListHeader<'_>, selected: &[CandidateFile]) -> SweepResult<Vec<u8>> {
    let keep: Vec<&str> = selected.iter().map(|f| f.subject_relative_path()).collect();
    let extra = serde_json::json!({ "all_to_keep": keep }).to_string();

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .quote_style(csv::QuoteStyle::NonNumeric)
        .from_writer(Vec::new());

    writer
        .write_record([
            header.subject_id.to_string().as_str(),
            header.subject,
            header.size.to_string().as_str(),
            BIDS_SUBJECT_TYPE,
            header.provider_name,
            header.user_name,
            header.group_name,
            extra.as_str(),
        ])
        .map_err(|e| SweepError::StorageError {
            reason: format!("failed to render file list for {}: {e}", header.subject),
        })?;

    writer.into_inner().map_err(|e| SweepError::StorageError {
        reason: format!("failed to render file list for {}: {e}", header.subject),
    })
}
