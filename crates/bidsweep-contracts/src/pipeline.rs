//! Resolved pipeline configuration.
//!
//! A `PipelineConfig` is produced once per sweep from a validated JSON
//! document and is immutable afterwards.

use serde::{Deserialize, Serialize};

use crate::{
    requirement::{RequirementGroup, RequirementSpec},
    subject::SubjectKey,
};

/// Registry type of a registered subject folder.
pub const BIDS_SUBJECT_TYPE: &str = "BidsSubject";

/// Registry type of a generated extended file list.
pub const FILE_LIST_TYPE: &str = "ExtendedCbrainFileList";

/// Where a registry-side input comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExternalSource {
    /// A fixed registry id shared by every subject (e.g. a license file).
    Static { id: u64 },
    /// A registry file of `file_type` whose name renders from `name_template`.
    ///
    /// The template accepts `{subject}` and `{session}` placeholders.
    Lookup {
        file_type: String,
        name_template: String,
    },
}

/// A named pipeline input that must already exist in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRequirement {
    /// The tool's input id, also used for the `CBRAIN_<name>` trace column.
    pub name: String,
    pub source: ExternalSource,
}

impl ExternalRequirement {
    /// True when this input receives the generated file list.
    pub fn takes_file_list(&self) -> bool {
        matches!(&self.source, ExternalSource::Lookup { file_type, .. } if file_type == BIDS_SUBJECT_TYPE)
    }
}

impl ExternalSource {
    /// Render the registry name this source looks up for `key`.
    pub fn owner_name(&self, key: &SubjectKey) -> Option<String> {
        match self {
            ExternalSource::Static { .. } => None,
            ExternalSource::Lookup { name_template, .. } => Some(
                name_template
                    .replace("{subject}", &key.subject)
                    .replace("{session}", &key.session),
            ),
        }
    }

    /// True when the looked-up file belongs to a single subject.
    pub fn is_per_subject(&self) -> bool {
        matches!(self, ExternalSource::Lookup { name_template, .. } if name_template.contains("{subject}"))
    }
}

/// Sidecar lookup: selected names containing `pattern` pull in the files
/// obtained by substituting each replacement, when those files exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociatedRule {
    pub pattern: String,
    pub replacements: Vec<String>,
}

/// Everything the sweep needs to know about one processing pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub tool_config_id: u64,
    /// Declaration order is significant for trace columns.
    pub groups: Vec<RequirementGroup>,
    pub external_requirements: Vec<ExternalRequirement>,
    pub associated_files: Vec<AssociatedRule>,
    pub ancestors: Vec<String>,
    pub invoke_params: serde_json::Map<String, serde_json::Value>,
    /// Selected files must be at least this old. Zero disables the check.
    pub min_file_age_days: u32,
}

impl PipelineConfig {
    /// Every distinct role across all groups, in first-declared order.
    ///
    /// Roles shared between groups are identical (enforced at load time), so
    /// the first occurrence stands for all of them.
    pub fn roles(&self) -> Vec<&RequirementSpec> {
        let mut seen: Vec<&RequirementSpec> = Vec::new();
        for spec in self.groups.iter().flat_map(|g| g.specs.iter()) {
            if !seen.iter().any(|s| s.role() == spec.role()) {
                seen.push(spec);
            }
        }
        seen
    }

    pub fn role_names(&self) -> Vec<String> {
        self.roles().iter().map(|s| s.role().to_string()).collect()
    }

    pub fn external_names(&self) -> Vec<String> {
        self.external_requirements.iter().map(|r| r.name.clone()).collect()
    }
}
