//! External requirement resolution against the registry snapshot.
//!
//! External requirements are inputs that must already be registered with the
//! remote platform (not found in object storage). They are resolved once per
//! subject, right before submission, against the registry listing fetched at
//! the start of the sweep.

use tracing::debug;

use bidsweep_contracts::{
    pipeline::{ExternalRequirement, ExternalSource, PipelineConfig, BIDS_SUBJECT_TYPE, FILE_LIST_TYPE},
    registry::{find_file, RegistryFile},
    subject::SubjectKey,
};

/// One external requirement after lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedExternal {
    pub name: String,
    /// Registry id, or `None` when nothing matched.
    pub id: Option<u64>,
    /// The input that is replaced by the subject's generated file list.
    pub takes_file_list: bool,
}

/// Resolve every requirement for `key`, in declaration order.
pub fn resolve_external(
    requirements: &[ExternalRequirement],
    registry: &[RegistryFile],
    key: &SubjectKey,
) -> Vec<ResolvedExternal> {
    requirements
        .iter()
        .map(|req| {
            let id = match &req.source {
                ExternalSource::Static { id } => Some(*id),
                ExternalSource::Lookup { file_type, .. } => req
                    .source
                    .owner_name(key)
                    .and_then(|name| find_file(registry, &name, file_type))
                    .map(|f| f.id),
            };
            debug!(subject = %key.label(), input = %req.name, ?id, "resolved external requirement");
            ResolvedExternal {
                name: req.name.clone(),
                id,
                takes_file_list: req.takes_file_list(),
            }
        })
        .collect()
}

/// The registry name of the subject's generated file list.
pub fn file_list_name(pipeline: &str, key: &SubjectKey) -> String {
    format!("{pipeline}_{}.csv", key.label())
}

/// The subject folder's registry record, if it is registered.
pub fn registered_subject<'a>(registry: &'a [RegistryFile], subject: &str) -> Option<&'a RegistryFile> {
    find_file(registry, subject, BIDS_SUBJECT_TYPE)
}

/// Registry ids that stand for this subject in job input lists.
///
/// Jobs may reference the subject folder directly, one of the file lists
/// generated for it by earlier sweeps of the same pipeline, or any
/// per-subject registry input the pipeline looks up. Static inputs are
/// shared by every subject and never identify one.
pub fn subject_input_ids(registry: &[RegistryFile], pipeline: &PipelineConfig, key: &SubjectKey) -> Vec<u64> {
    let list_name = file_list_name(&pipeline.name, key);
    let mut ids: Vec<u64> = registered_subject(registry, &key.subject)
        .map(|f| f.id)
        .into_iter()
        .collect();
    ids.extend(
        registry
            .iter()
            .filter(|f| f.file_type == FILE_LIST_TYPE && f.name == list_name)
            .map(|f| f.id),
    );

    let per_subject: Vec<ExternalRequirement> = pipeline
        .external_requirements
        .iter()
        .filter(|req| req.source.is_per_subject())
        .cloned()
        .collect();
    for resolved in resolve_external(&per_subject, registry, key) {
        if let Some(id) = resolved.id {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}
