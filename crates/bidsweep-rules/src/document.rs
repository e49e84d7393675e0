//! Pipeline document types and their resolution into `PipelineConfig`.
//!
//! A `PipelineDocument` is deserialized from one pipeline JSON file after it
//! has passed schema validation. `resolve` turns it into the typed
//! configuration the engine evaluates, deciding each role's shape (QC or
//! not, bounded or not) once.
//!
//! Example:
//! ```json
//! {
//!   "pipeline": "mriqc",
//!   "tool_config_id": 4331,
//!   "requirement_groups": {
//!     "full": {
//!       "T1w": {
//!         "file_naming": { "T1w.nii.gz": true, "rec-": false },
//!         "qc_criteria": [[{ "QU_motion": [true, "equals"] }, { "aqc_score": [3, "less_than"] }]],
//!         "num_to_keep": 1
//!       }
//!     }
//!   },
//!   "external_requirements": { "bids_dir": { "type": "BidsSubject" } }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use bidsweep_contracts::{
    error::{SweepError, SweepResult},
    pipeline::{AssociatedRule, ExternalRequirement, ExternalSource, PipelineConfig},
    requirement::{
        CriteriaTier, Criterion, FileNaming, KeepPolicy, NameRule, Operator, RequirementGroup,
        RequirementSpec, Threshold,
    },
};

/// Default name template for registry lookups.
pub const DEFAULT_NAME_TEMPLATE: &str = "{subject}";

/// The top-level structure of a pipeline JSON document.
///
/// Ordered sections are kept as JSON maps; `serde_json` preserves their
/// declaration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDocument {
    pub pipeline: String,
    pub tool_config_id: u64,
    pub requirement_groups: Map<String, Value>,
    #[serde(default)]
    pub external_requirements: Map<String, Value>,
    /// Substring to list of replacements.
    #[serde(default)]
    pub associated_files: Map<String, Value>,
    #[serde(default)]
    pub ancestor_pipelines: Vec<String>,
    #[serde(default)]
    pub invoke_params: Map<String, Value>,
    #[serde(default)]
    pub min_file_age_days: u32,
}

/// One role's rule as written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawSpec {
    pub file_naming: Map<String, Value>,
    /// Fallback tiers of `{field: [threshold, operator]}` objects.
    pub qc_criteria: Option<Vec<Vec<Map<String, Value>>>>,
    pub num_to_keep: Option<RawKeep>,
}

/// `num_to_keep`: a positive count or `"all"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawKeep {
    Count(usize),
    Keyword(String),
}

/// One external requirement as written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawExternal {
    Static {
        static_id: u64,
    },
    Lookup {
        #[serde(rename = "type")]
        file_type: String,
        name: Option<String>,
    },
}

impl PipelineDocument {
    /// Parse a document from JSON text.
    pub fn from_json_str(s: &str) -> SweepResult<Self> {
        serde_json::from_str(s).map_err(|e| SweepError::ConfigError {
            reason: format!("failed to parse pipeline document: {e}"),
        })
    }

    /// Resolve into the typed configuration.
    pub fn resolve(self) -> SweepResult<PipelineConfig> {
        let name = self.pipeline;

        let mut groups = Vec::with_capacity(self.requirement_groups.len());
        for (group_name, group) in self.requirement_groups {
            let Value::Object(specs) = group else {
                return Err(config_error(&name, format!("group '{group_name}' is not an object")));
            };
            let mut resolved = Vec::with_capacity(specs.len());
            for (role, raw) in specs {
                let raw: RawSpec = serde_json::from_value(raw)
                    .map_err(|e| config_error(&name, format!("{group_name}.{role}: {e}")))?;
                resolved.push(resolve_spec(&name, role, raw)?);
            }
            groups.push(RequirementGroup {
                name: group_name,
                specs: resolved,
            });
        }

        let mut external_requirements = Vec::with_capacity(self.external_requirements.len());
        for (input, raw) in self.external_requirements {
            let raw: RawExternal = serde_json::from_value(raw)
                .map_err(|e| config_error(&name, format!("external requirement '{input}': {e}")))?;
            let source = match raw {
                RawExternal::Static { static_id } => ExternalSource::Static { id: static_id },
                RawExternal::Lookup { file_type, name } => ExternalSource::Lookup {
                    file_type,
                    name_template: name.unwrap_or_else(|| DEFAULT_NAME_TEMPLATE.to_string()),
                },
            };
            external_requirements.push(ExternalRequirement { name: input, source });
        }

        let mut associated_files = Vec::with_capacity(self.associated_files.len());
        for (pattern, raw) in self.associated_files {
            let replacements: Vec<String> = serde_json::from_value(raw)
                .map_err(|e| config_error(&name, format!("associated files for '{pattern}': {e}")))?;
            associated_files.push(AssociatedRule { pattern, replacements });
        }

        Ok(PipelineConfig {
            name,
            tool_config_id: self.tool_config_id,
            groups,
            external_requirements,
            associated_files,
            ancestors: self.ancestor_pipelines,
            invoke_params: self.invoke_params,
            min_file_age_days: self.min_file_age_days,
        })
    }
}

fn resolve_spec(pipeline: &str, role: String, raw: RawSpec) -> SweepResult<RequirementSpec> {
    let mut rules = Vec::with_capacity(raw.file_naming.len());
    for (pattern, present) in raw.file_naming {
        let present = present
            .as_bool()
            .ok_or_else(|| config_error(pipeline, format!("{role}: naming rule '{pattern}' is not a boolean")))?;
        rules.push(NameRule { pattern, present });
    }
    let naming = FileNaming { rules };

    let keep = match raw.num_to_keep {
        None => KeepPolicy::Unbounded,
        Some(RawKeep::Count(0)) => {
            return Err(config_error(pipeline, format!("{role}: num_to_keep must be positive")));
        }
        Some(RawKeep::Count(n)) => KeepPolicy::Bounded(n),
        Some(RawKeep::Keyword(k)) if k == "all" => KeepPolicy::Unbounded,
        Some(RawKeep::Keyword(k)) => {
            return Err(config_error(pipeline, format!("{role}: unknown num_to_keep '{k}'")));
        }
    };

    let Some(raw_tiers) = raw.qc_criteria.filter(|t| !t.is_empty()) else {
        return Ok(RequirementSpec::NoQc { role, naming, keep });
    };

    let mut tiers = Vec::with_capacity(raw_tiers.len());
    for raw_tier in raw_tiers {
        let mut criteria = Vec::new();
        for (field, pair) in raw_tier.into_iter().flatten() {
            criteria.push(resolve_criterion(pipeline, &role, field, pair)?);
        }
        tiers.push(CriteriaTier { criteria });
    }
    Ok(RequirementSpec::WithQc { role, naming, tiers, keep })
}

fn resolve_criterion(pipeline: &str, role: &str, field: String, pair: Value) -> SweepResult<Criterion> {
    let bad = |detail: &str| config_error(pipeline, format!("{role}: criterion '{field}' {detail}"));

    let Value::Array(items) = pair else {
        return Err(bad("must be a [threshold, operator] pair"));
    };
    let [threshold, operator] = <[Value; 2]>::try_from(items)
        .map_err(|_| bad("must be a [threshold, operator] pair"))?;

    let threshold = match threshold {
        Value::Bool(b) => Threshold::Bool(b),
        Value::Number(n) => Threshold::Number(n.as_f64().ok_or_else(|| bad("has a non-finite threshold"))?),
        Value::String(s) => Threshold::Text(s),
        _ => return Err(bad("has an unsupported threshold type")),
    };
    let operator: Operator = serde_json::from_value(operator).map_err(|_| bad("has an unknown operator"))?;

    Ok(Criterion { field, threshold, operator })
}

fn config_error(pipeline: &str, detail: String) -> SweepError {
    SweepError::ConfigError {
        reason: format!("pipeline '{pipeline}': {detail}"),
    }
}
