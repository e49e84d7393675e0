//! Pipeline document validator.
//!
//! `PipelineValidator` checks a raw pipeline document in two phases:
//!
//! 1. **Structural**: the document is validated against
//!    [`schema::pipeline_schema`](crate::schema::pipeline_schema) with the
//!    `jsonschema` crate.
//! 2. **Semantic**: cross-field rules are evaluated in a fixed order. All
//!    failures are collected before returning so operators see the full
//!    failure set in one pass.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, warn};

use bidsweep_contracts::{
    error::{SweepError, SweepResult},
    pipeline::BIDS_SUBJECT_TYPE,
};

use crate::schema::{pipeline_schema, SCHEMA_ID};

/// One validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFailure {
    /// `json-schema`, `role-consistency`, `single-file-list-input`,
    /// `boolean-operator`, or `self-ancestor`.
    pub rule_id: String,
    pub message: String,
}

/// A role declared differently in two groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleConflict {
    pub role: String,
    pub first_group: String,
    pub second_group: String,
}

/// The outcome of validating one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigReport {
    pub passed: bool,
    pub failures: Vec<ConfigFailure>,
    pub conflicts: Vec<RoleConflict>,
}

impl ConfigReport {
    /// Convert to a `SweepResult`.
    ///
    /// A role conflict takes precedence and maps to
    /// `SweepError::ConflictingRequirement`; any other failure maps to
    /// `SweepError::SchemaValidation` listing every failure.
    pub fn into_result(self, document: &str) -> SweepResult<()> {
        if let Some(conflict) = self.conflicts.into_iter().next() {
            return Err(SweepError::ConflictingRequirement {
                role: conflict.role,
                first_group: conflict.first_group,
                second_group: conflict.second_group,
            });
        }
        if self.passed {
            return Ok(());
        }
        let summary = self
            .failures
            .iter()
            .map(|f| format!("[{}] {}", f.rule_id, f.message))
            .collect::<Vec<_>>()
            .join("; ");
        Err(SweepError::SchemaValidation {
            reason: format!("{document}: {summary}"),
        })
    }
}

/// Validates pipeline documents. Compile once, validate many.
pub struct PipelineValidator {
    validator: jsonschema::Validator,
}

impl PipelineValidator {
    /// Compile the pipeline schema.
    ///
    /// # Errors
    ///
    /// `SweepError::ConfigError` if the embedded schema fails to compile.
    pub fn new() -> SweepResult<Self> {
        let validator = jsonschema::validator_for(&pipeline_schema()).map_err(|e| SweepError::ConfigError {
            reason: format!("invalid pipeline schema: {e}"),
        })?;
        Ok(Self { validator })
    }

    /// Validate `document`, collecting every failure.
    pub fn validate(&self, document: &Value) -> ConfigReport {
        let mut failures: Vec<ConfigFailure> = Vec::new();

        // ── Phase 1: JSON Schema structural validation ───────────────────────
        for error in self.validator.iter_errors(document) {
            let message = format!("JSON Schema violation at {}: {}", error.instance_path, error);
            warn!(schema_id = SCHEMA_ID, %message, "structural validation failure");
            failures.push(ConfigFailure {
                rule_id: "json-schema".to_string(),
                message,
            });
        }

        // ── Phase 2: Semantic rules ──────────────────────────────────────────
        //
        // Each rule tolerates shapes phase 1 already rejected.
        let conflicts = role_conflicts(document);
        for c in &conflicts {
            let message = format!(
                "role '{}' differs between groups '{}' and '{}'",
                c.role, c.first_group, c.second_group
            );
            warn!(rule_id = "role-consistency", %message, "semantic rule failed");
            failures.push(ConfigFailure {
                rule_id: "role-consistency".to_string(),
                message,
            });
        }

        let semantic = [
            ("single-file-list-input", single_file_list_input(document)),
            ("boolean-operator", boolean_operators(document)),
            ("self-ancestor", self_ancestor(document)),
        ];
        for (rule_id, messages) in semantic {
            debug!(rule_id, "evaluated semantic rule");
            for message in messages {
                warn!(rule_id, %message, "semantic rule failed");
                failures.push(ConfigFailure {
                    rule_id: rule_id.to_string(),
                    message,
                });
            }
        }

        let passed = failures.is_empty();
        debug!(passed, failure_count = failures.len(), "pipeline validation complete");

        ConfigReport {
            passed,
            failures,
            conflicts,
        }
    }
}

// ── Semantic rules ───────────────────────────────────────────────────────────

fn groups(document: &Value) -> impl Iterator<Item = (&String, &serde_json::Map<String, Value>)> {
    document
        .get("requirement_groups")
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(|groups| groups.iter())
        .filter_map(|(name, group)| group.as_object().map(|g| (name, g)))
}

/// Roles shared between groups must be textually identical.
fn role_conflicts(document: &Value) -> Vec<RoleConflict> {
    let mut first_seen: BTreeMap<&str, (&str, String)> = BTreeMap::new();
    let mut conflicts = Vec::new();

    for (group, specs) in groups(document) {
        for (role, spec) in specs {
            let text = spec.to_string();
            match first_seen.get(role.as_str()) {
                Some((first_group, first_text)) if *first_text != text => conflicts.push(RoleConflict {
                    role: role.clone(),
                    first_group: first_group.to_string(),
                    second_group: group.clone(),
                }),
                Some(_) => {}
                None => {
                    first_seen.insert(role.as_str(), (group.as_str(), text));
                }
            }
        }
    }
    conflicts
}

/// At most one external requirement may receive the generated file list.
fn single_file_list_input(document: &Value) -> Vec<String> {
    let inputs: Vec<&String> = document
        .get("external_requirements")
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(|reqs| reqs.iter())
        .filter(|(_, req)| req.get("type").and_then(Value::as_str) == Some(BIDS_SUBJECT_TYPE))
        .map(|(name, _)| name)
        .collect();

    if inputs.len() > 1 {
        let names: Vec<&str> = inputs.iter().map(|n| n.as_str()).collect();
        vec![format!(
            "only one external requirement may have type '{BIDS_SUBJECT_TYPE}', found {}",
            names.join(", ")
        )]
    } else {
        Vec::new()
    }
}

/// Boolean and text thresholds only support `equals`.
fn boolean_operators(document: &Value) -> Vec<String> {
    let mut messages = Vec::new();
    for (group, specs) in groups(document) {
        for (role, spec) in specs {
            let tiers = spec.get("qc_criteria").and_then(Value::as_array);
            for tier in tiers.into_iter().flatten().filter_map(Value::as_array) {
                for (field, pair) in tier.iter().filter_map(Value::as_object).flatten() {
                    let (Some(threshold), Some(op)) = (pair.get(0), pair.get(1).and_then(Value::as_str)) else {
                        continue;
                    };
                    if !threshold.is_number() && op != "equals" {
                        messages.push(format!(
                            "{group}.{role}: field '{field}' compares a non-numeric threshold with '{op}'"
                        ));
                    }
                }
            }
        }
    }
    messages
}

/// A pipeline cannot be its own ancestor.
fn self_ancestor(document: &Value) -> Vec<String> {
    let Some(name) = document.get("pipeline").and_then(Value::as_str) else {
        return Vec::new();
    };
    let lists_itself = document
        .get("ancestor_pipelines")
        .and_then(Value::as_array)
        .is_some_and(|a| a.iter().any(|v| v.as_str() == Some(name)));
    if lists_itself {
        vec![format!("pipeline '{name}' lists itself as an ancestor")]
    } else {
        Vec::new()
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
