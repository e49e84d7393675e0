//! The JSON Schema (draft-07) for pipeline documents.

use serde_json::{json, Value};

/// Schema identifier reported in log events.
pub const SCHEMA_ID: &str = "bidsweep-pipeline-v1";

/// The structural schema every pipeline document must satisfy.
pub fn pipeline_schema() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "required": ["pipeline", "tool_config_id", "requirement_groups"],
        "additionalProperties": false,
        "properties": {
            "pipeline": { "type": "string", "minLength": 1 },
            "tool_config_id": { "type": "integer", "minimum": 0 },
            "requirement_groups": {
                "type": "object",
                "minProperties": 1,
                "additionalProperties": { "$ref": "#/definitions/group" }
            },
            "external_requirements": {
                "type": "object",
                "additionalProperties": { "$ref": "#/definitions/external" }
            },
            "associated_files": {
                "type": "object",
                "additionalProperties": {
                    "type": "array",
                    "minItems": 1,
                    "items": { "type": "string", "minLength": 1 }
                }
            },
            "ancestor_pipelines": {
                "type": "array",
                "uniqueItems": true,
                "items": { "type": "string", "minLength": 1 }
            },
            "invoke_params": { "type": "object" },
            "min_file_age_days": { "type": "integer", "minimum": 0 }
        },
        "definitions": {
            "group": {
                "type": "object",
                "minProperties": 1,
                "additionalProperties": { "$ref": "#/definitions/spec" }
            },
            "spec": {
                "type": "object",
                "required": ["file_naming"],
                "additionalProperties": false,
                "properties": {
                    "file_naming": {
                        "type": "object",
                        "minProperties": 1,
                        "additionalProperties": { "type": "boolean" }
                    },
                    "qc_criteria": {
                        "type": "array",
                        "minItems": 1,
                        "items": {
                            "type": "array",
                            "minItems": 1,
                            "items": { "$ref": "#/definitions/criterion" }
                        }
                    },
                    "num_to_keep": {
                        "oneOf": [
                            { "type": "integer", "minimum": 1 },
                            { "const": "all" }
                        ]
                    }
                }
            },
            "criterion": {
                "type": "object",
                "minProperties": 1,
                "additionalProperties": {
                    "type": "array",
                    "minItems": 2,
                    "maxItems": 2,
                    "items": [
                        { "type": ["boolean", "number", "string"] },
                        { "enum": ["equals", "less_than", "greater_than"] }
                    ]
                }
            },
            "external": {
                "oneOf": [
                    {
                        "type": "object",
                        "required": ["static_id"],
                        "additionalProperties": false,
                        "properties": {
                            "static_id": { "type": "integer", "minimum": 0 }
                        }
                    },
                    {
                        "type": "object",
                        "required": ["type"],
                        "additionalProperties": false,
                        "properties": {
                            "type": { "type": "string", "minLength": 1 },
                            "name": { "type": "string", "minLength": 1 }
                        }
                    }
                ]
            }
        }
    })
}
