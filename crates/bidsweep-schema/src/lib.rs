//! # bidsweep-schema
//!
//! Validation of pipeline configuration documents.
//!
//! This crate provides [`engine::PipelineValidator`], which checks a raw
//! pipeline JSON document in two phases:
//!
//! 1. **Structural**: JSON Schema validation via the `jsonschema` crate.
//! 2. **Semantic**: rules the schema cannot express (identical roles across
//!    groups, a single file-list input, boolean thresholds with `equals`
//!    only, no self-ancestry).
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use bidsweep_schema::engine::PipelineValidator;
//!
//! let validator = PipelineValidator::new()?;
//! validator.validate(&document).into_result("mriqc")?;
//! ```

pub mod engine;
pub mod schema;
