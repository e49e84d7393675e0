//! # bidsweep-rules
//!
//! The eligibility and selection engine for bidsweep.
//!
//! ## Overview
//!
//! This crate provides [`RuleEngine`], which implements the
//! [`SelectionEngine`](bidsweep_core::traits::SelectionEngine) trait. Pipeline
//! rules are declared in JSON documents, validated by `bidsweep-schema`, and
//! resolved once into typed configurations.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use bidsweep_rules::RuleEngine;
//!
//! let engine = RuleEngine::from_dir(Path::new("pipelines"))?;
//! // Pass `engine` to `bidsweep_core::Sweep::new(...)`.
//! ```
//!
//! ## Selection
//!
//! Each role filters candidates by name, resolves a QC tier, ranks the
//! survivors by criteria order, and keeps the top `num_to_keep`. A subject is
//! eligible when every role of at least one requirement group is satisfied.

pub mod ancestor;
pub mod associated;
pub mod catalog;
pub mod criteria;
pub mod document;
pub mod engine;
pub mod rank;

pub use document::PipelineDocument;
pub use engine::{evaluate_group, evaluate_pipeline, select_files, RuleEngine};

// ── Tests ─────────────────────────────────────────────────────────────────────
