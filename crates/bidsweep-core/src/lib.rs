//! # bidsweep-core
//!
//! The sweep runtime for bidsweep.
//!
//! This crate provides:
//! - The capability traits (`ObjectStore`, `FileRegistry`, `JobBroker`,
//!   `SelectionEngine`, `DecisionWriter`)
//! - The rerun classifier for existing jobs
//! - Subject discovery, external input resolution, and file-list rendering
//! - The `Sweep` orchestrator that wires them together per subject/session
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bidsweep_core::{Sweep, traits::{ObjectStore, SelectionEngine}};
//! ```

pub mod discovery;
pub mod external;
pub mod file_list;
pub mod orchestrator;
pub mod rerun;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use orchestrator::Sweep;
