//! Error types for the bidsweep processing sweep.
//!
//! All fallible sweep operations return `SweepResult<T>`. Per-subject data
//! problems (missing QC, missing inputs, ancestor drift) are not errors: they
//! are recorded as `NoProcessing` trace rows. Only faults that make the whole
//! sweep untrustworthy surface here.

use thiserror::Error;

/// The unified error type for the sweep.
#[derive(Debug, Error)]
pub enum SweepError {
    /// A pipeline or sweep configuration document is missing or malformed.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// The same role is declared differently in two requirement groups.
    ///
    /// Fatal at load time: role outcomes are shared across groups, so the
    /// definitions must be textually identical.
    #[error("role '{role}' is defined differently in groups '{first_group}' and '{second_group}'")]
    ConflictingRequirement {
        role: String,
        first_group: String,
        second_group: String,
    },

    /// A pipeline document failed structural or semantic validation.
    #[error("schema validation error: {reason}")]
    SchemaValidation { reason: String },

    /// A pipeline name was referenced that the catalog does not hold.
    #[error("unknown pipeline '{name}'")]
    UnknownPipeline { name: String },

    /// Listing, reading, or writing the object store failed.
    #[error("storage error: {reason}")]
    StorageError { reason: String },

    /// The remote file registry could not be queried or updated.
    #[error("registry error: {reason}")]
    RegistryError { reason: String },

    /// The job broker could not be reached. Retried once before it is fatal.
    #[error("job broker unavailable: {reason}")]
    BrokerUnavailable { reason: String },

    /// The job broker refused a submission. Always fatal for the sweep.
    #[error("job submission rejected: {reason}")]
    SubmissionRejected { reason: String },

    /// The decision trace could not record a row.
    ///
    /// A subject whose disposition cannot be recorded must not proceed.
    #[error("trace write failed: {reason}")]
    TraceWriteFailed { reason: String },
}

impl SweepError {
    /// True for failures that may succeed on an immediate retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, SweepError::BrokerUnavailable { .. })
    }
}

/// Convenience alias used throughout the bidsweep crates.
pub type SweepResult<T> = Result<T, SweepError>;
