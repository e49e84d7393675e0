//! Capability traits for the sweep.
//!
//! The orchestrator owns no I/O of its own. Everything it touches is one of
//! these injected capabilities:
//!
//! - `ObjectStore`: object listing plus get/put
//! - `FileRegistry`: the remote catalog of registered files
//! - `JobBroker`: job submission and the existing-job snapshot
//! - `SelectionEngine`: the eligibility, selection, and ancestor logic
//! - `DecisionWriter`: the append-only decision trace
//!
//! All calls are blocking. The sweep processes one subject at a time.

use std::collections::BTreeMap;

use bidsweep_contracts::{
    decision::{DecisionRow, SubmissionLog},
    error::SweepResult,
    job::{JobFilter, JobRecord, JobRequest, SubmittedJob},
    outcome::{AncestorVerdict, Eligibility},
    pipeline::PipelineConfig,
    registry::{RegisterOutcome, RegistryFile},
    subject::{ObjectInfo, SubjectListing},
};

/// Lazily paginated listing results.
pub type ObjectIter<'a> = Box<dyn Iterator<Item = SweepResult<ObjectInfo>> + 'a>;

/// Object storage holding BIDS inputs, derivatives, and sweep artifacts.
pub trait ObjectStore: Send + Sync {
    /// List objects whose key starts with `prefix`, in lexical key order when
    /// the store provides it. Each call restarts from the first page.
    fn list<'a>(&'a self, bucket: &str, prefix: &str) -> ObjectIter<'a>;

    /// Fetch an object's bytes. `Ok(None)` when the key does not exist.
    fn get(&self, bucket: &str, key: &str) -> SweepResult<Option<Vec<u8>>>;

    /// Create or replace an object.
    fn put(&self, bucket: &str, key: &str, body: &[u8]) -> SweepResult<()>;
}

/// The remote platform's catalog of registered files.
pub trait FileRegistry: Send + Sync {
    /// Every file registered on `provider_id`.
    fn query_files(&self, provider_id: u64) -> SweepResult<Vec<RegistryFile>>;

    /// Register an object already uploaded to the provider.
    fn register_upload(
        &self,
        name: &str,
        file_type: &str,
        provider_id: u64,
    ) -> SweepResult<RegisterOutcome>;
}

/// The remote job broker.
pub trait JobBroker: Send + Sync {
    /// Submit one job. Transient transport failures are reported as
    /// `SweepError::BrokerUnavailable`; refusals as `SubmissionRejected`.
    fn submit_job(&self, request: &JobRequest) -> SweepResult<SubmittedJob>;

    /// Existing jobs matching `filter`.
    fn list_jobs(&self, filter: &JobFilter) -> SweepResult<Vec<JobRecord>>;

    /// Force the broker to refresh its cached copy of a registry file.
    fn mark_file_stale(&self, file_id: u64) -> SweepResult<()>;
}

/// The rule engine: decides eligibility and selects inputs.
///
/// Implementations are pure with respect to their arguments; they never
/// perform I/O during evaluation.
pub trait SelectionEngine: Send + Sync {
    /// The resolved configuration for `pipeline`.
    fn pipeline(&self, pipeline: &str) -> SweepResult<&PipelineConfig>;

    /// Evaluate every requirement group of `pipeline` against `listing`.
    fn evaluate(&self, pipeline: &str, listing: &SubjectListing) -> SweepResult<Eligibility>;

    /// Recompute each ancestor's selection and compare it with the recorded
    /// submission logs. Ancestors missing from `recorded` are unstable.
    fn check_ancestors(
        &self,
        pipeline: &str,
        listing: &SubjectListing,
        recorded: &BTreeMap<String, SubmissionLog>,
    ) -> SweepResult<AncestorVerdict>;
}

/// The decision trace sink.
///
/// Every subject/session evaluated produces exactly one row. A failed write
/// is fatal: the subject's disposition would otherwise go unexplained.
pub trait DecisionWriter: Send + Sync {
    /// Append one row. Rows are never modified after they are written.
    fn write(&self, row: &DecisionRow) -> SweepResult<()>;

    /// Mark the sweep complete.
    fn finalize(&self, sweep_id: &str) -> SweepResult<()>;
}
