//! Trace event and log types.
//!
//! `TraceEvent` wraps one `DecisionRow` with its position in the sweep and
//! the SHA-256 hashes that make later edits detectable. `TraceLog` is the
//! sealed record exported when a sweep finalizes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bidsweep_contracts::{
    decision::DecisionRow,
    error::{SweepError, SweepResult},
};

use crate::chain::verify_chain;

/// A single entry in the hash chain for one sweep.
///
/// Modifying any field, including those of the embedded `row`, invalidates
/// `this_hash` and every later `prev_hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Position in the chain, starting at 0.
    pub sequence: u64,

    pub sweep_id: String,

    /// The decision recorded for one subject/session.
    pub row: DecisionRow,

    /// Hash of the previous event, or `GENESIS_HASH` for the first event.
    pub prev_hash: String,

    /// Hash over (sweep_id, sequence, prev_hash, canonical JSON of row).
    pub this_hash: String,
}

impl TraceEvent {
    /// The `prev_hash` of the first event in every chain.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// A sealed decision trace for one sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceLog {
    pub sweep_id: String,

    /// Events in chain order.
    pub events: Vec<TraceEvent>,

    pub finalized_at: DateTime<Utc>,

    /// The `this_hash` of the last event. Empty when the sweep saw no subject.
    pub terminal_hash: String,
}

impl TraceLog {
    /// Parse an exported log.
    pub fn from_json_str(s: &str) -> SweepResult<Self> {
        serde_json::from_str(s).map_err(|e| SweepError::ConfigError {
            reason: format!("invalid trace log: {e}"),
        })
    }

    pub fn to_json_pretty(&self) -> SweepResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| SweepError::TraceWriteFailed {
            reason: format!("failed to serialize trace log: {e}"),
        })
    }

    /// The decision rows in the order they were written.
    pub fn rows(&self) -> Vec<DecisionRow> {
        self.events.iter().map(|e| e.row.clone()).collect()
    }

    /// True when the chain verifies, every event belongs to this sweep, and
    /// the terminal hash matches the last event.
    pub fn verify(&self) -> bool {
        let terminal = self.events.last().map(|e| e.this_hash.as_str()).unwrap_or_default();
        verify_chain(&self.events)
            && self.events.iter().all(|e| e.sweep_id == self.sweep_id)
            && terminal == self.terminal_hash
    }
}
