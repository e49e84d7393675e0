//! Hash-chain primitives.
//!
//! Hash input layout (bytes, in order):
//!   1. sweep_id as UTF-8 bytes
//!   2. sequence as 8-byte little-endian
//!   3. prev_hash as UTF-8 bytes (64 ASCII hex chars)
//!   4. canonical JSON of the decision row

use sha2::{Digest, Sha256};

use bidsweep_contracts::decision::DecisionRow;

use crate::event::TraceEvent;

/// Compute the SHA-256 hash of one trace event, as lowercase hex.
///
/// # Panics
///
/// Panics if `row` cannot be serialized to JSON, which cannot happen for
/// `DecisionRow`: every field is a string, number, bool, timestamp or a
/// plain enum of those.
pub fn hash_event(sweep_id: &str, sequence: u64, row: &DecisionRow, prev_hash: &str) -> String {
    let row_json = serde_json::to_vec(row).expect("DecisionRow must always be serializable to JSON");

    let mut hasher = Sha256::new();
    hasher.update(sweep_id.as_bytes());
    hasher.update(sequence.to_le_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(&row_json);

    hex::encode(hasher.finalize())
}

/// Verify prev-hash linkage, sequence numbering and every recomputed hash.
///
/// An empty chain is valid.
pub fn verify_chain(events: &[TraceEvent]) -> bool {
    let mut expected_prev = TraceEvent::GENESIS_HASH.to_string();

    for (position, event) in events.iter().enumerate() {
        if event.prev_hash != expected_prev || event.sequence != position as u64 {
            return false;
        }

        let recomputed = hash_event(&event.sweep_id, event.sequence, &event.row, &event.prev_hash);
        if event.this_hash != recomputed {
            return false;
        }

        expected_prev = event.this_hash.clone();
    }

    true
}
