//! In-memory implementation of `DecisionWriter`.
//!
//! `InMemoryDecisionLog` keeps every event in a `Vec` behind a `Mutex` so
//! the sweep can call `write()` and `finalize()` through a shared reference.
//! Call `export_log()` once the sweep completes to obtain a sealed
//! `TraceLog`.

use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex, MutexGuard},
};

use chrono::Utc;
use tracing::{debug, info};

use bidsweep_contracts::{
    decision::DecisionRow,
    error::{SweepError, SweepResult},
    subject::SubjectKey,
};
use bidsweep_core::traits::DecisionWriter;

use crate::{
    chain::{hash_event, verify_chain},
    event::{TraceEvent, TraceLog},
};

// ── Internal mutable state ────────────────────────────────────────────────────

pub(crate) struct TraceState {
    pub(crate) events: Vec<TraceEvent>,
    pub(crate) sequence: u64,
    /// `this_hash` of the last event, or `GENESIS_HASH`.
    pub(crate) last_hash: String,
    /// Subject/session pairs already recorded.
    pub(crate) seen: BTreeSet<SubjectKey>,
    pub(crate) finalized: bool,
}

// ── Public writer ─────────────────────────────────────────────────────────────

/// An append-only decision trace backed by a SHA-256 hash chain.
///
/// A second row for the same subject/session, or any row after `finalize`,
/// is rejected with `TraceWriteFailed`. Clones share the same chain.
#[derive(Clone)]
pub struct InMemoryDecisionLog {
    sweep_id: String,
    pub(crate) state: Arc<Mutex<TraceState>>,
}

impl InMemoryDecisionLog {
    pub fn new(sweep_id: impl Into<String>) -> Self {
        let state = TraceState {
            events: Vec::new(),
            sequence: 0,
            last_hash: TraceEvent::GENESIS_HASH.to_string(),
            seen: BTreeSet::new(),
            finalized: false,
        };
        Self {
            sweep_id: sweep_id.into(),
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> SweepResult<MutexGuard<'_, TraceState>> {
        self.state.lock().map_err(|e| SweepError::TraceWriteFailed {
            reason: format!("trace state lock poisoned: {e}"),
        })
    }

    /// Export a sealed `TraceLog` of every event written so far.
    pub fn export_log(&self) -> SweepResult<TraceLog> {
        let state = self.lock()?;
        let terminal_hash = state.events.last().map(|e| e.this_hash.clone()).unwrap_or_default();

        Ok(TraceLog {
            sweep_id: self.sweep_id.clone(),
            events: state.events.clone(),
            finalized_at: Utc::now(),
            terminal_hash,
        })
    }

    /// The rows written so far, in order.
    pub fn rows(&self) -> SweepResult<Vec<DecisionRow>> {
        Ok(self.lock()?.events.iter().map(|e| e.row.clone()).collect())
    }

    /// Verify that the in-memory chain has not been tampered with.
    pub fn verify_integrity(&self) -> SweepResult<bool> {
        Ok(verify_chain(&self.lock()?.events))
    }
}

// ── DecisionWriter impl ───────────────────────────────────────────────────────

impl DecisionWriter for InMemoryDecisionLog {
    fn write(&self, row: &DecisionRow) -> SweepResult<()> {
        let mut state = self.lock()?;
        let key = row.key();

        if state.finalized {
            return Err(SweepError::TraceWriteFailed {
                reason: format!("trace for sweep {} is already finalized", self.sweep_id),
            });
        }
        if !state.seen.insert(key.clone()) {
            return Err(SweepError::TraceWriteFailed {
                reason: format!("{} already has a row in sweep {}", key.label(), self.sweep_id),
            });
        }

        let prev_hash = state.last_hash.clone();
        let sequence = state.sequence;
        let this_hash = hash_event(&self.sweep_id, sequence, row, &prev_hash);

        state.events.push(TraceEvent {
            sequence,
            sweep_id: self.sweep_id.clone(),
            row: row.clone(),
            prev_hash,
            this_hash: this_hash.clone(),
        });
        state.sequence += 1;
        state.last_hash = this_hash;

        debug!(sweep_id = %self.sweep_id, sequence, subject = %key.label(), "decision recorded");
        Ok(())
    }

    fn finalize(&self, sweep_id: &str) -> SweepResult<()> {
        let mut state = self.lock()?;
        if sweep_id != self.sweep_id {
            return Err(SweepError::TraceWriteFailed {
                reason: format!("trace belongs to sweep {}, not {sweep_id}", self.sweep_id),
            });
        }
        state.finalized = true;

        info!(
            sweep_id = %sweep_id,
            event_count = state.events.len(),
            terminal_hash = %state.last_hash,
            "decision trace finalized"
        );
        Ok(())
    }
}
