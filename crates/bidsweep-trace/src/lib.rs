//! # bidsweep-trace
//!
//! Append-only, SHA-256 hash-chained decision trace for bidsweep.
//!
//! ## Overview
//!
//! Every subject/session a sweep considers produces exactly one
//! `DecisionRow`. Each row is wrapped in a `TraceEvent` linked to the
//! previous event by its hash, so editing any recorded decision after the
//! fact breaks the chain and is detected by `verify_chain`.
//!
//! The `report` module turns rows into the CSV export and the HTML report.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bidsweep_trace::InMemoryDecisionLog;
//!
//! let trace = InMemoryDecisionLog::new(sweep_id.to_string());
//! let sweep = Sweep::new(store, registry, broker, engine, Box::new(trace.clone()), settings);
//! sweep.run(&sweep_id)?;
//!
//! let log = trace.export_log()?;
//! assert!(log.verify());
//! ```

pub mod chain;
pub mod event;
pub mod memory;
pub mod report;

pub use chain::{hash_event, verify_chain};
pub use event::{TraceEvent, TraceLog};
pub use memory::InMemoryDecisionLog;
pub use report::{render_csv, render_html};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use bidsweep_contracts::{
        decision::{DecisionRow, Disposition, ExternalStatus, SkipReason},
        error::SweepError,
        outcome::SelectionOutcome,
        subject::SubjectKey,
    };
    use bidsweep_core::traits::DecisionWriter;

    use super::{render_csv, render_html, verify_chain, InMemoryDecisionLog, TraceEvent, TraceLog};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn row(subject: &str, disposition: Disposition) -> DecisionRow {
        DecisionRow::not_evaluated(
            &SubjectKey::new(subject, "ses-V01"),
            "mriqc",
            &["T1w".to_string(), "dwi".to_string()],
            &["bids_dir".to_string()],
            disposition,
        )
    }

    fn submitted(subject: &str, job_id: u64) -> DecisionRow {
        let mut row = row(subject, Disposition::Submitted { job_id });
        row.derivatives_found = Some(false);
        row.cbrain_status = Some("No Existing Task".to_string());
        row.scans_tsv_present = Some(true);
        row.roles[0].outcome = Some(SelectionOutcome::Satisfied);
        row.roles[1].outcome = Some(SelectionOutcome::Satisfied);
        row.external[0].status = Some(ExternalStatus::Satisfied);
        row.ancestor_files = Some(true);
        row
    }

    fn failed(subject: &str) -> DecisionRow {
        let mut row = row(subject, Disposition::NoProcessing { reason: SkipReason::RequirementsNotMet });
        row.derivatives_found = Some(false);
        row.cbrain_status = Some("Failed On Cluster".to_string());
        row.scans_tsv_present = Some(true);
        row.roles[0].outcome = Some(SelectionOutcome::FailedQc);
        row.roles[1].outcome = Some(SelectionOutcome::NoFile);
        row
    }

    fn three_rows(trace: &InMemoryDecisionLog) {
        trace.write(&submitted("sub-01", 11)).unwrap();
        trace.write(&failed("sub-02")).unwrap();
        trace
            .write(&row("sub-03", Disposition::NoProcessing { reason: SkipReason::NotRegistered }))
            .unwrap();
    }

    // ── Chain ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_hash_chain_integrity() {
        let trace = InMemoryDecisionLog::new("sweep-integrity");
        three_rows(&trace);
        assert!(trace.verify_integrity().unwrap());
    }

    /// Rewriting a recorded disposition breaks the chain.
    #[test]
    fn test_tamper_detection() {
        let trace = InMemoryDecisionLog::new("sweep-tamper");
        three_rows(&trace);

        {
            let mut state = trace.state.lock().unwrap();
            state.events[1].row.disposition = Disposition::Submitted { job_id: 99 };
        }

        assert!(!trace.verify_integrity().unwrap(), "edited row must fail verification");
    }

    #[test]
    fn test_genesis_and_sequence() {
        let trace = InMemoryDecisionLog::new("sweep-seq");
        three_rows(&trace);

        let log = trace.export_log().unwrap();
        assert_eq!(log.events[0].prev_hash, TraceEvent::GENESIS_HASH);
        for (idx, event) in log.events.iter().enumerate() {
            assert_eq!(event.sequence, idx as u64);
        }
        assert_eq!(log.terminal_hash, log.events.last().unwrap().this_hash);
    }

    #[test]
    fn test_dropped_event_detected() {
        let trace = InMemoryDecisionLog::new("sweep-drop");
        three_rows(&trace);
        let mut log = trace.export_log().unwrap();
        log.events.remove(1);
        assert!(!verify_chain(&log.events));
    }

    #[test]
    fn test_exported_log_round_trips_and_verifies() {
        let trace = InMemoryDecisionLog::new("sweep-export");
        three_rows(&trace);
        trace.finalize("sweep-export").unwrap();

        let json = trace.export_log().unwrap().to_json_pretty().unwrap();
        let log = TraceLog::from_json_str(&json).unwrap();
        assert!(log.verify());
        assert_eq!(log.rows().len(), 3);

        let mut forged = log.clone();
        forged.terminal_hash = TraceEvent::GENESIS_HASH.to_string();
        assert!(!forged.verify());
    }

    #[test]
    fn test_empty_trace_is_valid() {
        let trace = InMemoryDecisionLog::new("sweep-empty");
        assert!(trace.verify_integrity().unwrap());
        let log = trace.export_log().unwrap();
        assert!(log.terminal_hash.is_empty());
        assert!(log.verify());
    }

    // ── Append-only rules ─────────────────────────────────────────────────────

    #[test]
    fn test_second_row_for_subject_is_rejected() {
        let trace = InMemoryDecisionLog::new("sweep-dup");
        trace.write(&submitted("sub-01", 11)).unwrap();
        let err = trace.write(&failed("sub-01")).unwrap_err();
        assert!(matches!(err, SweepError::TraceWriteFailed { .. }));
        assert_eq!(trace.rows().unwrap().len(), 1);
    }

    #[test]
    fn test_write_after_finalize_is_rejected() {
        let trace = InMemoryDecisionLog::new("sweep-final");
        trace.finalize("sweep-final").unwrap();
        assert!(trace.write(&submitted("sub-01", 1)).is_err());
        assert!(trace.finalize("another-sweep").is_err());
    }

    // ── Reports ───────────────────────────────────────────────────────────────

    #[test]
    fn test_csv_columns_and_placeholders() {
        let rows = vec![submitted("sub-01", 11), row("sub-03", Disposition::NoProcessing { reason: SkipReason::NotRegistered })];
        let csv = String::from_utf8(render_csv(&rows).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(
            lines[0],
            "subject,pipeline,session,derivatives_found,cbrain_status,scans_tsv_present,T1w,dwi,CBRAIN_bids_dir,ancestor_files,disposition"
        );
        assert_eq!(
            lines[1],
            "sub-01,mriqc,ses-V01,False,No Existing Task,True,Satisfied,Satisfied,Satisfied,Stable,Submitted 11"
        );
        assert_eq!(
            lines[2],
            "sub-03,mriqc,ses-V01,Not Evaluated,Not Evaluated,Not Evaluated,Not Evaluated,Not Evaluated,Not Evaluated,Not Evaluated,No Processing (Not Registered)"
        );
    }

    #[test]
    fn test_html_colours_and_counts() {
        let rows = vec![submitted("sub-01", 11), failed("sub-02")];
        let html = render_html("mriqc <sweep>", &rows);

        assert!(html.contains("<title>mriqc &lt;sweep&gt;</title>"));
        assert!(html.contains("<td class=\"ok\">Satisfied</td>"));
        assert!(html.contains("<td class=\"fail\">Failed QC</td>"));
        assert!(html.contains("<td class=\"missing\">No File</td>"));
        assert!(html.contains("<td class=\"fail\">Failed On Cluster</td>"));
        assert!(html.contains("<td class=\"na\">Not Evaluated</td>"));
        assert!(html.contains("<h3>T1w</h3>"));
        assert!(html.contains("<h2>Legend</h2>"));
    }
}
