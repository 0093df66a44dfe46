//! PlanLab Runner — planning-pass orchestration, beam selection, persistence.
//!
//! This crate builds on `planlab-core` to provide:
//! - The planning pass (generate → evaluate with cache reuse → merge)
//! - The beam selector (rank, diversity, Pareto stages)
//! - Sequence stores (in-memory and JSON-file) with the regeneration contract
//! - JSONL recommendation history
//! - CSV export of published beams
//! - The incremental scheduler (background thread, command channel)

pub mod beam;
pub mod export;
pub mod history;
pub mod pass;
pub mod scheduler;
pub mod store;

pub use beam::BeamEntry;
pub use export::{export_csv, export_csv_string};
pub use history::{summary_by_depth, DepthSummary, HistoryRecord, RecommendationHistory};
pub use pass::{run_pass, PassOutcome};
pub use scheduler::{
    spawn_scheduler, CycleStats, PlannerSnapshot, SchedulerCommand, SchedulerHandle,
    SchedulerPhase, SchedulerStopped,
};
pub use store::{JsonFileStore, MemoryStore, SequenceStore};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn beam_entry_is_send_sync() {
        assert_send::<BeamEntry>();
        assert_sync::<BeamEntry>();
    }

    #[test]
    fn pass_outcome_is_send_sync() {
        assert_send::<PassOutcome>();
        assert_sync::<PassOutcome>();
    }

    #[test]
    fn stores_are_send_sync() {
        assert_send::<MemoryStore>();
        assert_sync::<MemoryStore>();
        assert_send::<JsonFileStore>();
        assert_sync::<JsonFileStore>();
    }

    #[test]
    fn scheduler_command_is_send() {
        assert_send::<SchedulerCommand>();
    }

    #[test]
    fn scheduler_handle_is_send() {
        assert_send::<SchedulerHandle>();
    }

    #[test]
    fn snapshot_is_send_sync() {
        assert_send::<PlannerSnapshot>();
        assert_sync::<PlannerSnapshot>();
    }

    #[test]
    fn history_record_is_send_sync() {
        assert_send::<HistoryRecord>();
        assert_sync::<HistoryRecord>();
    }
}
