use crate::planner::ReconciliationPlan;
use crate::report::{Phase, PhaseReport};

/// Trait for observing a sync pass.
///
/// The CLI implements it with indicatif progress bars. `on_task_complete` is
/// called from worker threads; everything else from the orchestrating thread.
/// All methods have default no-op implementations.
pub trait SyncReporter: Send + Sync {
    fn on_enumerate_complete(&self, _local_files: usize, _remote_files: usize, _degraded: bool) {}
    /// Normalize passes list only the device folder.
    fn on_remote_listed(&self, _remote_files: usize, _degraded: bool) {}
    fn on_plan(&self, _plan: &ReconciliationPlan) {}
    fn on_phase_start(&self, _phase: Phase, _total: usize) {}
    fn on_task_complete(&self, _phase: Phase, _name: &str, _ok: bool) {}
    fn on_phase_complete(&self, _report: &PhaseReport) {}
    fn on_rescan_complete(&self, _ok: bool) {}
}

/// No-op reporter for silent operation.
pub struct SilentReporter;

impl SyncReporter for SilentReporter {}
