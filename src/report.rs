use crate::planner::ReconciliationPlan;
use crate::timestamp::CanonicalTimestamp;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Delete,
    Upload,
    Restamp,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Delete => "delete",
            Phase::Upload => "upload",
            Phase::Restamp => "restamp",
        };
        f.write_str(name)
    }
}

/// Result of one per-file operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded,
    Failed(String),
}

impl TaskOutcome {
    pub fn from_result<E: fmt::Display>(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => TaskOutcome::Succeeded,
            Err(e) => TaskOutcome::Failed(e.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Succeeded)
    }
}

/// Per-file outcome log for one phase of a pass.
#[derive(Debug, Clone)]
pub struct PhaseReport {
    pub phase: Phase,
    pub outcomes: BTreeMap<String, TaskOutcome>,
    pub duration: Duration,
}

impl PhaseReport {
    pub fn empty(phase: Phase) -> Self {
        Self {
            phase,
            outcomes: BTreeMap::new(),
            duration: Duration::ZERO,
        }
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_success())
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn failed(&self) -> Vec<(&str, &str)> {
        self.outcomes
            .iter()
            .filter_map(|(name, outcome)| match outcome {
                TaskOutcome::Failed(detail) => Some((name.as_str(), detail.as_str())),
                TaskOutcome::Succeeded => None,
            })
            .collect()
    }

    pub fn succeeded_count(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_success()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.total() - self.succeeded_count()
    }
}

/// Everything one full pass did. The caller-facing boolean only reflects
/// whether this could be produced at all.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub local_folder: String,
    pub remote_folder: String,
    pub local_files: usize,
    pub remote_files: usize,
    /// The remote listing failed and was treated as empty.
    pub listing_degraded: bool,
    pub plan: ReconciliationPlan,
    pub deletes: PhaseReport,
    pub uploads: PhaseReport,
    pub restamps: PhaseReport,
    pub timestamp: Option<CanonicalTimestamp>,
    pub rescan: TaskOutcome,
    pub duration: Duration,
}

impl SyncReport {
    /// Files whose push succeeded in this pass.
    pub fn newly_pushed(&self) -> Vec<String> {
        self.uploads.succeeded()
    }

    pub fn failed_tasks(&self) -> usize {
        self.deletes.failed_count() + self.uploads.failed_count() + self.restamps.failed_count()
    }

    pub fn phases(&self) -> [&PhaseReport; 3] {
        [&self.deletes, &self.uploads, &self.restamps]
    }
}

#[derive(Debug, Clone)]
pub struct NormalizeReport {
    pub remote_folder: String,
    pub remote_files: usize,
    pub listing_degraded: bool,
    pub restamps: PhaseReport,
    pub timestamp: Option<CanonicalTimestamp>,
    /// `None` when the folder listed no music files and nothing was sent.
    pub rescan: Option<TaskOutcome>,
    pub duration: Duration,
}

#[derive(Debug, Serialize)]
struct OutcomeRow<'a> {
    folder: &'a str,
    phase: Phase,
    file: &'a str,
    outcome: &'static str,
    detail: &'a str,
}

/// Writes one CSV row per file per phase of every report.
pub fn write_outcome_csv(path: &Path, reports: &[SyncReport]) -> Result<usize, crate::Error> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut wtr = csv::Writer::from_path(path)?;
    let mut rows = 0;

    for report in reports {
        for phase in report.phases() {
            for (file, outcome) in &phase.outcomes {
                let (outcome, detail) = match outcome {
                    TaskOutcome::Succeeded => ("ok", ""),
                    TaskOutcome::Failed(detail) => ("failed", detail.as_str()),
                };
                wtr.serialize(OutcomeRow {
                    folder: &report.remote_folder,
                    phase: phase.phase,
                    file,
                    outcome,
                    detail,
                })?;
                rows += 1;
            }
        }
    }

    wtr.flush()?;
    Ok(rows)
}
