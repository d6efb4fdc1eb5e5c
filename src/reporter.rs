use indicatif::{ProgressBar, ProgressStyle};
use phone_sync::{Phase, PhaseReport, ReconciliationPlan, SyncReporter};
use std::sync::Mutex;
use std::time::Duration;

/// CLI progress reporter using indicatif progress bars.
///
/// One bar per phase; the rescan is a single line once it answers.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        let mut guard = self.bar.lock().unwrap();
        if let Some(old) = guard.take() {
            old.finish_and_clear();
        }
        *guard = Some(pb);
    }

    fn finish_bar(&self) {
        let mut guard = self.bar.lock().unwrap();
        if let Some(pb) = guard.take() {
            pb.finish_and_clear();
        }
    }
}

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Delete => "Deleting ",
        Phase::Upload => "Uploading",
        Phase::Restamp => "Stamping ",
    }
}

impl SyncReporter for CliReporter {
    fn on_enumerate_complete(&self, local_files: usize, remote_files: usize, degraded: bool) {
        if degraded {
            eprintln!(
                "  \x1b[33m!\x1b[0m Phone listing failed, assuming the folder is empty ({} local files)",
                local_files
            );
        } else {
            eprintln!(
                "  \x1b[32m✓\x1b[0m Found {} local and {} phone files",
                local_files, remote_files
            );
        }
    }

    fn on_remote_listed(&self, remote_files: usize, degraded: bool) {
        if degraded {
            eprintln!("  \x1b[33m!\x1b[0m Phone listing failed, nothing to re-stamp");
        } else {
            eprintln!("  \x1b[32m✓\x1b[0m Found {} phone files", remote_files);
        }
    }

    fn on_plan(&self, plan: &ReconciliationPlan) {
        eprintln!(
            "  \x1b[32m✓\x1b[0m Plan: {} to delete, {} to upload",
            plan.to_delete.len(),
            plan.to_upload.len()
        );
    }

    fn on_phase_start(&self, phase: Phase, total: usize) {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::with_template(&format!(
                "  {{spinner:.cyan}} {} [{{bar:30.cyan/dim}}] {{pos}}/{{len}} files ({{elapsed}})",
                phase_label(phase)
            ))
            .unwrap()
            .progress_chars("━╸─")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_task_complete(&self, _phase: Phase, _name: &str, _ok: bool) {
        let guard = self.bar.lock().unwrap();
        if let Some(pb) = guard.as_ref() {
            pb.inc(1);
        }
    }

    fn on_phase_complete(&self, report: &PhaseReport) {
        self.finish_bar();
        let mark = if report.failed_count() == 0 {
            "\x1b[32m✓\x1b[0m"
        } else {
            "\x1b[31m✗\x1b[0m"
        };
        eprintln!(
            "  {} {} complete: {}/{} files in {:.2}s",
            mark,
            report.phase,
            report.succeeded_count(),
            report.total(),
            report.duration.as_secs_f64()
        );
    }

    fn on_rescan_complete(&self, ok: bool) {
        if ok {
            eprintln!("  \x1b[32m✓\x1b[0m Media rescan requested");
        } else {
            eprintln!("  \x1b[33m!\x1b[0m Media rescan request failed");
        }
    }
}
