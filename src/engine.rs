use crate::config::{AppConfig, ListingFailurePolicy};
use crate::error::Error;
use crate::inventory;
use crate::planner;
use crate::progress::{SilentReporter, SyncReporter};
use crate::report::{NormalizeReport, Phase, PhaseReport, SyncReport, TaskOutcome};
use crate::runner::{TaskRunner, DEFAULT_CONCURRENCY, UPLOAD_CONCURRENCY};
use crate::timestamp::{self, CanonicalTimestamp};
use crate::transport::Transport;
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    pub max_workers: usize,
    pub upload_workers: usize,
    pub listing_failure: ListingFailurePolicy,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_CONCURRENCY,
            upload_workers: UPLOAD_CONCURRENCY,
            listing_failure: ListingFailurePolicy::AssumeEmpty,
        }
    }
}

impl From<&AppConfig> for SyncSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_workers: config.max_workers.max(1),
            upload_workers: config.effective_upload_workers(),
            listing_failure: config.listing_failure,
        }
    }
}

type Clock = Box<dyn Fn() -> CanonicalTimestamp + Send + Sync>;

/// Mirrors a local music folder onto a device folder.
///
/// A pass runs strictly phase by phase: enumerate, plan, delete, upload,
/// re-stamp the newly pushed files, then ask the device to re-index. Files in
/// one phase run concurrently on a bounded pool.
pub struct SyncEngine<T: Transport> {
    transport: T,
    settings: SyncSettings,
    clock: Clock,
}

impl<T: Transport> SyncEngine<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            settings: SyncSettings::default(),
            clock: Box::new(CanonicalTimestamp::today),
        }
    }

    pub fn with_settings(mut self, settings: SyncSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Overrides how the per-pass canonical timestamp is chosen.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> CanonicalTimestamp + Send + Sync + 'static,
    {
        self.clock = Box::new(clock);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Advisory device check.
    pub fn probe_device(&self) -> bool {
        let reachable = self.transport.is_device_reachable();
        if reachable {
            info!("Device is reachable");
        } else {
            warn!("No reachable device");
        }
        reachable
    }

    /// Full pass with the outcome collapsed to a boolean. Per-file failures
    /// do not make this `false`.
    pub fn full_sync(&self, local_folder: &Path, remote_folder: &str) -> bool {
        match self.sync(local_folder, remote_folder, &SilentReporter) {
            Ok(_) => true,
            Err(e) => {
                error!(
                    "Sync of {} to {} failed: {}",
                    local_folder.display(),
                    remote_folder,
                    e
                );
                false
            }
        }
    }

    /// Normalize pass with the outcome collapsed to a boolean.
    pub fn normalize_remote_timestamps(&self, remote_folder: &str) -> bool {
        match self.normalize(remote_folder, &SilentReporter) {
            Ok(_) => true,
            Err(e) => {
                error!("Normalizing timestamps in {} failed: {}", remote_folder, e);
                false
            }
        }
    }

    /// Runs one full reconciliation pass and returns what every file did.
    pub fn sync(
        &self,
        local_folder: &Path,
        remote_folder: &str,
        reporter: &dyn SyncReporter,
    ) -> Result<SyncReport, Error> {
        let pass_start = Instant::now();
        info!(
            "Syncing {} -> {}",
            local_folder.display(),
            remote_folder
        );

        // Enumerate
        let local_paths = inventory::list_local_music_files(local_folder);
        let local_names = inventory::file_name_set(&local_paths);
        let (remote_names, listing_degraded) = self.list_remote(remote_folder)?;
        reporter.on_enumerate_complete(local_names.len(), remote_names.len(), listing_degraded);
        debug!(
            "{} local file(s), {} remote file(s)",
            local_names.len(),
            remote_names.len()
        );

        // Plan
        let plan = planner::plan(&local_names, &remote_names);
        reporter.on_plan(&plan);
        info!(
            "Plan: {} to delete, {} to upload, {} unchanged",
            plan.to_delete.len(),
            plan.to_upload.len(),
            local_names.len() - plan.to_upload.len()
        );

        // Delete
        let deletes = if plan.to_delete.is_empty() {
            PhaseReport::empty(Phase::Delete)
        } else {
            let transport = &self.transport;
            TaskRunner::new(self.settings.max_workers).run_phase(
                Phase::Delete,
                &plan.to_delete,
                reporter,
                |name| transport.delete_remote_file(remote_folder, name),
            )?
        };

        // Upload
        let uploads = if plan.to_upload.is_empty() {
            PhaseReport::empty(Phase::Upload)
        } else {
            let transport = &self.transport;
            TaskRunner::new(self.settings.upload_workers).run_phase(
                Phase::Upload,
                &plan.to_upload,
                reporter,
                |name| transport.push_local_file(&local_folder.join(name), remote_folder),
            )?
        };

        // Re-stamp only what this pass pushed.
        let newly_pushed = uploads.succeeded();
        let (restamps, canonical) = if newly_pushed.is_empty() {
            (PhaseReport::empty(Phase::Restamp), None)
        } else {
            let ts = (self.clock)();
            let report = timestamp::apply_timestamp(
                &self.transport,
                &TaskRunner::new(self.settings.max_workers),
                remote_folder,
                &newly_pushed,
                &ts,
                reporter,
            )?;
            (report, Some(ts))
        };

        let rescan = self.refresh_index(remote_folder, reporter);

        let report = SyncReport {
            local_folder: local_folder.display().to_string(),
            remote_folder: remote_folder.to_string(),
            local_files: local_names.len(),
            remote_files: remote_names.len(),
            listing_degraded,
            plan,
            deletes,
            uploads,
            restamps,
            timestamp: canonical,
            rescan,
            duration: pass_start.elapsed(),
        };

        info!(
            "Sync of {} finished in {:.2}s: {} deleted, {} uploaded, {} re-stamped, {} failed task(s)",
            remote_folder,
            report.duration.as_secs_f64(),
            report.deletes.succeeded_count(),
            report.uploads.succeeded_count(),
            report.restamps.succeeded_count(),
            report.failed_tasks(),
        );
        Ok(report)
    }

    /// Re-stamps every music file currently in `remote_folder` with one
    /// canonical timestamp and asks the device to re-index. No diffing.
    pub fn normalize(
        &self,
        remote_folder: &str,
        reporter: &dyn SyncReporter,
    ) -> Result<NormalizeReport, Error> {
        let pass_start = Instant::now();
        info!("Normalizing timestamps in {}", remote_folder);

        let (remote_names, listing_degraded) = self.list_remote(remote_folder)?;
        reporter.on_remote_listed(remote_names.len(), listing_degraded);

        if remote_names.is_empty() {
            info!("No music files in {}, nothing to normalize", remote_folder);
            return Ok(NormalizeReport {
                remote_folder: remote_folder.to_string(),
                remote_files: 0,
                listing_degraded,
                restamps: PhaseReport::empty(Phase::Restamp),
                timestamp: None,
                rescan: None,
                duration: pass_start.elapsed(),
            });
        }

        let ts = (self.clock)();
        let restamps = timestamp::apply_timestamp(
            &self.transport,
            &TaskRunner::new(self.settings.max_workers),
            remote_folder,
            &remote_names,
            &ts,
            reporter,
        )?;
        let rescan = self.refresh_index(remote_folder, reporter);

        Ok(NormalizeReport {
            remote_folder: remote_folder.to_string(),
            remote_files: remote_names.len(),
            listing_degraded,
            restamps,
            timestamp: Some(ts),
            rescan: Some(rescan),
            duration: pass_start.elapsed(),
        })
    }

    /// Filtered remote names, plus whether the listing failed and the
    /// configured policy substituted an empty set.
    fn list_remote(&self, remote_folder: &str) -> Result<(BTreeSet<String>, bool), Error> {
        match self.transport.list_remote_files(remote_folder) {
            Ok(entries) => Ok((inventory::filter_music_names(entries), false)),
            Err(e) => match self.settings.listing_failure {
                ListingFailurePolicy::AssumeEmpty => {
                    warn!(
                        "Listing {} failed ({}); treating the remote folder as empty",
                        remote_folder, e
                    );
                    Ok((BTreeSet::new(), true))
                }
                ListingFailurePolicy::Abort => Err(Error::Listing {
                    folder: remote_folder.to_string(),
                    source: e,
                }),
            },
        }
    }

    /// Failure here never fails the pass.
    fn refresh_index(&self, remote_folder: &str, reporter: &dyn SyncReporter) -> TaskOutcome {
        let result = self.transport.trigger_media_rescan(remote_folder);
        match &result {
            Ok(()) => debug!("Media rescan requested for {}", remote_folder),
            Err(e) => warn!("Media rescan of {} failed: {}", remote_folder, e),
        }
        reporter.on_rescan_complete(result.is_ok());
        TaskOutcome::from_result(result)
    }
}
