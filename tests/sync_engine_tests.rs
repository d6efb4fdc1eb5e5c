use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use tempfile::tempdir;

use phone_sync::config::ListingFailurePolicy;
use phone_sync::report::write_outcome_csv;
use phone_sync::{
    CanonicalTimestamp, Phase, ReconciliationPlan, SilentReporter, SyncEngine, SyncReporter,
    SyncSettings, TaskOutcome, Transport, TransportError,
};

const REMOTE: &str = "/sdcard/Music/Car";

fn stamp(day: u32) -> CanonicalTimestamp {
    CanonicalTimestamp::new(
        NaiveDate::from_ymd_opt(2025, 3, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap(),
    )
}

fn failed(command: &str) -> TransportError {
    TransportError::Failed {
        command: command.to_string(),
        status: "exit status: 1".to_string(),
        stderr: "simulated".to_string(),
    }
}

/// In-memory device: remote file name -> modification time.
#[derive(Default)]
struct FakeDevice {
    files: Mutex<BTreeMap<String, CanonicalTimestamp>>,
    fail_listing: bool,
    fail_push: HashSet<String>,
    fail_delete: HashSet<String>,
    panic_delete: HashSet<String>,
    fail_rescan: bool,
    extra_listing: Vec<String>,
    deletes: AtomicUsize,
    pushes: AtomicUsize,
    touches: AtomicUsize,
    rescans: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl FakeDevice {
    fn with_files(names: &[&str], mtime: CanonicalTimestamp) -> Self {
        let device = FakeDevice::default();
        {
            let mut files = device.files.lock().unwrap();
            for name in names {
                files.insert(name.to_string(), mtime);
            }
        }
        device
    }

    fn names(&self) -> BTreeSet<String> {
        self.files.lock().unwrap().keys().cloned().collect()
    }

    fn mtime(&self, name: &str) -> Option<CanonicalTimestamp> {
        self.files.lock().unwrap().get(name).copied()
    }

    fn mutations(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
            + self.pushes.load(Ordering::SeqCst)
            + self.touches.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(5));
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Transport for FakeDevice {
    fn is_device_reachable(&self) -> bool {
        true
    }

    fn list_remote_files(&self, _remote_folder: &str) -> Result<Vec<String>, TransportError> {
        if self.fail_listing {
            return Err(failed("ls"));
        }
        let mut names: Vec<String> = self.names().into_iter().collect();
        names.extend(self.extra_listing.iter().cloned());
        Ok(names)
    }

    fn delete_remote_file(&self, _remote_folder: &str, name: &str) -> Result<(), TransportError> {
        if self.panic_delete.contains(name) {
            panic!("device fault while deleting {name}");
        }
        self.enter();
        self.deletes.fetch_add(1, Ordering::SeqCst);
        let result = if self.fail_delete.contains(name) {
            Err(failed("rm"))
        } else {
            self.files.lock().unwrap().remove(name);
            Ok(())
        };
        self.leave();
        result
    }

    fn push_local_file(
        &self,
        local_path: &Path,
        _remote_folder: &str,
    ) -> Result<(), TransportError> {
        self.enter();
        self.pushes.fetch_add(1, Ordering::SeqCst);
        let name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap()
            .to_string();
        let result = if self.fail_push.contains(&name) {
            Err(failed("push"))
        } else {
            // A fresh push carries the time of the copy, not the canonical one.
            self.files.lock().unwrap().insert(name, stamp(28));
            Ok(())
        };
        self.leave();
        result
    }

    fn set_remote_timestamp(
        &self,
        _remote_folder: &str,
        name: &str,
        timestamp: &CanonicalTimestamp,
    ) -> Result<(), TransportError> {
        self.touches.fetch_add(1, Ordering::SeqCst);
        let mut files = self.files.lock().unwrap();
        match files.get_mut(name) {
            Some(mtime) => {
                *mtime = *timestamp;
                Ok(())
            }
            None => Err(failed("touch")),
        }
    }

    fn trigger_media_rescan(&self, _remote_folder: &str) -> Result<(), TransportError> {
        self.rescans.fetch_add(1, Ordering::SeqCst);
        if self.fail_rescan {
            Err(failed("am broadcast"))
        } else {
            Ok(())
        }
    }
}

fn create_local_folder(root: &Path, names: &[&str]) {
    fs::create_dir_all(root).unwrap();
    for name in names {
        fs::write(root.join(name), format!("audio bytes of {name}")).unwrap();
    }
}

fn set_of(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn engine(device: &Arc<FakeDevice>) -> SyncEngine<Arc<FakeDevice>> {
    SyncEngine::new(Arc::clone(device)).with_clock(|| stamp(1))
}

#[test]
fn test_mirrors_local_folder_onto_device() {
    let tmp = tempdir().unwrap();
    let local = tmp.path().join("Car");
    create_local_folder(&local, &["a.mp3", "b.flac", "notes.txt"]);

    let device = Arc::new(FakeDevice::with_files(&["b.flac", "c.wav"], stamp(10)));
    let report = engine(&device)
        .sync(&local, REMOTE, &SilentReporter)
        .unwrap();

    assert_eq!(report.plan.to_delete, set_of(&["c.wav"]));
    assert_eq!(report.plan.to_upload, set_of(&["a.mp3"]));
    assert_eq!(device.names(), set_of(&["a.mp3", "b.flac"]));

    // Only the new file gets the canonical stamp; b.flac keeps its own.
    assert_eq!(device.mtime("a.mp3"), Some(stamp(1)));
    assert_eq!(device.mtime("b.flac"), Some(stamp(10)));
    assert_eq!(report.timestamp, Some(stamp(1)));
    assert_eq!(report.newly_pushed(), vec!["a.mp3".to_string()]);
    assert_eq!(report.rescan, TaskOutcome::Succeeded);
    assert_eq!(device.rescans.load(Ordering::SeqCst), 1);
}

#[test]
fn test_second_pass_is_idempotent() {
    let tmp = tempdir().unwrap();
    let local = tmp.path().join("Car");
    create_local_folder(&local, &["a.mp3", "b.flac"]);

    let device = Arc::new(FakeDevice::default());
    let engine = engine(&device);
    assert!(engine.full_sync(&local, REMOTE));
    let after_first = device.mutations();
    assert_eq!(after_first, 4);

    let report = engine.sync(&local, REMOTE, &SilentReporter).unwrap();
    assert!(report.plan.is_empty());
    assert_eq!(device.mutations(), after_first);
    assert!(report.timestamp.is_none());
    assert_eq!(report.restamps.total(), 0);
    // The rescan is still requested even when nothing changed.
    assert_eq!(device.rescans.load(Ordering::SeqCst), 2);
}

#[test]
fn test_empty_local_folder_clears_device() {
    let tmp = tempdir().unwrap();
    let local = tmp.path().join("Empty");
    create_local_folder(&local, &[]);

    let device = Arc::new(FakeDevice::with_files(&["x.mp3"], stamp(10)));
    let report = engine(&device)
        .sync(&local, REMOTE, &SilentReporter)
        .unwrap();

    assert_eq!(report.plan.to_delete, set_of(&["x.mp3"]));
    assert!(report.plan.to_upload.is_empty());
    assert!(device.names().is_empty());
    assert_eq!(device.pushes.load(Ordering::SeqCst), 0);
    assert_eq!(device.touches.load(Ordering::SeqCst), 0);
}

#[test]
fn test_non_music_remote_entries_are_left_alone() {
    let tmp = tempdir().unwrap();
    let local = tmp.path().join("Car");
    create_local_folder(&local, &["a.mp3"]);

    let device = Arc::new(FakeDevice {
        extra_listing: vec!["cover.jpg".to_string(), ".nomedia".to_string()],
        ..FakeDevice::with_files(&["a.mp3"], stamp(10))
    });
    let report = engine(&device)
        .sync(&local, REMOTE, &SilentReporter)
        .unwrap();

    assert!(report.plan.is_empty());
    assert_eq!(device.deletes.load(Ordering::SeqCst), 0);
}

#[test]
fn test_listing_failure_uploads_everything() {
    let tmp = tempdir().unwrap();
    let local = tmp.path().join("Car");
    create_local_folder(&local, &["a.mp3", "b.flac"]);

    let device = Arc::new(FakeDevice {
        fail_listing: true,
        ..FakeDevice::with_files(&["stale.mp3"], stamp(10))
    });
    let engine = engine(&device);
    let report = engine.sync(&local, REMOTE, &SilentReporter).unwrap();

    assert!(report.listing_degraded);
    assert!(report.plan.to_delete.is_empty());
    assert_eq!(report.plan.to_upload, set_of(&["a.mp3", "b.flac"]));
    assert!(device.names().contains("stale.mp3"));
    assert!(engine.full_sync(&local, REMOTE));
}

#[test]
fn test_listing_failure_aborts_when_configured() {
    let tmp = tempdir().unwrap();
    let local = tmp.path().join("Car");
    create_local_folder(&local, &["a.mp3"]);

    let device = Arc::new(FakeDevice {
        fail_listing: true,
        ..FakeDevice::default()
    });
    let engine = engine(&device).with_settings(SyncSettings {
        listing_failure: ListingFailurePolicy::Abort,
        ..SyncSettings::default()
    });

    assert!(engine.sync(&local, REMOTE, &SilentReporter).is_err());
    assert!(!engine.full_sync(&local, REMOTE));
    assert!(!engine.normalize_remote_timestamps(REMOTE));
    assert_eq!(device.mutations(), 0);
}

#[test]
fn test_failed_upload_is_not_restamped() {
    let tmp = tempdir().unwrap();
    let local = tmp.path().join("Car");
    create_local_folder(&local, &["a.mp3", "b.flac", "c.wav"]);

    let device = Arc::new(FakeDevice {
        fail_push: ["b.flac".to_string()].into_iter().collect(),
        ..FakeDevice::default()
    });
    let engine = engine(&device);
    let report = engine.sync(&local, REMOTE, &SilentReporter).unwrap();

    assert_eq!(report.uploads.succeeded_count(), 2);
    assert_eq!(report.uploads.failed().len(), 1);
    assert_eq!(report.uploads.failed()[0].0, "b.flac");
    assert_eq!(report.restamps.total(), 2);
    assert!(!report.restamps.outcomes.contains_key("b.flac"));
    assert_eq!(device.mtime("a.mp3"), Some(stamp(1)));
    assert_eq!(device.mtime("c.wav"), Some(stamp(1)));
    assert_eq!(report.failed_tasks(), 1);

    // Per-file failures do not fail the pass.
    assert!(engine.full_sync(&local, REMOTE));
}

#[test]
fn test_failed_delete_does_not_stop_uploads() {
    let tmp = tempdir().unwrap();
    let local = tmp.path().join("Car");
    create_local_folder(&local, &["new.mp3"]);

    let device = Arc::new(FakeDevice {
        fail_delete: ["old1.mp3".to_string()].into_iter().collect(),
        ..FakeDevice::with_files(&["old1.mp3", "old2.mp3"], stamp(10))
    });
    let report = engine(&device)
        .sync(&local, REMOTE, &SilentReporter)
        .unwrap();

    assert_eq!(report.deletes.succeeded(), vec!["old2.mp3".to_string()]);
    assert_eq!(report.uploads.succeeded(), vec!["new.mp3".to_string()]);
    assert_eq!(device.names(), set_of(&["new.mp3", "old1.mp3"]));
}

#[test]
fn test_rescan_failure_is_not_fatal() {
    let tmp = tempdir().unwrap();
    let local = tmp.path().join("Car");
    create_local_folder(&local, &["a.mp3"]);

    let device = Arc::new(FakeDevice {
        fail_rescan: true,
        ..FakeDevice::default()
    });
    let engine = engine(&device);
    let report = engine.sync(&local, REMOTE, &SilentReporter).unwrap();

    assert!(matches!(report.rescan, TaskOutcome::Failed(_)));
    assert!(engine.full_sync(&local, REMOTE));
}

#[test]
fn test_uploads_respect_their_own_bound() {
    let tmp = tempdir().unwrap();
    let local = tmp.path().join("Car");
    let names: Vec<String> = (0..12).map(|i| format!("track{i:02}.mp3")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    create_local_folder(&local, &refs);

    let device = Arc::new(FakeDevice::default());
    let report = engine(&device)
        .with_settings(SyncSettings {
            max_workers: 8,
            upload_workers: 2,
            ..SyncSettings::default()
        })
        .sync(&local, REMOTE, &SilentReporter)
        .unwrap();

    assert_eq!(report.uploads.succeeded_count(), 12);
    assert!(device.peak_in_flight.load(Ordering::SeqCst) <= 2);
}

#[test]
fn test_normalize_stamps_every_music_file() {
    let device = Arc::new(FakeDevice {
        extra_listing: vec!["cover.jpg".to_string()],
        ..FakeDevice::default()
    });
    {
        let mut files = device.files.lock().unwrap();
        files.insert("a.mp3".into(), stamp(3));
        files.insert("b.flac".into(), stamp(7));
        files.insert("c.wav".into(), stamp(12));
    }

    let report = engine(&device).normalize(REMOTE, &SilentReporter).unwrap();

    assert_eq!(report.remote_files, 3);
    assert_eq!(report.restamps.succeeded_count(), 3);
    assert_eq!(report.timestamp, Some(stamp(1)));
    assert_eq!(report.rescan, Some(TaskOutcome::Succeeded));
    for name in ["a.mp3", "b.flac", "c.wav"] {
        assert_eq!(device.mtime(name), Some(stamp(1)));
    }
    assert_eq!(device.deletes.load(Ordering::SeqCst), 0);
    assert_eq!(device.pushes.load(Ordering::SeqCst), 0);
}

#[test]
fn test_normalize_empty_folder_does_nothing() {
    let device = Arc::new(FakeDevice::default());
    let engine = engine(&device);
    let report = engine.normalize(REMOTE, &SilentReporter).unwrap();

    assert_eq!(report.remote_files, 0);
    assert!(report.timestamp.is_none());
    assert!(report.rescan.is_none());
    assert_eq!(device.rescans.load(Ordering::SeqCst), 0);
    assert!(engine.normalize_remote_timestamps(REMOTE));
}

#[test]
fn test_outcome_csv_lists_every_task() {
    let tmp = tempdir().unwrap();
    let local = tmp.path().join("Car");
    create_local_folder(&local, &["a.mp3", "b.flac"]);

    let device = Arc::new(FakeDevice {
        fail_push: ["b.flac".to_string()].into_iter().collect(),
        ..FakeDevice::with_files(&["z.ogg"], stamp(10))
    });
    let report = engine(&device)
        .sync(&local, REMOTE, &SilentReporter)
        .unwrap();

    let csv_path = tmp.path().join("reports").join("outcome.csv");
    let rows = write_outcome_csv(&csv_path, &[report]).unwrap();
    // delete z.ogg, upload a.mp3 + b.flac, restamp a.mp3
    assert_eq!(rows, 4);

    let contents = fs::read_to_string(&csv_path).unwrap();
    let mut lines = contents.lines();
    assert_eq!(lines.next(), Some("folder,phase,file,outcome,detail"));
    assert!(contents.contains(&format!("{REMOTE},{},z.ogg,ok,", Phase::Delete)));
    assert!(contents.contains(&format!("{REMOTE},{},a.mp3,ok,", Phase::Restamp)));
    assert!(contents
        .lines()
        .any(|line| line.starts_with(&format!("{REMOTE},upload,b.flac,failed,"))));
}

#[test]
fn test_names_with_surrounding_spaces_stay_in_sync() {
    let tmp = tempdir().unwrap();
    let local = tmp.path().join("Car");
    create_local_folder(&local, &[" Intro.mp3", "Outro .flac"]);

    let device = Arc::new(FakeDevice::default());
    let engine = engine(&device);
    let first = engine.sync(&local, REMOTE, &SilentReporter).unwrap();
    assert_eq!(first.plan.to_upload, set_of(&[" Intro.mp3", "Outro .flac"]));
    assert_eq!(device.names(), set_of(&[" Intro.mp3", "Outro .flac"]));

    let mutations = device.mutations();
    let second = engine.sync(&local, REMOTE, &SilentReporter).unwrap();
    assert!(second.plan.is_empty());
    assert_eq!(device.mutations(), mutations);
}

#[test]
fn test_task_panic_fails_the_pass_before_uploads() {
    let tmp = tempdir().unwrap();
    let local = tmp.path().join("Car");
    create_local_folder(&local, &["new.mp3"]);

    let device = Arc::new(FakeDevice {
        panic_delete: ["broken.mp3".to_string()].into_iter().collect(),
        ..FakeDevice::with_files(&["broken.mp3", "old.mp3"], stamp(10))
    });
    let engine = engine(&device);

    assert!(engine.sync(&local, REMOTE, &SilentReporter).is_err());
    // The rest of the delete batch still ran.
    assert!(!device.names().contains("old.mp3"));
    assert!(!engine.full_sync(&local, REMOTE));
    assert_eq!(device.pushes.load(Ordering::SeqCst), 0);
    assert_eq!(device.touches.load(Ordering::SeqCst), 0);
    assert_eq!(device.rescans.load(Ordering::SeqCst), 0);
}

#[test]
fn test_settings_and_transport_are_exposed() {
    let device = Arc::new(FakeDevice::with_files(&["a.mp3"], stamp(10)));
    let settings = SyncSettings {
        max_workers: 2,
        upload_workers: 1,
        listing_failure: ListingFailurePolicy::Abort,
    };
    let engine = engine(&device).with_settings(settings);

    assert_eq!(engine.settings(), &settings);
    assert!(engine.transport().is_device_reachable());
    assert_eq!(engine.transport().names(), set_of(&["a.mp3"]));
    assert!(engine.probe_device());
}

/// Records which listing hook a pass used.
#[derive(Default)]
struct ListingRecorder {
    enumerated: Mutex<Vec<(usize, usize, bool)>>,
    remote_only: Mutex<Vec<(usize, bool)>>,
    planned: AtomicUsize,
}

impl SyncReporter for ListingRecorder {
    fn on_enumerate_complete(&self, local_files: usize, remote_files: usize, degraded: bool) {
        self.enumerated
            .lock()
            .unwrap()
            .push((local_files, remote_files, degraded));
    }

    fn on_remote_listed(&self, remote_files: usize, degraded: bool) {
        self.remote_only
            .lock()
            .unwrap()
            .push((remote_files, degraded));
    }

    fn on_plan(&self, _plan: &ReconciliationPlan) {
        self.planned.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_normalize_reports_only_the_remote_listing() {
    let device = Arc::new(FakeDevice::with_files(&["a.mp3", "b.flac"], stamp(10)));
    let recorder = ListingRecorder::default();
    engine(&device).normalize(REMOTE, &recorder).unwrap();

    assert_eq!(*recorder.remote_only.lock().unwrap(), vec![(2, false)]);
    assert!(recorder.enumerated.lock().unwrap().is_empty());
    assert_eq!(recorder.planned.load(Ordering::SeqCst), 0);
}

#[test]
fn test_sync_reports_both_listings() {
    let tmp = tempdir().unwrap();
    let local = tmp.path().join("Car");
    create_local_folder(&local, &["a.mp3", "b.flac", "c.wav"]);

    let device = Arc::new(FakeDevice {
        fail_listing: true,
        ..FakeDevice::default()
    });
    let recorder = ListingRecorder::default();
    engine(&device).sync(&local, REMOTE, &recorder).unwrap();

    assert_eq!(*recorder.enumerated.lock().unwrap(), vec![(3, 0, true)]);
    assert!(recorder.remote_only.lock().unwrap().is_empty());
    assert_eq!(recorder.planned.load(Ordering::SeqCst), 1);
}
