use crate::error::Error;
use crate::progress::SyncReporter;
use crate::report::{Phase, PhaseReport};
use crate::runner::TaskRunner;
use crate::transport::Transport;
use chrono::{Local, NaiveDateTime, NaiveTime};
use std::fmt;
use tracing::info;

/// The single modification time applied to every file a pass touches.
///
/// Files synced in the same pass compare equal by mtime afterwards, which is
/// what players that sort by "date added" group on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanonicalTimestamp(NaiveDateTime);

impl CanonicalTimestamp {
    pub fn new(at: NaiveDateTime) -> Self {
        Self(at)
    }

    /// Today at 00:00:00 local time.
    pub fn today() -> Self {
        Self(Local::now().date_naive().and_time(NaiveTime::MIN))
    }

    pub fn as_naive(&self) -> NaiveDateTime {
        self.0
    }

    /// `[[CC]YY]MMDDhhmm[.ss]` as understood by `touch -t`.
    pub fn touch_arg(&self) -> String {
        self.0.format("%Y%m%d%H%M.%S").to_string()
    }
}

impl fmt::Display for CanonicalTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S"))
    }
}

/// Sets `timestamp` on every file in `names` under `remote_folder`, one
/// bridge call per file.
pub fn apply_timestamp<'a, T, I>(
    transport: &T,
    runner: &TaskRunner,
    remote_folder: &str,
    names: I,
    timestamp: &CanonicalTimestamp,
    reporter: &dyn SyncReporter,
) -> Result<PhaseReport, Error>
where
    T: Transport + ?Sized,
    I: IntoIterator<Item = &'a String>,
{
    let report = runner.run_phase(Phase::Restamp, names, reporter, |name| {
        transport.set_remote_timestamp(remote_folder, name, timestamp)
    })?;
    info!(
        "Re-stamped {}/{} file(s) in {} to {}",
        report.succeeded_count(),
        report.total(),
        remote_folder,
        timestamp
    );
    Ok(report)
}
