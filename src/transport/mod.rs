pub mod adb;
pub mod process;
pub mod remote_path;

pub use adb::AdbBridge;
pub use remote_path::{explorer_path_to_remote, is_remote_path, join_remote, normalize_remote_folder};

use crate::timestamp::CanonicalTimestamp;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single bridge invocation. Launch failures, timeouts and
/// non-zero exits are all ordinary operation failures to the engine.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' timed out after {}s", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    #[error("'{command}' exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("local path '{0}' has no usable file name")]
    InvalidLocalPath(String),
}

/// The discrete remote operations the sync engine needs from a device.
///
/// Every call is independent and bounded by its own timeout. Implementations
/// must not retry or batch; the engine decides how failures aggregate.
pub trait Transport: Send + Sync {
    /// Advisory connectivity check. A `false` here does not abort a pass.
    fn is_device_reachable(&self) -> bool;

    /// Raw entry names of `remote_folder`, unfiltered.
    fn list_remote_files(&self, remote_folder: &str) -> Result<Vec<String>, TransportError>;

    fn delete_remote_file(&self, remote_folder: &str, name: &str) -> Result<(), TransportError>;

    /// Copies `local_path` into `remote_folder` under its own base name.
    fn push_local_file(&self, local_path: &Path, remote_folder: &str)
        -> Result<(), TransportError>;

    /// Sets access and modification time of an existing remote file without
    /// touching its content.
    fn set_remote_timestamp(
        &self,
        remote_folder: &str,
        name: &str,
        timestamp: &CanonicalTimestamp,
    ) -> Result<(), TransportError>;

    /// Best-effort notification that files under `remote_folder` changed.
    fn trigger_media_rescan(&self, remote_folder: &str) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn is_device_reachable(&self) -> bool {
        (**self).is_device_reachable()
    }

    fn list_remote_files(&self, remote_folder: &str) -> Result<Vec<String>, TransportError> {
        (**self).list_remote_files(remote_folder)
    }

    fn delete_remote_file(&self, remote_folder: &str, name: &str) -> Result<(), TransportError> {
        (**self).delete_remote_file(remote_folder, name)
    }

    fn push_local_file(
        &self,
        local_path: &Path,
        remote_folder: &str,
    ) -> Result<(), TransportError> {
        (**self).push_local_file(local_path, remote_folder)
    }

    fn set_remote_timestamp(
        &self,
        remote_folder: &str,
        name: &str,
        timestamp: &CanonicalTimestamp,
    ) -> Result<(), TransportError> {
        (**self).set_remote_timestamp(remote_folder, name, timestamp)
    }

    fn trigger_media_rescan(&self, remote_folder: &str) -> Result<(), TransportError> {
        (**self).trigger_media_rescan(remote_folder)
    }
}
