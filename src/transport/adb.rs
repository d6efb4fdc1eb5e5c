use super::process::{run_checked, run_with_timeout};
use super::remote_path::join_remote;
use super::{Transport, TransportError};
use crate::config::{AppConfig, TimeoutConfig};
use crate::timestamp::CanonicalTimestamp;
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

const MEDIA_SCANNER_ACTION: &str = "android.intent.action.MEDIA_SCANNER_SCAN_FILE";

/// [`Transport`] over the Android Debug Bridge command-line tool.
///
/// Each operation is one `adb` process with its own timeout budget; nothing is
/// kept between calls.
#[derive(Debug, Clone)]
pub struct AdbBridge {
    binary: String,
    serial: Option<String>,
    timeouts: TimeoutConfig,
}

impl AdbBridge {
    pub fn new(binary: &str) -> Self {
        Self {
            binary: binary.to_string(),
            serial: None,
            timeouts: TimeoutConfig::default(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            binary: config.bridge_binary.clone(),
            serial: config.device_serial.clone(),
            timeouts: config.timeouts.clone(),
        }
    }

    pub fn with_serial(mut self, serial: &str) -> Self {
        self.serial = Some(serial.to_string());
        self
    }

    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        if let Some(serial) = &self.serial {
            cmd.arg("-s").arg(serial);
        }
        cmd
    }

    fn shell(&self, script: &str) -> Command {
        let mut cmd = self.command();
        cmd.arg("shell").arg(script);
        cmd
    }
}

impl Transport for AdbBridge {
    fn is_device_reachable(&self) -> bool {
        // `adb devices` lists every device; `-s` would be ignored.
        let mut cmd = Command::new(&self.binary);
        cmd.arg("devices");
        match run_with_timeout(cmd, self.timeouts.probe()) {
            Ok(output) => parse_device_list(&output.stdout, self.serial.as_deref()),
            Err(e) => {
                warn!("Device probe failed: {}", e);
                false
            }
        }
    }

    fn list_remote_files(&self, remote_folder: &str) -> Result<Vec<String>, TransportError> {
        let script = format!("ls -1 {}", shell_quote(remote_folder));
        let output = run_checked(self.shell(&script), self.timeouts.list())?;
        let entries = parse_listing(&output.stdout);
        debug!("{} entries in {}", entries.len(), remote_folder);
        Ok(entries)
    }

    fn delete_remote_file(&self, remote_folder: &str, name: &str) -> Result<(), TransportError> {
        let script = format!("rm {}", shell_quote(&join_remote(remote_folder, name)));
        run_checked(self.shell(&script), self.timeouts.delete())?;
        Ok(())
    }

    fn push_local_file(
        &self,
        local_path: &Path,
        remote_folder: &str,
    ) -> Result<(), TransportError> {
        let name = local_path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| TransportError::InvalidLocalPath(local_path.display().to_string()))?;

        // `adb push` takes the destination as a plain argument, not a shell string.
        let mut cmd = self.command();
        cmd.arg("push")
            .arg(local_path)
            .arg(join_remote(remote_folder, name));
        run_checked(cmd, self.timeouts.push())?;
        Ok(())
    }

    fn set_remote_timestamp(
        &self,
        remote_folder: &str,
        name: &str,
        timestamp: &CanonicalTimestamp,
    ) -> Result<(), TransportError> {
        let script = touch_script(&join_remote(remote_folder, name), timestamp);
        run_checked(self.shell(&script), self.timeouts.touch())?;
        Ok(())
    }

    fn trigger_media_rescan(&self, remote_folder: &str) -> Result<(), TransportError> {
        run_checked(self.shell(&rescan_script(remote_folder)), self.timeouts.rescan())?;
        Ok(())
    }
}

/// Single-quotes `value` for the device shell.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// `-c` keeps `touch` from creating a file that vanished in the meantime.
pub fn touch_script(remote_path: &str, timestamp: &CanonicalTimestamp) -> String {
    format!(
        "touch -c -t {} {}",
        timestamp.touch_arg(),
        shell_quote(remote_path)
    )
}

pub fn rescan_script(remote_folder: &str) -> String {
    format!(
        "am broadcast -a {} -d {}",
        MEDIA_SCANNER_ACTION,
        shell_quote(&format!("file://{}", remote_folder))
    )
}

/// Interprets `adb devices` output. The first line is a header; every other
/// line is `<serial>\t<state>`.
pub fn parse_device_list(output: &str, serial: Option<&str>) -> bool {
    output
        .lines()
        .skip(1)
        .filter_map(|line| line.trim().split_once('\t'))
        .filter(|(_, state)| state.trim() == "device")
        .any(|(id, _)| serial.map_or(true, |wanted| id.trim() == wanted))
}

/// One entry per line. Only line terminators are stripped; spaces are part
/// of the name and must match the local file exactly.
pub fn parse_listing(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
