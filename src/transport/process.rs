use super::TransportError;
use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Captured result of one bridge process.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Renders a command line for log and error messages.
pub fn describe(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().into_owned()];
    parts.extend(cmd.get_args().map(|arg| arg.to_string_lossy().into_owned()));
    parts.join(" ")
}

/// Launches `cmd`, captures its output and kills it once `timeout` elapses.
///
/// The same deadline bounds reading the output: a descendant that keeps the
/// pipes open (adb forking its server, for one) cannot hold the call past its
/// budget. Output read up to that point is returned.
///
/// A non-zero exit is still `Ok` here; see [`run_checked`].
pub fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Result<CommandOutput, TransportError> {
    let command = describe(&cmd);
    let program = cmd.get_program().to_string_lossy().into_owned();

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    hide_console_window(&mut cmd);

    debug!("Running '{}' (timeout {}s)", command, timeout.as_secs());
    let mut child = cmd.spawn().map_err(|source| TransportError::Launch {
        program: program.clone(),
        source,
    })?;

    let stdout_reader = child.stdout.take().map(drain);
    let stderr_reader = child.stderr.take().map(drain);

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                debug!("'{}' killed after {}s", command, timeout.as_secs());
                return Err(TransportError::Timeout { command, timeout });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(source) => {
                let _ = child.kill();
                return Err(TransportError::Launch { program, source });
            }
        }
    };

    let stdout = collect(stdout_reader, deadline, &command, "stdout");
    let stderr = collect(stderr_reader, deadline, &command, "stderr");
    trace!("'{}' finished with {}", command, status);

    Ok(CommandOutput {
        status,
        stdout,
        stderr,
    })
}

/// Like [`run_with_timeout`] but maps a non-zero exit to [`TransportError::Failed`].
pub fn run_checked(cmd: Command, timeout: Duration) -> Result<CommandOutput, TransportError> {
    let command = describe(&cmd);
    let output = run_with_timeout(cmd, timeout)?;
    if output.success() {
        return Ok(output);
    }

    let detail = if output.stderr.trim().is_empty() {
        output.stdout.trim().to_string()
    } else {
        output.stderr.trim().to_string()
    };
    Err(TransportError::Failed {
        command,
        status: output.status.to_string(),
        stderr: detail,
    })
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buffer = [0u8; 8192];
        loop {
            match reader.read(&mut buffer) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if tx.send(buffer[..n].to_vec()).is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}

/// Gathers chunks until the writer side closes or `deadline` passes.
fn collect(
    reader: Option<Receiver<Vec<u8>>>,
    deadline: Instant,
    command: &str,
    stream: &str,
) -> String {
    let Some(reader) = reader else {
        return String::new();
    };

    let mut buffer = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match reader.recv_timeout(remaining) {
            Ok(chunk) => buffer.extend_from_slice(&chunk),
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "'{}' exited but its {} is still held open; keeping {} byte(s) read so far",
                    command,
                    stream,
                    buffer.len()
                );
                break;
            }
        }
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(windows)]
fn hide_console_window(cmd: &mut Command) {
    use std::os::windows::process::CommandExt;
    cmd.creation_flags(winapi::um::winbase::CREATE_NO_WINDOW);
}

#[cfg(not(windows))]
fn hide_console_window(_cmd: &mut Command) {}
