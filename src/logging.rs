use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "info";
const DEFAULT_LOG_FILE: &str = "./logs/phone-sync.log";
const FALLBACK_FILE_NAME: &str = "phone-sync.log";

/// Where log output goes and how much of it. Read from `TRACING_LEVEL` and
/// `LOG_FILE_PATH`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LogSettings {
    filter: String,
    directory: PathBuf,
    file_name: OsString,
}

impl LogSettings {
    fn from_env() -> Self {
        Self::resolve(
            env::var("TRACING_LEVEL").ok(),
            env::var("LOG_FILE_PATH").ok(),
        )
    }

    fn resolve(filter: Option<String>, log_file: Option<String>) -> Self {
        let filter = filter
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());
        let log_file = log_file
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string());

        let path = Path::new(&log_file);
        let directory = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        let file_name = path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| OsString::from(FALLBACK_FILE_NAME));

        Self {
            filter,
            directory,
            file_name,
        }
    }
}

/// Installs the stdout and file layers. Keep the returned guard alive until
/// exit or buffered file output is lost.
pub fn init_logger() -> impl Drop {
    let settings = LogSettings::from_env();

    let file_appender =
        tracing_appender::rolling::never(&settings.directory, &settings.file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .pretty()
                .with_file(false)
                .without_time()
                .with_ansi(true),
        )
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_target(false)
                .with_ansi(false),
        )
        .with(EnvFilter::new(&settings.filter))
        .init();

    info!(
        "Logging at '{}' to {}",
        settings.filter,
        settings.directory.join(&settings.file_name).display()
    );

    guard
}
