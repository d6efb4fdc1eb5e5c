mod cli;
mod logging;
mod reporter;

use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser};
use cli::{Cli, Commands, NormalizeArgs, SyncArgs};
use colored::*;
use dotenv::dotenv;
use phone_sync::config::{load_configuration, FolderMapping};
use phone_sync::report::write_outcome_csv;
use phone_sync::transport::{explorer_path_to_remote, normalize_remote_folder};
use phone_sync::{AdbBridge, AppConfig, SyncEngine, SyncReport, SyncSettings};
use reporter::CliReporter;
use tracing::{error, info, warn};

fn main() -> ExitCode {
    dotenv().ok();

    let _guard = logging::init_logger();

    let args = Cli::parse();

    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Cli) -> anyhow::Result<bool> {
    let config = load_configuration(args.config.as_deref())
        .context("Error loading configuration")?;

    match args.command {
        Some(Commands::Sync(sync_args)) => run_sync(&config, sync_args),
        Some(Commands::Normalize(normalize_args)) => run_normalize(&config, normalize_args),
        Some(Commands::Probe) => {
            let engine = build_engine(&config);
            let reachable = engine.probe_device();
            if reachable {
                println!("{}", "Device reachable".green());
            } else {
                println!("{}", "No device reachable".red());
            }
            Ok(reachable)
        }
        Some(Commands::RemotePath { explorer_path }) => {
            println!("{}", explorer_path_to_remote(&explorer_path));
            Ok(true)
        }
        Some(Commands::PrintConfig) => {
            let rendered =
                toml::to_string_pretty(&config).context("Error rendering configuration")?;
            println!("{}", rendered);
            Ok(true)
        }
        None => {
            let _ = Cli::command().print_long_help();
            Ok(true)
        }
    }
}

fn build_engine(config: &AppConfig) -> SyncEngine<AdbBridge> {
    SyncEngine::new(AdbBridge::from_config(config)).with_settings(SyncSettings::from(config))
}

fn run_sync(config: &AppConfig, args: SyncArgs) -> anyhow::Result<bool> {
    let mappings = match (args.local, args.remote) {
        (Some(local), Some(remote)) => vec![FolderMapping {
            local,
            remote: normalize_remote_folder(&remote),
        }],
        _ => config.mappings.clone(),
    };
    if mappings.is_empty() {
        bail!("Nothing to sync: pass --local and --remote or add [[mappings]] to the configuration");
    }

    let engine = build_engine(config);
    if !engine.probe_device() {
        warn!("Continuing without a confirmed device; bridge calls may fail");
    }

    let reporter = CliReporter::new();
    let mut reports = Vec::with_capacity(mappings.len());
    let mut all_ok = true;

    for mapping in &mappings {
        println!(
            "{} {} -> {}",
            "Syncing".bold(),
            mapping.local.display(),
            mapping.remote.cyan()
        );
        match engine.sync(&mapping.local, &mapping.remote, &reporter) {
            Ok(report) => {
                print_sync_summary(&report);
                reports.push(report);
            }
            Err(err) => {
                error!("Sync of {} failed: {}", mapping.remote, err);
                all_ok = false;
            }
        }
    }

    if let Some(path) = args.report {
        write_report(&path, &reports)?;
    }

    Ok(all_ok)
}

fn print_sync_summary(report: &SyncReport) {
    println!();
    info!(
        "Deleted: {}, Uploaded: {}, Re-stamped: {} in {}",
        format!("{}/{}", report.deletes.succeeded_count(), report.deletes.total()).green(),
        format!("{}/{}", report.uploads.succeeded_count(), report.uploads.total()).green(),
        format!("{}/{}", report.restamps.succeeded_count(), report.restamps.total()).green(),
        format!("{:.2}s", report.duration.as_secs_f64()).green(),
    );
    if let Some(ts) = &report.timestamp {
        info!("New files stamped {}", ts.to_string().cyan());
    }
    for phase in report.phases() {
        for (name, detail) in phase.failed() {
            warn!("{} {} failed: {}", phase.phase, name.red(), detail);
        }
    }
    if report.listing_degraded {
        warn!(
            "{}",
            "The phone listing failed, so every local file was pushed again".yellow()
        );
    }
}

fn write_report(path: &Path, reports: &[SyncReport]) -> anyhow::Result<()> {
    let rows = write_outcome_csv(path, reports)
        .with_context(|| format!("Error writing report to {}", path.display()))?;
    info!("Wrote {} row(s) to {}", rows, path.display());
    Ok(())
}

fn run_normalize(config: &AppConfig, args: NormalizeArgs) -> anyhow::Result<bool> {
    let folders: Vec<String> = match args.remote {
        Some(remote) => vec![normalize_remote_folder(&remote)],
        None => config.mappings.iter().map(|m| m.remote.clone()).collect(),
    };
    if folders.is_empty() {
        bail!("Nothing to normalize: pass --remote or add [[mappings]] to the configuration");
    }

    let engine = build_engine(config);
    let reporter = CliReporter::new();
    let mut all_ok = true;

    for folder in &folders {
        println!("{} {}", "Normalizing".bold(), folder.cyan());
        match engine.normalize(folder, &reporter) {
            Ok(report) => match report.timestamp {
                Some(ts) => info!(
                    "Re-stamped {}/{} file(s) to {}",
                    format!("{}", report.restamps.succeeded_count()).green(),
                    report.restamps.total(),
                    ts.to_string().cyan()
                ),
                None => info!("No music files in {}", folder),
            },
            Err(err) => {
                error!("Normalizing {} failed: {}", folder, err);
                all_ok = false;
            }
        }
    }

    Ok(all_ok)
}
