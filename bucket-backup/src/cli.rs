/// # bucket-backup CLI Interface (Module)
///
/// Command parsing and the entrypoints shared by `main()` and the tests.
/// All planning and process supervision lives in [`bucket_backup_core`];
/// this module wires the loaded profiles, the run mode and the real
/// `aws` executor together.
///
/// - [`Cli`] declares the single `--dryrun` flag.
/// - [`run`] is what the binary calls.
/// - [`run_with`] takes an explicit config path and executor so tests can
///   substitute a mock.
use crate::load_config::{config_path, load_config};
use anyhow::{Context, Result};
use bucket_backup_core::backup::{run_backup, BackupReport};
use bucket_backup_core::contract::SyncExecutor;
use bucket_backup_core::execute::{ProcessExecutor, TracingSink, TransferTool};
use bucket_backup_core::plan::RunMode;
use chrono::Utc;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;

/// Overrides the path of the `aws` executable.
pub const TOOL_ENV_VAR: &str = "BUCKET_BACKUP_AWS";

/// Back up remote S3 buckets to local folders.
#[derive(Parser, Debug)]
#[clap(
    name = "bucket-backup",
    version,
    about = "Backup remote S3 buckets to local folders"
)]
pub struct Cli {
    /// Pass --dryrun to every aws command: report what would be transferred, download nothing
    #[clap(long)]
    pub dryrun: bool,
}

impl Cli {
    pub fn mode(&self) -> RunMode {
        RunMode::from_dryrun(self.dryrun)
    }
}

/// The transfer tool, honouring [`TOOL_ENV_VAR`].
pub fn transfer_tool() -> TransferTool {
    match std::env::var(TOOL_ENV_VAR) {
        Ok(program) if !program.trim().is_empty() => TransferTool::with_program(program),
        _ => TransferTool::default(),
    }
}

/// Loads the profiles and runs the backup with the real `aws` executor.
pub async fn run(cli: Cli) -> Result<BackupReport> {
    let executor = ProcessExecutor::new(transfer_tool(), Arc::new(TracingSink));
    run_with(&cli, &config_path(), &executor).await
}

/// Loads the profiles at `config` and runs every sync through `executor`.
///
/// A configuration error returns before anything is planned.
pub async fn run_with<E>(cli: &Cli, config: &Path, executor: &E) -> Result<BackupReport>
where
    E: SyncExecutor + ?Sized,
{
    let profiles = load_config(config)
        .with_context(|| format!("Failed to load backup profiles from {}", config.display()))?;

    tracing::info!(command = "backup", mode = ?cli.mode(), "Starting backup");
    let report = run_backup(&profiles, cli.mode(), executor, Utc::now).await;
    Ok(report)
}
