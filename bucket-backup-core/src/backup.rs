//! The backup run: plan and execute every configured path, one at a time.
//!
//! Profiles and paths are visited in declaration order. Each sync must finish
//! before the next is planned. A failed sync is logged and the run moves on;
//! nothing is retried. The outcome of every task is collected in a
//! [`BackupReport`] for the caller to summarise.

use chrono::{DateTime, Utc};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::ProfileSet;
use crate::contract::{SyncExecutor, TerminationStatus};
use crate::plan::{plan_task, RunMode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The tool ran to completion, with whatever exit code it chose.
    Completed(TerminationStatus),
    /// The tool could not be launched or supervised.
    LaunchFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub profile: String,
    pub source: String,
    pub destination: String,
    pub outcome: TaskOutcome,
}

impl TaskReport {
    pub fn succeeded(&self) -> bool {
        matches!(&self.outcome, TaskOutcome::Completed(status) if status.success())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupReport {
    pub run_id: Uuid,
    pub mode: RunMode,
    pub tasks: Vec<TaskReport>,
}

impl BackupReport {
    /// Tasks that did not exit with code 0.
    pub fn failures(&self) -> usize {
        self.tasks.iter().filter(|t| !t.succeeded()).count()
    }
}

/// Runs every path of every profile through `executor`.
///
/// `clock` is sampled once per task, right before it is planned.
pub async fn run_backup<E, C>(
    profiles: &ProfileSet,
    mode: RunMode,
    executor: &E,
    clock: C,
) -> BackupReport
where
    E: SyncExecutor + ?Sized,
    C: Fn() -> DateTime<Utc>,
{
    let run_id = Uuid::new_v4();
    let span = info_span!("backup", %run_id, dry_run = mode.is_dry_run());

    async {
        match mode {
            RunMode::Live => info!("Not a dry run: Eligible files will be downloaded"),
            RunMode::DryRun => info!("DRY RUN: Nothing will be downloaded"),
        }

        let mut tasks = Vec::with_capacity(profiles.path_count());
        for profile in profiles.profiles() {
            for path in &profile.paths {
                let task = plan_task(&profile.name, path, mode, clock());
                info!(
                    profile = %profile.name,
                    remote = %task.source,
                    local = %task.destination,
                    flags = ?task.flag_strings(),
                    "Planned sync"
                );

                let outcome = match executor.execute(&task).await {
                    Ok(status) if status.success() => TaskOutcome::Completed(status),
                    Ok(status) => {
                        error!(
                            profile = %profile.name,
                            remote = %task.source,
                            code = ?status.code,
                            "Sync exited unsuccessfully; continuing with the next path"
                        );
                        TaskOutcome::Completed(status)
                    }
                    Err(e) => {
                        let reason = describe(&e);
                        error!(
                            profile = %profile.name,
                            remote = %task.source,
                            error = %reason,
                            "Sync could not run; continuing with the next path"
                        );
                        TaskOutcome::LaunchFailed(reason)
                    }
                };

                tasks.push(TaskReport {
                    profile: task.identity,
                    source: task.source,
                    destination: task.destination,
                    outcome,
                });
            }
        }

        let report = BackupReport {
            run_id,
            mode,
            tasks,
        };
        if report.failures() > 0 {
            warn!(
                failed = report.failures(),
                total = report.tasks.len(),
                "Backup finished with failed syncs"
            );
        } else {
            info!(total = report.tasks.len(), "Backup finished");
        }
        report
    }
    .instrument(span)
    .await
}

/// `error: cause: cause...`, the way the CLI renders its own errors.
fn describe(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
