//! Turns one configured path into the `aws s3 sync` task that backs it up.
//!
//! Planning is pure: the same profile, path, mode and instant always give the
//! same [`SyncTask`]. The caller supplies the clock.

use std::fmt;

use chrono::{DateTime, Duration, Utc};

use crate::config::{DatePattern, PathSpec};

/// Whether the transfer tool should actually move files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Live,
    /// The tool's own `--dryrun`: every step is reported, nothing is written.
    DryRun,
}

impl RunMode {
    pub fn from_dryrun(dryrun: bool) -> Self {
        if dryrun {
            RunMode::DryRun
        } else {
            RunMode::Live
        }
    }

    pub fn is_dry_run(self) -> bool {
        self == RunMode::DryRun
    }
}

/// A single option passed to the transfer tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferFlag {
    /// Remove destination files that are absent from the source.
    Delete,
    Exclude(String),
    Include(String),
    DryRun,
}

impl TransferFlag {
    /// Argument vector form, for spawning without a shell.
    pub fn to_args(&self) -> Vec<String> {
        match self {
            TransferFlag::Delete => vec!["--delete".to_string()],
            TransferFlag::Exclude(pattern) => vec!["--exclude".to_string(), pattern.clone()],
            TransferFlag::Include(pattern) => vec!["--include".to_string(), pattern.clone()],
            TransferFlag::DryRun => vec!["--dryrun".to_string()],
        }
    }
}

/// Renders the flag the way it would be typed on a shell command line.
impl fmt::Display for TransferFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferFlag::Delete => f.write_str("--delete"),
            TransferFlag::Exclude(pattern) => write!(f, "--exclude '{pattern}'"),
            TransferFlag::Include(pattern) => write!(f, "--include '{pattern}'"),
            TransferFlag::DryRun => f.write_str("--dryrun"),
        }
    }
}

/// Everything needed to run one sync. Built fresh for every path on every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTask {
    pub source: String,
    pub destination: String,
    /// Profile name, passed as `--profile=<identity>`.
    pub identity: String,
    pub flags: Vec<TransferFlag>,
}

impl SyncTask {
    /// Flags in their shell-rendered form, e.g. `--include '2024-03-15'`.
    pub fn flag_strings(&self) -> Vec<String> {
        self.flags.iter().map(ToString::to_string).collect()
    }
}

/// Plans the sync of `path` under `profile`.
///
/// Filter flags keep the tool's left-to-right evaluation in mind: the
/// catch-all exclude comes first so the date includes re-admit only the
/// matching names. `--dryrun` is always last.
pub fn plan_task(profile: &str, path: &PathSpec, mode: RunMode, now: DateTime<Utc>) -> SyncTask {
    let mut flags = Vec::new();

    if path.delete {
        flags.push(TransferFlag::Delete);
    }

    if let Some(filter) = &path.include_only {
        let mut includes = Vec::new();
        if let Some(pattern) = &filter.today {
            includes.push(TransferFlag::Include(format_date(now, pattern)));
        }
        if let Some(pattern) = &filter.yesterday {
            includes.push(TransferFlag::Include(format_date(now - Duration::days(1), pattern)));
        }

        if !includes.is_empty() {
            flags.push(TransferFlag::Exclude("*".to_string()));
            flags.extend(includes);
        }
    }

    if mode.is_dry_run() {
        flags.push(TransferFlag::DryRun);
    }

    SyncTask {
        source: path.remote.clone(),
        destination: path.local.clone(),
        identity: profile.to_string(),
        flags,
    }
}

fn format_date(instant: DateTime<Utc>, pattern: &DatePattern) -> String {
    instant.format(pattern.as_str()).to_string()
}
