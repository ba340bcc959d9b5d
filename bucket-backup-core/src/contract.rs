//! # contract: the seams between planning and the outside world
//!
//! Two traits separate the run loop from side effects:
//! - [`SyncExecutor`] runs a planned [`SyncTask`] to completion. The real
//!   implementation spawns the transfer tool; tests substitute a mock.
//! - [`LogSink`] receives the tool's output, one line at a time.
//!
//! Both are annotated for `mockall`, so consumers get `MockSyncExecutor` and
//! `MockLogSink` under `cfg(test)` or the `test-export-mocks` feature.

use async_trait::async_trait;
use thiserror::Error;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::plan::SyncTask;

/// How an invocation ended. A non-zero code is reported, not raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationStatus {
    /// `None` when the process was ended by a signal.
    pub code: Option<i32>,
}

impl TerminationStatus {
    pub fn from_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for TerminationStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("Failed to launch `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to wait for `{program}`")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Runs one sync task as an external invocation and supervises it until it
/// terminates. There is no timeout and no cancellation.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait SyncExecutor: Send + Sync {
    async fn execute(&self, task: &SyncTask) -> Result<TerminationStatus, ExecuteError>;
}

/// Destination for the transfer tool's output lines.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait LogSink: Send + Sync {
    /// A line from standard output.
    fn info(&self, line: &str);

    /// A line from standard error.
    fn error(&self, line: &str);
}
